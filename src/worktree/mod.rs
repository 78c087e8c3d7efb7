//! Git worktree management for stage isolation.
//!
//! Each workflow stage gets its own worktree in a sibling directory of
//! the repository, checked out to a branch derived from the stage and
//! project name.

mod manager;

pub use manager::{ChangeKind, PendingChange, ProjectContext, WorktreeEntry, WorktreeManager};

/// Launch helper written into every new worktree
pub const LAUNCH_SCRIPT: &str = "agent-start.sh";
