//! Agent registry and process supervision
//!
//! Spawns isolated background sessions per worktree, tracks their
//! liveness, captures output, and terminates them on demand. The
//! registry is owned by one supervisor instance obtained via
//! constructor injection; there is no ambient global state.

mod agent_supervisor;
mod registry;

pub use agent_supervisor::{AgentEvent, AgentSupervisor};
pub use registry::{AgentRegistry, StatusCounts};
