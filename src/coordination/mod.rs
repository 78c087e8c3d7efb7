//! Signal-file workflow coordination
//!
//! Watches the well-known marker files inside stage worktrees and
//! decides which stage runs next: feature feeds test, test feeds docs,
//! bugfix feeds test (re-validation), docs is terminal. Decisions are
//! pure data; consumption of a signal is exactly-once.

mod chain;
mod scanner;

pub use chain::{ChainAction, next_action};
pub use scanner::SignalScanner;

/// Note dropped into the docs worktree when documentation work is due
pub const DOCS_NEEDED_FILE: &str = ".docs-needed";
