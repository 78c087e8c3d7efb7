//! stagehand - a git worktree workflow orchestrator
//!
//! Provisions one worktree per workflow stage (feature/test/docs/bugfix),
//! runs background agents in detached sessions bound to those worktrees,
//! and chains stages through signal files: feature feeds test, test feeds
//! docs, bugfix feeds test.

pub mod config;
pub mod coordination;
pub mod domain;
pub mod error;
pub mod exec;
pub mod id;
pub mod ops;
pub mod report;
pub mod session;
pub mod supervisor;
pub mod watch;
pub mod worktree;

pub use error::{OrchestratorError, Result};
