//! Domain types for stagehand
//!
//! This module contains all core domain types:
//! - Stage: the four workflow stages, each backed by one worktree
//! - Agent: one spawned background task bound to a stage
//! - Signal: the marker files that chain workflow stages together

pub mod agent;
pub mod signal;
pub mod stage;

pub use agent::{Agent, AgentStatus};
pub use signal::Signal;
pub use stage::Stage;
