//! Session host boundary
//!
//! Agents run inside detached, named, re-attachable sessions provided by
//! an external host (a terminal multiplexer in production). The trait
//! keeps the supervisor independent of the host so tests can run against
//! a scripted mock.

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;

pub mod mock;
pub mod tmux;

pub use mock::MockSessionHost;
pub use tmux::TmuxHost;

/// External facility providing detached named command execution
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Start a detached session named `name`, running `command` (an
    /// argument vector, never a pre-joined shell string) with `cwd` as
    /// its working directory.
    async fn create_session(&self, name: &str, cwd: &Path, command: &[String]) -> Result<()>;

    /// Resolve the OS process id of the session's command, if available
    async fn session_pid(&self, name: &str) -> Result<Option<u32>>;

    /// Whether the session still exists
    async fn is_alive(&self, name: &str) -> Result<bool>;

    /// Capture the trailing `lines` lines of the session's visible output
    async fn capture(&self, name: &str, lines: usize) -> Result<String>;

    /// Terminate the session by name
    async fn kill_session(&self, name: &str) -> Result<()>;
}
