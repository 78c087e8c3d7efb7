//! Scripted in-memory session host for tests
//!
//! Sessions live in a map; tests flip them dead to drive the
//! supervisor's liveness detection without a real multiplexer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::session::SessionHost;

#[derive(Debug, Clone)]
struct MockSession {
    alive: bool,
    pid: Option<u32>,
    cwd: PathBuf,
    command: Vec<String>,
    output: String,
}

/// Pid reported for mock sessions; beyond any real pid range so stray
/// termination attempts in tests cannot hit a live process
pub const MOCK_PID: u32 = u32::MAX;

/// In-memory SessionHost implementation
#[derive(Debug, Default)]
pub struct MockSessionHost {
    sessions: Mutex<HashMap<String, MockSession>>,
    /// When true, create_session fails (spawn-error paths)
    pub fail_create: bool,
}

impl MockSessionHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            fail_create: true,
        }
    }

    /// Mark a session as ended, as if its command exited
    pub fn end_session(&self, name: &str) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(name) {
            s.alive = false;
        }
    }

    /// Set the visible output buffer of a session
    pub fn set_output(&self, name: &str, output: &str) {
        if let Some(s) = self.sessions.lock().unwrap().get_mut(name) {
            s.output = output.to_string();
        }
    }

    /// The argv a session was started with
    pub fn command_of(&self, name: &str) -> Option<Vec<String>> {
        self.sessions.lock().unwrap().get(name).map(|s| s.command.clone())
    }

    /// The working directory a session was started in
    pub fn cwd_of(&self, name: &str) -> Option<PathBuf> {
        self.sessions.lock().unwrap().get(name).map(|s| s.cwd.clone())
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl SessionHost for MockSessionHost {
    async fn create_session(&self, name: &str, cwd: &Path, command: &[String]) -> Result<()> {
        if self.fail_create {
            return Err(OrchestratorError::Session("mock create failure".to_string()));
        }
        self.sessions.lock().unwrap().insert(
            name.to_string(),
            MockSession {
                alive: true,
                pid: Some(MOCK_PID),
                cwd: cwd.to_path_buf(),
                command: command.to_vec(),
                output: String::new(),
            },
        );
        Ok(())
    }

    async fn session_pid(&self, name: &str) -> Result<Option<u32>> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(name)
            .and_then(|s| s.pid))
    }

    async fn is_alive(&self, name: &str) -> Result<bool> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .get(name)
            .map(|s| s.alive)
            .unwrap_or(false))
    }

    async fn capture(&self, name: &str, lines: usize) -> Result<String> {
        let sessions = self.sessions.lock().unwrap();
        let session = sessions
            .get(name)
            .ok_or_else(|| OrchestratorError::Session(format!("no such session: {}", name)))?;
        let all: Vec<&str> = session.output.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].join("\n"))
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        let mut sessions = self.sessions.lock().unwrap();
        match sessions.get_mut(name) {
            Some(s) => {
                s.alive = false;
                Ok(())
            }
            None => Err(OrchestratorError::Session(format!("no such session: {}", name))),
        }
    }
}
