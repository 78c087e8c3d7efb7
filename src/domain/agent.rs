//! Agent record and status
//!
//! An Agent is one spawned background task, owned by the registry for its
//! lifetime. Status transitions are monotonic: Running moves to Completed
//! or Failed once, and terminal states never revert.

use serde::{Deserialize, Serialize};

use crate::domain::Stage;
use crate::id::{generate_agent_id, now_ms};

/// Status of an agent's background session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    /// Session is (believed to be) alive
    Running,
    /// Session ended on its own
    Completed,
    /// Terminated via kill, or failed to run
    Failed,
}

impl AgentStatus {
    /// Returns true once the agent has stopped running
    pub fn is_terminal(&self) -> bool {
        matches!(self, AgentStatus::Completed | AgentStatus::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgentStatus::Running => "running",
            AgentStatus::Completed => "completed",
            AgentStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One spawned background task bound to a stage worktree
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    /// Unique identifier (timestamp + random suffix: "agent-1738300800123-a1b2")
    pub id: String,

    /// Stage whose worktree the agent runs in
    pub stage: Stage,

    /// Free-text task description
    pub task: String,

    /// Current status
    pub status: AgentStatus,

    /// OS process id of the session's pane process, when resolved
    pub pid: Option<u32>,

    /// Name of the detached session hosting the task (None if the
    /// session could not be addressed)
    pub session: Option<String>,

    /// Spawn timestamp (ms since epoch)
    pub started_at: i64,

    /// Set when the agent reaches a terminal status (ms since epoch)
    pub finished_at: Option<i64>,
}

impl Agent {
    /// Create a new running agent for a stage
    pub fn new(stage: Stage, task: &str) -> Self {
        let id = generate_agent_id();
        Self {
            id: id.clone(),
            stage,
            task: task.to_string(),
            status: AgentStatus::Running,
            pid: None,
            session: Some(id),
            started_at: now_ms(),
            finished_at: None,
        }
    }

    /// Transition Running -> Completed. Terminal states are left alone.
    pub fn mark_completed(&mut self) {
        if self.status == AgentStatus::Running {
            self.status = AgentStatus::Completed;
            self.finished_at = Some(now_ms());
        }
    }

    /// Transition Running -> Failed. Terminal states are left alone, but
    /// a missing completion timestamp is backfilled so killed agents
    /// always carry one.
    pub fn mark_failed(&mut self) {
        if self.status == AgentStatus::Running {
            self.status = AgentStatus::Failed;
        }
        if self.finished_at.is_none() {
            self.finished_at = Some(now_ms());
        }
    }

    /// Seconds the agent has been running (or ran, once terminal)
    pub fn runtime_secs(&self) -> i64 {
        let end = self.finished_at.unwrap_or_else(now_ms);
        (end - self.started_at) / 1000
    }
}
