//! Agent supervisor
//!
//! Spawns background sessions for agents, runs a per-agent liveness
//! watcher, and handles termination and log capture. Completion events
//! are published on an mpsc channel so the workflow watcher can chain
//! the next stage.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::SupervisorConfig;
use crate::domain::{Agent, AgentStatus, Stage};
use crate::error::{OrchestratorError, Result};
use crate::exec;
use crate::session::SessionHost;
use crate::supervisor::registry::{AgentRegistry, StatusCounts};
use crate::worktree::WorktreeManager;

/// Event sent from liveness watchers back to the workflow watcher
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AgentEvent {
    /// An agent's session ended on its own
    Exited { agent_id: String, stage: Stage },
}

/// Supervises background agent sessions for stage worktrees
pub struct AgentSupervisor {
    host: Arc<dyn SessionHost>,
    worktrees: Arc<WorktreeManager>,
    registry: Arc<Mutex<AgentRegistry>>,
    event_tx: mpsc::Sender<AgentEvent>,
    liveness_interval: Duration,
    default_log_lines: usize,
    watchers: Mutex<HashMap<String, JoinHandle<()>>>,
}

impl AgentSupervisor {
    /// Create a supervisor and the receiving end of its event channel.
    pub fn new(
        host: Arc<dyn SessionHost>,
        worktrees: Arc<WorktreeManager>,
        config: &SupervisorConfig,
    ) -> (Self, mpsc::Receiver<AgentEvent>) {
        let (event_tx, event_rx) = mpsc::channel(100);
        let supervisor = Self {
            host,
            worktrees,
            registry: Arc::new(Mutex::new(AgentRegistry::new(config.max_finished_agents))),
            event_tx,
            liveness_interval: Duration::from_millis(config.liveness_interval_ms),
            default_log_lines: config.default_log_lines,
            watchers: Mutex::new(HashMap::new()),
        };
        (supervisor, event_rx)
    }

    /// Spawn a detached agent session in a stage's worktree.
    ///
    /// The worktree must already exist on disk; spawning never provisions
    /// infrastructure. Returns the new agent id once the session is
    /// confirmed started (not when the task completes).
    pub async fn spawn(&self, stage: Stage, task: &str, command: Vec<String>) -> Result<String> {
        if !self.worktrees.exists(stage) {
            return Err(OrchestratorError::WorktreeNotFound(format!(
                "{} (create it before spawning an agent)",
                stage
            )));
        }
        if command.is_empty() {
            return Err(OrchestratorError::Spawn("Empty command".to_string()));
        }

        let mut agent = Agent::new(stage, task);
        // Session name is the agent id, unique by construction
        let session = agent.id.clone();
        let worktree_path = self.worktrees.path(stage);

        self.host
            .create_session(&session, &worktree_path, &command)
            .await
            .map_err(|e| OrchestratorError::Spawn(e.to_string()))?;

        match self.host.session_pid(&session).await {
            Ok(pid) => agent.pid = pid,
            Err(e) => {
                tracing::warn!(agent_id = %agent.id, error = %e, "Could not resolve session pid");
            }
        }

        let agent_id = agent.id.clone();
        tracing::info!(
            agent_id = %agent_id,
            stage = %stage,
            pid = ?agent.pid,
            task = %task,
            "Spawned agent"
        );
        self.registry.lock().unwrap().insert(agent);
        self.start_watcher(agent_id.clone(), stage, session);

        Ok(agent_id)
    }

    /// Start the per-agent liveness poll.
    ///
    /// On session end the record moves Running -> Completed and an
    /// Exited event is published for the coordination hand-off. The
    /// watcher stops silently when the record is already terminal (a
    /// kill beat it to the transition).
    fn start_watcher(&self, agent_id: String, stage: Stage, session: String) {
        let host = self.host.clone();
        let registry = self.registry.clone();
        let event_tx = self.event_tx.clone();
        let interval = self.liveness_interval;

        let watcher_id = agent_id.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;

                let terminal = registry
                    .lock()
                    .unwrap()
                    .get(&agent_id)
                    .map(|a| a.status.is_terminal())
                    .unwrap_or(true);
                if terminal {
                    break;
                }

                match host.is_alive(&session).await {
                    Ok(true) => {}
                    Ok(false) => {
                        let transitioned = {
                            let mut reg = registry.lock().unwrap();
                            match reg.get_mut(&agent_id) {
                                Some(agent) if agent.status == AgentStatus::Running => {
                                    agent.mark_completed();
                                    true
                                }
                                _ => false,
                            }
                        };
                        if transitioned {
                            tracing::info!(agent_id = %agent_id, stage = %stage, "Agent session ended");
                            let _ = event_tx.send(AgentEvent::Exited { agent_id: agent_id.clone(), stage }).await;
                        }
                        break;
                    }
                    Err(e) => {
                        // Host hiccup: keep polling
                        tracing::warn!(agent_id = %agent_id, error = %e, "Liveness check failed");
                    }
                }
            }
        });

        let mut watchers = self.watchers.lock().unwrap();
        watchers.retain(|_, h| !h.is_finished());
        watchers.insert(watcher_id, handle);
    }

    /// Status query: one record for a known id, empty for an unknown id,
    /// or every record when no id is given.
    pub fn status(&self, agent_id: Option<&str>) -> Vec<Agent> {
        let registry = self.registry.lock().unwrap();
        match agent_id {
            Some(id) => registry.get(id).cloned().into_iter().collect(),
            None => registry.all(),
        }
    }

    /// Counts of agents by status.
    pub fn counts(&self) -> StatusCounts {
        self.registry.lock().unwrap().counts()
    }

    /// Whether an agent is currently running in a stage.
    pub fn running_in(&self, stage: Stage) -> bool {
        self.registry.lock().unwrap().running_in(stage)
    }

    /// Currently running agents.
    pub fn running(&self) -> Vec<Agent> {
        self.registry.lock().unwrap().running()
    }

    /// Terminate an agent: session kill plus a direct TERM to the
    /// recorded pid as a second channel. The record is marked failed
    /// with a completion timestamp regardless of whether the session had
    /// already exited on its own.
    pub async fn kill(&self, agent_id: &str) -> Result<String> {
        let (session, pid) = {
            let mut registry = self.registry.lock().unwrap();
            let agent = registry
                .get_mut(agent_id)
                .ok_or_else(|| OrchestratorError::AgentNotFound(agent_id.to_string()))?;
            agent.mark_failed();
            (agent.session.clone(), agent.pid)
        };

        if let Some(ref session) = session
            && let Err(e) = self.host.kill_session(session).await
        {
            tracing::warn!(agent_id = %agent_id, error = %e, "Session kill failed");
        }

        if let Some(pid) = pid {
            let pid_str = pid.to_string();
            match exec::run("kill", &["-TERM", &pid_str], None, 5000).await {
                Ok(out) if !out.success => {
                    tracing::debug!(agent_id = %agent_id, pid = pid, "Process already gone");
                }
                Err(e) => {
                    tracing::warn!(agent_id = %agent_id, error = %e, "Direct process kill failed");
                }
                _ => {}
            }
        }

        if let Some(ref session) = session
            && self.host.is_alive(session).await.unwrap_or(false)
        {
            return Err(OrchestratorError::Kill(format!(
                "Session {} still alive after kill",
                session
            )));
        }

        tracing::info!(agent_id = %agent_id, "Killed agent");
        Ok(format!("Agent {} terminated", agent_id))
    }

    /// Trailing lines of the agent's session output.
    ///
    /// Agents without a session handle (or whose session is gone) get an
    /// explanatory placeholder, not an error.
    pub async fn logs(&self, agent_id: &str, lines: Option<usize>) -> Result<String> {
        let agent = {
            let registry = self.registry.lock().unwrap();
            registry
                .get(agent_id)
                .cloned()
                .ok_or_else(|| OrchestratorError::AgentNotFound(agent_id.to_string()))?
        };

        let Some(session) = agent.session else {
            return Ok(format!("Agent {} has no attached session; no output available", agent_id));
        };

        let lines = lines.unwrap_or(self.default_log_lines);
        match self.host.capture(&session, lines).await {
            Ok(output) => Ok(output),
            Err(e) => {
                tracing::debug!(agent_id = %agent_id, error = %e, "Capture failed");
                Ok(format!("Session {} has ended; no output available", session))
            }
        }
    }

    /// Abort all liveness watchers. Used on shutdown so no poll task
    /// outlives the orchestrator.
    pub fn shutdown_watchers(&self) {
        let mut watchers = self.watchers.lock().unwrap();
        for (_, handle) in watchers.drain() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GitConfig;
    use crate::session::MockSessionHost;
    use crate::worktree::ProjectContext;
    use tempfile::TempDir;

    fn test_config() -> SupervisorConfig {
        SupervisorConfig {
            liveness_interval_ms: 25,
            max_finished_agents: 50,
            default_log_lines: 50,
        }
    }

    fn setup(host: Arc<MockSessionHost>) -> (TempDir, Arc<WorktreeManager>, AgentSupervisor, mpsc::Receiver<AgentEvent>) {
        let temp = TempDir::new().unwrap();
        let repo_root = temp.path().join("demo");
        std::fs::create_dir(&repo_root).unwrap();

        let context = ProjectContext {
            repo_root,
            project_name: "demo".to_string(),
        };
        let worktrees = Arc::new(WorktreeManager::new(context, &GitConfig::default()));
        // Fake existing worktrees on disk; no git needed for spawn paths
        std::fs::create_dir_all(worktrees.path(Stage::Feature)).unwrap();
        std::fs::create_dir_all(worktrees.path(Stage::Test)).unwrap();

        let (supervisor, rx) = AgentSupervisor::new(host, worktrees.clone(), &test_config());
        (temp, worktrees, supervisor, rx)
    }

    fn argv(parts: &[&str]) -> Vec<String> {
        parts.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_spawn_missing_worktree_registers_nothing() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host.clone());

        let result = supervisor.spawn(Stage::Docs, "write docs", argv(&["true"])).await;
        assert!(matches!(result, Err(OrchestratorError::WorktreeNotFound(_))));
        assert!(supervisor.status(None).is_empty());
        assert_eq!(host.session_count(), 0);
    }

    #[tokio::test]
    async fn test_spawn_failure_registers_nothing() {
        let host = Arc::new(MockSessionHost::failing());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        let result = supervisor.spawn(Stage::Feature, "task", argv(&["true"])).await;
        assert!(matches!(result, Err(OrchestratorError::Spawn(_))));
        assert!(supervisor.status(None).is_empty());
    }

    #[tokio::test]
    async fn test_spawn_empty_command() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        let result = supervisor.spawn(Stage::Feature, "task", vec![]).await;
        assert!(matches!(result, Err(OrchestratorError::Spawn(_))));
    }

    #[tokio::test]
    async fn test_spawn_registers_running_agent() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, worktrees, supervisor, _rx) = setup(host.clone());

        let id = supervisor
            .spawn(Stage::Feature, "build login", argv(&["echo", "done"]))
            .await
            .unwrap();
        assert!(id.starts_with("agent-"));

        let agents = supervisor.status(Some(&id));
        assert_eq!(agents.len(), 1);
        let agent = &agents[0];
        assert_eq!(agent.status, AgentStatus::Running);
        assert_eq!(agent.stage, Stage::Feature);
        assert_eq!(agent.task, "build login");
        assert_eq!(agent.pid, Some(crate::session::mock::MOCK_PID));
        assert_eq!(agent.session.as_deref(), Some(id.as_str()));

        // Session runs the argv rooted in the stage worktree
        assert_eq!(host.command_of(&id).unwrap(), argv(&["echo", "done"]));
        assert_eq!(host.cwd_of(&id).unwrap(), worktrees.path(Stage::Feature));
    }

    #[tokio::test]
    async fn test_status_unknown_id_is_empty() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        assert!(supervisor.status(Some("agent-0-ffff")).is_empty());
    }

    #[tokio::test]
    async fn test_liveness_marks_completed_and_emits_event() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, mut rx) = setup(host.clone());

        let id = supervisor
            .spawn(Stage::Feature, "task", argv(&["true"]))
            .await
            .unwrap();

        host.end_session(&id);

        let event = tokio::time::timeout(Duration::from_secs(2), rx.recv())
            .await
            .expect("liveness watcher should emit within the poll interval")
            .unwrap();
        assert_eq!(
            event,
            AgentEvent::Exited {
                agent_id: id.clone(),
                stage: Stage::Feature
            }
        );

        let agent = &supervisor.status(Some(&id))[0];
        assert_eq!(agent.status, AgentStatus::Completed);
        assert!(agent.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_kill_marks_failed_with_timestamp() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        let id = supervisor
            .spawn(Stage::Feature, "task", argv(&["sleep", "999"]))
            .await
            .unwrap();

        let confirmation = supervisor.kill(&id).await.unwrap();
        assert!(confirmation.contains(&id));

        let agent = &supervisor.status(Some(&id))[0];
        assert_eq!(agent.status, AgentStatus::Failed);
        assert!(agent.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_kill_after_session_already_exited() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host.clone());

        let id = supervisor
            .spawn(Stage::Feature, "task", argv(&["true"]))
            .await
            .unwrap();
        host.end_session(&id);

        // Session is already gone; kill still succeeds and marks failed
        supervisor.kill(&id).await.unwrap();
        let agent = &supervisor.status(Some(&id))[0];
        assert_eq!(agent.status, AgentStatus::Failed);
        assert!(agent.finished_at.is_some());
    }

    #[tokio::test]
    async fn test_kill_unknown_agent() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        let result = supervisor.kill("agent-0-ffff").await;
        assert!(matches!(result, Err(OrchestratorError::AgentNotFound(_))));
    }

    #[tokio::test]
    async fn test_kill_stops_chain_event() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, mut rx) = setup(host);

        let id = supervisor
            .spawn(Stage::Feature, "task", argv(&["sleep", "999"]))
            .await
            .unwrap();
        supervisor.kill(&id).await.unwrap();

        // A killed agent never publishes an Exited event
        let waited = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_logs_returns_trailing_lines() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host.clone());

        let id = supervisor
            .spawn(Stage::Feature, "task", argv(&["true"]))
            .await
            .unwrap();
        host.set_output(&id, "line1\nline2\nline3");

        let logs = supervisor.logs(&id, Some(2)).await.unwrap();
        assert_eq!(logs, "line2\nline3");
    }

    #[tokio::test]
    async fn test_logs_unknown_agent() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        let result = supervisor.logs("agent-0-ffff", None).await;
        assert!(matches!(result, Err(OrchestratorError::AgentNotFound(_))));
    }

    #[tokio::test]
    async fn test_logs_without_session_is_placeholder() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        let mut agent = Agent::new(Stage::Feature, "task");
        agent.session = None;
        let id = agent.id.clone();
        supervisor.registry.lock().unwrap().insert(agent);

        let logs = supervisor.logs(&id, None).await.unwrap();
        assert!(logs.contains("no attached session"));
    }

    #[tokio::test]
    async fn test_counts_and_running_in() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, _rx) = setup(host);

        supervisor
            .spawn(Stage::Feature, "a", argv(&["true"]))
            .await
            .unwrap();
        supervisor
            .spawn(Stage::Test, "b", argv(&["true"]))
            .await
            .unwrap();

        let counts = supervisor.counts();
        assert_eq!(counts.running, 2);
        assert!(supervisor.running_in(Stage::Feature));
        assert!(supervisor.running_in(Stage::Test));
        assert!(!supervisor.running_in(Stage::Docs));
    }

    #[tokio::test]
    async fn test_shutdown_watchers() {
        let host = Arc::new(MockSessionHost::new());
        let (_temp, _wt, supervisor, mut rx) = setup(host.clone());

        let id = supervisor
            .spawn(Stage::Feature, "task", argv(&["true"]))
            .await
            .unwrap();
        supervisor.shutdown_watchers();

        // With watchers aborted, a session ending is no longer observed
        host.end_session(&id);
        let waited = tokio::time::timeout(Duration::from_millis(200), rx.recv()).await;
        assert!(waited.is_err());
        assert_eq!(supervisor.status(Some(&id))[0].status, AgentStatus::Running);
    }
}
