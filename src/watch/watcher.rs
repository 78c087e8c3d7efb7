//! Workflow watcher
//!
//! Drives stage transitions. Within one stage, consumption and the
//! next-stage spawn happen sequentially inside a single tick; different
//! stages may interleave freely.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::ChainConfig;
use crate::coordination::{ChainAction, SignalScanner};
use crate::supervisor::{AgentEvent, AgentSupervisor};
use crate::worktree::WorktreeManager;

/// Owns the watch loops' dependencies; `start` moves them into tasks.
pub struct WorkflowWatcher {
    scanner: Arc<SignalScanner>,
    supervisor: Arc<AgentSupervisor>,
    worktrees: Arc<WorktreeManager>,
    scan_interval: Duration,
}

/// Handles to the two running loops
pub struct WatcherHandle {
    event_task: JoinHandle<()>,
    scan_task: JoinHandle<()>,
}

impl WatcherHandle {
    /// Abort both loops. Safe to call at any time.
    pub fn shutdown(self) {
        self.event_task.abort();
        self.scan_task.abort();
    }
}

impl WorkflowWatcher {
    pub fn new(
        scanner: Arc<SignalScanner>,
        supervisor: Arc<AgentSupervisor>,
        worktrees: Arc<WorktreeManager>,
        chain: &ChainConfig,
    ) -> Self {
        Self {
            scanner,
            supervisor,
            worktrees,
            scan_interval: Duration::from_millis(chain.scan_interval_ms),
        }
    }

    /// Start the event loop and the global scan tick.
    pub fn start(self, mut events: mpsc::Receiver<AgentEvent>) -> WatcherHandle {
        let scanner = self.scanner.clone();
        let supervisor = self.supervisor.clone();
        let worktrees = self.worktrees.clone();
        let event_task = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let AgentEvent::Exited { agent_id, stage } = event;
                tracing::info!(agent_id = %agent_id, stage = %stage, "Agent exited, scanning for signals");
                let actions = scanner.scan_stage(stage);
                perform_actions(&supervisor, &worktrees, actions).await;
            }
        });

        let scanner = self.scanner;
        let supervisor = self.supervisor;
        let worktrees = self.worktrees;
        let interval = self.scan_interval;
        let scan_task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                let actions = scanner.scan_all();
                perform_actions(&supervisor, &worktrees, actions).await;
            }
        });

        WatcherHandle { event_task, scan_task }
    }
}

/// Carry out chain actions: best-effort branch sync into the target
/// worktree, then spawn. A failed spawn is logged and dropped; the
/// signal was already consumed (accepted crash-window, no redelivery).
async fn perform_actions(
    supervisor: &AgentSupervisor,
    worktrees: &WorktreeManager,
    actions: Vec<ChainAction>,
) {
    for action in actions {
        if !worktrees.exists(action.stage) {
            tracing::warn!(
                source = %action.source,
                target = %action.stage,
                "Target worktree missing, dropping transition"
            );
            continue;
        }

        match worktrees.current_branch(action.source).await {
            Ok(branch) => {
                let _ = worktrees.sync_from_branch(action.stage, &branch).await;
            }
            Err(e) => {
                tracing::debug!(source = %action.source, error = %e, "Skipping branch sync");
            }
        }

        match supervisor
            .spawn(action.stage, &action.task, action.command.clone())
            .await
        {
            Ok(agent_id) => {
                tracing::info!(
                    agent_id = %agent_id,
                    source = %action.source,
                    stage = %action.stage,
                    "Chained next stage"
                );
            }
            Err(e) => {
                tracing::error!(
                    source = %action.source,
                    stage = %action.stage,
                    error = %e,
                    "Failed to spawn chained agent"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GitConfig, SupervisorConfig};
    use crate::domain::{AgentStatus, Signal, Stage};
    use crate::session::MockSessionHost;
    use crate::worktree::ProjectContext;
    use tempfile::TempDir;

    struct Fixture {
        _temp: TempDir,
        host: Arc<MockSessionHost>,
        worktrees: Arc<WorktreeManager>,
        supervisor: Arc<AgentSupervisor>,
        scanner: Arc<SignalScanner>,
        events: mpsc::Receiver<AgentEvent>,
    }

    fn setup() -> Fixture {
        let temp = TempDir::new().unwrap();
        let repo_root = temp.path().join("demo");
        std::fs::create_dir(&repo_root).unwrap();

        let context = ProjectContext {
            repo_root,
            project_name: "demo".to_string(),
        };
        let worktrees = Arc::new(WorktreeManager::new(context, &GitConfig::default()));
        for stage in Stage::ALL {
            std::fs::create_dir_all(worktrees.path(stage)).unwrap();
        }

        let host = Arc::new(MockSessionHost::new());
        let supervisor_config = SupervisorConfig {
            liveness_interval_ms: 25,
            max_finished_agents: 50,
            default_log_lines: 50,
        };
        let (supervisor, events) =
            AgentSupervisor::new(host.clone(), worktrees.clone(), &supervisor_config);
        let scanner = Arc::new(SignalScanner::new(worktrees.clone(), ChainConfig::default()));

        Fixture {
            _temp: temp,
            host,
            worktrees,
            supervisor: Arc::new(supervisor),
            scanner,
            events,
        }
    }

    fn chain_config(scan_interval_ms: u64) -> ChainConfig {
        ChainConfig {
            scan_interval_ms,
            ..Default::default()
        }
    }

    async fn wait_for<F: Fn() -> bool>(pred: F) {
        for _ in 0..100 {
            if pred() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("condition not reached within 2s");
    }

    #[tokio::test]
    async fn test_agent_exit_chains_next_stage() {
        let fixture = setup();
        let watcher = WorkflowWatcher::new(
            fixture.scanner.clone(),
            fixture.supervisor.clone(),
            fixture.worktrees.clone(),
            // Long scan interval so only the event path can fire
            &chain_config(60000),
        );
        let handle = watcher.start(fixture.events);

        let id = fixture
            .supervisor
            .spawn(Stage::Feature, "build login", vec!["true".to_string()])
            .await
            .unwrap();

        // The agent "finishes" after leaving its completion marker
        std::fs::write(
            fixture.worktrees.path(Stage::Feature).join(Signal::ClaudeComplete.file_name()),
            "",
        )
        .unwrap();
        fixture.host.end_session(&id);

        let supervisor = fixture.supervisor.clone();
        wait_for(|| supervisor.running_in(Stage::Test)).await;

        // Signal consumed, original agent completed, exactly one test agent
        assert!(!fixture
            .worktrees
            .path(Stage::Feature)
            .join(Signal::ClaudeComplete.file_name())
            .exists());
        assert_eq!(fixture.supervisor.status(Some(&id))[0].status, AgentStatus::Completed);
        let test_agents: Vec<_> = fixture
            .supervisor
            .status(None)
            .into_iter()
            .filter(|a| a.stage == Stage::Test)
            .collect();
        assert_eq!(test_agents.len(), 1);

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_global_scan_picks_up_manual_signal() {
        let fixture = setup();
        let watcher = WorkflowWatcher::new(
            fixture.scanner.clone(),
            fixture.supervisor.clone(),
            fixture.worktrees.clone(),
            &chain_config(30),
        );
        let handle = watcher.start(fixture.events);

        // No agent involved: a human touches the bugfix marker
        std::fs::write(
            fixture.worktrees.path(Stage::Bugfix).join(Signal::BugfixComplete.file_name()),
            "",
        )
        .unwrap();

        let supervisor = fixture.supervisor.clone();
        wait_for(|| supervisor.running_in(Stage::Test)).await;

        let test_agent = fixture
            .supervisor
            .status(None)
            .into_iter()
            .find(|a| a.stage == Stage::Test)
            .unwrap();
        assert!(test_agent.task.contains("bug fix"));

        handle.shutdown();
    }

    #[tokio::test]
    async fn test_shutdown_stops_scanning() {
        let fixture = setup();
        let watcher = WorkflowWatcher::new(
            fixture.scanner.clone(),
            fixture.supervisor.clone(),
            fixture.worktrees.clone(),
            &chain_config(30),
        );
        let handle = watcher.start(fixture.events);
        handle.shutdown();

        std::fs::write(
            fixture.worktrees.path(Stage::Feature).join(Signal::ClaudeComplete.file_name()),
            "",
        )
        .unwrap();

        tokio::time::sleep(Duration::from_millis(200)).await;
        // Signal remains untouched after shutdown
        assert!(fixture
            .worktrees
            .path(Stage::Feature)
            .join(Signal::ClaudeComplete.file_name())
            .exists());
        assert!(!fixture.supervisor.running_in(Stage::Test));
    }

    #[tokio::test]
    async fn test_missing_target_worktree_drops_transition() {
        let fixture = setup();
        std::fs::remove_dir_all(fixture.worktrees.path(Stage::Test)).unwrap();

        let actions = vec![ChainAction {
            source: Stage::Feature,
            stage: Stage::Test,
            task: "validate".to_string(),
            command: vec!["true".to_string()],
        }];
        perform_actions(&fixture.supervisor, &fixture.worktrees, actions).await;

        assert!(fixture.supervisor.status(None).is_empty());
    }
}
