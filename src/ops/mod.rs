//! Operation boundary
//!
//! The orchestrator's operations are exposed as a tagged request enum
//! with typed fields; stage-valued fields only deserialize to the four
//! known stages. Dispatch maps every variant to its handler and always
//! returns a success or error text payload; failures never cross this
//! boundary as panics or errors.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::coordination::SignalScanner;
use crate::domain::{Agent, Stage};
use crate::error::{OrchestratorError, Result};
use crate::report::StatusReporter;
use crate::session::{SessionHost, TmuxHost};
use crate::supervisor::{AgentEvent, AgentSupervisor};
use crate::watch::WorkflowWatcher;
use crate::worktree::{ProjectContext, WorktreeManager};

/// One named operation with its typed inputs
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum OpRequest {
    CreateWorktree {
        r#type: Stage,
        name: String,
    },
    SpawnAgent {
        worktree: Stage,
        task: String,
        #[serde(default)]
        command: Option<String>,
    },
    GetStatus,
    GetAgentStatus {
        #[serde(default)]
        agent_id: Option<String>,
    },
    GetAgentLogs {
        agent_id: String,
        #[serde(default)]
        lines: Option<usize>,
    },
    MonitorProgress {
        worktree: Stage,
        #[serde(default)]
        since: Option<String>,
    },
    KillAgent {
        agent_id: String,
    },
    IntegrateChanges {
        source_worktree: Stage,
        #[serde(default)]
        target_branch: Option<String>,
    },
}

/// Result payload of a dispatched operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", content = "text", rename_all = "lowercase")]
pub enum OpOutcome {
    Success(String),
    Error(String),
}

impl OpOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, OpOutcome::Success(_))
    }

    pub fn text(&self) -> &str {
        match self {
            OpOutcome::Success(text) | OpOutcome::Error(text) => text,
        }
    }
}

/// Owns all orchestrator components; the single entry point callers
/// construct (no singletons).
pub struct Orchestrator {
    worktrees: Arc<WorktreeManager>,
    supervisor: Arc<AgentSupervisor>,
    scanner: Arc<SignalScanner>,
    reporter: StatusReporter,
    config: Config,
}

impl Orchestrator {
    /// Construct against the repository containing `start_dir`, with a
    /// tmux session host. Fails fast when outside a git repository.
    pub async fn bootstrap(start_dir: &Path, config: Config) -> Result<(Self, mpsc::Receiver<AgentEvent>)> {
        let host: Arc<dyn SessionHost> = Arc::new(TmuxHost::new());
        Self::with_host(start_dir, config, host).await
    }

    /// Construct with an injected session host (tests use a mock).
    pub async fn with_host(
        start_dir: &Path,
        config: Config,
        host: Arc<dyn SessionHost>,
    ) -> Result<(Self, mpsc::Receiver<AgentEvent>)> {
        let context = ProjectContext::discover(start_dir, config.git.command_timeout_ms).await?;
        tracing::info!(
            repo_root = %context.repo_root.display(),
            project = %context.project_name,
            "Orchestrator starting"
        );

        let worktrees = Arc::new(WorktreeManager::new(context, &config.git));
        let (supervisor, event_rx) = AgentSupervisor::new(host, worktrees.clone(), &config.supervisor);
        let supervisor = Arc::new(supervisor);
        let scanner = Arc::new(SignalScanner::new(worktrees.clone(), config.chain.clone()));
        let reporter = StatusReporter::new(worktrees.clone(), supervisor.clone());

        Ok((
            Self {
                worktrees,
                supervisor,
                scanner,
                reporter,
                config,
            },
            event_rx,
        ))
    }

    pub fn worktrees(&self) -> &Arc<WorktreeManager> {
        &self.worktrees
    }

    pub fn supervisor(&self) -> &Arc<AgentSupervisor> {
        &self.supervisor
    }

    pub fn reporter(&self) -> &StatusReporter {
        &self.reporter
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A workflow watcher over this orchestrator's components.
    pub fn watcher(&self) -> WorkflowWatcher {
        WorkflowWatcher::new(
            self.scanner.clone(),
            self.supervisor.clone(),
            self.worktrees.clone(),
            &self.config.chain,
        )
    }

    /// Abort background liveness watchers.
    pub fn shutdown(&self) {
        self.supervisor.shutdown_watchers();
    }

    /// Dispatch one operation. Internal failures become an error payload.
    pub async fn dispatch(&self, request: OpRequest) -> OpOutcome {
        match self.handle(request).await {
            Ok(text) => OpOutcome::Success(text),
            Err(e) => OpOutcome::Error(e.to_string()),
        }
    }

    async fn handle(&self, request: OpRequest) -> Result<String> {
        match request {
            OpRequest::CreateWorktree { r#type, name } => {
                let entry = self.worktrees.create(r#type, &name).await?;
                Ok(format!(
                    "Created {} worktree at {} on branch {}",
                    r#type,
                    entry.path.display(),
                    entry.branch.as_deref().unwrap_or("(detached)"),
                ))
            }
            OpRequest::SpawnAgent { worktree, task, command } => {
                let argv = self.resolve_command(command.as_deref(), &task)?;
                let agent_id = self.supervisor.spawn(worktree, &task, argv).await?;
                Ok(format!("Spawned agent {} in {} worktree", agent_id, worktree))
            }
            OpRequest::GetStatus => Ok(self.reporter.worktree_status().await),
            OpRequest::GetAgentStatus { agent_id } => {
                Ok(render_agents(&self.supervisor.status(agent_id.as_deref())))
            }
            OpRequest::GetAgentLogs { agent_id, lines } => self.supervisor.logs(&agent_id, lines).await,
            OpRequest::MonitorProgress { worktree, since } => {
                self.reporter.monitor_progress(worktree, since.as_deref()).await
            }
            OpRequest::KillAgent { agent_id } => self.supervisor.kill(&agent_id).await,
            OpRequest::IntegrateChanges { source_worktree, target_branch } => {
                let target = target_branch.unwrap_or_else(|| self.config.git.main_branch.clone());
                self.worktrees.integrate(source_worktree, &target).await
            }
        }
    }

    /// Split a caller-supplied command string into an argv, or fall back
    /// to the configured agent program with the task as its argument.
    fn resolve_command(&self, command: Option<&str>, task: &str) -> Result<Vec<String>> {
        match command {
            Some(raw) => shlex::split(raw)
                .filter(|argv| !argv.is_empty())
                .ok_or_else(|| OrchestratorError::Spawn(format!("Unparsable command: {}", raw))),
            None => Ok(vec![self.config.chain.agent_program.clone(), task.to_string()]),
        }
    }
}

fn render_agents(agents: &[Agent]) -> String {
    if agents.is_empty() {
        return "No agents found".to_string();
    }
    agents
        .iter()
        .map(|a| {
            format!(
                "{} [{}] {} ({}s) {}",
                a.id,
                a.stage,
                a.status,
                a.runtime_secs(),
                a.task,
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}
