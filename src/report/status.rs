//! Combined status snapshot

use std::fmt::Write as _;
use std::sync::Arc;

use crate::domain::{Signal, Stage};
use crate::supervisor::AgentSupervisor;
use crate::worktree::WorktreeManager;

/// On-demand reporter over the manager and supervisor
pub struct StatusReporter {
    worktrees: Arc<WorktreeManager>,
    supervisor: Arc<AgentSupervisor>,
}

impl StatusReporter {
    pub fn new(worktrees: Arc<WorktreeManager>, supervisor: Arc<AgentSupervisor>) -> Self {
        Self { worktrees, supervisor }
    }

    pub(crate) fn worktrees(&self) -> &Arc<WorktreeManager> {
        &self.worktrees
    }

    pub(crate) fn supervisor(&self) -> &Arc<AgentSupervisor> {
        &self.supervisor
    }

    /// Full snapshot: worktree listing, agent counts and detail, signal
    /// presence per stage, and per-stage cleanliness. Never errors; each
    /// failing query degrades to a marker line.
    pub async fn worktree_status(&self) -> String {
        let mut out = String::new();

        out.push_str("Git worktrees:\n");
        match self.worktrees.stage_entries().await {
            Ok(entries) if entries.is_empty() => {
                out.push_str("  No worktrees found\n");
            }
            Ok(_) => match self.worktrees.raw_listing().await {
                Ok(listing) => {
                    for line in listing.lines() {
                        let _ = writeln!(out, "  {}", line);
                    }
                }
                Err(e) => {
                    let _ = writeln!(out, "  unable to check ({})", e);
                }
            },
            Err(e) => {
                let _ = writeln!(out, "  unable to check ({})", e);
            }
        }

        let counts = self.supervisor.counts();
        let _ = writeln!(
            out,
            "\nAgents: {} running, {} completed, {} failed",
            counts.running, counts.completed, counts.failed
        );

        let running = self.supervisor.running();
        if !running.is_empty() {
            out.push_str("Active agents:\n");
            for agent in &running {
                let _ = writeln!(
                    out,
                    "  {} [{}] {} ({}s, session {})",
                    agent.id,
                    agent.stage,
                    agent.task,
                    agent.runtime_secs(),
                    agent.session.as_deref().unwrap_or("-"),
                );
            }
        }

        out.push_str("\nSignal files:\n");
        for stage in Stage::ALL {
            let present = self.signals_in(stage);
            if present.is_empty() {
                let _ = writeln!(out, "  {}: none", stage);
            } else {
                let _ = writeln!(out, "  {}: {}", stage, present.join(", "));
            }
        }

        out.push_str("\nPending changes:\n");
        for stage in Stage::ALL {
            if !self.worktrees.exists(stage) {
                let _ = writeln!(out, "  {}: not created", stage);
                continue;
            }
            match self.worktrees.pending_changes(stage).await {
                Ok(changes) if changes.is_empty() => {
                    let _ = writeln!(out, "  {}: clean", stage);
                }
                Ok(changes) => {
                    let _ = writeln!(out, "  {}: {} pending", stage, changes.len());
                }
                Err(e) => {
                    let _ = writeln!(out, "  {}: unable to check ({})", stage, e);
                }
            }
        }

        out
    }

    /// Present signal files (all four names checked) in a stage's worktree
    fn signals_in(&self, stage: Stage) -> Vec<&'static str> {
        let path = self.worktrees.path(stage);
        Signal::ALL
            .into_iter()
            .map(|s| s.file_name())
            .filter(|name| path.join(name).exists())
            .collect()
    }
}
