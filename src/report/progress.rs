//! Per-worktree progress view

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Local};

use crate::domain::{Signal, Stage};
use crate::error::{OrchestratorError, Result};
use crate::report::StatusReporter;

impl StatusReporter {
    /// Detailed progress for one stage: signal files with timestamps,
    /// categorized pending changes, agent activity, and recent commits.
    pub async fn monitor_progress(&self, stage: Stage, since: Option<&str>) -> Result<String> {
        if !self.worktrees().exists(stage) {
            return Err(OrchestratorError::WorktreeNotFound(stage.to_string()));
        }

        let path = self.worktrees().path(stage);
        let since = since.unwrap_or("1 hour ago");
        let mut out = String::new();

        let _ = writeln!(out, "Progress for worktree '{}':", stage);

        out.push_str("Signal files:\n");
        let mut any_signal = false;
        for signal in Signal::ALL {
            let file = path.join(signal.file_name());
            if file.exists() {
                any_signal = true;
                match modified_at(&file) {
                    Some(ts) => {
                        let _ = writeln!(out, "  {} present (modified {})", signal, ts);
                    }
                    None => {
                        let _ = writeln!(out, "  {} present", signal);
                    }
                }
            }
        }
        if !any_signal {
            out.push_str("  none\n");
        }

        out.push_str("Pending changes:\n");
        match self.worktrees().pending_changes(stage).await {
            Ok(changes) if changes.is_empty() => out.push_str("  clean\n"),
            Ok(changes) => {
                for change in changes {
                    let _ = writeln!(out, "  {}: {}", change.kind.as_str(), change.path);
                }
            }
            Err(e) => {
                let _ = writeln!(out, "  unable to check ({})", e);
            }
        }

        let active = self.supervisor().running_in(stage);
        let _ = writeln!(out, "Agent active: {}", if active { "yes" } else { "no" });

        let _ = writeln!(out, "Recent commits (since {}):", since);
        match self.worktrees().recent_commits(stage, since).await {
            Ok(commits) if commits.is_empty() => out.push_str("  none\n"),
            Ok(commits) => {
                for commit in commits {
                    let _ = writeln!(out, "  {}", commit);
                }
            }
            Err(e) => {
                let _ = writeln!(out, "  unable to check ({})", e);
            }
        }

        Ok(out)
    }
}

fn modified_at(path: &Path) -> Option<String> {
    let modified = std::fs::metadata(path).ok()?.modified().ok()?;
    let stamp: DateTime<Local> = modified.into();
    Some(stamp.format("%Y-%m-%d %H:%M:%S").to_string())
}
