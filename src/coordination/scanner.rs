//! Consuming signal scanner
//!
//! Scans stage worktrees for signal files and deletes each one it
//! observes before returning the chain action it implies. The delete is
//! the exactly-once guard: concurrent scans race on `remove_file` and
//! only the winner acts. A crash between delete and spawn loses that
//! transition; there is no durable outbox.

use std::path::PathBuf;
use std::sync::Arc;

use crate::config::ChainConfig;
use crate::coordination::chain::{ChainAction, next_action};
use crate::coordination::DOCS_NEEDED_FILE;
use crate::domain::{Signal, Stage};
use crate::worktree::WorktreeManager;

/// Observes and consumes signal files across stage worktrees
pub struct SignalScanner {
    worktrees: Arc<WorktreeManager>,
    chain: ChainConfig,
}

impl SignalScanner {
    pub fn new(worktrees: Arc<WorktreeManager>, chain: ChainConfig) -> Self {
        Self { worktrees, chain }
    }

    /// Path a signal's marker file lives at
    pub fn signal_path(&self, signal: Signal) -> PathBuf {
        self.worktrees.path(signal.stage()).join(signal.file_name())
    }

    /// Whether a signal's marker file is currently present (non-consuming)
    pub fn is_present(&self, signal: Signal) -> bool {
        self.signal_path(signal).exists()
    }

    /// Scan one stage's worktree, consuming any present signal and
    /// returning the resulting chain actions.
    pub fn scan_stage(&self, stage: Stage) -> Vec<ChainAction> {
        let mut actions = Vec::new();
        if !self.worktrees.exists(stage) {
            return actions;
        }

        for signal in Signal::for_stage(stage) {
            if !self.consume(signal) {
                continue;
            }
            if signal == Signal::TestsComplete {
                self.note_docs_needed();
            }
            if let Some(action) = next_action(signal, &self.chain) {
                actions.push(action);
            }
        }
        actions
    }

    /// Scan all four stages.
    pub fn scan_all(&self) -> Vec<ChainAction> {
        Stage::ALL
            .into_iter()
            .flat_map(|stage| self.scan_stage(stage))
            .collect()
    }

    /// Delete a signal's marker file. Returns true only for the caller
    /// that actually removed it.
    fn consume(&self, signal: Signal) -> bool {
        let path = self.signal_path(signal);
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!(signal = %signal, path = %path.display(), "Consumed signal");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                tracing::warn!(signal = %signal, error = %e, "Failed to consume signal");
                false
            }
        }
    }

    /// Drop a `.docs-needed` note into the docs worktree so the docs
    /// agent finds its cue there.
    fn note_docs_needed(&self) {
        let docs = self.worktrees.path(Stage::Docs);
        if !docs.exists() {
            return;
        }
        let note = format!(
            "Documentation update needed for {}\n",
            self.worktrees.project_name()
        );
        if let Err(e) = std::fs::write(docs.join(DOCS_NEEDED_FILE), note) {
            tracing::warn!(error = %e, "Failed to write docs-needed note");
        }
    }
}
