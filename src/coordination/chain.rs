//! Stage chain decisions
//!
//! Maps an observed signal to the next stage's spawn, if any. The chain
//! is fixed: feature -> test -> docs, bugfix -> test. Only the agent
//! program is configurable.

use crate::config::ChainConfig;
use crate::domain::{Signal, Stage};

/// Decision to spawn the next stage's agent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainAction {
    /// Stage whose signal triggered this action
    pub source: Stage,
    /// Stage the new agent runs in
    pub stage: Stage,
    /// Task description for the new agent
    pub task: String,
    /// Command argv for the new agent
    pub command: Vec<String>,
}

/// The next-stage spawn for a consumed signal, or None for terminal
/// signals.
pub fn next_action(signal: Signal, config: &ChainConfig) -> Option<ChainAction> {
    let (stage, task) = match signal {
        Signal::ClaudeComplete => (
            Stage::Test,
            "Run the test suite and validate the completed feature work",
        ),
        Signal::TestsComplete => (
            Stage::Docs,
            "Update project documentation for the tested changes",
        ),
        Signal::BugfixComplete => (
            Stage::Test,
            "Re-run the test suite to validate the bug fix",
        ),
        Signal::DocsComplete => return None,
    };

    Some(ChainAction {
        source: signal.stage(),
        stage,
        task: task.to_string(),
        command: vec![config.agent_program.clone(), task.to_string()],
    })
}
