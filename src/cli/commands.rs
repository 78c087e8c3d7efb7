//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - create: provision stage worktrees
//! - spawn/agents/logs/kill: agent lifecycle
//! - status/monitor: reporting
//! - integrate/cleanup: branch merge and teardown
//! - watch: run the workflow loops in the foreground

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Upper bound on feature/project names
const MAX_NAME_LEN: usize = 64;

/// Sanitize a caller-supplied name before it reaches the worktree
/// manager: bounded length, restricted character set, no path
/// separators or traversal sequences.
pub fn validate_name(name: &str) -> Result<String, String> {
    if name.is_empty() {
        return Err("name must not be empty".to_string());
    }
    if name.len() > MAX_NAME_LEN {
        return Err(format!("name must be at most {} characters", MAX_NAME_LEN));
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        return Err("name may only contain letters, digits, '-', '_' and '.'".to_string());
    }
    if name.starts_with('.') || name.starts_with('-') {
        return Err("name must not start with '.' or '-'".to_string());
    }
    Ok(name.to_string())
}

/// stagehand - git worktree workflow orchestrator
#[derive(Parser, Debug)]
#[command(name = "stagehand")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create a stage worktree (or all four with "all")
    Create {
        /// Stage to create: feature, test, docs, bugfix, or all
        stage: String,

        /// Feature/project name used for branch naming (defaults to the
        /// project name)
        #[arg(short, long, value_parser = validate_name)]
        name: Option<String>,
    },

    /// Spawn a background agent in a stage's worktree
    Spawn {
        /// Target stage: feature, test, docs, or bugfix
        worktree: String,

        /// Task description for the agent
        task: String,

        /// Command to run (defaults to the configured agent program with
        /// the task as its argument)
        #[arg(long)]
        command: Option<String>,
    },

    /// Print the combined worktree/agent/signal status snapshot
    Status,

    /// List agent records, or one record by id
    Agents {
        /// Agent id to look up
        agent_id: Option<String>,
    },

    /// Print the trailing lines of an agent's session output
    Logs {
        /// Agent id
        agent_id: String,

        /// Number of trailing lines
        #[arg(short, long)]
        lines: Option<usize>,
    },

    /// Terminate an agent
    Kill {
        /// Agent id
        agent_id: String,
    },

    /// Detailed progress for one stage's worktree
    Monitor {
        /// Stage to inspect: feature, test, docs, or bugfix
        worktree: String,

        /// Report commits since this git approxidate (default "1 hour ago")
        #[arg(short, long)]
        since: Option<String>,
    },

    /// Merge a stage worktree's branch into a target branch
    Integrate {
        /// Source stage: feature, test, docs, or bugfix
        source: String,

        /// Target branch (defaults to the configured main branch)
        #[arg(short, long)]
        target: Option<String>,
    },

    /// Remove all stage worktrees and the worktrees root
    Cleanup,

    /// Run the workflow watch loops in the foreground until ctrl-c
    Watch,
}
