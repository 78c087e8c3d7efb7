//! CLI module for stagehand - command-line interface and subcommands.
//!
//! Owns sanitization of caller-supplied names before they reach the
//! worktree manager.

pub mod commands;

pub use commands::Cli;
