//! tmux-backed session host
//!
//! Every tmux invocation passes its arguments as a vector. tmux itself
//! joins trailing `new-session` arguments with spaces before handing
//! them to a shell, so each element of the inner command is single-quote
//! escaped first; caller-supplied text can never break out of its
//! argument position.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{OrchestratorError, Result};
use crate::exec;
use crate::session::SessionHost;

/// Session host shelling out to the `tmux` binary
#[derive(Debug, Clone)]
pub struct TmuxHost {
    timeout_ms: u64,
}

impl TmuxHost {
    pub fn new() -> Self {
        Self { timeout_ms: 10000 }
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    async fn tmux(&self, args: &[&str]) -> Result<exec::ExecOutput> {
        exec::run("tmux", args, None, self.timeout_ms).await
    }
}

impl Default for TmuxHost {
    fn default() -> Self {
        Self::new()
    }
}

/// Quote one word for POSIX sh: wrap in single quotes, escaping embedded
/// single quotes as `'\''`.
fn quote_word(word: &str) -> String {
    if !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/' | ':' | '=' | '@'))
    {
        return word.to_string();
    }
    format!("'{}'", word.replace('\'', r#"'\''"#))
}

/// Join an argument vector into a single safely-quoted sh command
fn quote_command(command: &[String]) -> String {
    command
        .iter()
        .map(|w| quote_word(w))
        .collect::<Vec<_>>()
        .join(" ")
}

#[async_trait]
impl SessionHost for TmuxHost {
    async fn create_session(&self, name: &str, cwd: &Path, command: &[String]) -> Result<()> {
        let cwd_str = cwd
            .to_str()
            .ok_or_else(|| OrchestratorError::Session(format!("Invalid worktree path: {}", cwd.display())))?;
        let quoted = quote_command(command);

        let out = self
            .tmux(&["new-session", "-d", "-s", name, "-c", cwd_str, &quoted])
            .await?;
        if !out.success {
            return Err(OrchestratorError::Session(format!(
                "tmux new-session failed: {}",
                out.stderr.trim()
            )));
        }
        Ok(())
    }

    async fn session_pid(&self, name: &str) -> Result<Option<u32>> {
        let out = self
            .tmux(&["list-panes", "-t", name, "-F", "#{pane_pid}"])
            .await?;
        if !out.success {
            return Ok(None);
        }
        Ok(out.stdout.lines().next().and_then(|l| l.trim().parse().ok()))
    }

    async fn is_alive(&self, name: &str) -> Result<bool> {
        let out = self.tmux(&["has-session", "-t", name]).await?;
        Ok(out.success)
    }

    async fn capture(&self, name: &str, lines: usize) -> Result<String> {
        let out = self.tmux(&["capture-pane", "-p", "-t", name]).await?;
        if !out.success {
            return Err(OrchestratorError::Session(format!(
                "tmux capture-pane failed: {}",
                out.stderr.trim()
            )));
        }
        let all: Vec<&str> = out.stdout.lines().collect();
        let start = all.len().saturating_sub(lines);
        Ok(all[start..].join("\n"))
    }

    async fn kill_session(&self, name: &str) -> Result<()> {
        let out = self.tmux(&["kill-session", "-t", name]).await?;
        if !out.success {
            return Err(OrchestratorError::Session(format!(
                "tmux kill-session failed: {}",
                out.stderr.trim()
            )));
        }
        Ok(())
    }
}
