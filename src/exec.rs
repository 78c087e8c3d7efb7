//! Bounded-timeout subprocess execution
//!
//! All git and session-host invocations go through `run`: arguments are
//! always passed as a vector to the spawning primitive, never composed
//! into a shell string, and every call carries a timeout.

use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;

use crate::error::{OrchestratorError, Result};

/// Captured result of a finished subprocess
#[derive(Debug)]
pub struct ExecOutput {
    /// Whether the process exited with status 0
    pub success: bool,
    /// UTF-8 (lossy) stdout
    pub stdout: String,
    /// UTF-8 (lossy) stderr
    pub stderr: String,
}

impl ExecOutput {
    /// stdout if the process succeeded, stderr wrapped by `err` otherwise
    pub fn into_stdout(self, err: impl Fn(String) -> OrchestratorError) -> Result<String> {
        if self.success {
            Ok(self.stdout)
        } else {
            Err(err(self.stderr.trim().to_string()))
        }
    }
}

/// Run a program with an argument vector and a bounded timeout.
///
/// The child is killed if the timeout elapses (kill_on_drop) and the
/// call returns `OrchestratorError::Timeout`.
pub async fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout_ms: u64,
) -> Result<ExecOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let child = cmd.spawn()?;

    let timeout = tokio::time::Duration::from_millis(timeout_ms);
    let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
        Ok(result) => result?,
        Err(_) => return Err(OrchestratorError::Timeout(timeout_ms)),
    };

    Ok(ExecOutput {
        success: output.status.success(),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_success() {
        let out = run("true", &[], None, 5000).await.unwrap();
        assert!(out.success);
    }

    #[tokio::test]
    async fn test_run_failure_captures_stderr() {
        let out = run("sh", &["-c", "echo oops >&2; exit 1"], None, 5000)
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("oops"));
    }

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let out = run("echo", &["hello"], None, 5000).await.unwrap();
        assert!(out.success);
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn test_run_timeout() {
        let err = run("sleep", &["10"], None, 100).await.unwrap_err();
        assert!(matches!(err, OrchestratorError::Timeout(100)));
    }

    #[tokio::test]
    async fn test_run_missing_program() {
        let result = run("nonexistent_program_xyz123", &[], None, 5000).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_run_with_cwd() {
        let out = run("pwd", &[], Some(Path::new("/tmp")), 5000).await.unwrap();
        assert!(out.success);
        assert!(out.stdout.trim().ends_with("tmp"));
    }

    #[tokio::test]
    async fn test_args_are_not_shell_interpreted() {
        // A hostile value stays a literal argument, it is never evaluated
        let out = run("echo", &["$(touch /tmp/injected); true"], None, 5000)
            .await
            .unwrap();
        assert!(out.success);
        assert!(out.stdout.contains("$(touch"));
    }

    #[test]
    fn test_into_stdout_success() {
        let out = ExecOutput {
            success: true,
            stdout: "data".to_string(),
            stderr: String::new(),
        };
        assert_eq!(out.into_stdout(OrchestratorError::Git).unwrap(), "data");
    }

    #[test]
    fn test_into_stdout_failure_maps_stderr() {
        let out = ExecOutput {
            success: false,
            stdout: String::new(),
            stderr: "fatal: bad ref\n".to_string(),
        };
        let err = out.into_stdout(OrchestratorError::Git).unwrap_err();
        assert_eq!(err.to_string(), "Git error: fatal: bad ref");
    }
}
