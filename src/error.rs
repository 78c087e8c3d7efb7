//! Error types for stagehand
//!
//! Centralized error handling using thiserror. Every public operation
//! boundary converts these into a text payload before they can cross
//! the tool-calling surface (see `ops`).

use thiserror::Error;

/// All error types that can occur in stagehand
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The starting directory is not inside a git repository
    #[error("Not a git repository: {0}")]
    NotARepository(String),

    /// Worktree creation/removal/query failure
    #[error("Worktree error: {0}")]
    Worktree(String),

    /// Operation targeted a stage whose worktree does not exist on disk
    #[error("Worktree not found: {0}")]
    WorktreeNotFound(String),

    /// Unknown stage name supplied by a caller
    #[error("Unknown stage: {0} (expected feature, test, docs, or bugfix)")]
    UnknownStage(String),

    /// Agent id not present in the registry
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// Background session could not be started
    #[error("Spawn error: {0}")]
    Spawn(String),

    /// Session host command failure
    #[error("Session error: {0}")]
    Session(String),

    /// Agent termination failure
    #[error("Kill error: {0}")]
    Kill(String),

    /// Git command failure
    #[error("Git error: {0}")]
    Git(String),

    /// Subprocess exceeded its bounded timeout
    #[error("Command timed out after {0}ms")]
    Timeout(u64),

    /// Configuration load/parse error
    #[error("Config error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type alias for stagehand operations
pub type Result<T> = std::result::Result<T, OrchestratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_a_repository_error() {
        let err = OrchestratorError::NotARepository("/tmp/nowhere".to_string());
        assert_eq!(err.to_string(), "Not a git repository: /tmp/nowhere");
    }

    #[test]
    fn test_worktree_not_found_error() {
        let err = OrchestratorError::WorktreeNotFound("test".to_string());
        assert_eq!(err.to_string(), "Worktree not found: test");
    }

    #[test]
    fn test_unknown_stage_error() {
        let err = OrchestratorError::UnknownStage("staging".to_string());
        assert!(err.to_string().contains("staging"));
        assert!(err.to_string().contains("feature, test, docs, or bugfix"));
    }

    #[test]
    fn test_agent_not_found_error() {
        let err = OrchestratorError::AgentNotFound("agent-123-abcd".to_string());
        assert_eq!(err.to_string(), "Agent not found: agent-123-abcd");
    }

    #[test]
    fn test_timeout_error() {
        let err = OrchestratorError::Timeout(30000);
        assert_eq!(err.to_string(), "Command timed out after 30000ms");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: OrchestratorError = io_err.into();
        assert!(matches!(err, OrchestratorError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid").unwrap_err();
        let err: OrchestratorError = json_err.into();
        assert!(matches!(err, OrchestratorError::Json(_)));
    }

    #[test]
    fn test_result_type_alias() {
        fn returns_ok() -> Result<i32> {
            Ok(42)
        }

        fn returns_err() -> Result<i32> {
            Err(OrchestratorError::Git("merge conflict".to_string()))
        }

        assert!(returns_ok().is_ok());
        assert!(returns_err().is_err());
    }
}
