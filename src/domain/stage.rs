//! Workflow stages
//!
//! Each stage owns exactly one worktree under the worktrees root and a
//! branch named `{stage}/{name}`. Branch name and path are both derived
//! from the same inputs so they cannot desynchronize.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::OrchestratorError;

/// The four workflow stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Feature,
    Test,
    Docs,
    Bugfix,
}

impl Stage {
    /// All stages, in workflow order
    pub const ALL: [Stage; 4] = [Stage::Feature, Stage::Test, Stage::Docs, Stage::Bugfix];

    /// The stage name as used in paths and branch prefixes
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Feature => "feature",
            Stage::Test => "test",
            Stage::Docs => "docs",
            Stage::Bugfix => "bugfix",
        }
    }

    /// Branch name for this stage and feature/project name: `{stage}/{name}`
    pub fn branch_name(&self, name: &str) -> String {
        format!("{}/{}", self.as_str(), name)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Stage {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "feature" => Ok(Stage::Feature),
            "test" => Ok(Stage::Test),
            "docs" => Ok(Stage::Docs),
            "bugfix" => Ok(Stage::Bugfix),
            other => Err(OrchestratorError::UnknownStage(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_as_str() {
        assert_eq!(Stage::Feature.as_str(), "feature");
        assert_eq!(Stage::Test.as_str(), "test");
        assert_eq!(Stage::Docs.as_str(), "docs");
        assert_eq!(Stage::Bugfix.as_str(), "bugfix");
    }

    #[test]
    fn test_stage_branch_name() {
        assert_eq!(Stage::Feature.branch_name("demo"), "feature/demo");
        assert_eq!(Stage::Bugfix.branch_name("login-fix"), "bugfix/login-fix");
    }

    #[test]
    fn test_stage_from_str() {
        assert_eq!("feature".parse::<Stage>().unwrap(), Stage::Feature);
        assert_eq!("test".parse::<Stage>().unwrap(), Stage::Test);
        assert_eq!("docs".parse::<Stage>().unwrap(), Stage::Docs);
        assert_eq!("bugfix".parse::<Stage>().unwrap(), Stage::Bugfix);
    }

    #[test]
    fn test_stage_from_str_rejects_unknown() {
        let err = "staging".parse::<Stage>().unwrap_err();
        assert!(matches!(err, OrchestratorError::UnknownStage(_)));
    }

    #[test]
    fn test_stage_display_roundtrip() {
        for stage in Stage::ALL {
            let parsed: Stage = stage.to_string().parse().unwrap();
            assert_eq!(parsed, stage);
        }
    }

    #[test]
    fn test_stage_serde_lowercase() {
        let json = serde_json::to_string(&Stage::Bugfix).unwrap();
        assert_eq!(json, "\"bugfix\"");
        let back: Stage = serde_json::from_str("\"docs\"").unwrap();
        assert_eq!(back, Stage::Docs);
    }

    #[test]
    fn test_stage_serde_rejects_unknown() {
        let result = serde_json::from_str::<Stage>("\"release\"");
        assert!(result.is_err());
    }
}
