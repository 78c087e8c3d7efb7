//! Configuration for stagehand
//!
//! Two layers: orchestrator settings loaded from YAML with a fallback
//! chain (explicit path, XDG config dir, working directory, defaults),
//! and a per-repository project file (`.workflow-config.json` at the repo
//! root) holding the project name, read once at construction.

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-repository project file
pub const PROJECT_CONFIG_FILE: &str = ".workflow-config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: Option<String>,
    pub git: GitConfig,
    pub supervisor: SupervisorConfig,
    pub chain: ChainConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GitConfig {
    /// Timeout for worktree/branch/merge operations
    pub command_timeout_ms: u64,
    /// Shorter timeout for status queries
    pub status_timeout_ms: u64,
    /// Branch integrated into by default
    pub main_branch: String,
}

impl Default for GitConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 30000,
            status_timeout_ms: 5000,
            main_branch: "main".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SupervisorConfig {
    /// How often each agent's liveness is polled
    pub liveness_interval_ms: u64,
    /// Terminal agent records kept for history before eviction
    pub max_finished_agents: usize,
    /// Default trailing lines returned by log capture
    pub default_log_lines: usize,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            liveness_interval_ms: 3000,
            max_finished_agents: 200,
            default_log_lines: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChainConfig {
    /// Program run for chained stage agents
    pub agent_program: String,
    /// Interval of the global signal scan across all stages
    pub scan_interval_ms: u64,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            agent_program: "claude".to_string(),
            scan_interval_ms: 15000,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            git: GitConfig::default(),
            supervisor: SupervisorConfig::default(),
            chain: ChainConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try primary location: ~/.config/<project>/<project>.yml
        if let Some(config_dir) = dirs::config_dir() {
            let project_name = env!("CARGO_PKG_NAME");
            let primary_config = config_dir.join(project_name).join(format!("{}.yml", project_name));
            if primary_config.exists() {
                match Self::load_from_file(&primary_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        log::warn!("Failed to load config from {}: {}", primary_config.display(), e);
                    }
                }
            }
        }

        // Try fallback location: ./<project>.yml
        let project_name = env!("CARGO_PKG_NAME");
        let fallback_config = PathBuf::from(format!("{}.yml", project_name));
        if fallback_config.exists() {
            match Self::load_from_file(&fallback_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    log::warn!("Failed to load config from {}: {}", fallback_config.display(), e);
                }
            }
        }

        // No config file found, use defaults
        log::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        log::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// The per-repository project file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub project_name: String,
}

impl ProjectConfig {
    /// Read `.workflow-config.json` from the repo root, falling back to
    /// the repository directory name when absent or unreadable.
    pub fn load(repo_root: &Path) -> Self {
        let path = repo_root.join(PROJECT_CONFIG_FILE);
        if path.exists() {
            match fs::read_to_string(&path)
                .map_err(|e| e.to_string())
                .and_then(|s| serde_json::from_str::<ProjectConfig>(&s).map_err(|e| e.to_string()))
            {
                Ok(config) => return config,
                Err(e) => {
                    log::warn!("Failed to read {}: {}", path.display(), e);
                }
            }
        }

        let name = repo_root
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "project".to_string());
        ProjectConfig { project_name: name }
    }
}
