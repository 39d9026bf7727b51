pub mod maintenance;

pub use maintenance::MaintenanceConfig;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Result, StewardError};

/// Returns the global config directory path: `~/.config/steward/`
pub fn dirs_global() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
    PathBuf::from(home).join(".config").join("steward")
}

/// Top-level configuration from `~/.config/steward/config.yml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StewardConfig {
    /// Where the JSON store lives. Default: `~/.config/steward/data`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,

    /// Unix socket the daemon listens on. Default: `$XDG_RUNTIME_DIR/steward.sock`.
    #[serde(default)]
    pub socket_path: Option<PathBuf>,

    /// Bounded wait for one hook event, in milliseconds. Default: 5000.
    #[serde(default = "default_hook_timeout_ms")]
    pub hook_timeout_ms: u64,

    /// Log level for the daemon. Default: info.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Tools whose invocation spawns a sub-agent.
    #[serde(default = "default_delegation_tools")]
    pub delegation_tools: Vec<String>,

    /// Agent names matching any of these regexes were registered by mistake
    /// and are removed by the garbage sweep.
    #[serde(default = "default_garbage_name_patterns")]
    pub garbage_name_patterns: Vec<String>,

    #[serde(default)]
    pub maintenance: MaintenanceConfig,
}

fn default_hook_timeout_ms() -> u64 {
    5000
}

fn default_log_level() -> String {
    "info".into()
}

fn default_delegation_tools() -> Vec<String> {
    vec!["Task".into(), "Agent".into()]
}

fn default_garbage_name_patterns() -> Vec<String> {
    vec![
        r"^(bash|sh|zsh|fish)$".into(),
        r"^\s*$".into(),
    ]
}

impl Default for StewardConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            socket_path: None,
            hook_timeout_ms: default_hook_timeout_ms(),
            log_level: default_log_level(),
            delegation_tools: default_delegation_tools(),
            garbage_name_patterns: default_garbage_name_patterns(),
            maintenance: MaintenanceConfig::default(),
        }
    }
}

impl StewardConfig {
    /// Load config from a YAML file. Returns default if the file doesn't exist.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        serde_yaml::from_str(&contents).map_err(|e| StewardError::ConfigParse {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    /// Load the global config.
    pub fn load() -> Result<Self> {
        Self::load_from(&dirs_global().join("config.yml"))
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir
            .clone()
            .unwrap_or_else(|| dirs_global().join("data"))
    }

    pub fn socket_path(&self) -> PathBuf {
        self.socket_path
            .clone()
            .unwrap_or_else(|| runtime_dir().join("steward.sock"))
    }

    pub fn is_delegation_tool(&self, tool_name: &str) -> bool {
        self.delegation_tools.iter().any(|t| t == tool_name)
    }
}

/// Prefers XDG_RUNTIME_DIR (typically /run/user/<uid>/, mode 0700), else /tmp.
fn runtime_dir() -> PathBuf {
    std::env::var("XDG_RUNTIME_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("/tmp"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_missing_file_yields_defaults() {
        let tmp = TempDir::new().unwrap();
        let config = StewardConfig::load_from(&tmp.path().join("config.yml")).unwrap();
        assert_eq!(config.hook_timeout_ms, 5000);
        assert!(config.is_delegation_tool("Task"));
        assert_eq!(config.maintenance.idle_threshold_secs, 120);
    }

    #[test]
    fn test_partial_yaml_keeps_other_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        std::fs::write(
            &path,
            "hook_timeout_ms: 250\nmaintenance:\n  stale_threshold_secs: 60\n",
        )
        .unwrap();
        let config = StewardConfig::load_from(&path).unwrap();
        assert_eq!(config.hook_timeout_ms, 250);
        assert_eq!(config.maintenance.stale_threshold_secs, 60);
        assert_eq!(config.maintenance.idle_threshold_secs, 120);
        assert_eq!(config.log_level, "info");
    }

    #[test]
    fn test_bad_yaml_is_config_parse_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("config.yml");
        std::fs::write(&path, "hook_timeout_ms: [not a number").unwrap();
        assert!(matches!(
            StewardConfig::load_from(&path),
            Err(StewardError::ConfigParse { .. })
        ));
    }
}
