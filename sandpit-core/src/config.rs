//! Configuration parsing and management.

use sandpit_types::ExecutionMode;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default configuration filename
pub const CONFIG_FILENAME: &str = "sandpit.yml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Main configuration struct matching the sandpit.yml schema
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub paths: PathsConfig,

    #[serde(default)]
    pub runtime: RuntimeConfig,

    #[serde(default)]
    pub default_mode: ExecutionMode,

    // Internal: path to config file (for relative path resolution)
    #[serde(skip)]
    config_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    String::from("127.0.0.1")
}

fn default_port() -> u16 {
    8000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    /// Directory holding index.html, styles.css, script.js, main.js and stdin.txt
    #[serde(default = "default_workspace")]
    pub workspace: PathBuf,

    /// JSON file backing the persisted editor state
    #[serde(default = "default_state")]
    pub state: PathBuf,
}

fn default_workspace() -> PathBuf {
    PathBuf::from(".")
}

fn default_state() -> PathBuf {
    PathBuf::from(".sandpit/state.json")
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            workspace: default_workspace(),
            state: default_state(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Minimum time the running indicator stays on
    #[serde(default = "default_dwell_ms")]
    pub dwell_ms: u64,

    /// Quiet period before edits are persisted
    #[serde(default = "default_persist_debounce_ms")]
    pub persist_debounce_ms: u64,
}

fn default_dwell_ms() -> u64 {
    500
}

fn default_persist_debounce_ms() -> u64 {
    500
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dwell_ms: default_dwell_ms(),
            persist_debounce_ms: default_persist_debounce_ms(),
        }
    }
}

impl RuntimeConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn persist_debounce(&self) -> Duration {
        Duration::from_millis(self.persist_debounce_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            paths: PathsConfig::default(),
            runtime: RuntimeConfig::default(),
            default_mode: ExecutionMode::default(),
            config_path: None,
        }
    }
}

impl Config {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;
        let mut config = Self::from_yaml(&contents)?;

        // Store config file path for relative path resolution
        config.config_path = Some(path.to_path_buf());

        Ok(config)
    }

    /// Parse configuration from YAML text
    pub fn from_yaml(contents: &str) -> ConfigResult<Self> {
        // An empty file is a valid, all-defaults config
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(contents)?
        };
        config.validate()?;
        Ok(config)
    }

    /// Load the file if it exists, defaults otherwise
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> ConfigResult<Self> {
        let path = path.as_ref();
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!("No config at {:?}, using defaults", path);
            let mut config = Config::default();
            config.config_path = Some(path.to_path_buf());
            Ok(config)
        }
    }

    fn validate(&self) -> ConfigResult<()> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidValue {
                field: "server.port".to_string(),
                reason: "must be non-zero".to_string(),
            });
        }
        Ok(())
    }

    /// Serialize back to YAML, as written by `sandpit init`
    pub fn to_yaml(&self) -> ConfigResult<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Get the workspace directory, resolved relative to config file
    pub fn workspace_dir(&self) -> PathBuf {
        self.resolve_path(&self.paths.workspace)
    }

    /// Get the persisted state file, resolved relative to config file
    pub fn state_path(&self) -> PathBuf {
        self.resolve_path(&self.paths.state)
    }

    /// Address the server binds to
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Resolve a path relative to the config file location
    fn resolve_path(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else if let Some(config_path) = &self.config_path {
            match config_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.join(path),
                _ => path.to_path_buf(),
            }
        } else {
            path.to_path_buf()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_is_default() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.runtime.dwell_ms, 500);
        assert_eq!(config.default_mode, ExecutionMode::Markup);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = "server:\n  port: 9000\ndefault_mode: js\nruntime:\n  dwell_ms: 250\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.default_mode, ExecutionMode::Script);
        assert_eq!(config.runtime.dwell(), Duration::from_millis(250));
        assert_eq!(config.runtime.persist_debounce_ms, 500);
    }

    #[test]
    fn test_zero_port_rejected() {
        let err = Config::from_yaml("server:\n  port: 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { .. }));
    }

    #[test]
    fn test_paths_resolve_against_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILENAME);
        std::fs::write(&path, "paths:\n  workspace: src\n").unwrap();

        let config = Config::from_file(&path).unwrap();
        assert_eq!(config.workspace_dir(), dir.path().join("src"));
        assert_eq!(config.state_path(), dir.path().join(".sandpit/state.json"));
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_or_default(dir.path().join(CONFIG_FILENAME)).unwrap();
        assert_eq!(config.workspace_dir(), dir.path().join("."));
    }

    #[test]
    fn test_yaml_roundtrip_keeps_mode_name() {
        let yaml = Config::default().to_yaml().unwrap();
        assert!(yaml.contains("default_mode: html"));
    }
}
