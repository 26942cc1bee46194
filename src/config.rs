//! Hub configuration loaded from a JSON file

use crate::audio::AudioConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "AMBIENT_HUB_CONFIG";

/// Environment variable overriding the log level
pub const LOG_LEVEL_ENV: &str = "LOG_LEVEL";

/// Default config file, relative to the working directory
pub const DEFAULT_CONFIG_PATH: &str = "config.json";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Where light commands go
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PublishConfig {
    /// Topic for light commands
    pub command_topic: String,

    /// Outbound queue depth before commands are dropped
    pub queue_capacity: usize,
}

impl Default for PublishConfig {
    fn default() -> Self {
        Self {
            command_topic: "smartambient/led/command".to_string(),
            queue_capacity: 64,
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HubConfig {
    pub audio: AudioConfig,
    pub publish: PublishConfig,

    /// env_logger filter used when RUST_LOG is unset
    pub log_level: String,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            audio: AudioConfig::default(),
            publish: PublishConfig::default(),
            log_level: "info".to_string(),
        }
    }
}

impl HubConfig {
    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        };

        serde_json::from_str(&text).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// An explicit path wins, then `$AMBIENT_HUB_CONFIG`, then `config.json`.
    pub fn resolve_path(explicit: Option<&Path>) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_PATH_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH))
    }

    /// Load from `path`, then apply `$LOG_LEVEL`.
    pub fn load_with_env(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            config.log_level = level.to_lowercase();
        }
        Ok(config)
    }
}
