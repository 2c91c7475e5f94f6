//! Configuration file handling for veo-studio.
//!
//! Loads configuration from `~/.config/veo-studio/config.toml` or a custom path.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::session::{default_state_path, DEFAULT_GENERATION_CEILING};
use crate::veo::{PollPolicy, DEFAULT_POLL_INTERVAL, GEMINI_API_BASE_URL};

/// Configuration file structure for veo-studio.
#[derive(Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub quota: QuotaConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct ApiConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Model used when `--model` is not given.
    #[serde(default)]
    pub model: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct PollingConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
    /// Give up after this long. Unset means wait for as long as it takes.
    #[serde(default)]
    pub max_wait_secs: Option<u64>,
    #[serde(default)]
    pub max_polls: Option<u32>,
    /// Retries for a transient status-check failure.
    #[serde(default)]
    pub transient_retries: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
            max_wait_secs: None,
            max_polls: None,
            transient_retries: 0,
        }
    }
}

/// Shortest accepted poll interval; 0 would poll in a tight loop.
const MIN_INTERVAL_SECS: u64 = 1;

impl PollingConfig {
    pub fn poll_policy(&self) -> PollPolicy {
        if self.interval_secs < MIN_INTERVAL_SECS {
            log::warn!(
                "polling.interval_secs = {} is too short, using {}s",
                self.interval_secs,
                MIN_INTERVAL_SECS
            );
        }
        PollPolicy {
            interval: Duration::from_secs(self.interval_secs.max(MIN_INTERVAL_SECS)),
            max_wait: self.max_wait_secs.map(Duration::from_secs),
            max_polls: self.max_polls,
            transient_retries: self.transient_retries,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, PartialEq, Eq)]
pub struct QuotaConfig {
    #[serde(default = "default_ceiling")]
    pub ceiling: u32,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            ceiling: default_ceiling(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Default, PartialEq, Eq)]
pub struct StorageConfig {
    pub state_file: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
}

impl StorageConfig {
    pub fn state_file(&self) -> PathBuf {
        self.state_file.clone().unwrap_or_else(default_state_path)
    }

    pub fn media_dir(&self) -> PathBuf {
        self.media_dir.clone().unwrap_or_else(default_media_dir)
    }
}

fn default_base_url() -> String {
    GEMINI_API_BASE_URL.to_string()
}

fn default_interval_secs() -> u64 {
    DEFAULT_POLL_INTERVAL.as_secs()
}

fn default_ceiling() -> u32 {
    DEFAULT_GENERATION_CEILING
}

impl Config {
    /// Load configuration from a file path.
    /// Returns default config if the file doesn't exist.
    /// Returns an error if the file exists but cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path.map(PathBuf::from).unwrap_or_else(default_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io {
                path: path.clone(),
                source: e,
            })?;
            let config: Config = toml::from_str(&content).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                source: e,
            })?;
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{}': {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Get the default config file path.
pub fn default_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join("veo-studio")
        .join("config.toml")
}

/// Directory where downloaded videos are kept until saved.
pub fn default_media_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("veo-studio")
        .join("media")
}

/// Commented template written by `config init`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# veo-studio configuration

[api]
# Gemini API endpoint
base_url = "https://generativelanguage.googleapis.com"
# Default model: veo-2.0-generate-001 or veo-3.0-generate-preview
# model = "veo-2.0-generate-001"

[polling]
# Seconds between status checks (minimum 1)
interval_secs = 10
# Give up after this many seconds (default: wait indefinitely)
# max_wait_secs = 900
# Give up after this many status checks
# max_polls = 90
# Retries for a transient status-check failure (0 = never retry)
transient_retries = 0

[quota]
# Generations allowed per API key before a new key is required
ceiling = 10

[storage]
# state_file = "/path/to/state.toml"
# media_dir = "/path/to/media"
"#;
