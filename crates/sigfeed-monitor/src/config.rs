//! Application configuration.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Serialize};
use sigfeed_ws::ConnectionConfig;
use std::path::Path;
use std::time::Duration;

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "SIGFEED_CONFIG";

/// Config file used when neither flag nor environment name one.
pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Monitor configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// WebSocket connection settings.
    #[serde(default)]
    pub connection: ConnectionConfig,
    /// Seconds between connection status log lines.
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    /// Send `get_status` once the monitor starts.
    #[serde(default = "default_request_status_on_start")]
    pub request_status_on_start: bool,
}

fn default_status_interval_secs() -> u64 {
    30
}

fn default_request_status_on_start() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            connection: ConnectionConfig::default(),
            status_interval_secs: default_status_interval_secs(),
            request_status_on_start: default_request_status_on_start(),
        }
    }
}

impl AppConfig {
    /// Load configuration.
    ///
    /// An explicit path (CLI flag, else `SIGFEED_CONFIG`) must exist. Without
    /// one, `config/default.toml` is used if present, else built-in defaults.
    pub fn load(explicit: Option<String>) -> AppResult<Self> {
        let explicit = explicit.or_else(|| std::env::var(CONFIG_ENV).ok());
        match explicit {
            Some(path) => Self::from_file(&path),
            None if Path::new(DEFAULT_CONFIG_PATH).exists() => Self::from_file(DEFAULT_CONFIG_PATH),
            None => {
                tracing::warn!(path = DEFAULT_CONFIG_PATH, "Config file not found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from a specific file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;

        toml::from_str(&content)
            .map_err(|e| AppError::Config(format!("Failed to parse config {path}: {e}")))
    }

    /// Override the endpoint base URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.connection.url = url.into();
        self
    }

    /// Interval between status log lines (at least one second).
    pub fn status_interval(&self) -> Duration {
        Duration::from_secs(self.status_interval_secs.max(1))
    }
}
