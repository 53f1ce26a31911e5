//! Connection configuration.

use crate::lifecycle::ReconnectPolicy;
use serde::{Deserialize, Serialize};
use sigfeed_core::ClientId;
use std::time::Duration;

/// Environment variable supplying the default endpoint.
pub const WS_URL_ENV: &str = "SIGFEED_WS_URL";

/// Endpoint used when neither config nor environment provide one.
pub const DEFAULT_WS_URL: &str = "ws://websocket_server:8008/ws";

/// Connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Base WebSocket URL; `/{clientId}` is appended per connection.
    #[serde(default = "default_url")]
    pub url: String,
    /// Automatic reconnection attempts before giving up.
    #[serde(default = "default_max_reconnect_attempts")]
    pub max_reconnect_attempts: u32,
    /// Base delay for exponential backoff (delay = base * 2^attempt).
    #[serde(default = "default_reconnect_base_delay_ms")]
    pub reconnect_base_delay_ms: u64,
    /// Ceiling for a single connection attempt.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
}

fn default_url() -> String {
    std::env::var(WS_URL_ENV)
        .ok()
        .map(|url| url.trim().to_string())
        .filter(|url| !url.is_empty())
        .unwrap_or_else(|| DEFAULT_WS_URL.to_string())
}

fn default_max_reconnect_attempts() -> u32 {
    5
}

fn default_reconnect_base_delay_ms() -> u64 {
    5_000
}

fn default_connect_timeout_ms() -> u64 {
    10_000
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            url: default_url(),
            max_reconnect_attempts: default_max_reconnect_attempts(),
            reconnect_base_delay_ms: default_reconnect_base_delay_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
        }
    }
}

impl ConnectionConfig {
    /// Config pointing at `url` with default timings.
    pub fn with_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    /// Full connection URL for a client: `{url}/{client_id}`.
    pub fn endpoint_url(&self, client_id: &ClientId) -> String {
        format!("{}/{}", self.url.trim().trim_end_matches('/'), client_id)
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy::new(
            self.max_reconnect_attempts,
            Duration::from_millis(self.reconnect_base_delay_ms),
        )
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let config = ConnectionConfig::default();
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.reconnect_base_delay_ms, 5000);
        assert_eq!(config.connect_timeout(), Duration::from_secs(10));
        assert!(!config.url.is_empty());
    }

    #[test]
    fn test_endpoint_url_appends_client_id() {
        let config = ConnectionConfig::with_url("ws://localhost:8008/ws/");
        let client = ClientId::new("client_abc123xyz");
        assert_eq!(
            config.endpoint_url(&client),
            "ws://localhost:8008/ws/client_abc123xyz"
        );
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: ConnectionConfig = serde_json::from_str(
            r#"{"url":"wss://feed.example.com/ws","reconnect_base_delay_ms":250}"#,
        )
        .unwrap();

        assert_eq!(config.url, "wss://feed.example.com/ws");
        assert_eq!(config.reconnect_base_delay_ms, 250);
        assert_eq!(config.max_reconnect_attempts, 5);
        assert_eq!(config.connect_timeout_ms, 10_000);
    }

    #[test]
    fn test_reconnect_policy_from_config() {
        let config = ConnectionConfig {
            max_reconnect_attempts: 3,
            reconnect_base_delay_ms: 100,
            ..ConnectionConfig::with_url("ws://localhost/ws")
        };
        let policy = config.reconnect_policy();
        assert_eq!(policy.max_attempts(), 3);
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }
}
