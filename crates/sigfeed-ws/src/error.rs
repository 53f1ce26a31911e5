//! WebSocket error types.

use thiserror::Error;

/// Connection manager errors.
///
/// `Clone` so a single coalesced connect outcome can be handed to every
/// waiter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WsError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Connection timeout after {0}ms")]
    ConnectTimeout(u64),

    #[error("WebSocket connection not available")]
    ConnectionUnavailable,

    #[error("Connection closed by client")]
    Closed,

    #[error("Send failed: {0}")]
    SendFailed(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<tokio_tungstenite::tungstenite::Error> for WsError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::ConnectionFailed(e.to_string())
    }
}

impl From<serde_json::Error> for WsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type WsResult<T> = Result<T, WsError>;
