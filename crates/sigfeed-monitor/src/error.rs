//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] sigfeed_ws::WsError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] sigfeed_telemetry::TelemetryError),

    #[error("Connection failed: reconnection attempts exhausted")]
    ConnectionFailed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type AppResult<T> = Result<T, AppError>;
