//! Reconnecting WebSocket client for the sigfeed dashboard feed.
//!
//! Provides:
//! - A single managed connection with exponential backoff reconnection
//! - A per-instance client identity appended to the endpoint path
//! - Readiness-gated sends that wait for an in-flight connect
//! - A last-registration-wins dispatch table keyed by event tag

pub mod config;
pub mod connection;
pub mod dispatch;
pub mod error;
pub mod lifecycle;

pub use config::{ConnectionConfig, DEFAULT_WS_URL, WS_URL_ENV};
pub use connection::{ConnectionManager, ConnectionStatus};
pub use dispatch::{DispatchOutcome, DispatchTable};
pub use error::{WsError, WsResult};
pub use lifecycle::{ConnectionState, DisconnectAction, Lifecycle, ReconnectPolicy};

use std::sync::Once;

static INIT_CRYPTO: Once = Once::new();

/// Initialize the TLS crypto provider.
/// Must be called before any `wss://` connection is made.
pub fn init_crypto() {
    INIT_CRYPTO.call_once(|| {
        let _ = rustls::crypto::ring::default_provider().install_default();
    });
}
