//! Headless monitor for the sigfeed dashboard feed.
//!
//! Orchestrates:
//! - Configuration loading (TOML, CLI and environment overrides)
//! - A single reconnecting WebSocket connection
//! - Typed subscribers for every dashboard event kind
//! - Platform health tracking from heartbeats

pub mod app;
pub mod board;
pub mod config;
pub mod error;

pub use app::Monitor;
pub use board::PlatformBoard;
pub use config::AppConfig;
pub use error::{AppError, AppResult};
