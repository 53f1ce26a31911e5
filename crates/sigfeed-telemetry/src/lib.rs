//! Structured logging and Prometheus metrics for sigfeed.
//!
//! - Structured JSON logging with tracing (pretty output in development)
//! - Prometheus metrics for connection state and event flow

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::{init_logging, init_logging_with, LogFormat};
pub use metrics::FeedMetrics;
