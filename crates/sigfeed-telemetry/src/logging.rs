//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter when `RUST_LOG` is unset.
const DEFAULT_FILTER: &str = "info,sigfeed=debug";

/// Environment variable selecting the deployment flavour.
const RUST_ENV: &str = "RUST_ENV";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// One JSON object per event, with span context.
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

impl LogFormat {
    /// `RUST_ENV=production` selects JSON; anything else is pretty.
    pub fn for_env(rust_env: Option<&str>) -> Self {
        match rust_env.map(str::trim) {
            Some(env) if env.eq_ignore_ascii_case("production") => Self::Json,
            _ => Self::Pretty,
        }
    }

    pub fn from_env() -> Self {
        Self::for_env(std::env::var(RUST_ENV).ok().as_deref())
    }
}

/// Initialize structured logging in the format chosen by `RUST_ENV`.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with(LogFormat::from_env())
}

/// Initialize structured logging in an explicit format.
pub fn init_logging_with(format: LogFormat) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(env_filter);

    let result = match format {
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true),
            )
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_target(true))
            .try_init(),
    };

    result.map_err(|e| TelemetryError::LoggingInit(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_for_env() {
        assert_eq!(LogFormat::for_env(Some("production")), LogFormat::Json);
        assert_eq!(LogFormat::for_env(Some(" Production ")), LogFormat::Json);
        assert_eq!(LogFormat::for_env(Some("development")), LogFormat::Pretty);
        assert_eq!(LogFormat::for_env(None), LogFormat::Pretty);
    }

    #[test]
    fn test_second_init_fails() {
        // Only one global subscriber per process; the first call may or may
        // not win depending on test order, the second never does.
        let _ = init_logging_with(LogFormat::Pretty);
        let err = init_logging_with(LogFormat::Json).unwrap_err();
        assert!(matches!(err, TelemetryError::LoggingInit(_)));
    }
}
