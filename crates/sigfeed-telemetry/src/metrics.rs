//! Prometheus metrics for the sigfeed client.
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A failure means duplicate metric
//! names, which is a startup bug; it can only happen during static
//! initialization.

use crate::error::{TelemetryError, TelemetryResult};
use once_cell::sync::Lazy;
use prometheus::{
    register_int_counter, register_int_counter_vec, register_int_gauge, Encoder, IntCounter,
    IntCounterVec, IntGauge, TextEncoder,
};

/// WebSocket connection state (1 = connected, 0 = not connected).
pub static WS_CONNECTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "sigfeed_ws_connected",
        "WebSocket connection state (1=connected)"
    )
    .unwrap()
});

/// Reconnection attempts started.
pub static WS_RECONNECT_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sigfeed_ws_reconnect_total",
        "Total WebSocket reconnection attempts"
    )
    .unwrap()
});

/// Inbound events delivered to a subscriber.
/// Labels: kind (dispatch tag)
pub static EVENTS_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sigfeed_events_total",
        "Inbound events delivered to a subscriber",
        &["kind"]
    )
    .unwrap()
});

/// Inbound frames not delivered.
/// Labels: reason (malformed/unhandled)
pub static FRAMES_DROPPED_TOTAL: Lazy<IntCounterVec> = Lazy::new(|| {
    register_int_counter_vec!(
        "sigfeed_frames_dropped_total",
        "Inbound frames not delivered to any subscriber",
        &["reason"]
    )
    .unwrap()
});

/// Times the reconnect ceiling was reached.
pub static CONNECTION_FAILED_TOTAL: Lazy<IntCounter> = Lazy::new(|| {
    register_int_counter!(
        "sigfeed_connection_failed_total",
        "Times reconnection attempts were exhausted"
    )
    .unwrap()
});

/// Drop reason label values.
pub const DROP_MALFORMED: &str = "malformed";
pub const DROP_UNHANDLED: &str = "unhandled";

/// Convenience recorder over the static metrics.
pub struct FeedMetrics;

impl FeedMetrics {
    pub fn set_connected(connected: bool) {
        WS_CONNECTED.set(i64::from(connected));
    }

    pub fn record_reconnect() {
        WS_RECONNECT_TOTAL.inc();
    }

    pub fn record_event(kind: &str) {
        EVENTS_TOTAL.with_label_values(&[kind]).inc();
    }

    pub fn record_dropped(reason: &str) {
        FRAMES_DROPPED_TOTAL.with_label_values(&[reason]).inc();
    }

    pub fn record_connection_failed() {
        CONNECTION_FAILED_TOTAL.inc();
    }

    /// Events delivered so far for `kind`.
    pub fn event_count(kind: &str) -> u64 {
        EVENTS_TOTAL.with_label_values(&[kind]).get()
    }

    /// Render every registered metric in the Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&families, &mut buffer)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buffer).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
