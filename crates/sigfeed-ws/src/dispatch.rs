//! Event dispatch table.
//!
//! Maps an event tag to exactly one subscriber. Registering again for the
//! same tag replaces the previous callback (last registration wins); there
//! is no unsubscribe handle.
//!
//! The connection-failed notification has its own slot and is never
//! looked up by wire tag.

use chrono::Utc;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use sigfeed_core::{
    AgentSignal, AgentStatusUpdate, EventKind, InboundEvent, MarketEvent, PlatformStatusUpdate,
    TradeExecution, CONNECTION_FAILED,
};
use sigfeed_telemetry::metrics::{FeedMetrics, DROP_MALFORMED, DROP_UNHANDLED};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Subscriber for one event tag.
pub type EventCallback = Arc<dyn Fn(&InboundEvent) + Send + Sync>;

/// Subscriber for the connection-failed notification.
pub type FailureCallback = Arc<dyn Fn() + Send + Sync>;

/// Result of routing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// A subscriber was invoked.
    Delivered,
    /// No subscriber registered for the tag; discarded.
    Unhandled,
    /// Frame could not be parsed; dropped.
    Malformed,
}

/// Registry of one callback per event tag.
#[derive(Default)]
pub struct DispatchTable {
    handlers: RwLock<HashMap<String, EventCallback>>,
    connection_failed: RwLock<Option<FailureCallback>>,
}

impl DispatchTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `callback` for `kind`, replacing any previous one.
    pub fn on_message<F>(&self, kind: impl Into<String>, callback: F)
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        let kind = kind.into();
        let replaced = self
            .handlers
            .write()
            .insert(kind.clone(), Arc::new(callback))
            .is_some();
        debug!(kind = %kind, replaced, "Subscriber registered");
    }

    /// Register a typed subscriber. Payloads that do not decode into `T`
    /// are dropped and logged.
    fn on_typed<T, F>(&self, kind: EventKind, callback: F)
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        self.on_message(kind.as_str(), move |event| match event.decode::<T>() {
            Ok(value) => callback(value),
            Err(e) => {
                warn!(error = %e, "Dropping undecodable payload");
                FeedMetrics::record_dropped(DROP_MALFORMED);
            }
        });
    }

    pub fn on_market_event<F>(&self, callback: F)
    where
        F: Fn(MarketEvent) + Send + Sync + 'static,
    {
        self.on_typed(EventKind::MarketEvent, callback);
    }

    pub fn on_agent_signal<F>(&self, callback: F)
    where
        F: Fn(AgentSignal) + Send + Sync + 'static,
    {
        self.on_typed(EventKind::AgentSignal, callback);
    }

    pub fn on_trade_update<F>(&self, callback: F)
    where
        F: Fn(TradeExecution) + Send + Sync + 'static,
    {
        self.on_typed(EventKind::TradeUpdate, callback);
    }

    pub fn on_agent_status<F>(&self, callback: F)
    where
        F: Fn(AgentStatusUpdate) + Send + Sync + 'static,
    {
        self.on_message(EventKind::AgentStatus.as_str(), move |event| {
            callback(AgentStatusUpdate::from_event(event));
        });
    }

    /// Platform status derived from `system_event` frames.
    ///
    /// Heartbeats yield a single-platform update and are skipped when they
    /// name no venue; other frames are read as a flat platform map. Frames
    /// carrying no platform are skipped. Shares the
    /// `system_event` slot with [`Self::on_system_event`].
    pub fn on_platform_status<F>(&self, callback: F)
    where
        F: Fn(PlatformStatusUpdate) + Send + Sync + 'static,
    {
        self.on_message(EventKind::SystemEvent.as_str(), move |event| {
            let update = PlatformStatusUpdate::from_system_event(event, Utc::now());
            if update.is_empty() {
                debug!("System event carries no platform status");
                return;
            }
            callback(update);
        });
    }

    pub fn on_system_event<F>(&self, callback: F)
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        self.on_message(EventKind::SystemEvent.as_str(), callback);
    }

    pub fn on_agent_output<F>(&self, callback: F)
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        self.on_message(EventKind::AgentOutput.as_str(), callback);
    }

    pub fn on_task_update<F>(&self, callback: F)
    where
        F: Fn(&InboundEvent) + Send + Sync + 'static,
    {
        self.on_message(EventKind::TaskUpdate.as_str(), callback);
    }

    /// Register the terminal "reconnection exhausted" subscriber.
    pub fn on_connection_failed<F>(&self, callback: F)
    where
        F: Fn() + Send + Sync + 'static,
    {
        *self.connection_failed.write() = Some(Arc::new(callback));
        debug!(kind = CONNECTION_FAILED, "Subscriber registered");
    }

    pub fn has_handler(&self, kind: &str) -> bool {
        self.handlers.read().contains_key(kind)
    }

    /// Route a parsed event to its subscriber.
    ///
    /// The lock is released before the callback runs, so a callback may
    /// re-register.
    pub fn dispatch(&self, event: &InboundEvent) -> DispatchOutcome {
        let handler = self.handlers.read().get(event.kind()).cloned();
        match handler {
            Some(handler) => {
                handler(event);
                FeedMetrics::record_event(event.kind());
                DispatchOutcome::Delivered
            }
            None => {
                debug!(kind = event.kind(), "No subscriber, discarding event");
                FeedMetrics::record_dropped(DROP_UNHANDLED);
                DispatchOutcome::Unhandled
            }
        }
    }

    /// Parse and route one raw text frame. Malformed frames are logged and
    /// dropped.
    pub fn dispatch_frame(&self, text: &str) -> DispatchOutcome {
        match InboundEvent::parse(text) {
            Ok(event) => self.dispatch(&event),
            Err(e) => {
                error!(error = %e, "Error parsing WebSocket message");
                FeedMetrics::record_dropped(DROP_MALFORMED);
                DispatchOutcome::Malformed
            }
        }
    }

    /// Invoke the connection-failed subscriber, if any. Returns whether one
    /// was registered.
    pub fn notify_connection_failed(&self) -> bool {
        FeedMetrics::record_connection_failed();
        let handler = self.connection_failed.read().clone();
        match handler {
            Some(handler) => {
                handler();
                true
            }
            None => {
                warn!("Connection failed with no subscriber registered");
                false
            }
        }
    }
}

impl std::fmt::Debug for DispatchTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<String> = self.handlers.read().keys().cloned().collect();
        kinds.sort();
        f.debug_struct("DispatchTable")
            .field("kinds", &kinds)
            .field(
                "connection_failed",
                &self.connection_failed.read().is_some(),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use rust_decimal_macros::dec;
    use serde_json::{json, Value};
    use sigfeed_core::{PlatformState, SignalAction};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const SIGNAL_FRAME: &str = r#"{"type":"agent_signal","agent":"x","signal":"BUY","confidence":0.9,"reasoning":"r","timestamp":"2025-01-01T00:00:00Z"}"#;

    #[test]
    fn test_routes_to_registered_kind_with_exact_payload() {
        let table = DispatchTable::new();
        let received: Arc<Mutex<Vec<Value>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        table.on_message("agent_signal", move |event| {
            sink.lock().push(event.payload().clone());
        });

        assert_eq!(table.dispatch_frame(SIGNAL_FRAME), DispatchOutcome::Delivered);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0],
            json!({
                "type": "agent_signal",
                "agent": "x",
                "signal": "BUY",
                "confidence": 0.9,
                "reasoning": "r",
                "timestamp": "2025-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn test_unregistered_kind_is_discarded() {
        let table = DispatchTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        table.on_message("agent_signal", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = table.dispatch_frame(r#"{"type":"task_update","id":"t1"}"#);
        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_reregistration_replaces_previous() {
        let table = DispatchTable::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));

        let a = first.clone();
        table.on_message("agent_signal", move |_| {
            a.fetch_add(1, Ordering::SeqCst);
        });
        let b = second.clone();
        table.on_message("agent_signal", move |_| {
            b.fetch_add(1, Ordering::SeqCst);
        });

        table.dispatch_frame(SIGNAL_FRAME);
        assert_eq!(first.load(Ordering::SeqCst), 0);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_malformed_frame_invokes_nothing() {
        let table = DispatchTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        table.on_message("agent_signal", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert_eq!(
            table.dispatch_frame("{\"type\":\"agent_signal\""),
            DispatchOutcome::Malformed
        );
        assert_eq!(table.dispatch_frame("garbage"), DispatchOutcome::Malformed);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_typed_agent_signal() {
        let table = DispatchTable::new();
        let received: Arc<Mutex<Option<AgentSignal>>> = Arc::new(Mutex::new(None));

        let sink = received.clone();
        table.on_agent_signal(move |signal| {
            *sink.lock() = Some(signal);
        });
        table.dispatch_frame(SIGNAL_FRAME);

        let signal = received.lock().clone().unwrap();
        assert_eq!(signal.agent, "x");
        assert_eq!(signal.signal, SignalAction::Buy);
    }

    #[test]
    fn test_typed_subscriber_skips_undecodable_payload() {
        let table = DispatchTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        table.on_trade_update(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        // Still delivered to the slot, but the typed wrapper drops it
        let outcome = table.dispatch_frame(r#"{"type":"trade_update","id":"1"}"#);
        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_typed_market_event() {
        let table = DispatchTable::new();
        let received: Arc<Mutex<Vec<MarketEvent>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        table.on_market_event(move |event| sink.lock().push(event));
        table.dispatch_frame(
            r#"{"type":"market_event","symbol":"XAUUSD","price":1905,"timestamp":"2025-08-01T10:05:00Z","source":"feed"}"#,
        );

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].price, dec!(1905));
    }

    #[test]
    fn test_platform_status_from_heartbeat() {
        let table = DispatchTable::new();
        let received: Arc<Mutex<Vec<PlatformStatusUpdate>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        table.on_platform_status(move |update| sink.lock().push(update));

        table.dispatch_frame(
            r#"{"type":"system_event","event_type":"MACHINE_HEARTBEAT","venue":"oanda","details":{"status":"SCANNING"}}"#,
        );
        // Not a heartbeat and no platform entries: skipped
        table.dispatch_frame(r#"{"type":"system_event","event_type":"ENGINE_START"}"#);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(
            received[0].get("oanda").unwrap().status,
            PlatformState::Online
        );
    }

    #[test]
    fn test_heartbeat_without_venue_is_skipped() {
        let table = DispatchTable::new();
        let received: Arc<Mutex<Vec<PlatformStatusUpdate>>> = Arc::new(Mutex::new(Vec::new()));

        let sink = received.clone();
        table.on_platform_status(move |update| sink.lock().push(update));

        let outcome = table.dispatch_frame(
            r#"{"type":"system_event","event_type":"MACHINE_HEARTBEAT","details":{"status":"online"}}"#,
        );
        assert_eq!(outcome, DispatchOutcome::Delivered);
        assert!(received.lock().is_empty());
    }

    #[test]
    fn test_platform_and_system_event_share_slot() {
        let table = DispatchTable::new();
        let platform_calls = Arc::new(AtomicUsize::new(0));
        let system_calls = Arc::new(AtomicUsize::new(0));

        let p = platform_calls.clone();
        table.on_platform_status(move |_| {
            p.fetch_add(1, Ordering::SeqCst);
        });
        let s = system_calls.clone();
        table.on_system_event(move |_| {
            s.fetch_add(1, Ordering::SeqCst);
        });

        table.dispatch_frame(
            r#"{"type":"system_event","event_type":"HEARTBEAT","venue":"ibkr","details":{"status":"paper"}}"#,
        );
        assert_eq!(platform_calls.load(Ordering::SeqCst), 0);
        assert_eq!(system_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_connection_failed_is_not_a_wire_tag() {
        let table = DispatchTable::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        table.on_connection_failed(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        let outcome = table.dispatch_frame(r#"{"type":"connection_failed"}"#);
        assert_eq!(outcome, DispatchOutcome::Unhandled);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        assert!(table.notify_connection_failed());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_notify_without_subscriber() {
        let table = DispatchTable::new();
        assert!(!table.notify_connection_failed());
    }

    #[test]
    fn test_callback_may_reregister() {
        let table = Arc::new(DispatchTable::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let inner_table = table.clone();
        let counter = calls.clone();
        table.on_message("task_update", move |_| {
            let counter = counter.clone();
            inner_table.on_message("task_update", move |_| {
                counter.fetch_add(10, Ordering::SeqCst);
            });
        });

        table.dispatch_frame(r#"{"type":"task_update"}"#);
        table.dispatch_frame(r#"{"type":"task_update"}"#);
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert!(table.has_handler("task_update"));
    }
}
