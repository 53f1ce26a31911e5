//! Outbound command messages.

use crate::identity::ClientId;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

/// Fields the client stamps onto every outbound message.
const STAMPED_KEYS: [&str; 3] = ["type", "clientId", "timestamp"];

/// Command sent to the server.
///
/// Callers supply only `type` and payload fields; `clientId` and
/// `timestamp` are stamped at transmission time.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundMessage {
    kind: String,
    fields: Map<String, Value>,
}

impl OutboundMessage {
    /// Create a message with no payload fields.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
        }
    }

    /// Keepalive / hello sent on every successful open.
    pub fn ping() -> Self {
        Self::new("ping")
    }

    /// Ask the server for a status snapshot.
    pub fn get_status() -> Self {
        Self::new("get_status")
    }

    /// Submit a task to the agent system.
    pub fn create_task(data: Value) -> Self {
        Self::new("create_task").with_field("data", data)
    }

    /// Add a payload field.
    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Produce the wire object.
    ///
    /// Order is `type`, caller fields, `clientId`, `timestamp`. Caller
    /// fields named like a stamped key are overridden.
    pub fn stamp(&self, client_id: &ClientId, now: DateTime<Utc>) -> Value {
        let mut wire = Map::with_capacity(self.fields.len() + STAMPED_KEYS.len());
        wire.insert("type".to_string(), Value::String(self.kind.clone()));
        for (key, value) in &self.fields {
            if !STAMPED_KEYS.contains(&key.as_str()) {
                wire.insert(key.clone(), value.clone());
            }
        }
        wire.insert(
            "clientId".to_string(),
            Value::String(client_id.as_str().to_string()),
        );
        wire.insert(
            "timestamp".to_string(),
            Value::String(now.to_rfc3339_opts(SecondsFormat::Millis, true)),
        );
        Value::Object(wire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn fixed_now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_ping_stamp() {
        let client = ClientId::new("client_abc123xyz");
        let wire = OutboundMessage::ping().stamp(&client, fixed_now());

        assert_eq!(
            wire,
            json!({
                "type": "ping",
                "clientId": "client_abc123xyz",
                "timestamp": "2025-01-01T00:00:00.000Z"
            })
        );
    }

    #[test]
    fn test_create_task_keeps_payload_and_order() {
        let client = ClientId::new("client_abc123xyz");
        let wire = OutboundMessage::create_task(json!({"symbol": "XAUUSD", "action": "analyze"}))
            .stamp(&client, fixed_now());

        let keys: Vec<&str> = wire.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["type", "data", "clientId", "timestamp"]);
        assert_eq!(wire["data"]["symbol"], "XAUUSD");
    }

    #[test]
    fn test_stamp_overrides_caller_identity() {
        let client = ClientId::new("client_real00000");
        let wire = OutboundMessage::get_status()
            .with_field("clientId", json!("client_spoofed"))
            .with_field("timestamp", json!("1999-01-01T00:00:00Z"))
            .with_field("type", json!("something_else"))
            .stamp(&client, fixed_now());

        assert_eq!(wire["type"], "get_status");
        assert_eq!(wire["clientId"], "client_real00000");
        assert_eq!(wire["timestamp"], "2025-01-01T00:00:00.000Z");
    }
}
