//! Inbound frame envelope.
//!
//! Every frame pushed by the server is a JSON object carrying a string
//! `type` tag. The tag is the dispatch key; the whole object is the payload.

use crate::error::{CoreError, Result};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Key of the locally synthesized "reconnection exhausted" notification.
///
/// Never received over the wire; used only in log output and metrics labels.
pub const CONNECTION_FAILED: &str = "connection_failed";

/// Inbound event tags recognized by the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    AgentStatus,
    AgentOutput,
    TaskUpdate,
    /// System events; platform heartbeats arrive here.
    SystemEvent,
    MarketEvent,
    AgentSignal,
    TradeUpdate,
}

impl EventKind {
    /// All recognized kinds, in wire-documentation order.
    pub const ALL: [EventKind; 7] = [
        Self::AgentStatus,
        Self::AgentOutput,
        Self::TaskUpdate,
        Self::SystemEvent,
        Self::MarketEvent,
        Self::AgentSignal,
        Self::TradeUpdate,
    ];

    /// Wire tag for this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AgentStatus => "agent_status",
            Self::AgentOutput => "agent_output",
            Self::TaskUpdate => "task_update",
            Self::SystemEvent => "system_event",
            Self::MarketEvent => "market_event",
            Self::AgentSignal => "agent_signal",
            Self::TradeUpdate => "trade_update",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| CoreError::UnknownKind(s.to_string()))
    }
}

/// A parsed inbound frame.
///
/// `payload` is the complete frame object, `type` included, exactly as
/// received.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundEvent {
    kind: String,
    payload: Value,
}

impl InboundEvent {
    /// Parse a raw text frame.
    ///
    /// Fails with `MalformedFrame` if the text is not JSON, is not an
    /// object, or has no string `type` field.
    pub fn parse(text: &str) -> Result<Self> {
        let payload: Value = serde_json::from_str(text)
            .map_err(|e| CoreError::MalformedFrame(format!("invalid JSON: {e}")))?;
        Self::from_value(payload)
    }

    /// Build from an already-decoded JSON value.
    pub fn from_value(payload: Value) -> Result<Self> {
        let kind = match payload.get("type") {
            Some(Value::String(kind)) => kind.clone(),
            Some(_) => {
                return Err(CoreError::MalformedFrame(
                    "`type` is not a string".to_string(),
                ))
            }
            None if payload.is_object() => {
                return Err(CoreError::MalformedFrame("missing `type`".to_string()))
            }
            None => {
                return Err(CoreError::MalformedFrame(
                    "frame is not a JSON object".to_string(),
                ))
            }
        };
        Ok(Self { kind, payload })
    }

    /// Dispatch key.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Recognized kind, if the tag is one of the well-known ones.
    pub fn event_kind(&self) -> Option<EventKind> {
        self.kind.parse().ok()
    }

    /// Full frame object.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Object view of the payload.
    pub fn fields(&self) -> Option<&Map<String, Value>> {
        self.payload.as_object()
    }

    /// Consume and return the frame object.
    pub fn into_payload(self) -> Value {
        self.payload
    }

    /// Deserialize the payload into a typed contract.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T> {
        T::deserialize(&self.payload).map_err(|e| CoreError::MalformedPayload {
            kind: self.kind.clone(),
            reason: e.to_string(),
        })
    }
}
