//! Agent and platform status maps.
//!
//! Status frames are flat objects: every top-level key other than the
//! envelope keys names an agent (or platform) and maps to its health.
//! Platform health is also derived from heartbeat `system_event` frames.

use crate::event::{EventKind, InboundEvent};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Keys that belong to the frame envelope rather than the status map.
const ENVELOPE_KEYS: [&str; 3] = ["type", "clientId", "timestamp"];

/// Additional envelope keys of `system_event` frames.
const SYSTEM_EVENT_KEYS: [&str; 4] = ["event_type", "event", "venue", "details"];

/// Heartbeat event types that update platform status.
pub const HEARTBEAT_EVENT_TYPES: [&str; 2] = ["MACHINE_HEARTBEAT", "HEARTBEAT"];

/// Platform key whose heartbeat message is fixed.
pub const OANDA_PLATFORM: &str = "oanda";

/// Message attached to every OANDA heartbeat.
pub const OANDA_HEARTBEAT_MESSAGE: &str = "OANDA engine heartbeat (canary mode: logging only)";

/// Agent liveness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentState {
    Online,
    Offline,
    #[serde(other)]
    Unknown,
}

/// Health entry for one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentHealth {
    pub status: AgentState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl AgentHealth {
    pub fn is_online(&self) -> bool {
        self.status == AgentState::Online
    }
}

/// Trading platform mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlatformState {
    Online,
    Offline,
    /// Logging-only execution.
    Canary,
    Paper,
}

impl PlatformState {
    /// Map a heartbeat status string to a platform state.
    pub fn from_heartbeat_status(status: &str) -> Self {
        let status = status.to_lowercase();
        match status.as_str() {
            "scanning" | "online" | "active" => Self::Online,
            s if s.contains("canary") => Self::Canary,
            s if s.contains("paper") => Self::Paper,
            _ => Self::Offline,
        }
    }
}

impl fmt::Display for PlatformState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
            Self::Canary => write!(f, "canary"),
            Self::Paper => write!(f, "paper"),
        }
    }
}

/// Health entry for one platform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformHealth {
    pub status: PlatformState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_heartbeat: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Agent name -> health, parsed from an `agent_status` frame.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentStatusUpdate {
    pub agents: BTreeMap<String, AgentHealth>,
}

impl AgentStatusUpdate {
    pub fn from_event(event: &InboundEvent) -> Self {
        Self {
            agents: collect_entries(event.kind(), event.fields()),
        }
    }

    pub fn get(&self, name: &str) -> Option<&AgentHealth> {
        self.agents.get(name)
    }

    pub fn online_count(&self) -> usize {
        self.agents.values().filter(|h| h.is_online()).count()
    }
}

/// Platform name -> health.
///
/// Built either from a flat status frame or from a single heartbeat.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlatformStatusUpdate {
    pub platforms: BTreeMap<String, PlatformHealth>,
}

impl PlatformStatusUpdate {
    pub fn from_event(event: &InboundEvent) -> Self {
        Self {
            platforms: collect_entries(event.kind(), event.fields()),
        }
    }

    /// Platform status carried by a `system_event` frame.
    ///
    /// A heartbeat yields its single platform, or nothing when it names no
    /// venue. Any other system event is read as a flat platform map.
    pub fn from_system_event(event: &InboundEvent, now: DateTime<Utc>) -> Self {
        match event.decode::<SystemEvent>() {
            Ok(system) if system.is_heartbeat() => {
                Self::from_heartbeat(&system, now).unwrap_or_default()
            }
            _ => Self::from_event(event),
        }
    }

    /// Derive an update from a heartbeat system event.
    ///
    /// Returns `None` for non-heartbeat events and heartbeats without a venue.
    pub fn from_heartbeat(event: &SystemEvent, now: DateTime<Utc>) -> Option<Self> {
        let (name, health) = event.platform_health(now)?;
        let mut platforms = BTreeMap::new();
        platforms.insert(name, health);
        Some(Self { platforms })
    }

    pub fn get(&self, name: &str) -> Option<&PlatformHealth> {
        self.platforms.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.platforms.is_empty()
    }
}

/// Details block of a system event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemEventDetails {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// System event pushed on the `system_event` channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemEvent {
    #[serde(default, alias = "event")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub details: Option<SystemEventDetails>,
}

impl SystemEvent {
    pub fn is_heartbeat(&self) -> bool {
        self.event_type
            .as_deref()
            .is_some_and(|t| HEARTBEAT_EVENT_TYPES.contains(&t))
    }

    /// Venue from the event, falling back to the details block.
    pub fn venue(&self) -> Option<&str> {
        let details = self.details.as_ref();
        self.venue
            .as_deref()
            .or_else(|| details.and_then(|d| d.venue.as_deref()))
            .or_else(|| details.and_then(|d| d.platform.as_deref()))
            .filter(|v| !v.is_empty())
    }

    /// Platform key and health derived from a heartbeat.
    pub fn platform_health(&self, now: DateTime<Utc>) -> Option<(String, PlatformHealth)> {
        if !self.is_heartbeat() {
            return None;
        }
        let key = self.venue()?.to_lowercase();
        let details = self.details.as_ref();

        let status = details
            .and_then(|d| d.status.as_deref())
            .map(PlatformState::from_heartbeat_status)
            .unwrap_or(PlatformState::Offline);

        let message = if key == OANDA_PLATFORM {
            OANDA_HEARTBEAT_MESSAGE.to_string()
        } else {
            details
                .and_then(|d| d.message.clone().or_else(|| d.summary.clone()))
                .unwrap_or_default()
        };

        Some((
            key,
            PlatformHealth {
                status,
                last_heartbeat: Some(now),
                message: Some(message),
            },
        ))
    }
}

fn is_envelope_key(kind: &str, key: &str) -> bool {
    ENVELOPE_KEYS.contains(&key)
        || (kind == EventKind::SystemEvent.as_str() && SYSTEM_EVENT_KEYS.contains(&key))
}

fn collect_entries<T: serde::de::DeserializeOwned>(
    kind: &str,
    fields: Option<&Map<String, Value>>,
) -> BTreeMap<String, T> {
    let Some(fields) = fields else {
        return BTreeMap::new();
    };

    fields
        .iter()
        .filter(|(key, _)| !is_envelope_key(kind, key))
        .filter_map(|(key, value)| match T::deserialize(value) {
            Ok(entry) => Some((key.clone(), entry)),
            Err(e) => {
                debug!(kind, key = %key, error = %e, "Skipping non-status entry");
                None
            }
        })
        .collect()
}
