//! Core event contracts for the sigfeed real-time client.
//!
//! This crate provides the shapes exchanged with the dashboard event server:
//! - `InboundEvent`, `EventKind`: tagged frames pushed by the server
//! - `MarketEvent`, `AgentSignal`, `TradeExecution`: typed views of those frames
//! - `AgentStatusUpdate`, `PlatformStatusUpdate`: name -> health maps
//! - `OutboundMessage`, `ClientId`: commands sent by the client

pub mod error;
pub mod event;
pub mod identity;
pub mod market;
pub mod outbound;
pub mod signal;
pub mod status;
pub mod trade;

pub use error::{CoreError, Result};
pub use event::{EventKind, InboundEvent, CONNECTION_FAILED};
pub use identity::ClientId;
pub use market::MarketEvent;
pub use outbound::OutboundMessage;
pub use signal::{AgentSignal, SignalAction};
pub use status::{
    AgentHealth, AgentState, AgentStatusUpdate, PlatformHealth, PlatformState,
    PlatformStatusUpdate, SystemEvent, SystemEventDetails, HEARTBEAT_EVENT_TYPES,
    OANDA_HEARTBEAT_MESSAGE, OANDA_PLATFORM,
};
pub use trade::{TradeDirection, TradeExecution, TradeStatus};
