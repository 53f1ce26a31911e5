//! Market tick / news events.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Market event pushed on the `market_event` channel.
///
/// `kind` carries the producer's own category (e.g. `TICK`, `NEWS`,
/// `SYSTEM`); the frame itself is routed by the envelope tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news: Option<String>,
    pub source: String,
}

impl MarketEvent {
    /// Check if this event carries a headline.
    pub fn has_news(&self) -> bool {
        self.news.as_deref().is_some_and(|n| !n.is_empty())
    }
}
