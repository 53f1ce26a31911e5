//! Trade execution updates.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeDirection {
    Long,
    Short,
}

impl TradeDirection {
    /// Returns 1 for long, -1 for short.
    pub fn sign(&self) -> i8 {
        match self {
            Self::Long => 1,
            Self::Short => -1,
        }
    }
}

impl fmt::Display for TradeDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "LONG"),
            Self::Short => write!(f, "SHORT"),
        }
    }
}

/// Trade lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeStatus {
    Open,
    Closed,
    Pending,
}

impl fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::Pending => write!(f, "PENDING"),
        }
    }
}

/// Trade update pushed on the `trade_update` channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeExecution {
    pub id: String,
    pub symbol: String,
    pub direction: TradeDirection,
    pub entry_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_price: Option<Decimal>,
    pub size: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pnl: Option<Decimal>,
    pub status: TradeStatus,
    pub opened_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub closed_at: Option<DateTime<Utc>>,
    /// Agents that contributed to the decision, in the order reported.
    #[serde(default)]
    pub agents_involved: Vec<String>,
}

impl TradeExecution {
    pub fn is_open(&self) -> bool {
        self.status == TradeStatus::Open
    }

    /// PnL as reported, or derived from entry/exit when the trade is
    /// closed and the server omitted it.
    pub fn realized_pnl(&self) -> Option<Decimal> {
        if let Some(pnl) = self.pnl {
            return Some(pnl);
        }
        let exit = self.exit_price?;
        if self.status != TradeStatus::Closed {
            return None;
        }
        let per_unit = exit - self.entry_price;
        Some(per_unit * self.size * Decimal::from(self.direction.sign()))
    }
}
