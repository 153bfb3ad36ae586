//! Immutable trade records and proposed (not yet executed) trades.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction of an executed trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeAction {
    Buy,
    Sell,
}

impl TradeAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeAction::Buy => "BUY",
            TradeAction::Sell => "SELL",
        }
    }
}

/// An immutable record of one executed fill.
///
/// Appended to the portfolio's trade history; never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    /// Unique trade identifier
    pub trade_id: String,

    /// When the fill was applied
    pub timestamp: DateTime<Utc>,

    /// Ticker symbol
    pub symbol: String,

    /// Trade direction
    pub action: TradeAction,

    /// Units filled, always > 0
    pub quantity: Decimal,

    /// Fill price per unit, always > 0
    pub price: Decimal,

    /// Commission paid, >= 0
    pub commission: Decimal,

    /// Signed cash impact: positive outflow for a buy
    /// (`qty * price + commission`), negative for the net proceeds of a sell
    /// (`-(qty * price - commission)`).
    pub total_cost: Decimal,
}

/// A trade candidate submitted to the risk engine before any venue call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposedTrade {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: Decimal,
    pub price: Decimal,
    pub commission: Decimal,
}

impl ProposedTrade {
    pub fn buy(symbol: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            action: TradeAction::Buy,
            quantity,
            price,
            commission: Decimal::ZERO,
        }
    }

    pub fn sell(symbol: impl Into<String>, quantity: Decimal, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            action: TradeAction::Sell,
            quantity,
            price,
            commission: Decimal::ZERO,
        }
    }

    pub fn with_commission(mut self, commission: Decimal) -> Self {
        self.commission = commission;
        self
    }
}
