//! Trading signals consumed from the external signal source.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Direction requested by a signal. `Hold` short-circuits execution with a
/// skipped result and no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Hold => "hold",
        }
    }
}

/// One trading signal produced by the external model for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSignal {
    /// Ticker symbol
    pub symbol: String,

    /// Requested direction
    pub action: SignalAction,

    /// Model score backing the signal
    pub score: f64,

    /// Model confidence in [0, 1]
    pub confidence: f64,

    /// Explicit quantity; for sells, caps the default sell-everything sizing
    #[serde(default)]
    pub quantity: Option<Decimal>,

    /// Target portfolio weight, advisory only
    #[serde(default)]
    pub target_weight: Option<Decimal>,
}

impl TradingSignal {
    pub fn new(symbol: impl Into<String>, action: SignalAction) -> Self {
        Self {
            symbol: symbol.into(),
            action,
            score: 0.0,
            confidence: 0.0,
            quantity: None,
            target_weight: None,
        }
    }

    pub fn with_quantity(mut self, quantity: Decimal) -> Self {
        self.quantity = Some(quantity);
        self
    }
}
