//! Per-signal execution outcomes and end-of-session summaries.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::models::Trade;

/// What happened to one signal during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeOutcome {
    /// Filled at the venue and applied to the ledger
    Executed,
    /// Nothing to do (hold signal, or a size that rounded to zero)
    Skipped,
    /// Blocked by the risk gate
    Rejected,
    /// Venue or lookup failure; the ledger is untouched
    Failed,
}

/// Result of executing one signal in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeResult {
    pub symbol: String,
    pub outcome: TradeOutcome,
    pub trade: Option<Trade>,
    /// Risk violations or error text explaining a non-executed outcome
    pub reasons: Vec<String>,
}

impl TradeResult {
    pub fn executed(trade: Trade) -> Self {
        Self {
            symbol: trade.symbol.clone(),
            outcome: TradeOutcome::Executed,
            trade: Some(trade),
            reasons: Vec::new(),
        }
    }

    pub fn skipped(symbol: &str, reason: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            outcome: TradeOutcome::Skipped,
            trade: None,
            reasons: vec![reason.to_string()],
        }
    }

    pub fn rejected(symbol: &str, reasons: Vec<String>) -> Self {
        Self {
            symbol: symbol.to_string(),
            outcome: TradeOutcome::Rejected,
            trade: None,
            reasons,
        }
    }

    pub fn failed(symbol: &str, reason: String) -> Self {
        Self {
            symbol: symbol.to_string(),
            outcome: TradeOutcome::Failed,
            trade: None,
            reasons: vec![reason],
        }
    }
}

/// Final accounting for a stopped session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub model_id: String,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
    pub initial_capital: Decimal,
    pub final_value: Decimal,
    pub total_return_pct: Decimal,
    pub num_trades: usize,
    pub open_positions: usize,
}

impl fmt::Display for SessionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Session {} ({})", self.session_id, self.model_id)?;
        writeln!(f, "  started:        {}", self.started_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "  stopped:        {}", self.stopped_at.format("%Y-%m-%d %H:%M:%S"))?;
        writeln!(f, "  initial:        ${:.2}", self.initial_capital)?;
        writeln!(f, "  final value:    ${:.2}", self.final_value)?;
        writeln!(f, "  return:         {:.2}%", self.total_return_pct)?;
        writeln!(f, "  trades:         {}", self.num_trades)?;
        write!(f, "  open positions: {}", self.open_positions)
    }
}
