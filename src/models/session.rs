//! Trading session lifecycle state.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::session::SessionConfig;

/// Lifecycle state of a trading session. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Paused,
    Stopped,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::Active => "active",
            SessionStatus::Paused => "paused",
            SessionStatus::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle wrapper around one portfolio.
///
/// `current_capital` mirrors the portfolio's total value and is refreshed on
/// every valuation; `config` is immutable for the life of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingSession {
    /// Unique session identifier
    pub session_id: String,

    /// Identifier of the model supplying signals
    pub model_id: String,

    /// Lifecycle state
    pub status: SessionStatus,

    /// Capital the session started with
    pub initial_capital: Decimal,

    /// Last observed portfolio total value
    pub current_capital: Decimal,

    /// Return since start, as a fraction of initial capital
    pub total_return: Decimal,

    /// Risk and sizing parameters, fixed per session
    pub config: SessionConfig,

    /// When the session started
    pub started_at: DateTime<Utc>,

    /// When the session stopped, once terminal
    pub stopped_at: Option<DateTime<Utc>>,
}

impl TradingSession {
    /// Refresh the capital mirror from a new portfolio valuation.
    pub fn record_valuation(&mut self, total_value: Decimal) {
        self.current_capital = total_value;
        self.total_return = if self.initial_capital.is_zero() {
            Decimal::ZERO
        } else {
            (total_value - self.initial_capital) / self.initial_capital
        };
    }
}
