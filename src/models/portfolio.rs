//! Portfolio: the book of record for one trading account.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{Position, Trade};

/// The authoritative state of one account: cash, open positions, and the
/// append-only trade history.
///
/// A portfolio is owned by exactly one session and mutated only through
/// ledger operations. `initial_capital` is immutable after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Portfolio {
    /// Unique portfolio identifier
    pub portfolio_id: String,

    /// Uncommitted cash, never negative after a committed trade
    pub cash: Decimal,

    /// Open positions keyed by symbol
    pub positions: HashMap<String, Position>,

    /// Capital the portfolio was created with
    pub initial_capital: Decimal,

    /// Executed fills, append-only
    pub trades: Vec<Trade>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

impl Portfolio {
    /// Aggregate market value of all open positions.
    pub fn positions_value(&self) -> Decimal {
        self.positions.values().map(Position::market_value).sum()
    }

    /// Cash plus the market value of all open positions.
    pub fn total_value(&self) -> Decimal {
        self.cash + self.positions_value()
    }

    /// Aggregate unrealized P&L across open positions.
    pub fn total_unrealized_pnl(&self) -> Decimal {
        self.positions.values().map(Position::unrealized_pnl).sum()
    }

    /// Total return as a fraction of initial capital.
    pub fn total_return_pct(&self) -> Decimal {
        if self.initial_capital.is_zero() {
            return Decimal::ZERO;
        }
        (self.total_value() - self.initial_capital) / self.initial_capital
    }
}

/// Pure read model of a portfolio, exposed to callers without leaking
/// mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioSnapshot {
    pub cash: Decimal,
    pub positions_value: Decimal,
    pub total_value: Decimal,
    pub num_positions: usize,
    pub total_unrealized_pnl: Decimal,
    pub total_return_pct: Decimal,
    pub num_trades: usize,
}

impl std::fmt::Display for PortfolioSnapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Cash:            ${:.2}", self.cash)?;
        writeln!(f, "Positions Value: ${:.2}", self.positions_value)?;
        writeln!(f, "Total Value:     ${:.2}", self.total_value)?;
        writeln!(f, "Positions:       {}", self.num_positions)?;
        writeln!(f, "Unrealized P&L:  ${:.2}", self.total_unrealized_pnl)?;
        writeln!(
            f,
            "Total Return:    {:.2}%",
            self.total_return_pct * Decimal::ONE_HUNDRED
        )?;
        writeln!(f, "Trades:          {}", self.num_trades)?;
        Ok(())
    }
}
