//! Ledger: the only writer of portfolio state.
//!
//! Applies buys and sells with weighted-average cost accounting, recomputes
//! valuations, and provides a pure `preview` used by the risk engine to
//! simulate a trade without touching the real portfolio. Every failure path
//! leaves the portfolio unchanged.

use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::models::{Portfolio, PortfolioSnapshot, Position, ProposedTrade, Trade, TradeAction};

/// Ledger operations over a portfolio.
pub struct Ledger;

impl Ledger {
    /// Create a fresh portfolio holding only cash.
    pub fn create_portfolio(initial_capital: Decimal, id: Option<String>) -> Result<Portfolio> {
        if initial_capital <= Decimal::ZERO {
            return Err(CoreError::InvalidArgument(format!(
                "initial capital must be positive, got {initial_capital}"
            )));
        }

        Ok(Portfolio {
            portfolio_id: id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            cash: initial_capital,
            positions: HashMap::new(),
            initial_capital,
            trades: Vec::new(),
            created_at: Utc::now(),
        })
    }

    /// Apply a buy fill: deduct `qty * price + commission` from cash,
    /// re-average the position basis, and append the trade record.
    pub fn apply_buy(
        portfolio: &mut Portfolio,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
    ) -> Result<Trade> {
        validate_trade_args(quantity, price, commission)?;

        let cost = quantity * price + commission;
        if portfolio.cash < cost {
            return Err(CoreError::InsufficientCash {
                required: cost,
                available: portfolio.cash,
            });
        }

        match portfolio.positions.get_mut(symbol) {
            Some(position) => position.add(quantity, price, commission),
            None => {
                portfolio.positions.insert(
                    symbol.to_string(),
                    Position::open(symbol.to_string(), quantity, price, commission),
                );
            }
        }

        portfolio.cash -= cost;

        let trade = Trade {
            trade_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            action: TradeAction::Buy,
            quantity,
            price,
            commission,
            total_cost: cost,
        };
        portfolio.trades.push(trade.clone());

        debug!(symbol, %quantity, %price, %cost, "buy applied");
        Ok(trade)
    }

    /// Apply a sell fill: credit `qty * price - commission` to cash, reduce
    /// the position, and delete it when the quantity reaches zero.
    ///
    /// The average cost of any remaining quantity is unchanged; realized P&L
    /// is not tracked and must be derived from the trade history.
    pub fn apply_sell(
        portfolio: &mut Portfolio,
        symbol: &str,
        quantity: Decimal,
        price: Decimal,
        commission: Decimal,
    ) -> Result<Trade> {
        validate_trade_args(quantity, price, commission)?;

        let held = portfolio
            .positions
            .get(symbol)
            .ok_or_else(|| CoreError::PositionNotFound(symbol.to_string()))?;

        if quantity > held.quantity {
            return Err(CoreError::InsufficientShares {
                symbol: symbol.to_string(),
                requested: quantity,
                held: held.quantity,
            });
        }

        let proceeds = quantity * price - commission;
        portfolio.cash += proceeds;

        let position = portfolio
            .positions
            .get_mut(symbol)
            .ok_or_else(|| CoreError::PositionNotFound(symbol.to_string()))?;
        position.current_price = price;
        if position.reduce(quantity).is_zero() {
            portfolio.positions.remove(symbol);
        }

        let trade = Trade {
            trade_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            symbol: symbol.to_string(),
            action: TradeAction::Sell,
            quantity,
            price,
            commission,
            total_cost: -proceeds,
        };
        portfolio.trades.push(trade.clone());

        debug!(symbol, %quantity, %price, %proceeds, "sell applied");
        Ok(trade)
    }

    /// Update the last observed price on every matching open position.
    /// Symbols without an open position are silently ignored.
    pub fn reprice(portfolio: &mut Portfolio, prices: &HashMap<String, Decimal>) {
        for (symbol, price) in prices {
            if let Some(position) = portfolio.positions.get_mut(symbol) {
                position.current_price = *price;
            }
        }
    }

    /// Pure read of the portfolio's current valuation.
    pub fn snapshot(portfolio: &Portfolio) -> PortfolioSnapshot {
        PortfolioSnapshot {
            cash: portfolio.cash,
            positions_value: portfolio.positions_value(),
            total_value: portfolio.total_value(),
            num_positions: portfolio.positions.len(),
            total_unrealized_pnl: portfolio.total_unrealized_pnl(),
            total_return_pct: portfolio.total_return_pct(),
            num_trades: portfolio.trades.len(),
        }
    }

    /// Apply a proposed trade to an immutable snapshot, returning the
    /// resulting portfolio as a new value.
    ///
    /// This is the simulation primitive behind pre-trade risk checks: the
    /// input portfolio is never mutated, so "simulate, don't mutate" is
    /// structural rather than conventional.
    pub fn preview(portfolio: &Portfolio, proposed: &ProposedTrade) -> Result<Portfolio> {
        let mut next = portfolio.clone();
        match proposed.action {
            TradeAction::Buy => {
                Self::apply_buy(
                    &mut next,
                    &proposed.symbol,
                    proposed.quantity,
                    proposed.price,
                    proposed.commission,
                )?;
            }
            TradeAction::Sell => {
                Self::apply_sell(
                    &mut next,
                    &proposed.symbol,
                    proposed.quantity,
                    proposed.price,
                    proposed.commission,
                )?;
            }
        }
        Ok(next)
    }
}

fn validate_trade_args(quantity: Decimal, price: Decimal, commission: Decimal) -> Result<()> {
    if quantity <= Decimal::ZERO {
        return Err(CoreError::InvalidArgument(format!(
            "quantity must be positive, got {quantity}"
        )));
    }
    if price <= Decimal::ZERO {
        return Err(CoreError::InvalidArgument(format!(
            "price must be positive, got {price}"
        )));
    }
    if commission < Decimal::ZERO {
        return Err(CoreError::InvalidArgument(format!(
            "commission must not be negative, got {commission}"
        )));
    }
    Ok(())
}
