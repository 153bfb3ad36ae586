//! Position model representing one open exposure to a symbol.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One open exposure to a symbol.
///
/// A position with zero quantity must not exist in the portfolio map; the
/// ledger deletes it when a sell brings the quantity to zero.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    /// Ticker symbol
    pub symbol: String,

    /// Number of units held, always > 0 while the position exists
    pub quantity: Decimal,

    /// Cost basis per unit, including commission amortized on buys
    pub avg_cost: Decimal,

    /// Last observed market price per unit
    pub current_price: Decimal,
}

impl Position {
    /// Create a position from the first buy of a symbol.
    ///
    /// The commission is folded into the cost basis: `price + commission/quantity`.
    pub fn open(symbol: String, quantity: Decimal, price: Decimal, commission: Decimal) -> Self {
        let avg_cost = if quantity.is_zero() {
            price
        } else {
            price + commission / quantity
        };
        Self {
            symbol,
            quantity,
            avg_cost,
            current_price: price,
        }
    }

    /// Current market value at the last observed price.
    pub fn market_value(&self) -> Decimal {
        self.quantity * self.current_price
    }

    /// Unrealized P&L against the cost basis.
    pub fn unrealized_pnl(&self) -> Decimal {
        (self.current_price - self.avg_cost) * self.quantity
    }

    /// Unrealized P&L as a fraction of the cost basis.
    pub fn unrealized_pnl_pct(&self) -> Decimal {
        if self.avg_cost.is_zero() {
            return Decimal::ZERO;
        }
        (self.current_price - self.avg_cost) / self.avg_cost
    }

    /// Fold a subsequent buy into the position (weighted-average cost).
    ///
    /// `new_avg = (old_qty * old_avg + qty * price + commission) / (old_qty + qty)`.
    /// Commission is amortized into the basis only on buys; sells never
    /// restate the basis of the remaining lot.
    pub fn add(&mut self, quantity: Decimal, price: Decimal, commission: Decimal) {
        let old_cost = self.quantity * self.avg_cost;
        let new_cost = quantity * price + commission;
        let new_quantity = self.quantity + quantity;

        if !new_quantity.is_zero() {
            self.avg_cost = (old_cost + new_cost) / new_quantity;
        }
        self.quantity = new_quantity;
        self.current_price = price;
    }

    /// Reduce the position by a sell. Returns the remaining quantity.
    /// The basis of the remainder is unchanged.
    pub fn reduce(&mut self, quantity: Decimal) -> Decimal {
        self.quantity -= quantity;
        self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_open_amortizes_commission() {
        let pos = Position::open("AAPL".to_string(), dec!(100), dec!(180), dec!(5));
        assert_eq!(pos.avg_cost, dec!(180.05));
        assert_eq!(pos.market_value(), dec!(18000));
    }

    #[test]
    fn test_weighted_average_on_add() {
        let mut pos = Position::open("AAPL".to_string(), dec!(100), dec!(180), dec!(5));
        pos.add(dec!(50), dec!(185), dec!(3));

        // ((100*180 + 5) + (50*185 + 3)) / 150
        let expected = (dec!(18005) + dec!(9253)) / dec!(150);
        assert_eq!(pos.quantity, dec!(150));
        assert_eq!(pos.avg_cost, expected);
    }

    #[test]
    fn test_unrealized_pnl() {
        let mut pos = Position::open("MSFT".to_string(), dec!(10), dec!(100), Decimal::ZERO);
        pos.current_price = dec!(110);
        assert_eq!(pos.unrealized_pnl(), dec!(100));
        assert_eq!(pos.unrealized_pnl_pct(), dec!(0.1));
    }

    #[test]
    fn test_reduce_leaves_basis_unchanged() {
        let mut pos = Position::open("MSFT".to_string(), dec!(10), dec!(100), dec!(2));
        let basis = pos.avg_cost;
        let remaining = pos.reduce(dec!(4));
        assert_eq!(remaining, dec!(6));
        assert_eq!(pos.avg_cost, basis);
    }
}
