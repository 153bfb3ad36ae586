//! Live session configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::risk::RiskConfig;
use crate::venue::VenueCredentials;

/// Per-session settings. Unknown keys are rejected at construction time.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct SessionConfig {
    /// Fraction of total value targeted per new buy
    pub max_position_size_pct: Decimal,

    /// Buys are rounded down to whole multiples of this
    pub lot_size: u32,

    /// Flat commission charged on every executed trade
    pub commission_per_trade: Decimal,

    /// Venue connect timeout at session start
    pub venue_timeout_secs: u64,

    pub venue: VenueCredentials,

    pub risk: RiskConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_position_size_pct: dec!(0.10),
            lot_size: 100,
            commission_per_trade: dec!(1.00),
            venue_timeout_secs: 10,
            venue: VenueCredentials::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl SessionConfig {
    /// Buy size for one signal: the per-position capital target divided by
    /// the estimated price, rounded down to a whole number of lots. Zero when
    /// even one lot does not fit.
    pub fn buy_quantity(&self, total_value: Decimal, price: Decimal) -> Decimal {
        if price <= Decimal::ZERO || self.lot_size == 0 {
            return Decimal::ZERO;
        }
        let lot = Decimal::from(self.lot_size);
        let target = total_value * self.max_position_size_pct;
        let lots = (target / price / lot).floor();
        lots * lot
    }

    /// Round a quantity down to a whole number of lots.
    pub fn round_to_lot(&self, quantity: Decimal) -> Decimal {
        if self.lot_size == 0 {
            return quantity.floor();
        }
        let lot = Decimal::from(self.lot_size);
        (quantity / lot).floor() * lot
    }

    pub fn venue_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.venue_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buy_quantity_rounds_to_lot() {
        let config = SessionConfig::default();
        // 10% of 100000 = 10000; 10000 / 42 = 238.09 -> 2 lots of 100
        assert_eq!(config.buy_quantity(dec!(100000), dec!(42)), dec!(200));
    }

    #[test]
    fn test_buy_quantity_zero_when_lot_does_not_fit() {
        let config = SessionConfig::default();
        // 10% of 5000 = 500; one lot at 42 costs 4200
        assert_eq!(config.buy_quantity(dec!(5000), dec!(42)), dec!(0));
        assert_eq!(config.buy_quantity(dec!(100000), dec!(0)), dec!(0));
    }

    #[test]
    fn test_round_to_lot() {
        let config = SessionConfig::default();
        assert_eq!(config.round_to_lot(dec!(299)), dec!(200));
        assert_eq!(config.round_to_lot(dec!(99)), dec!(0));
    }
}
