//! Risk engine configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Limits enforced by the risk engine, fixed per engine instance.
///
/// Unknown keys are rejected at construction time; there is no free-form
/// config map.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields, default)]
pub struct RiskConfig {
    /// Maximum fraction of total value a single position may reach
    pub max_position_pct: Decimal,

    /// Maximum fraction of total value a single sector may reach
    pub max_sector_pct: Decimal,

    /// Maximum tolerated peak-to-trough drawdown (0.0 to 1.0)
    pub max_drawdown_pct: f64,

    /// Maximum tolerated single-period loss (0.0 to 1.0)
    pub max_daily_loss_pct: f64,

    /// Confidence level for historical VaR
    pub var_confidence: f64,
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_position_pct: dec!(0.25),  // Max 25% in one symbol
            max_sector_pct: dec!(0.40),    // Max 40% in one sector
            max_drawdown_pct: 0.15,        // Pause beyond 15% drawdown
            max_daily_loss_pct: 0.05,      // Critical on a 5% daily loss
            var_confidence: 0.95,
        }
    }
}
