//! Risk engine: pre-trade gating and portfolio risk metrics.
//!
//! Pre-trade checks run against a previewed copy of the portfolio produced
//! by `Ledger::preview`; the real book of record is never touched here.

use std::collections::{BTreeSet, HashMap};

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing::debug;
use uuid::Uuid;

use crate::ledger::Ledger;
use crate::market::SectorMap;
use crate::models::{Portfolio, ProposedTrade};

use super::{AlertSeverity, ConcentrationReport, RiskAlert, RiskCheckResult, RiskConfig, RiskLevel};

/// Evaluates proposed trades against limits and computes VaR, drawdown, and
/// concentration metrics. Configuration is fixed per instance.
pub struct RiskEngine {
    config: RiskConfig,
}

impl RiskEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Evaluate a proposed trade against position-size and sector limits.
    ///
    /// The trade is applied to an immutable preview of the portfolio; a
    /// preview failure (insufficient cash, unknown position) is itself a
    /// violation. When the position-size limit is breached, the result
    /// carries a `max_quantity` suggestion of the largest conforming size.
    pub fn check_trade(
        &self,
        portfolio: &Portfolio,
        proposed: &ProposedTrade,
        sectors: Option<&dyn SectorMap>,
    ) -> RiskCheckResult {
        let mut result = RiskCheckResult::passed();

        let previewed = match Ledger::preview(portfolio, proposed) {
            Ok(previewed) => previewed,
            Err(e) => {
                result.passed = false;
                result.risk_score = 1.0;
                result.violations.push(e.to_string());
                return result;
            }
        };

        let total_value = previewed.total_value();
        if total_value > Decimal::ZERO {
            if let Some(position) = previewed.positions.get(&proposed.symbol) {
                let position_pct = position.market_value() / total_value;
                if position_pct > self.config.max_position_pct {
                    result.violations.push(format!(
                        "position {} would be {:.1}% of portfolio, limit is {:.1}%",
                        proposed.symbol,
                        position_pct * Decimal::ONE_HUNDRED,
                        self.config.max_position_pct * Decimal::ONE_HUNDRED,
                    ));
                    let max_quantity =
                        total_value * self.config.max_position_pct / proposed.price;
                    result
                        .suggested_adjustments
                        .insert("max_quantity".to_string(), max_quantity);
                } else if position_pct > self.config.max_position_pct * dec!(0.8) {
                    result.warnings.push(format!(
                        "position {} at {:.1}% of portfolio approaches the {:.1}% limit",
                        proposed.symbol,
                        position_pct * Decimal::ONE_HUNDRED,
                        self.config.max_position_pct * Decimal::ONE_HUNDRED,
                    ));
                }
            }

            if let Some(sectors) = sectors {
                let mut by_sector: HashMap<&str, Decimal> = HashMap::new();
                for position in previewed.positions.values() {
                    if let Some(sector) = sectors.sector(&position.symbol) {
                        *by_sector.entry(sector).or_default() += position.market_value();
                    }
                }
                let mut breached: Vec<&str> = by_sector
                    .iter()
                    .filter(|(_, value)| **value / total_value > self.config.max_sector_pct)
                    .map(|(sector, _)| *sector)
                    .collect();
                breached.sort_unstable();
                for sector in breached {
                    result.violations.push(format!(
                        "sector {} would exceed the {:.1}% sector limit",
                        sector,
                        self.config.max_sector_pct * Decimal::ONE_HUNDRED,
                    ));
                }
            }
        }

        result.risk_score =
            result.violations.len() as f64 + 0.5 * result.warnings.len() as f64;
        result.passed = result.violations.is_empty();

        debug!(
            symbol = %proposed.symbol,
            passed = result.passed,
            risk_score = result.risk_score,
            "risk check"
        );
        result
    }

    /// Historical-simulation Value at Risk.
    ///
    /// Takes the `(1 - confidence) * 100`-th percentile of the return
    /// distribution (linear interpolation between order statistics) and
    /// scales its magnitude by the portfolio value. Returns zero below two
    /// observations.
    pub fn value_at_risk(
        &self,
        returns: &[f64],
        portfolio_value: Decimal,
        confidence: Option<f64>,
    ) -> Decimal {
        if returns.len() < 2 {
            return Decimal::ZERO;
        }
        let confidence = confidence.unwrap_or(self.config.var_confidence);

        let mut sorted = returns.to_vec();
        sorted.sort_by(|a, b| a.total_cmp(b));

        let pct_return = percentile(&sorted, (1.0 - confidence) * 100.0);
        Decimal::try_from(pct_return.abs()).unwrap_or(Decimal::ZERO) * portfolio_value
    }

    /// Maximum peak-to-trough drawdown of the cumulative return path,
    /// as a fraction in [0, 1]. Returns zero below two observations.
    pub fn max_drawdown(&self, returns: &[f64]) -> f64 {
        if returns.len() < 2 {
            return 0.0;
        }

        // The peak is the expanding max of the cumulative path itself, so a
        // series that opens with losses has no drawdown at its first point.
        let mut cumulative = 1.0f64;
        let mut running_max = f64::NEG_INFINITY;
        let mut worst = 0.0f64;

        for r in returns {
            cumulative *= 1.0 + r;
            if cumulative > running_max {
                running_max = cumulative;
            }
            let drawdown = (cumulative - running_max) / running_max;
            if drawdown < worst {
                worst = drawdown;
            }
        }

        worst.abs()
    }

    /// How concentrated the portfolio is across positions and sectors.
    pub fn concentration(
        &self,
        portfolio: &Portfolio,
        sectors: Option<&dyn SectorMap>,
    ) -> ConcentrationReport {
        let total_value = portfolio.total_value();
        if portfolio.positions.is_empty() || total_value <= Decimal::ZERO {
            return ConcentrationReport {
                max_position_pct: 0.0,
                top5_concentration_pct: 0.0,
                sector_concentration: HashMap::new(),
                risk_level: RiskLevel::Low,
            };
        }

        let mut weights: Vec<f64> = portfolio
            .positions
            .values()
            .map(|p| {
                (p.market_value() / total_value)
                    .to_f64()
                    .unwrap_or(0.0)
                    * 100.0
            })
            .collect();
        weights.sort_by(|a, b| b.total_cmp(a));

        let max_position_pct = weights.first().copied().unwrap_or(0.0);
        let top5_concentration_pct: f64 = weights.iter().take(5).sum();

        let mut sector_concentration: HashMap<String, f64> = HashMap::new();
        if let Some(sectors) = sectors {
            for position in portfolio.positions.values() {
                if let Some(sector) = sectors.sector(&position.symbol) {
                    let weight = (position.market_value() / total_value)
                        .to_f64()
                        .unwrap_or(0.0)
                        * 100.0;
                    *sector_concentration.entry(sector.to_string()).or_default() += weight;
                }
            }
        }

        let position_limit = self.config.max_position_pct.to_f64().unwrap_or(1.0) * 100.0;
        let sector_limit = self.config.max_sector_pct.to_f64().unwrap_or(1.0) * 100.0;

        let sector_breach = sector_concentration.values().any(|w| *w > sector_limit);
        let risk_level = if max_position_pct > position_limit || sector_breach {
            RiskLevel::High
        } else if max_position_pct > 0.8 * position_limit || top5_concentration_pct > 70.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        };

        ConcentrationReport {
            max_position_pct,
            top5_concentration_pct,
            sector_concentration,
            risk_level,
        }
    }

    /// Evaluate drawdown, latest-period loss, concentration, and per-position
    /// losses; return one aggregated alert, or `None` when nothing fired.
    ///
    /// Severity is the maximum across checks. A `Critical` alert obliges the
    /// session manager to pause the session.
    pub fn generate_alert(
        &self,
        portfolio: &Portfolio,
        returns: &[f64],
        sectors: Option<&dyn SectorMap>,
    ) -> Option<RiskAlert> {
        let mut findings = AlertFindings::default();

        let drawdown = self.max_drawdown(returns);
        if drawdown > self.config.max_drawdown_pct {
            findings.record(
                AlertSeverity::Critical,
                "drawdown",
                format!(
                    "drawdown {:.1}% exceeds the {:.1}% limit",
                    drawdown * 100.0,
                    self.config.max_drawdown_pct * 100.0
                ),
                drawdown,
                self.config.max_drawdown_pct,
            );
            findings.recommend("reduce position sizes");
        } else if drawdown > 0.8 * self.config.max_drawdown_pct {
            findings.record(
                AlertSeverity::Warning,
                "drawdown",
                format!(
                    "drawdown {:.1}% approaches the {:.1}% limit",
                    drawdown * 100.0,
                    self.config.max_drawdown_pct * 100.0
                ),
                drawdown,
                self.config.max_drawdown_pct,
            );
            findings.recommend("reduce position sizes");
        }

        if let Some(last) = returns.last() {
            if *last < -self.config.max_daily_loss_pct {
                findings.record(
                    AlertSeverity::Critical,
                    "daily_loss",
                    format!(
                        "latest period lost {:.1}%, beyond the {:.1}% daily limit",
                        last.abs() * 100.0,
                        self.config.max_daily_loss_pct * 100.0
                    ),
                    last.abs(),
                    self.config.max_daily_loss_pct,
                );
                findings.recommend("review open positions");
            }
        }

        let concentration = self.concentration(portfolio, sectors);
        if concentration.risk_level == RiskLevel::High {
            findings.record(
                AlertSeverity::Warning,
                "concentration",
                format!(
                    "portfolio concentration is high: largest position {:.1}%",
                    concentration.max_position_pct
                ),
                concentration.max_position_pct,
                self.config.max_position_pct.to_f64().unwrap_or(1.0) * 100.0,
            );
            findings.recommend("diversify");

            let total_value = portfolio.total_value();
            if total_value > Decimal::ZERO {
                for position in portfolio.positions.values() {
                    if position.market_value() / total_value > self.config.max_position_pct {
                        findings.affect(&position.symbol);
                    }
                }
            }
        }

        for position in portfolio.positions.values() {
            let pnl_pct = position.unrealized_pnl_pct().to_f64().unwrap_or(0.0);
            if pnl_pct < -0.20 {
                findings.record(
                    AlertSeverity::Critical,
                    "position_loss",
                    format!("{} down {:.1}% from cost", position.symbol, pnl_pct.abs() * 100.0),
                    pnl_pct.abs(),
                    0.20,
                );
                findings.affect(&position.symbol);
                findings.recommend("consider stop-loss");
            } else if pnl_pct < -0.10 {
                findings.record(
                    AlertSeverity::Warning,
                    "position_loss",
                    format!("{} down {:.1}% from cost", position.symbol, pnl_pct.abs() * 100.0),
                    pnl_pct.abs(),
                    0.10,
                );
                findings.affect(&position.symbol);
                findings.recommend("consider stop-loss");
            }
        }

        findings.into_alert()
    }
}

/// Linear-interpolation percentile over a sorted sample, matching the
/// numpy default: `rank = pct/100 * (n-1)`, interpolate between neighbors.
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    let n = sorted.len();
    if n == 1 {
        return sorted[0];
    }
    let rank = (pct / 100.0).clamp(0.0, 1.0) * (n - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    if lo == hi {
        sorted[lo]
    } else {
        sorted[lo] + (rank - lo as f64) * (sorted[hi] - sorted[lo])
    }
}

/// Accumulates findings across the ordered alert checks.
#[derive(Default)]
struct AlertFindings {
    severity: Option<AlertSeverity>,
    alert_type: &'static str,
    messages: Vec<String>,
    current_value: f64,
    threshold_value: f64,
    affected: BTreeSet<String>,
    actions: Vec<String>,
}

impl AlertFindings {
    fn record(
        &mut self,
        severity: AlertSeverity,
        alert_type: &'static str,
        message: String,
        current: f64,
        threshold: f64,
    ) {
        // The first check to reach the running maximum severity names the alert.
        if self.severity.map_or(true, |s| severity > s) {
            self.severity = Some(severity);
            self.alert_type = alert_type;
            self.current_value = current;
            self.threshold_value = threshold;
        }
        self.messages.push(message);
    }

    fn recommend(&mut self, action: &str) {
        if !self.actions.iter().any(|a| a == action) {
            self.actions.push(action.to_string());
        }
    }

    fn affect(&mut self, symbol: &str) {
        self.affected.insert(symbol.to_string());
    }

    fn into_alert(self) -> Option<RiskAlert> {
        let severity = self.severity?;
        Some(RiskAlert {
            alert_id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            severity,
            alert_type: self.alert_type.to_string(),
            message: self.messages.join("; "),
            current_value: self.current_value,
            threshold_value: self.threshold_value,
            affected_positions: self.affected,
            recommended_actions: self.actions,
        })
    }
}
