//! Risk check results, alerts, and concentration reports.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Outcome of a pre-trade risk check for one proposed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskCheckResult {
    /// True when no violations fired; warnings alone do not block a trade
    pub passed: bool,

    /// 1.0 per violation plus 0.5 per warning
    pub risk_score: f64,

    /// Soft findings, in evaluation order
    pub warnings: Vec<String>,

    /// Hard limit breaches, in evaluation order
    pub violations: Vec<String>,

    /// Suggested fixes; `max_quantity` holds the largest conforming size
    pub suggested_adjustments: HashMap<String, Decimal>,
}

impl RiskCheckResult {
    pub fn passed() -> Self {
        Self {
            passed: true,
            risk_score: 0.0,
            warnings: Vec::new(),
            violations: Vec::new(),
            suggested_adjustments: HashMap::new(),
        }
    }

    /// The `max_quantity` adjustment, when the check produced one.
    pub fn suggested_max_quantity(&self) -> Option<Decimal> {
        self.suggested_adjustments.get("max_quantity").copied()
    }
}

/// Alert severity. `Critical` mandates an automatic session pause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Info,
    Warning,
    Critical,
}

impl AlertSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertSeverity::Info => "info",
            AlertSeverity::Warning => "warning",
            AlertSeverity::Critical => "critical",
        }
    }
}

/// A risk alert aggregating every check that fired during one evaluation.
///
/// Severity is the maximum across checks; `current_value`/`threshold_value`
/// describe the highest-severity check that fired first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskAlert {
    pub alert_id: String,
    pub timestamp: DateTime<Utc>,
    pub severity: AlertSeverity,
    pub alert_type: String,
    pub message: String,
    pub current_value: f64,
    pub threshold_value: f64,
    pub affected_positions: BTreeSet<String>,
    pub recommended_actions: Vec<String>,
}

/// Concentration risk bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// How value is spread across positions and sectors, in percent of total.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConcentrationReport {
    /// Largest single position, percent of total value
    pub max_position_pct: f64,

    /// Combined weight of the five largest positions, percent
    pub top5_concentration_pct: f64,

    /// Percent of total value per sector; empty without a sector map
    pub sector_concentration: HashMap<String, f64>,

    pub risk_level: RiskLevel,
}
