//! Pre-trade risk gating, alerting, and portfolio risk metrics.

mod alert;
mod config;
mod engine;

pub use alert::{AlertSeverity, ConcentrationReport, RiskAlert, RiskCheckResult, RiskLevel};
pub use config::RiskConfig;
pub use engine::RiskEngine;
