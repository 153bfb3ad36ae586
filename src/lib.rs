//! Portfolio and risk trading core.
//!
//! Cash-and-positions bookkeeping with strict conservation, pre-trade risk
//! gating, live session management over a pluggable execution venue, and a
//! deterministic day-by-day simulator that shares the live sizing and risk
//! code paths.

pub mod db;
pub mod error;
pub mod ledger;
pub mod market;
pub mod models;
pub mod risk;
pub mod session;
pub mod sim;
pub mod venue;

pub use error::{CoreError, Result};
pub use ledger::Ledger;
pub use risk::{RiskConfig, RiskEngine};
pub use session::{SessionConfig, SessionManager, SessionStore};
pub use sim::{SimulationConfig, SimulationReport, SimulationStepper};
