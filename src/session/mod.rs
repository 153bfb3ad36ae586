//! Live trading sessions: lifecycle, execution, and the session registry.

mod config;
mod manager;
mod result;
mod store;

pub use config::SessionConfig;
pub use manager::SessionManager;
pub use result::{SessionSummary, TradeOutcome, TradeResult};
pub use store::{SessionState, SessionStore};
