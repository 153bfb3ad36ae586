//! Data models for portfolios, positions, trades, signals, and sessions.

mod portfolio;
mod position;
mod session;
mod signal;
mod trade;

pub use portfolio::{Portfolio, PortfolioSnapshot};
pub use position::Position;
pub use session::{SessionStatus, TradingSession};
pub use signal::{SignalAction, TradingSignal};
pub use trade::{ProposedTrade, Trade, TradeAction};
