//! Typed error taxonomy for the trading core.
//!
//! Domain errors describe a violated invariant and guarantee the ledger was
//! left untouched. External errors (venue, storage) are recoverable: callers
//! convert them into failed/skipped trade results instead of aborting.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::models::SessionStatus;

/// Errors surfaced by ledger, risk, and session operations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Bad argument shape: non-positive quantity/price, malformed input.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A buy was attempted beyond available cash.
    #[error("insufficient cash: required {required}, available {available}")]
    InsufficientCash {
        required: Decimal,
        available: Decimal,
    },

    /// A sell was attempted beyond the held quantity.
    #[error("insufficient shares in {symbol}: requested {requested}, held {held}")]
    InsufficientShares {
        symbol: String,
        requested: Decimal,
        held: Decimal,
    },

    /// A sell referenced a symbol with no open position.
    #[error("no open position in {0}")]
    PositionNotFound(String),

    /// The session id is unknown to the store.
    #[error("session {0} not found")]
    SessionNotFound(String),

    /// A trade was submitted to a session that is not active.
    #[error("session {0} is not active")]
    SessionNotActive(String),

    /// An illegal lifecycle transition; the session state is unchanged.
    #[error("cannot {action} a {from} session")]
    InvalidTransition {
        from: SessionStatus,
        action: &'static str,
    },

    /// A signal failed validation before any side effect.
    #[error("invalid signal: {0}")]
    InvalidSignal(String),

    /// The execution venue failed or timed out. The trade is presumed not
    /// filled and the ledger is not mutated.
    #[error("execution venue unavailable: {0}")]
    VenueUnavailable(String),

    /// Session archive storage failure.
    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),
}

pub type Result<T> = std::result::Result<T, CoreError>;
