//! In-memory session registry with optional write-behind archival.

use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;
use tokio::sync::{Mutex, RwLock};
use tracing::warn;

use crate::db::Database;
use crate::error::{CoreError, Result};
use crate::models::{Portfolio, TradingSession};

/// Everything the manager tracks for one live session. Guarded by one mutex
/// so signal batches execute atomically per session.
pub struct SessionState {
    pub session: TradingSession,
    pub portfolio: Portfolio,
    /// Period returns recorded at each mark-to-market
    pub returns: Vec<f64>,
    /// Total value at the previous mark, the base for the next return
    pub last_value: Decimal,
    /// Total value after each mark, in order
    pub equity_curve: Vec<Decimal>,
}

impl SessionState {
    pub fn new(session: TradingSession, portfolio: Portfolio) -> Self {
        let last_value = portfolio.total_value();
        Self {
            session,
            portfolio,
            returns: Vec::new(),
            last_value,
            equity_curve: Vec::new(),
        }
    }
}

/// Registry of sessions keyed by id. Stopped sessions stay registered for
/// read-only queries and, when a database is attached, are archived there.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<Mutex<SessionState>>>>,
    db: Option<Database>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            db: None,
        }
    }

    pub fn with_database(db: Database) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            db: Some(db),
        }
    }

    pub fn database(&self) -> Option<&Database> {
        self.db.as_ref()
    }

    pub async fn insert(&self, state: SessionState) -> Arc<Mutex<SessionState>> {
        let id = state.session.session_id.clone();
        let state = Arc::new(Mutex::new(state));
        self.sessions.write().await.insert(id, Arc::clone(&state));
        state
    }

    pub async fn get(&self, session_id: &str) -> Result<Arc<Mutex<SessionState>>> {
        self.sessions
            .read()
            .await
            .get(session_id)
            .cloned()
            .ok_or_else(|| CoreError::SessionNotFound(session_id.to_string()))
    }

    /// Archive a stopped session. Archival failure is logged and swallowed;
    /// the stop itself has already succeeded.
    pub async fn archive(&self, state: &SessionState) {
        let Some(db) = &self.db else {
            return;
        };
        if let Err(e) = db.archive_session(&state.session, &state.portfolio, &state.equity_curve).await {
            warn!(
                session_id = %state.session.session_id,
                error = %e,
                "failed to archive session"
            );
        }
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
