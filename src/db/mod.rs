//! SQLite archive for stopped sessions.
//!
//! Live state stays in memory; rows land here only when a session stops.
//! Stores the session header, its trade history, and the equity curve.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::info;

use crate::error::Result;
use crate::models::{Portfolio, TradingSession};

/// Database connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Archived session header.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredSession {
    pub session_id: String,
    pub model_id: String,
    pub status: String,
    pub initial_capital: f64,
    pub final_value: f64,
    pub total_return_pct: f64,
    pub num_trades: i64,
    pub open_positions: i64,
    pub config_json: String,
    pub started_at: String,
    pub stopped_at: Option<String>,
}

/// Archived trade record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredTrade {
    pub trade_id: String,
    pub session_id: String,
    pub timestamp: String,
    pub symbol: String,
    pub action: String,
    pub quantity: f64,
    pub price: f64,
    pub commission: f64,
    pub total_cost: f64,
}

/// One equity curve point.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredEquityPoint {
    pub id: i64,
    pub session_id: String,
    pub seq: i64,
    pub portfolio_value: f64,
}

impl Database {
    /// Connect and run migrations.
    pub async fn new(database_url: &str) -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        // Session headers
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS sessions (
                session_id TEXT PRIMARY KEY,
                model_id TEXT NOT NULL,
                status TEXT NOT NULL,
                initial_capital REAL NOT NULL,
                final_value REAL NOT NULL DEFAULT 0,
                total_return_pct REAL NOT NULL DEFAULT 0,
                num_trades INTEGER NOT NULL DEFAULT 0,
                open_positions INTEGER NOT NULL DEFAULT 0,
                config_json TEXT NOT NULL DEFAULT '{}',
                started_at TEXT NOT NULL,
                stopped_at TEXT
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Trade history
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS trades (
                trade_id TEXT PRIMARY KEY,
                session_id TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                symbol TEXT NOT NULL,
                action TEXT NOT NULL,
                quantity REAL NOT NULL,
                price REAL NOT NULL,
                commission REAL NOT NULL DEFAULT 0,
                total_cost REAL NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(session_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Equity curve
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS equity_curve (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                session_id TEXT NOT NULL,
                seq INTEGER NOT NULL,
                portfolio_value REAL NOT NULL,
                FOREIGN KEY (session_id) REFERENCES sessions(session_id)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        // Indexes
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_trades_session ON trades(session_id)")
            .execute(&self.pool)
            .await?;
        sqlx::query("CREATE INDEX IF NOT EXISTS idx_equity_session ON equity_curve(session_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// Archive a stopped session with its trades and equity curve.
    pub async fn archive_session(
        &self,
        session: &TradingSession,
        portfolio: &Portfolio,
        equity_curve: &[Decimal],
    ) -> Result<()> {
        let config_json = serde_json::to_string(&session.config).unwrap_or_else(|_| "{}".to_string());

        sqlx::query(
            r#"
            INSERT INTO sessions (
                session_id, model_id, status, initial_capital, final_value,
                total_return_pct, num_trades, open_positions, config_json,
                started_at, stopped_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(session_id) DO UPDATE SET
                status = excluded.status,
                final_value = excluded.final_value,
                total_return_pct = excluded.total_return_pct,
                num_trades = excluded.num_trades,
                open_positions = excluded.open_positions,
                stopped_at = excluded.stopped_at
            "#,
        )
        .bind(&session.session_id)
        .bind(&session.model_id)
        .bind(session.status.as_str())
        .bind(session.initial_capital.to_f64().unwrap_or(0.0))
        .bind(session.current_capital.to_f64().unwrap_or(0.0))
        .bind((session.total_return * Decimal::ONE_HUNDRED).to_f64().unwrap_or(0.0))
        .bind(portfolio.trades.len() as i64)
        .bind(portfolio.positions.len() as i64)
        .bind(&config_json)
        .bind(session.started_at.to_rfc3339())
        .bind(session.stopped_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        for trade in &portfolio.trades {
            sqlx::query(
                r#"
                INSERT OR IGNORE INTO trades (
                    trade_id, session_id, timestamp, symbol, action,
                    quantity, price, commission, total_cost
                )
                VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&trade.trade_id)
            .bind(&session.session_id)
            .bind(trade.timestamp.to_rfc3339())
            .bind(&trade.symbol)
            .bind(trade.action.as_str())
            .bind(trade.quantity.to_f64().unwrap_or(0.0))
            .bind(trade.price.to_f64().unwrap_or(0.0))
            .bind(trade.commission.to_f64().unwrap_or(0.0))
            .bind(trade.total_cost.to_f64().unwrap_or(0.0))
            .execute(&self.pool)
            .await?;
        }

        for (seq, value) in equity_curve.iter().enumerate() {
            sqlx::query(
                "INSERT INTO equity_curve (session_id, seq, portfolio_value) VALUES (?, ?, ?)",
            )
            .bind(&session.session_id)
            .bind(seq as i64)
            .bind(value.to_f64().unwrap_or(0.0))
            .execute(&self.pool)
            .await?;
        }

        info!(
            session_id = %session.session_id,
            trades = portfolio.trades.len(),
            "session archived"
        );
        Ok(())
    }

    /// All archived sessions, most recently stopped first.
    pub async fn list_sessions(&self) -> Result<Vec<StoredSession>> {
        let sessions = sqlx::query_as::<_, StoredSession>(
            "SELECT * FROM sessions ORDER BY stopped_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(sessions)
    }

    /// One archived session header.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<StoredSession>> {
        let session = sqlx::query_as::<_, StoredSession>(
            "SELECT * FROM sessions WHERE session_id = ?",
        )
        .bind(session_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(session)
    }

    /// Trade history of one archived session, in execution order.
    pub async fn session_trades(&self, session_id: &str) -> Result<Vec<StoredTrade>> {
        let trades = sqlx::query_as::<_, StoredTrade>(
            "SELECT * FROM trades WHERE session_id = ? ORDER BY timestamp",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(trades)
    }

    /// Equity curve of one archived session, in mark order.
    pub async fn session_equity_curve(&self, session_id: &str) -> Result<Vec<StoredEquityPoint>> {
        let points = sqlx::query_as::<_, StoredEquityPoint>(
            "SELECT * FROM equity_curve WHERE session_id = ? ORDER BY seq",
        )
        .bind(session_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(points)
    }
}
