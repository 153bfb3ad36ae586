//! Session lifecycle and signal execution.
//!
//! The manager owns no market state of its own: prices come from the
//! `MarketData` collaborator, fills from the `ExecutionVenue`, and the
//! ledger is the book of record. Venue state never overrides the ledger.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::ledger::Ledger;
use crate::market::{MarketData, SectorMap};
use crate::models::{
    PortfolioSnapshot, ProposedTrade, SessionStatus, SignalAction, TradingSession, TradingSignal,
};
use crate::risk::{AlertSeverity, RiskAlert, RiskEngine};
use crate::venue::{ExecutionVenue, OrderRequest, OrderStatus};

use super::{SessionConfig, SessionState, SessionStore, SessionSummary, TradeResult};

/// Runs live trading sessions: starts and stops them, executes signal
/// batches through the venue, and applies fills to each session's ledger.
pub struct SessionManager {
    store: Arc<SessionStore>,
    venue: Arc<dyn ExecutionVenue>,
    market: Arc<dyn MarketData>,
    sectors: Option<Arc<dyn SectorMap>>,
}

impl SessionManager {
    pub fn new(
        store: Arc<SessionStore>,
        venue: Arc<dyn ExecutionVenue>,
        market: Arc<dyn MarketData>,
    ) -> Self {
        Self {
            store,
            venue,
            market,
            sectors: None,
        }
    }

    pub fn with_sectors(mut self, sectors: Arc<dyn SectorMap>) -> Self {
        self.sectors = Some(sectors);
        self
    }

    /// Start a session: fund a fresh portfolio and connect the venue.
    ///
    /// A venue that fails to connect within the configured timeout aborts the
    /// start; no session is registered.
    pub async fn start_session(
        &self,
        model_id: &str,
        initial_capital: Decimal,
        config: SessionConfig,
    ) -> Result<TradingSession> {
        let portfolio = Ledger::create_portfolio(initial_capital, None)?;

        let connect = self.venue.connect(&config.venue);
        match tokio::time::timeout(config.venue_timeout(), connect).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(CoreError::VenueUnavailable(format!(
                    "venue connect timed out after {}s",
                    config.venue_timeout_secs
                )))
            }
        }

        let session = TradingSession {
            session_id: Uuid::new_v4().to_string(),
            model_id: model_id.to_string(),
            status: SessionStatus::Active,
            initial_capital,
            current_capital: initial_capital,
            total_return: Decimal::ZERO,
            config,
            started_at: Utc::now(),
            stopped_at: None,
        };
        info!(
            session_id = %session.session_id,
            model_id,
            %initial_capital,
            "session started"
        );

        self.store
            .insert(SessionState::new(session.clone(), portfolio))
            .await;
        Ok(session)
    }

    /// Execute one signal against an active session.
    pub async fn execute_trade(
        &self,
        session_id: &str,
        signal: &TradingSignal,
    ) -> Result<TradeResult> {
        let state = self.store.get(session_id).await?;
        let mut state = state.lock().await;
        self.ensure_active(&state.session)?;
        self.execute_signal(&mut state, signal).await
    }

    /// Execute a batch of signals in order, under one session lock.
    ///
    /// A failing signal never aborts the batch: its error becomes a failed
    /// result and execution continues. Always returns one result per signal.
    pub async fn execute_batch(
        &self,
        session_id: &str,
        signals: &[TradingSignal],
    ) -> Result<Vec<TradeResult>> {
        let state = self.store.get(session_id).await?;
        let mut state = state.lock().await;
        self.ensure_active(&state.session)?;

        let mut results = Vec::with_capacity(signals.len());
        for signal in signals {
            let result = match self.execute_signal(&mut state, signal).await {
                Ok(result) => result,
                Err(e) => TradeResult::failed(&signal.symbol, e.to_string()),
            };
            results.push(result);
        }
        Ok(results)
    }

    /// Pause an active session. Trades are refused until resumed.
    pub async fn pause_session(&self, session_id: &str) -> Result<()> {
        let state = self.store.get(session_id).await?;
        let mut state = state.lock().await;
        match state.session.status {
            SessionStatus::Active => {
                state.session.status = SessionStatus::Paused;
                info!(session_id, "session paused");
                Ok(())
            }
            from => Err(CoreError::InvalidTransition {
                from,
                action: "pause",
            }),
        }
    }

    /// Resume a paused session.
    pub async fn resume_session(&self, session_id: &str) -> Result<()> {
        let state = self.store.get(session_id).await?;
        let mut state = state.lock().await;
        match state.session.status {
            SessionStatus::Paused => {
                state.session.status = SessionStatus::Active;
                info!(session_id, "session resumed");
                Ok(())
            }
            from => Err(CoreError::InvalidTransition {
                from,
                action: "resume",
            }),
        }
    }

    /// Stop a session permanently, archive it, and return the final
    /// accounting. Works from either the active or the paused state; the
    /// stopped session stays queryable but accepts no further transitions
    /// or trades.
    pub async fn stop_session(&self, session_id: &str) -> Result<SessionSummary> {
        let state = self.store.get(session_id).await?;
        let mut state = state.lock().await;
        if state.session.status == SessionStatus::Stopped {
            return Err(CoreError::InvalidTransition {
                from: SessionStatus::Stopped,
                action: "stop",
            });
        }

        let stopped_at = Utc::now();
        state.session.status = SessionStatus::Stopped;
        state.session.stopped_at = Some(stopped_at);
        let final_value = state.portfolio.total_value();
        state.session.record_valuation(final_value);

        let summary = SessionSummary {
            session_id: state.session.session_id.clone(),
            model_id: state.session.model_id.clone(),
            started_at: state.session.started_at,
            stopped_at,
            initial_capital: state.session.initial_capital,
            final_value,
            total_return_pct: state.session.total_return * Decimal::ONE_HUNDRED,
            num_trades: state.portfolio.trades.len(),
            open_positions: state.portfolio.positions.len(),
        };
        info!(session_id, final_value = %final_value, "session stopped");

        self.store.archive(&state).await;
        Ok(summary)
    }

    /// Refresh position marks, record the period return, and return the
    /// resulting snapshot. Symbols missing from `prices` keep their last mark.
    pub async fn mark_to_market(
        &self,
        session_id: &str,
        prices: &HashMap<String, Decimal>,
    ) -> Result<PortfolioSnapshot> {
        let state = self.store.get(session_id).await?;
        let mut state = state.lock().await;
        if state.session.status == SessionStatus::Stopped {
            return Err(CoreError::SessionNotActive(session_id.to_string()));
        }

        Ledger::reprice(&mut state.portfolio, prices);
        let total = state.portfolio.total_value();
        if state.last_value > Decimal::ZERO {
            let period_return = ((total - state.last_value) / state.last_value)
                .to_f64()
                .unwrap_or(0.0);
            state.returns.push(period_return);
        }
        state.last_value = total;
        state.equity_curve.push(total);
        state.session.record_valuation(total);

        Ok(Ledger::snapshot(&state.portfolio))
    }

    /// Evaluate risk alerts for a session. A critical alert on an active
    /// session pauses it before returning.
    pub async fn check_risk_alerts(&self, session_id: &str) -> Result<Option<RiskAlert>> {
        let state = self.store.get(session_id).await?;
        let mut state = state.lock().await;

        let engine = RiskEngine::new(state.session.config.risk.clone());
        let alert = engine.generate_alert(
            &state.portfolio,
            &state.returns,
            self.sectors.as_deref(),
        );

        if let Some(alert) = &alert {
            warn!(
                session_id,
                severity = alert.severity.as_str(),
                alert_type = %alert.alert_type,
                "risk alert: {}",
                alert.message
            );
            if alert.severity == AlertSeverity::Critical
                && state.session.status == SessionStatus::Active
            {
                state.session.status = SessionStatus::Paused;
                warn!(session_id, "session auto-paused on critical alert");
            }
        }
        Ok(alert)
    }

    /// Current lifecycle view of a session.
    pub async fn get_session(&self, session_id: &str) -> Result<TradingSession> {
        let state = self.store.get(session_id).await?;
        let state = state.lock().await;
        Ok(state.session.clone())
    }

    /// Current portfolio snapshot of a session.
    pub async fn get_snapshot(&self, session_id: &str) -> Result<PortfolioSnapshot> {
        let state = self.store.get(session_id).await?;
        let state = state.lock().await;
        Ok(Ledger::snapshot(&state.portfolio))
    }

    /// Open positions of a session, cloned out of the book of record.
    pub async fn get_positions(&self, session_id: &str) -> Result<Vec<crate::models::Position>> {
        let state = self.store.get(session_id).await?;
        let state = state.lock().await;
        Ok(state.portfolio.positions.values().cloned().collect())
    }

    /// Trade history of a session, in execution order.
    pub async fn get_trade_history(&self, session_id: &str) -> Result<Vec<crate::models::Trade>> {
        let state = self.store.get(session_id).await?;
        let state = state.lock().await;
        Ok(state.portfolio.trades.clone())
    }

    fn ensure_active(&self, session: &TradingSession) -> Result<()> {
        if session.status != SessionStatus::Active {
            return Err(CoreError::SessionNotActive(session.session_id.clone()));
        }
        Ok(())
    }

    /// Size, risk-check, route, and book one signal. Caller holds the
    /// session lock and has verified the session is active.
    async fn execute_signal(
        &self,
        state: &mut SessionState,
        signal: &TradingSignal,
    ) -> Result<TradeResult> {
        let symbol = signal.symbol.as_str();
        if symbol.trim().is_empty() {
            return Err(CoreError::InvalidSignal("empty symbol".to_string()));
        }
        if let Some(q) = signal.quantity {
            if q <= Decimal::ZERO {
                return Err(CoreError::InvalidSignal(format!(
                    "non-positive quantity {q} for {symbol}"
                )));
            }
        }
        let config = state.session.config.clone();

        let action = match signal.action {
            SignalAction::Hold => {
                return Ok(TradeResult::skipped(symbol, "hold signal"));
            }
            SignalAction::Buy => crate::models::TradeAction::Buy,
            SignalAction::Sell => crate::models::TradeAction::Sell,
        };

        let Some(price) = self.market.get_price(symbol, Utc::now().date_naive()) else {
            return Ok(TradeResult::failed(
                symbol,
                format!("no price available for {symbol}"),
            ));
        };

        let quantity = match action {
            crate::models::TradeAction::Buy => match signal.quantity {
                Some(q) => config.round_to_lot(q),
                None => config.buy_quantity(state.portfolio.total_value(), price),
            },
            crate::models::TradeAction::Sell => {
                let held = state
                    .portfolio
                    .positions
                    .get(symbol)
                    .map(|p| p.quantity)
                    .ok_or_else(|| CoreError::PositionNotFound(symbol.to_string()))?;
                signal.quantity.map_or(held, |q| q.min(held))
            }
        };
        if quantity <= Decimal::ZERO {
            return Ok(TradeResult::skipped(symbol, "sized to zero"));
        }

        let mut proposed = ProposedTrade {
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
            commission: config.commission_per_trade,
        };

        let engine = RiskEngine::new(config.risk.clone());
        let check = engine.check_trade(&state.portfolio, &proposed, self.sectors.as_deref());
        if !check.passed {
            // One resubmission at the suggested size, rounded down to a lot
            // and routed to the venue as-is.
            let adjusted = check
                .suggested_max_quantity()
                .map(|q| config.round_to_lot(q))
                .filter(|q| *q > Decimal::ZERO && *q < proposed.quantity);
            match adjusted {
                Some(adjusted) => {
                    debug!(symbol, %adjusted, "resubmitting at risk-adjusted quantity");
                    proposed.quantity = adjusted;
                }
                None => return Ok(TradeResult::rejected(symbol, check.violations)),
            }
        }

        let request = OrderRequest {
            symbol: proposed.symbol.clone(),
            action: proposed.action,
            quantity: proposed.quantity,
            order_type: crate::venue::OrderType::Market,
            limit_price: Some(proposed.price),
        };
        let fill = match self.venue.place_order(&request).await {
            Ok(fill) => fill,
            Err(e) => return Ok(TradeResult::failed(symbol, e.to_string())),
        };
        if fill.status != OrderStatus::Filled || fill.filled_quantity <= Decimal::ZERO {
            return Ok(TradeResult::failed(symbol, "venue rejected order".to_string()));
        }

        let trade = match proposed.action {
            crate::models::TradeAction::Buy => Ledger::apply_buy(
                &mut state.portfolio,
                symbol,
                fill.filled_quantity,
                fill.avg_fill_price,
                proposed.commission,
            )?,
            crate::models::TradeAction::Sell => Ledger::apply_sell(
                &mut state.portfolio,
                symbol,
                fill.filled_quantity,
                fill.avg_fill_price,
                proposed.commission,
            )?,
        };
        state.session.record_valuation(state.portfolio.total_value());

        Ok(TradeResult::executed(trade))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::FixturePrices;
    use crate::models::TradeAction;
    use crate::risk::RiskConfig;
    use crate::session::TradeOutcome;
    use crate::venue::MockVenue;
    use rust_decimal_macros::dec;

    fn fixture_market(prices: &[(&str, Decimal)]) -> Arc<FixturePrices> {
        let mut fixture = FixturePrices::new();
        let today = Utc::now().date_naive();
        for (symbol, price) in prices {
            fixture.set(symbol, today, *price);
        }
        Arc::new(fixture)
    }

    fn manager_with(
        venue: Arc<MockVenue>,
        market: Arc<FixturePrices>,
    ) -> SessionManager {
        SessionManager::new(Arc::new(SessionStore::new()), venue, market)
    }

    fn venue_with(prices: &[(&str, Decimal)]) -> Arc<MockVenue> {
        let venue = MockVenue::new(dec!(1000000));
        for (symbol, price) in prices {
            venue.set_fill_price(symbol, *price);
        }
        Arc::new(venue)
    }

    #[tokio::test]
    async fn test_start_executes_and_stops() {
        let venue = venue_with(&[("AAPL", dec!(50))]);
        let market = fixture_market(&[("AAPL", dec!(50))]);
        let manager = manager_with(venue, market);

        let session = manager
            .start_session("alpha-1", dec!(100000), SessionConfig::default())
            .await
            .unwrap();
        assert_eq!(session.status, SessionStatus::Active);

        // 10% of 100k at $50 is 200 shares, exactly two lots.
        let signal = TradingSignal::new("AAPL", SignalAction::Buy);
        let result = manager
            .execute_trade(&session.session_id, &signal)
            .await
            .unwrap();
        assert_eq!(result.outcome, TradeOutcome::Executed);
        let trade = result.trade.unwrap();
        assert_eq!(trade.quantity, dec!(200));
        assert_eq!(trade.action, TradeAction::Buy);

        let summary = manager.stop_session(&session.session_id).await.unwrap();
        assert_eq!(summary.num_trades, 1);
        assert_eq!(summary.open_positions, 1);
        // Only the commission has been lost at a flat price.
        assert_eq!(summary.final_value, dec!(99999));

        // The stopped session stays queryable.
        let stopped = manager.get_session(&session.session_id).await.unwrap();
        assert_eq!(stopped.status, SessionStatus::Stopped);
        let history = manager
            .get_trade_history(&session.session_id)
            .await
            .unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].symbol, "AAPL");
    }

    #[tokio::test]
    async fn test_hold_signal_is_skipped() {
        let venue = venue_with(&[]);
        let market = fixture_market(&[]);
        let manager = manager_with(venue, market);

        let session = manager
            .start_session("alpha-1", dec!(100000), SessionConfig::default())
            .await
            .unwrap();
        let result = manager
            .execute_trade(&session.session_id, &TradingSignal::new("AAPL", SignalAction::Hold))
            .await
            .unwrap();
        assert_eq!(result.outcome, TradeOutcome::Skipped);
    }

    #[tokio::test]
    async fn test_missing_price_fails_without_side_effects() {
        let venue = venue_with(&[]);
        let market = fixture_market(&[]);
        let manager = manager_with(venue, market);

        let session = manager
            .start_session("alpha-1", dec!(100000), SessionConfig::default())
            .await
            .unwrap();
        let result = manager
            .execute_trade(&session.session_id, &TradingSignal::new("AAPL", SignalAction::Buy))
            .await
            .unwrap();
        assert_eq!(result.outcome, TradeOutcome::Failed);

        let snapshot = manager.get_snapshot(&session.session_id).await.unwrap();
        assert_eq!(snapshot.cash, dec!(100000));
        assert_eq!(snapshot.num_trades, 0);
    }

    #[tokio::test]
    async fn test_sell_without_position_is_an_error() {
        let venue = venue_with(&[("AAPL", dec!(50))]);
        let market = fixture_market(&[("AAPL", dec!(50))]);
        let manager = manager_with(venue, market);

        let session = manager
            .start_session("alpha-1", dec!(100000), SessionConfig::default())
            .await
            .unwrap();
        let err = manager
            .execute_trade(&session.session_id, &TradingSignal::new("AAPL", SignalAction::Sell))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::PositionNotFound(_)));
    }

    #[tokio::test]
    async fn test_risk_adjusted_resubmission() {
        let venue = venue_with(&[("AAPL", dec!(50))]);
        let market = fixture_market(&[("AAPL", dec!(50))]);
        let manager = manager_with(venue, market);

        // Sizing wants 40% per position but risk caps any position at 20%.
        let config = SessionConfig {
            max_position_size_pct: dec!(0.40),
            risk: RiskConfig {
                max_position_pct: dec!(0.20),
                ..RiskConfig::default()
            },
            ..SessionConfig::default()
        };
        let session = manager
            .start_session("alpha-1", dec!(100000), config)
            .await
            .unwrap();

        let result = manager
            .execute_trade(&session.session_id, &TradingSignal::new("AAPL", SignalAction::Buy))
            .await
            .unwrap();
        assert_eq!(result.outcome, TradeOutcome::Executed);
        // Capped near 20% of ~100k at $50, rounded down to a whole lot.
        assert_eq!(result.trade.unwrap().quantity, dec!(300));
    }

    #[tokio::test]
    async fn test_adjusted_quantity_is_not_rechecked() {
        let venue = venue_with(&[("AAPL", dec!(100)), ("MSFT", dec!(100))]);
        let market = fixture_market(&[("AAPL", dec!(100)), ("MSFT", dec!(100))]);
        let sectors: HashMap<String, String> = HashMap::from([
            ("AAPL".to_string(), "tech".to_string()),
            ("MSFT".to_string(), "tech".to_string()),
        ]);
        let manager = SessionManager::new(
            Arc::new(SessionStore::new()),
            venue,
            market,
        )
        .with_sectors(Arc::new(sectors));

        let config = SessionConfig {
            max_position_size_pct: dec!(0.40),
            commission_per_trade: Decimal::ZERO,
            risk: RiskConfig {
                max_position_pct: dec!(0.20),
                max_sector_pct: dec!(0.30),
                ..RiskConfig::default()
            },
            ..SessionConfig::default()
        };
        let session = manager
            .start_session("alpha-1", dec!(100000), config)
            .await
            .unwrap();
        let id = session.session_id.clone();

        // Fill tech up to its 30% ceiling minus one position's headroom.
        let result = manager
            .execute_trade(
                &id,
                &TradingSignal::new("AAPL", SignalAction::Buy).with_quantity(dec!(200)),
            )
            .await
            .unwrap();
        assert_eq!(result.outcome, TradeOutcome::Executed);

        // MSFT sizes to 400 shares, gets capped to 200 by the position limit,
        // and at 200 the tech sector sits at 40% against a 30% cap. The
        // adjusted order still fills: the suggested size goes straight to the
        // venue without a second gate.
        let result = manager
            .execute_trade(&id, &TradingSignal::new("MSFT", SignalAction::Buy))
            .await
            .unwrap();
        assert_eq!(result.outcome, TradeOutcome::Executed);
        assert_eq!(result.trade.unwrap().quantity, dec!(200));
    }

    #[tokio::test]
    async fn test_invalid_signal_is_rejected_up_front() {
        let venue = venue_with(&[("AAPL", dec!(50))]);
        let market = fixture_market(&[("AAPL", dec!(50))]);
        let manager = manager_with(venue, market);

        let session = manager
            .start_session("alpha-1", dec!(100000), SessionConfig::default())
            .await
            .unwrap();
        let id = session.session_id.clone();

        let err = manager
            .execute_trade(&id, &TradingSignal::new("  ", SignalAction::Buy))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignal(_)));

        let err = manager
            .execute_trade(
                &id,
                &TradingSignal::new("AAPL", SignalAction::Buy).with_quantity(dec!(0)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidSignal(_)));

        // Nothing reached the ledger.
        let snapshot = manager.get_snapshot(&id).await.unwrap();
        assert_eq!(snapshot.cash, dec!(100000));
        assert_eq!(snapshot.num_trades, 0);
    }

    #[tokio::test]
    async fn test_batch_tolerates_partial_failure() {
        let symbols = ["AAA", "BBB", "CCC", "DDD", "EEE"];
        let priced: Vec<(&str, Decimal)> =
            symbols.iter().map(|s| (*s, dec!(10))).collect();
        let venue = venue_with(&priced);
        venue.fail_orders_for("CCC");
        let market = fixture_market(&priced);
        let manager = manager_with(venue, market);

        let session = manager
            .start_session("alpha-1", dec!(1000000), SessionConfig::default())
            .await
            .unwrap();
        let signals: Vec<TradingSignal> = symbols
            .iter()
            .map(|s| TradingSignal::new(*s, SignalAction::Buy))
            .collect();

        let results = manager
            .execute_batch(&session.session_id, &signals)
            .await
            .unwrap();
        assert_eq!(results.len(), 5);
        assert_eq!(results[2].outcome, TradeOutcome::Failed);
        for i in [0usize, 1, 3, 4] {
            assert_eq!(results[i].outcome, TradeOutcome::Executed, "signal {i}");
        }

        let snapshot = manager.get_snapshot(&session.session_id).await.unwrap();
        assert_eq!(snapshot.num_positions, 4);
        assert_eq!(snapshot.num_trades, 4);
    }

    #[tokio::test]
    async fn test_lifecycle_transitions() {
        let venue = venue_with(&[("AAPL", dec!(50))]);
        let market = fixture_market(&[("AAPL", dec!(50))]);
        let manager = manager_with(venue, market);

        let session = manager
            .start_session("alpha-1", dec!(100000), SessionConfig::default())
            .await
            .unwrap();
        let id = session.session_id.clone();

        // Cannot resume an active session.
        let err = manager.resume_session(&id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        manager.pause_session(&id).await.unwrap();

        // Paused sessions refuse trades.
        let err = manager
            .execute_trade(&id, &TradingSignal::new("AAPL", SignalAction::Buy))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionNotActive(_)));

        // Cannot pause twice.
        let err = manager.pause_session(&id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));

        manager.resume_session(&id).await.unwrap();
        manager.stop_session(&id).await.unwrap();

        // Stop is terminal: no transition leaves it, no trade enters it.
        let err = manager.pause_session(&id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        let err = manager.resume_session(&id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        let err = manager.stop_session(&id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidTransition { .. }));
        let err = manager
            .execute_trade(&id, &TradingSignal::new("AAPL", SignalAction::Buy))
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::SessionNotActive(_)));

        // But the final state is still readable.
        let session = manager.get_session(&id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Stopped);
        assert!(session.stopped_at.is_some());
    }

    #[tokio::test]
    async fn test_venue_timeout_aborts_start() {
        let venue = MockVenue::new(dec!(0));
        venue.set_response_delay(std::time::Duration::from_secs(5));
        let market = fixture_market(&[]);
        let manager = manager_with(Arc::new(venue), market);

        let config = SessionConfig {
            venue_timeout_secs: 0,
            ..SessionConfig::default()
        };
        let err = manager
            .start_session("alpha-1", dec!(100000), config)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::VenueUnavailable(_)));
    }

    #[tokio::test]
    async fn test_critical_alert_auto_pauses() {
        let venue = venue_with(&[("AAPL", dec!(100))]);
        let market = fixture_market(&[("AAPL", dec!(100))]);
        let manager = manager_with(venue, market);

        let config = SessionConfig {
            max_position_size_pct: dec!(0.40),
            risk: RiskConfig {
                max_position_pct: dec!(0.50),
                max_daily_loss_pct: 0.05,
                ..RiskConfig::default()
            },
            ..SessionConfig::default()
        };
        let session = manager
            .start_session("alpha-1", dec!(100000), config)
            .await
            .unwrap();
        let id = session.session_id.clone();

        manager
            .execute_trade(&id, &TradingSignal::new("AAPL", SignalAction::Buy))
            .await
            .unwrap();

        // Establish a baseline mark, then crash the price 20% in one period.
        manager
            .mark_to_market(&id, &HashMap::from([("AAPL".to_string(), dec!(100))]))
            .await
            .unwrap();
        manager
            .mark_to_market(&id, &HashMap::from([("AAPL".to_string(), dec!(80))]))
            .await
            .unwrap();

        let alert = manager.check_risk_alerts(&id).await.unwrap().unwrap();
        assert_eq!(alert.severity, AlertSeverity::Critical);

        let session = manager.get_session(&id).await.unwrap();
        assert_eq!(session.status, SessionStatus::Paused);
    }

    #[tokio::test]
    async fn test_mark_to_market_records_returns() {
        let venue = venue_with(&[("AAPL", dec!(100))]);
        let market = fixture_market(&[("AAPL", dec!(100))]);
        let store = Arc::new(SessionStore::new());
        let manager = SessionManager::new(Arc::clone(&store), venue, market);

        let config = SessionConfig {
            commission_per_trade: Decimal::ZERO,
            ..SessionConfig::default()
        };
        let session = manager
            .start_session("alpha-1", dec!(100000), config)
            .await
            .unwrap();
        let id = session.session_id.clone();

        manager
            .execute_trade(&id, &TradingSignal::new("AAPL", SignalAction::Buy))
            .await
            .unwrap();

        let snapshot = manager
            .mark_to_market(&id, &HashMap::from([("AAPL".to_string(), dec!(110))]))
            .await
            .unwrap();
        // 100 shares up $10 each on a 100k base.
        assert_eq!(snapshot.total_value, dec!(101000));

        let state = store.get(&id).await.unwrap();
        let state = state.lock().await;
        assert_eq!(state.returns.len(), 1);
        assert!((state.returns[0] - 0.01).abs() < 1e-12);
        assert_eq!(state.equity_curve, vec![dec!(101000)]);
    }
}
