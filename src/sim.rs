//! Deterministic day-by-day simulation of a signal model.
//!
//! The stepper reuses the live sizing and risk gates but fills orders
//! instantly at the market price, so a simulated run and a live session
//! share one code path for everything except the venue.

use std::fmt;
use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::{debug, warn};

use crate::error::{CoreError, Result};
use crate::ledger::Ledger;
use crate::market::{MarketData, SectorMap, SignalSource};
use crate::models::{Portfolio, SignalAction, Trade, TradeAction, TradingSignal};
use crate::risk::RiskEngine;
use crate::session::SessionConfig;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Parameters for one simulation run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    pub model_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub initial_capital: Decimal,
    /// Symbols the signal source may draw from
    pub universe: Vec<String>,
    /// Signals taken per day, best first
    pub top_n: usize,
    /// Sizing and risk limits, shared with live sessions
    pub session: SessionConfig,
}

/// Everything that happened on one simulated day.
#[derive(Debug, Clone)]
pub struct StepResult {
    pub date: NaiveDate,
    /// Signals the model emitted this day, before sizing and risk gating
    pub signals: Vec<TradingSignal>,
    pub trades: Vec<Trade>,
    pub portfolio_value: Decimal,
    pub daily_return: f64,
    pub cash: Decimal,
}

/// Advances one portfolio through the trading calendar a day at a time.
pub struct SimulationStepper {
    config: SimulationConfig,
    market: Arc<dyn MarketData>,
    signals: Arc<dyn SignalSource>,
    sectors: Option<Arc<dyn SectorMap>>,
    engine: RiskEngine,
    portfolio: Portfolio,
    dates: Vec<NaiveDate>,
    cursor: usize,
    returns: Vec<f64>,
    last_value: Decimal,
}

impl fmt::Debug for SimulationStepper {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulationStepper")
            .field("config", &self.config)
            .field("cursor", &self.cursor)
            .field("last_value", &self.last_value)
            .finish_non_exhaustive()
    }
}

impl SimulationStepper {
    pub fn new(
        config: SimulationConfig,
        market: Arc<dyn MarketData>,
        signals: Arc<dyn SignalSource>,
    ) -> Result<Self> {
        if config.end_date < config.start_date {
            return Err(CoreError::InvalidArgument(format!(
                "end date {} precedes start date {}",
                config.end_date, config.start_date
            )));
        }
        let dates = market.get_calendar(config.start_date, config.end_date);
        if dates.is_empty() {
            return Err(CoreError::InvalidArgument(
                "no trading dates in the requested range".to_string(),
            ));
        }

        let portfolio = Ledger::create_portfolio(config.initial_capital, None)?;
        let engine = RiskEngine::new(config.session.risk.clone());
        let last_value = portfolio.total_value();
        Ok(Self {
            config,
            market,
            signals,
            sectors: None,
            engine,
            portfolio,
            dates,
            cursor: 0,
            returns: Vec::new(),
            last_value,
        })
    }

    pub fn with_sectors(mut self, sectors: Arc<dyn SectorMap>) -> Self {
        self.sectors = Some(sectors);
        self
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    /// Advance one trading day: reprice, pull signals, trade, and mark.
    /// Returns `None` once the calendar is exhausted.
    pub fn step(&mut self) -> Option<StepResult> {
        let date = *self.dates.get(self.cursor)?;
        self.cursor += 1;

        self.reprice(date);

        let snapshot = Ledger::snapshot(&self.portfolio);
        let signals = self.signals.generate_signals(
            &self.config.model_id,
            date,
            &snapshot,
            self.config.top_n,
            &self.config.universe,
        );

        let mut trades = Vec::new();
        for signal in &signals {
            if let Some(trade) = self.execute_signal(date, signal) {
                trades.push(trade);
            }
        }

        let portfolio_value = self.portfolio.total_value();
        let daily_return = if self.last_value > Decimal::ZERO {
            ((portfolio_value - self.last_value) / self.last_value)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };
        self.returns.push(daily_return);
        self.last_value = portfolio_value;

        debug!(%date, %portfolio_value, daily_return, num_trades = trades.len(), "step");
        Some(StepResult {
            date,
            signals,
            trades,
            portfolio_value,
            daily_return,
            cash: self.portfolio.cash,
        })
    }

    /// Run every remaining day and aggregate the report.
    pub fn run(&mut self) -> SimulationReport {
        let mut num_trades = 0usize;
        let mut days = 0usize;
        while let Some(step) = self.step() {
            num_trades += step.trades.len();
            days += 1;
        }
        self.report(days, num_trades)
    }

    /// Carry-forward repricing: held symbols with no quote today keep their
    /// last mark.
    fn reprice(&mut self, date: NaiveDate) {
        let symbols: Vec<String> = self.portfolio.positions.keys().cloned().collect();
        for symbol in symbols {
            match self.market.get_price(&symbol, date) {
                Some(price) => {
                    if let Some(position) = self.portfolio.positions.get_mut(&symbol) {
                        position.current_price = price;
                    }
                }
                None => warn!(%symbol, %date, "no quote, carrying last mark forward"),
            }
        }
    }

    fn execute_signal(&mut self, date: NaiveDate, signal: &TradingSignal) -> Option<Trade> {
        let symbol = signal.symbol.as_str();
        let session = &self.config.session;

        let action = match signal.action {
            SignalAction::Hold => return None,
            SignalAction::Buy => TradeAction::Buy,
            SignalAction::Sell => TradeAction::Sell,
        };

        let Some(price) = self.market.get_price(symbol, date) else {
            warn!(%symbol, %date, "no quote, skipping signal");
            return None;
        };

        let quantity = match action {
            TradeAction::Buy => match signal.quantity {
                Some(q) => session.round_to_lot(q),
                None => session.buy_quantity(self.portfolio.total_value(), price),
            },
            TradeAction::Sell => {
                let held = self.portfolio.positions.get(symbol).map(|p| p.quantity)?;
                signal.quantity.map_or(held, |q| q.min(held))
            }
        };
        if quantity <= Decimal::ZERO {
            return None;
        }

        let mut proposed = crate::models::ProposedTrade {
            symbol: symbol.to_string(),
            action,
            quantity,
            price,
            commission: session.commission_per_trade,
        };

        let check = self
            .engine
            .check_trade(&self.portfolio, &proposed, self.sectors.as_deref());
        if !check.passed {
            // The suggested size is filled as-is, mirroring live execution.
            let Some(adjusted) = check
                .suggested_max_quantity()
                .map(|q| session.round_to_lot(q))
                .filter(|q| *q > Decimal::ZERO && *q < proposed.quantity)
            else {
                debug!(%symbol, %date, "signal rejected by risk gate");
                return None;
            };
            proposed.quantity = adjusted;
        }

        let applied = match proposed.action {
            TradeAction::Buy => Ledger::apply_buy(
                &mut self.portfolio,
                symbol,
                proposed.quantity,
                proposed.price,
                proposed.commission,
            ),
            TradeAction::Sell => Ledger::apply_sell(
                &mut self.portfolio,
                symbol,
                proposed.quantity,
                proposed.price,
                proposed.commission,
            ),
        };
        match applied {
            Ok(trade) => Some(trade),
            Err(e) => {
                warn!(%symbol, %date, error = %e, "simulated fill not applied");
                None
            }
        }
    }

    fn report(&self, days: usize, num_trades: usize) -> SimulationReport {
        let final_value = self.portfolio.total_value();
        let total_return = if self.config.initial_capital > Decimal::ZERO {
            ((final_value - self.config.initial_capital) / self.config.initial_capital)
                .to_f64()
                .unwrap_or(0.0)
        } else {
            0.0
        };

        let annualized_return = if days > 0 {
            (1.0 + total_return).powf(TRADING_DAYS_PER_YEAR / days as f64) - 1.0
        } else {
            0.0
        };
        let annualized_volatility = if self.returns.len() > 1 {
            self.returns.clone().std_dev() * TRADING_DAYS_PER_YEAR.sqrt()
        } else {
            0.0
        };
        let sharpe_ratio = if annualized_volatility > 0.0 {
            annualized_return / annualized_volatility
        } else {
            0.0
        };
        let winning = self.returns.iter().filter(|r| **r > 0.0).count();
        let win_rate = if self.returns.is_empty() {
            0.0
        } else {
            winning as f64 / self.returns.len() as f64
        };

        SimulationReport {
            model_id: self.config.model_id.clone(),
            start_date: self.config.start_date,
            end_date: self.config.end_date,
            trading_days: days,
            initial_capital: self.config.initial_capital,
            final_value,
            total_return_pct: total_return * 100.0,
            annualized_return_pct: annualized_return * 100.0,
            annualized_volatility_pct: annualized_volatility * 100.0,
            sharpe_ratio,
            max_drawdown_pct: self.engine.max_drawdown(&self.returns) * 100.0,
            value_at_risk: self.engine.value_at_risk(&self.returns, final_value, None),
            win_rate_pct: win_rate * 100.0,
            num_trades,
            open_positions: self.portfolio.positions.len(),
        }
    }
}

/// Aggregate statistics for one completed run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub model_id: String,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub trading_days: usize,
    pub initial_capital: Decimal,
    pub final_value: Decimal,
    pub total_return_pct: f64,
    pub annualized_return_pct: f64,
    pub annualized_volatility_pct: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown_pct: f64,
    pub value_at_risk: Decimal,
    pub win_rate_pct: f64,
    pub num_trades: usize,
    pub open_positions: usize,
}

impl fmt::Display for SimulationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", "═".repeat(52))?;
        writeln!(f, "  SIMULATION REPORT: {}", self.model_id)?;
        writeln!(f, "{}", "═".repeat(52))?;
        writeln!(f, "  Period:           {} to {}", self.start_date, self.end_date)?;
        writeln!(f, "  Trading days:     {}", self.trading_days)?;
        writeln!(f, "  Initial capital:  ${:.2}", self.initial_capital)?;
        writeln!(f, "  Final value:      ${:.2}", self.final_value)?;
        writeln!(f, "  Total return:     {:.2}%", self.total_return_pct)?;
        writeln!(f, "  Annualized:       {:.2}%", self.annualized_return_pct)?;
        writeln!(f, "  Volatility:       {:.2}%", self.annualized_volatility_pct)?;
        writeln!(f, "  Sharpe ratio:     {:.2}", self.sharpe_ratio)?;
        writeln!(f, "  Max drawdown:     {:.2}%", self.max_drawdown_pct)?;
        writeln!(f, "  Value at risk:    ${:.2}", self.value_at_risk)?;
        writeln!(f, "  Win rate:         {:.1}%", self.win_rate_pct)?;
        writeln!(f, "  Trades:           {}", self.num_trades)?;
        writeln!(f, "  Open positions:   {}", self.open_positions)?;
        write!(f, "{}", "═".repeat(52))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::market::{FixturePrices, ScriptedSignals};
    use rust_decimal_macros::dec;

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn config(start: &str, end: &str) -> SimulationConfig {
        SimulationConfig {
            model_id: "alpha-1".to_string(),
            start_date: d(start),
            end_date: d(end),
            initial_capital: dec!(100000),
            universe: vec!["AAPL".to_string()],
            top_n: 10,
            session: SessionConfig {
                commission_per_trade: Decimal::ZERO,
                ..SessionConfig::default()
            },
        }
    }

    #[test]
    fn test_rejects_inverted_range() {
        let market = Arc::new(FixturePrices::new());
        let signals = Arc::new(ScriptedSignals::new());
        let err = SimulationStepper::new(config("2024-01-10", "2024-01-08"), market, signals)
            .unwrap_err();
        assert!(matches!(err, CoreError::InvalidArgument(_)));
    }

    #[test]
    fn test_buy_then_ride_price_up() {
        // Mon 2024-01-08 through Wed 2024-01-10.
        let mut prices = FixturePrices::new();
        prices.set("AAPL", d("2024-01-08"), dec!(100));
        prices.set("AAPL", d("2024-01-09"), dec!(110));
        prices.set("AAPL", d("2024-01-10"), dec!(121));

        let mut scripted = ScriptedSignals::new();
        scripted.on(
            d("2024-01-08"),
            vec![TradingSignal::new("AAPL", SignalAction::Buy)],
        );

        let mut stepper = SimulationStepper::new(
            config("2024-01-08", "2024-01-10"),
            Arc::new(prices),
            Arc::new(scripted),
        )
        .unwrap();

        // Day one: buy 100 shares (10% of 100k at $100), flat close.
        let step = stepper.step().unwrap();
        assert_eq!(step.signals.len(), 1);
        assert_eq!(step.signals[0].symbol, "AAPL");
        assert_eq!(step.trades.len(), 1);
        assert_eq!(step.trades[0].quantity, dec!(100));
        assert_eq!(step.portfolio_value, dec!(100000));
        assert_eq!(step.daily_return, 0.0);

        // Day two: no signals, position marks up 10%.
        let step = stepper.step().unwrap();
        assert!(step.signals.is_empty());
        assert!(step.trades.is_empty());
        assert_eq!(step.portfolio_value, dec!(101000));
        assert!((step.daily_return - 0.01).abs() < 1e-12);

        let step = stepper.step().unwrap();
        assert_eq!(step.portfolio_value, dec!(102100));

        assert!(stepper.step().is_none());
    }

    #[test]
    fn test_missing_quote_carries_mark_forward() {
        let mut prices = FixturePrices::new();
        prices.set("AAPL", d("2024-01-08"), dec!(100));
        // No AAPL quote on the 9th; back on the 10th.
        prices.set("MSFT", d("2024-01-09"), dec!(1));
        prices.set("AAPL", d("2024-01-10"), dec!(120));

        let mut scripted = ScriptedSignals::new();
        scripted.on(
            d("2024-01-08"),
            vec![TradingSignal::new("AAPL", SignalAction::Buy)],
        );

        let mut stepper = SimulationStepper::new(
            config("2024-01-08", "2024-01-10"),
            Arc::new(prices),
            Arc::new(scripted),
        )
        .unwrap();

        stepper.step().unwrap();
        let step = stepper.step().unwrap();
        assert_eq!(step.portfolio_value, dec!(100000));
        assert_eq!(step.daily_return, 0.0);

        let step = stepper.step().unwrap();
        assert_eq!(step.portfolio_value, dec!(102000));
    }

    #[test]
    fn test_run_aggregates_report() {
        let mut prices = FixturePrices::new();
        prices.set_constant("AAPL", d("2024-01-08"), d("2024-01-12"), dec!(100));

        let mut scripted = ScriptedSignals::new();
        scripted.on(
            d("2024-01-08"),
            vec![TradingSignal::new("AAPL", SignalAction::Buy)],
        );
        scripted.on(
            d("2024-01-12"),
            vec![TradingSignal::new("AAPL", SignalAction::Sell)],
        );

        let mut stepper = SimulationStepper::new(
            config("2024-01-08", "2024-01-12"),
            Arc::new(prices),
            Arc::new(scripted),
        )
        .unwrap();
        let report = stepper.run();

        assert_eq!(report.trading_days, 5);
        assert_eq!(report.num_trades, 2);
        assert_eq!(report.open_positions, 0);
        // Flat prices and zero commission: capital is conserved.
        assert_eq!(report.final_value, dec!(100000));
        assert_eq!(report.total_return_pct, 0.0);
        assert_eq!(report.sharpe_ratio, 0.0);
        assert_eq!(report.max_drawdown_pct, 0.0);
    }
}
