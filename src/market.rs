//! External collaborator contracts: market data, signal source, sector
//! classification — plus deterministic implementations for tests and
//! simulation runs.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rust_decimal::Decimal;

use crate::models::{PortfolioSnapshot, TradingSignal};

/// Price and calendar supplier. Implementations own retrieval; the core only
/// consumes the narrow lookup contract.
pub trait MarketData: Send + Sync {
    /// Price of `symbol` on `date`, or `None` when unknown.
    fn get_price(&self, symbol: &str, date: NaiveDate) -> Option<Decimal>;

    /// Ordered trading dates in `[start, end]`.
    fn get_calendar(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate>;
}

/// Produces the ordered signal batch for one model and date.
pub trait SignalSource: Send + Sync {
    fn generate_signals(
        &self,
        model_id: &str,
        date: NaiveDate,
        snapshot: &PortfolioSnapshot,
        top_n: usize,
        universe: &[String],
    ) -> Vec<TradingSignal>;
}

/// Optional symbol-to-sector classification. Concentration checks degrade to
/// symbol-only limits when no map is supplied.
pub trait SectorMap: Send + Sync {
    fn sector(&self, symbol: &str) -> Option<&str>;
}

impl SectorMap for HashMap<String, String> {
    fn sector(&self, symbol: &str) -> Option<&str> {
        self.get(symbol).map(String::as_str)
    }
}

/// In-memory price fixture keyed by symbol and date, with a weekday calendar.
/// Deterministic; used by the simulation demo and tests.
#[derive(Debug, Default, Clone)]
pub struct FixturePrices {
    prices: HashMap<String, BTreeMap<NaiveDate, Decimal>>,
}

impl FixturePrices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the price of `symbol` on a single date.
    pub fn set(&mut self, symbol: &str, date: NaiveDate, price: Decimal) {
        self.prices
            .entry(symbol.to_string())
            .or_default()
            .insert(date, price);
    }

    /// Set a constant price for `symbol` on every weekday in `[start, end]`.
    pub fn set_constant(&mut self, symbol: &str, start: NaiveDate, end: NaiveDate, price: Decimal) {
        for date in weekdays(start, end) {
            self.set(symbol, date, price);
        }
    }
}

impl MarketData for FixturePrices {
    fn get_price(&self, symbol: &str, date: NaiveDate) -> Option<Decimal> {
        self.prices.get(symbol).and_then(|series| series.get(&date)).copied()
    }

    fn get_calendar(&self, start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
        weekdays(start, end)
    }
}

/// Fixed signal batches per date. Dates without an entry yield no signals.
#[derive(Debug, Default, Clone)]
pub struct ScriptedSignals {
    by_date: HashMap<NaiveDate, Vec<TradingSignal>>,
}

impl ScriptedSignals {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&mut self, date: NaiveDate, signals: Vec<TradingSignal>) {
        self.by_date.insert(date, signals);
    }
}

impl SignalSource for ScriptedSignals {
    fn generate_signals(
        &self,
        _model_id: &str,
        date: NaiveDate,
        _snapshot: &PortfolioSnapshot,
        top_n: usize,
        _universe: &[String],
    ) -> Vec<TradingSignal> {
        let mut signals = self.by_date.get(&date).cloned().unwrap_or_default();
        signals.truncate(top_n);
        signals
    }
}

fn weekdays(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut date = start;
    while date <= end {
        if !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
            dates.push(date);
        }
        date += Duration::days(1);
    }
    dates
}
