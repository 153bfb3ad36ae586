//! Execution venue abstraction and the deterministic mock used by tests
//! and the demo binary.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::models::TradeAction;

/// Credentials and routing for one brokerage connection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VenueCredentials {
    pub broker: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default)]
    pub api_secret: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderType {
    Market,
    Limit,
}

/// One order handed to a venue for execution.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub symbol: String,
    pub action: TradeAction,
    pub quantity: Decimal,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
}

impl OrderRequest {
    pub fn market(symbol: &str, action: TradeAction, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.to_string(),
            action,
            quantity,
            order_type: OrderType::Market,
            limit_price: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Filled,
    Rejected,
    Cancelled,
}

/// Venue response to a placed order.
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub order_id: String,
    pub status: OrderStatus,
    pub filled_quantity: Decimal,
    pub avg_fill_price: Decimal,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct VenuePosition {
    pub symbol: String,
    pub quantity: Decimal,
    pub avg_cost: Decimal,
}

#[derive(Debug, Clone)]
pub struct VenueAccount {
    pub cash: Decimal,
    pub total_value: Decimal,
}

/// Order routing surface the session manager talks to. Implementations own
/// transport and authentication.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    async fn connect(&self, credentials: &VenueCredentials) -> Result<()>;

    fn is_connected(&self) -> bool;

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderFill>;

    async fn cancel_order(&self, order_id: &str) -> Result<()>;

    async fn get_positions(&self) -> Result<Vec<VenuePosition>>;

    async fn get_account_info(&self) -> Result<VenueAccount>;
}

/// Mutex access for the mock's internal state; a poisoned lock still
/// yields the data since fills are applied atomically under the guard.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// In-process venue with deterministic fills. Orders fill at the configured
/// price per symbol (falling back to the limit price). Failure injection per
/// symbol and a fixed response delay support timeout and partial-failure
/// tests.
pub struct MockVenue {
    connected: AtomicBool,
    fill_prices: Mutex<HashMap<String, Decimal>>,
    fail_symbols: Mutex<HashSet<String>>,
    response_delay: Mutex<Option<Duration>>,
    positions: Mutex<HashMap<String, VenuePosition>>,
    cash: Mutex<Decimal>,
}

impl MockVenue {
    pub fn new(starting_cash: Decimal) -> Self {
        Self {
            connected: AtomicBool::new(false),
            fill_prices: Mutex::new(HashMap::new()),
            fail_symbols: Mutex::new(HashSet::new()),
            response_delay: Mutex::new(None),
            positions: Mutex::new(HashMap::new()),
            cash: Mutex::new(starting_cash),
        }
    }

    /// Fill every future order in `symbol` at `price`.
    pub fn set_fill_price(&self, symbol: &str, price: Decimal) {
        lock(&self.fill_prices).insert(symbol.to_string(), price);
    }

    /// Reject every future order in `symbol`.
    pub fn fail_orders_for(&self, symbol: &str) {
        lock(&self.fail_symbols).insert(symbol.to_string());
    }

    /// Delay every venue call by `delay`.
    pub fn set_response_delay(&self, delay: Duration) {
        *lock(&self.response_delay) = Some(delay);
    }

    async fn simulate_latency(&self) {
        let delay = *lock(&self.response_delay);
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
    }

    fn apply_fill(&self, request: &OrderRequest, price: Decimal) {
        let mut positions = lock(&self.positions);
        let mut cash = lock(&self.cash);
        match request.action {
            TradeAction::Buy => {
                *cash -= request.quantity * price;
                let entry = positions
                    .entry(request.symbol.clone())
                    .or_insert_with(|| VenuePosition {
                        symbol: request.symbol.clone(),
                        quantity: Decimal::ZERO,
                        avg_cost: price,
                    });
                let new_quantity = entry.quantity + request.quantity;
                entry.avg_cost = (entry.quantity * entry.avg_cost + request.quantity * price)
                    / new_quantity;
                entry.quantity = new_quantity;
            }
            TradeAction::Sell => {
                *cash += request.quantity * price;
                if let Some(entry) = positions.get_mut(&request.symbol) {
                    entry.quantity -= request.quantity;
                    if entry.quantity <= Decimal::ZERO {
                        positions.remove(&request.symbol);
                    }
                }
            }
        }
    }
}

#[async_trait]
impl ExecutionVenue for MockVenue {
    async fn connect(&self, credentials: &VenueCredentials) -> Result<()> {
        self.simulate_latency().await;
        info!(broker = %credentials.broker, "mock venue connected");
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn place_order(&self, request: &OrderRequest) -> Result<OrderFill> {
        if !self.is_connected() {
            return Err(CoreError::VenueUnavailable(
                "venue is not connected".to_string(),
            ));
        }
        self.simulate_latency().await;

        let order_id = Uuid::new_v4().to_string();
        let timestamp = Utc::now();

        if lock(&self.fail_symbols).contains(&request.symbol) {
            return Ok(OrderFill {
                order_id,
                status: OrderStatus::Rejected,
                filled_quantity: Decimal::ZERO,
                avg_fill_price: Decimal::ZERO,
                timestamp,
            });
        }

        let price = lock(&self.fill_prices)
            .get(&request.symbol)
            .copied()
            .or(request.limit_price);
        let Some(price) = price else {
            return Ok(OrderFill {
                order_id,
                status: OrderStatus::Rejected,
                filled_quantity: Decimal::ZERO,
                avg_fill_price: Decimal::ZERO,
                timestamp,
            });
        };

        self.apply_fill(request, price);
        Ok(OrderFill {
            order_id,
            status: OrderStatus::Filled,
            filled_quantity: request.quantity,
            avg_fill_price: price,
            timestamp,
        })
    }

    async fn cancel_order(&self, _order_id: &str) -> Result<()> {
        self.simulate_latency().await;
        Ok(())
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>> {
        self.simulate_latency().await;
        Ok(lock(&self.positions).values().cloned().collect())
    }

    async fn get_account_info(&self) -> Result<VenueAccount> {
        self.simulate_latency().await;
        let cash = *lock(&self.cash);
        let positions_value: Decimal = lock(&self.positions)
            .values()
            .map(|p| p.quantity * p.avg_cost)
            .sum();
        Ok(VenueAccount {
            cash,
            total_value: cash + positions_value,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_order_requires_connection() {
        let venue = MockVenue::new(dec!(10000));
        let request = OrderRequest::market("AAPL", TradeAction::Buy, dec!(10));
        let err = venue.place_order(&request).await.unwrap_err();
        assert!(matches!(err, CoreError::VenueUnavailable(_)));
    }

    #[tokio::test]
    async fn test_fill_at_configured_price() {
        let venue = MockVenue::new(dec!(10000));
        venue.connect(&VenueCredentials::default()).await.unwrap();
        venue.set_fill_price("AAPL", dec!(150));

        let request = OrderRequest::market("AAPL", TradeAction::Buy, dec!(10));
        let fill = venue.place_order(&request).await.unwrap();
        assert_eq!(fill.status, OrderStatus::Filled);
        assert_eq!(fill.filled_quantity, dec!(10));
        assert_eq!(fill.avg_fill_price, dec!(150));

        let account = venue.get_account_info().await.unwrap();
        assert_eq!(account.cash, dec!(8500));
        assert_eq!(account.total_value, dec!(10000));
    }

    #[tokio::test]
    async fn test_failure_injection_rejects() {
        let venue = MockVenue::new(dec!(10000));
        venue.connect(&VenueCredentials::default()).await.unwrap();
        venue.set_fill_price("AAPL", dec!(150));
        venue.fail_orders_for("AAPL");

        let request = OrderRequest::market("AAPL", TradeAction::Buy, dec!(10));
        let fill = venue.place_order(&request).await.unwrap();
        assert_eq!(fill.status, OrderStatus::Rejected);
        assert_eq!(fill.filled_quantity, Decimal::ZERO);
    }

    #[tokio::test]
    async fn test_unknown_symbol_without_limit_rejects() {
        let venue = MockVenue::new(dec!(10000));
        venue.connect(&VenueCredentials::default()).await.unwrap();

        let request = OrderRequest::market("ZZZZ", TradeAction::Buy, dec!(1));
        let fill = venue.place_order(&request).await.unwrap();
        assert_eq!(fill.status, OrderStatus::Rejected);
    }
}
