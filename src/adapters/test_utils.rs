//! Shared test utilities for adapter testing
//!
//! Provides a configurable `TestMockAdapter` used by the adapter, monitoring
//! and execution test modules.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{
    current_time_ms, ApiCredentials, Balance, Orderbook, OrderbookLevel, Ticker,
};

/// Unified mock adapter for testing
///
/// Books can be swapped while the adapter is shared behind an `Arc`, so
/// monitoring tests can move prices between cycles.
pub struct TestMockAdapter {
    pub name: &'static str,
    books: Mutex<HashMap<String, Orderbook>>,
    failing_markets: Mutex<HashSet<String>>,
    failing_tickers: Mutex<HashSet<String>>,
    /// When true, `get_balance` returns an authentication error
    pub reject_credentials: bool,
    /// Counter of orderbook requests (thread-safe for async tests)
    pub orderbook_calls: Arc<AtomicU64>,
}

impl TestMockAdapter {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            books: Mutex::new(HashMap::new()),
            failing_markets: Mutex::new(HashSet::new()),
            failing_tickers: Mutex::new(HashSet::new()),
            reject_credentials: false,
            orderbook_calls: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Builder: single-level book with the given best ask / best bid
    pub fn with_book(self, market: &str, ask: f64, bid: f64) -> Self {
        self.set_book(market, ask, bid);
        self
    }

    pub fn set_book(&self, market: &str, ask: f64, bid: f64) {
        let ob = Orderbook {
            asks: vec![OrderbookLevel::new(ask, 10.0)],
            bids: vec![OrderbookLevel::new(bid, 10.0)],
            timestamp: current_time_ms(),
        };
        self.books.lock().unwrap().insert(market.to_string(), ob);
    }

    pub fn fail_market(&self, market: &str) {
        self.failing_markets.lock().unwrap().insert(market.to_string());
    }

    /// Ticker requests fail while orderbooks keep working
    pub fn fail_ticker(&self, market: &str) {
        self.failing_tickers.lock().unwrap().insert(market.to_string());
    }

    fn check_market(&self, market: &str) -> ExchangeResult<Orderbook> {
        if self.failing_markets.lock().unwrap().contains(market) {
            return Err(ExchangeError::Network(format!("mock outage for {}", market)));
        }
        self.books
            .lock()
            .unwrap()
            .get(market)
            .cloned()
            .ok_or_else(|| ExchangeError::UnknownMarket(market.to_string()))
    }
}

impl Default for TestMockAdapter {
    fn default() -> Self {
        Self::new("mock")
    }
}

#[async_trait]
impl ExchangeAdapter for TestMockAdapter {
    async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker> {
        if self.failing_tickers.lock().unwrap().contains(market) {
            return Err(ExchangeError::Network(format!("mock ticker outage for {}", market)));
        }
        let ob = self.check_market(market)?;
        Ok(Ticker {
            price: ob.best_bid().unwrap_or(0.0),
            volume: 1000.0,
            timestamp: ob.timestamp,
        })
    }

    async fn get_orderbook(&self, market: &str, depth: usize) -> ExchangeResult<Orderbook> {
        self.orderbook_calls.fetch_add(1, Ordering::Relaxed);
        let mut ob = self.check_market(market)?;
        ob.asks.truncate(depth);
        ob.bids.truncate(depth);
        Ok(ob)
    }

    async fn get_balance(&self, _credentials: &ApiCredentials) -> ExchangeResult<Balance> {
        if self.reject_credentials {
            return Err(ExchangeError::Authentication("invalid access key".to_string()));
        }
        Ok(Balance {
            fiat_currency: "KRW".to_string(),
            fiat_balance: 10_000_000.0,
            coin_balances: Vec::new(),
        })
    }

    fn exchange_name(&self) -> &'static str {
        self.name
    }
}
