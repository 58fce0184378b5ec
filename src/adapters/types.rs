//! Core data types for exchange adapters
//!
//! These types are used across all exchange adapters for consistent
//! ticker, orderbook and balance representation.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

// =============================================================================
// HTTP Client Constants
// =============================================================================

/// HTTP request timeout (seconds)
const HTTP_TIMEOUT_SECS: u64 = 10;
/// HTTP connection timeout (milliseconds), fail fast if host unreachable
const HTTP_CONNECT_TIMEOUT_MS: u64 = 3000;
/// Max idle connections per host in connection pool
const HTTP_POOL_MAX_IDLE: usize = 5;
/// How long idle connections stay in the pool (seconds)
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 60;
/// TCP keepalive interval (seconds)
const HTTP_TCP_KEEPALIVE_SECS: u64 = 30;

/// Create a pooled HTTP client for REST market data
pub fn create_http_client(exchange_name: &str) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .tcp_keepalive(Duration::from_secs(HTTP_TCP_KEEPALIVE_SECS))
        .connect_timeout(Duration::from_millis(HTTP_CONNECT_TIMEOUT_MS))
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    tracing::debug!(
        phase = "init",
        exchange = %exchange_name,
        timeout_s = HTTP_TIMEOUT_SECS,
        connect_timeout_ms = HTTP_CONNECT_TIMEOUT_MS,
        "HTTP client configured"
    );
    client
}

/// Get current timestamp in milliseconds (Unix epoch)
#[inline]
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// =============================================================================
// Ticker
// =============================================================================

/// Last traded price snapshot for a market
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticker {
    /// Last trade price in the market's quote currency
    pub price: f64,
    /// Rolling 24h traded volume in base units
    pub volume: f64,
    /// Exchange timestamp in Unix milliseconds
    pub timestamp: u64,
}

// =============================================================================
// Orderbook Types
// =============================================================================

/// Which side of the book to read
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BookSide {
    /// Sell orders, best (lowest) price first
    Ask,
    /// Buy orders, best (highest) price first
    Bid,
}

impl fmt::Display for BookSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BookSide::Ask => write!(f, "ask"),
            BookSide::Bid => write!(f, "bid"),
        }
    }
}

/// A single level in the orderbook (price + quantity)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderbookLevel {
    /// Price at this level
    pub price: f64,
    /// Quantity available at this price
    pub quantity: f64,
}

impl OrderbookLevel {
    /// Create a new orderbook level
    pub fn new(price: f64, quantity: f64) -> Self {
        Self { price, quantity }
    }
}

/// Orderbook snapshot with bid and ask levels
///
/// Adapters are not required to deliver sorted levels; consumers that
/// depend on ordering call [`Orderbook::sorted_levels`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Orderbook {
    pub bids: Vec<OrderbookLevel>,
    pub asks: Vec<OrderbookLevel>,
    /// Timestamp in Unix milliseconds
    pub timestamp: u64,
}

impl Orderbook {
    /// Create a new empty orderbook
    pub fn new() -> Self {
        Self::default()
    }

    /// Levels of one side ordered best-first: asks ascending, bids descending.
    pub fn sorted_levels(&self, side: BookSide) -> Vec<OrderbookLevel> {
        let mut levels = match side {
            BookSide::Ask => self.asks.clone(),
            BookSide::Bid => self.bids.clone(),
        };
        match side {
            BookSide::Ask => levels.sort_by(|a, b| a.price.total_cmp(&b.price)),
            BookSide::Bid => levels.sort_by(|a, b| b.price.total_cmp(&a.price)),
        }
        levels
    }

    /// Get the best bid price (highest bid)
    pub fn best_bid(&self) -> Option<f64> {
        self.bids.iter().map(|l| l.price).reduce(f64::max)
    }

    /// Get the best ask price (lowest ask)
    pub fn best_ask(&self) -> Option<f64> {
        self.asks.iter().map(|l| l.price).reduce(f64::min)
    }
}

// =============================================================================
// Account Types
// =============================================================================

/// Decrypted API credentials handed to an adapter for private calls
#[derive(Clone)]
pub struct ApiCredentials {
    pub access_key: String,
    pub secret_key: String,
}

impl fmt::Debug for ApiCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiCredentials")
            .field("access_key", &crate::core::events::sanitize(&self.access_key))
            .field("secret_key", &"REDACTED")
            .finish()
    }
}

/// Balance of a single coin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinBalance {
    pub symbol: String,
    pub available: f64,
    pub locked: f64,
}

/// Account balance snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    /// Fiat or stable quote currency code (e.g. "KRW", "USDT")
    pub fiat_currency: String,
    pub fiat_balance: f64,
    pub coin_balances: Vec<CoinBalance>,
}
