//! Cross-exchange premium ("kimchi premium") calculation
//!
//! # Architecture
//! - `PriceSample`: depth-averaged prices of one coin on one exchange
//! - `PremiumResult`: signed premium of the domestic market over the
//!   FX-converted foreign market
//! - `PremiumCalculator`: builds both from a pair of snapshots
//!
//! Sign convention: a positive premium means the domestic sell price is
//! above the converted foreign buy price (buy abroad, sell at home).

use serde::{Deserialize, Serialize};

use crate::adapters::types::{current_time_ms, BookSide, Orderbook};
use crate::core::vwap::calculate_depth_average;

// =============================================================================
// Core Types
// =============================================================================

/// Averaged prices of one coin on one exchange, for one cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSample {
    pub exchange: String,
    pub symbol: String,
    pub ask_average_price: f64,
    pub bid_average_price: f64,
    pub ask_depth_quantity: f64,
    pub bid_depth_quantity: f64,
    /// Unix ms
    pub timestamp: u64,
}

impl PriceSample {
    /// Average both sides of a snapshot; `None` unless both sides have depth
    pub fn from_orderbook(
        exchange: &str,
        symbol: &str,
        orderbook: &Orderbook,
        depth: usize,
    ) -> Option<Self> {
        let ask = calculate_depth_average(orderbook, BookSide::Ask, depth)?;
        let bid = calculate_depth_average(orderbook, BookSide::Bid, depth)?;
        Some(Self {
            exchange: exchange.to_string(),
            symbol: symbol.to_string(),
            ask_average_price: ask.average_price,
            bid_average_price: bid.average_price,
            ask_depth_quantity: ask.total_quantity,
            bid_depth_quantity: bid.total_quantity,
            timestamp: current_time_ms(),
        })
    }
}

/// Premium of one coin at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PremiumResult {
    pub symbol: String,
    /// Unix ms
    pub timestamp: u64,
    /// Domestic averaged bid, quote currency
    pub sell_side_price: f64,
    /// Foreign averaged ask, foreign currency
    pub buy_side_price_foreign: f64,
    /// Foreign averaged ask converted to the quote currency
    pub buy_side_price_quote: f64,
    pub fx_rate: f64,
    pub premium_percent: f64,
    pub is_positive: bool,
}

/// Signed premium in percent
///
/// `None` when the converted buy price is zero, negative or non-finite,
/// so Infinity/NaN never leave this function.
#[inline]
#[must_use]
pub fn calculate_premium(sell_price_quote: f64, buy_price_foreign: f64, fx_rate: f64) -> Option<f64> {
    let buy_price_quote = buy_price_foreign * fx_rate;
    if !buy_price_quote.is_finite() || buy_price_quote <= 0.0 || !sell_price_quote.is_finite() {
        return None;
    }
    let premium = (sell_price_quote - buy_price_quote) / buy_price_quote * 100.0;
    premium.is_finite().then_some(premium)
}

// =============================================================================
// PremiumCalculator
// =============================================================================

/// Premium calculator for a domestic/foreign exchange pair
#[derive(Debug, Clone)]
pub struct PremiumCalculator {
    /// Domestic exchange id (e.g., "upbit")
    pub domestic_exchange: String,
    /// Foreign exchange id (e.g., "binance")
    pub foreign_exchange: String,
    /// Levels averaged per side
    pub depth: usize,
}

impl PremiumCalculator {
    pub fn new(domestic_exchange: impl Into<String>, foreign_exchange: impl Into<String>, depth: usize) -> Self {
        Self {
            domestic_exchange: domestic_exchange.into(),
            foreign_exchange: foreign_exchange.into(),
            depth,
        }
    }

    /// Average both snapshots of `symbol`
    ///
    /// Returns `(domestic, foreign)` samples, or `None` if either book lacks
    /// depth on a side.
    pub fn sample(
        &self,
        symbol: &str,
        domestic_book: &Orderbook,
        foreign_book: &Orderbook,
    ) -> Option<(PriceSample, PriceSample)> {
        let domestic = PriceSample::from_orderbook(&self.domestic_exchange, symbol, domestic_book, self.depth)?;
        let foreign = PriceSample::from_orderbook(&self.foreign_exchange, symbol, foreign_book, self.depth)?;
        Some((domestic, foreign))
    }

    /// Premium from two samples and an FX rate (foreign -> quote)
    #[must_use]
    pub fn from_samples(
        &self,
        domestic: &PriceSample,
        foreign: &PriceSample,
        fx_rate: f64,
    ) -> Option<PremiumResult> {
        let sell_side_price = domestic.bid_average_price;
        let buy_side_price_foreign = foreign.ask_average_price;
        let premium_percent = calculate_premium(sell_side_price, buy_side_price_foreign, fx_rate)?;

        Some(PremiumResult {
            symbol: domestic.symbol.clone(),
            timestamp: current_time_ms(),
            sell_side_price,
            buy_side_price_foreign,
            buy_side_price_quote: buy_side_price_foreign * fx_rate,
            fx_rate,
            premium_percent,
            is_positive: premium_percent > 0.0,
        })
    }

    /// Snapshots straight to a premium
    #[must_use]
    pub fn calculate(
        &self,
        symbol: &str,
        domestic_book: &Orderbook,
        foreign_book: &Orderbook,
        fx_rate: f64,
    ) -> Option<PremiumResult> {
        let (domestic, foreign) = self.sample(symbol, domestic_book, foreign_book)?;
        self.from_samples(&domestic, &foreign, fx_rate)
    }
}
