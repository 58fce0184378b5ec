//! Upbit public REST adapter (KRW markets)
//!
//! Market ids use Upbit's `QUOTE-BASE` form, e.g. `KRW-BTC`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::get_json;
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{
    create_http_client, ApiCredentials, Balance, Orderbook, OrderbookLevel, Ticker,
};

pub const UPBIT_BASE_URL: &str = "https://api.upbit.com";

/// Upbit orderbook snapshots carry at most 15 units
const UPBIT_MAX_DEPTH: usize = 15;

#[derive(Debug, Clone)]
pub struct UpbitConfig {
    pub base_url: String,
}

impl Default for UpbitConfig {
    fn default() -> Self {
        Self {
            base_url: UPBIT_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct UpbitTicker {
    trade_price: f64,
    acc_trade_volume_24h: f64,
    timestamp: u64,
}

#[derive(Debug, Deserialize)]
struct UpbitOrderbook {
    timestamp: u64,
    orderbook_units: Vec<UpbitOrderbookUnit>,
}

#[derive(Debug, Deserialize)]
struct UpbitOrderbookUnit {
    ask_price: f64,
    bid_price: f64,
    ask_size: f64,
    bid_size: f64,
}

pub struct UpbitAdapter {
    client: reqwest::Client,
    config: UpbitConfig,
}

impl UpbitAdapter {
    pub fn new(config: UpbitConfig) -> Self {
        Self {
            client: create_http_client("upbit"),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Upbit answers 404 with a JSON error for unlisted market codes
    fn map_market_error(market: &str, err: ExchangeError) -> ExchangeError {
        match err {
            ExchangeError::Api { status: 404, .. } => ExchangeError::UnknownMarket(market.to_string()),
            other => other,
        }
    }
}

#[async_trait]
impl ExchangeAdapter for UpbitAdapter {
    async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker> {
        let tickers: Vec<UpbitTicker> = get_json(
            &self.client,
            &self.url("/v1/ticker"),
            &[("markets", market.to_string())],
        )
        .await
        .map_err(|e| Self::map_market_error(market, e))?;

        let ticker = tickers
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::UnknownMarket(market.to_string()))?;

        Ok(Ticker {
            price: ticker.trade_price,
            volume: ticker.acc_trade_volume_24h,
            timestamp: ticker.timestamp,
        })
    }

    async fn get_orderbook(&self, market: &str, depth: usize) -> ExchangeResult<Orderbook> {
        let books: Vec<UpbitOrderbook> = get_json(
            &self.client,
            &self.url("/v1/orderbook"),
            &[("markets", market.to_string())],
        )
        .await
        .map_err(|e| Self::map_market_error(market, e))?;

        let book = books
            .into_iter()
            .next()
            .ok_or_else(|| ExchangeError::UnknownMarket(market.to_string()))?;

        let depth = depth.min(UPBIT_MAX_DEPTH);
        let units = book.orderbook_units.iter().take(depth);
        let (asks, bids): (Vec<_>, Vec<_>) = units
            .map(|u| {
                (
                    OrderbookLevel::new(u.ask_price, u.ask_size),
                    OrderbookLevel::new(u.bid_price, u.bid_size),
                )
            })
            .unzip();

        Ok(Orderbook {
            asks,
            bids,
            timestamp: book.timestamp,
        })
    }

    async fn get_balance(&self, _credentials: &ApiCredentials) -> ExchangeResult<Balance> {
        Err(ExchangeError::Unsupported(
            "upbit balance requires signed requests".to_string(),
        ))
    }

    fn exchange_name(&self) -> &'static str {
        "upbit"
    }
}
