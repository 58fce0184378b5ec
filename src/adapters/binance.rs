//! Binance spot public REST adapter (USDT markets)
//!
//! Market ids are Binance symbols, e.g. `BTCUSDT`.

use async_trait::async_trait;
use serde::Deserialize;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{get_json, parse_f64};
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{
    create_http_client, current_time_ms, ApiCredentials, Balance, Orderbook, OrderbookLevel,
    Ticker,
};

pub const BINANCE_BASE_URL: &str = "https://api.binance.com";

/// Depth limits accepted by `/api/v3/depth`
const BINANCE_DEPTH_LIMITS: [usize; 8] = [5, 10, 20, 50, 100, 500, 1000, 5000];

/// Binance error code for an unknown symbol
const BINANCE_INVALID_SYMBOL: &str = "-1121";

#[derive(Debug, Clone)]
pub struct BinanceConfig {
    pub base_url: String,
}

impl Default for BinanceConfig {
    fn default() -> Self {
        Self {
            base_url: BINANCE_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinanceTicker {
    last_price: String,
    volume: String,
    close_time: u64,
}

#[derive(Debug, Deserialize)]
struct BinanceDepth {
    bids: Vec<[String; 2]>,
    asks: Vec<[String; 2]>,
}

pub struct BinanceAdapter {
    client: reqwest::Client,
    config: BinanceConfig,
}

impl BinanceAdapter {
    pub fn new(config: BinanceConfig) -> Self {
        Self {
            client: create_http_client("binance"),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn map_market_error(market: &str, err: ExchangeError) -> ExchangeError {
        match err {
            ExchangeError::Api { status: 400, ref message } if message.contains(BINANCE_INVALID_SYMBOL) => {
                ExchangeError::UnknownMarket(market.to_string())
            }
            other => other,
        }
    }
}

/// Smallest accepted depth limit that covers the requested depth
fn depth_limit(depth: usize) -> usize {
    BINANCE_DEPTH_LIMITS
        .iter()
        .copied()
        .find(|&limit| limit >= depth)
        .unwrap_or(BINANCE_DEPTH_LIMITS[BINANCE_DEPTH_LIMITS.len() - 1])
}

fn parse_levels(raw: &[[String; 2]], depth: usize) -> ExchangeResult<Vec<OrderbookLevel>> {
    raw.iter()
        .take(depth)
        .map(|[price, qty]| {
            Ok(OrderbookLevel::new(
                parse_f64("price", price)?,
                parse_f64("quantity", qty)?,
            ))
        })
        .collect()
}

#[async_trait]
impl ExchangeAdapter for BinanceAdapter {
    async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker> {
        let ticker: BinanceTicker = get_json(
            &self.client,
            &self.url("/api/v3/ticker/24hr"),
            &[("symbol", market.to_string())],
        )
        .await
        .map_err(|e| Self::map_market_error(market, e))?;

        Ok(Ticker {
            price: parse_f64("lastPrice", &ticker.last_price)?,
            volume: parse_f64("volume", &ticker.volume)?,
            timestamp: ticker.close_time,
        })
    }

    async fn get_orderbook(&self, market: &str, depth: usize) -> ExchangeResult<Orderbook> {
        let raw: BinanceDepth = get_json(
            &self.client,
            &self.url("/api/v3/depth"),
            &[
                ("symbol", market.to_string()),
                ("limit", depth_limit(depth).to_string()),
            ],
        )
        .await
        .map_err(|e| Self::map_market_error(market, e))?;

        Ok(Orderbook {
            asks: parse_levels(&raw.asks, depth)?,
            bids: parse_levels(&raw.bids, depth)?,
            timestamp: current_time_ms(),
        })
    }

    async fn get_balance(&self, _credentials: &ApiCredentials) -> ExchangeResult<Balance> {
        Err(ExchangeError::Unsupported(
            "binance balance requires signed requests".to_string(),
        ))
    }

    fn exchange_name(&self) -> &'static str {
        "binance"
    }
}
