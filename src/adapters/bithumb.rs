//! Bithumb public REST adapter (KRW markets)
//!
//! Market ids use Bithumb's `BASE_QUOTE` form, e.g. `BTC_KRW`.
//! Bithumb reports most failures with HTTP 200 and a non-"0000" status.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{get_json, parse_f64};
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{
    create_http_client, current_time_ms, ApiCredentials, Balance, Orderbook, OrderbookLevel,
    Ticker,
};

pub const BITHUMB_BASE_URL: &str = "https://api.bithumb.com";

const BITHUMB_OK: &str = "0000";
const BITHUMB_MAX_DEPTH: usize = 30;

#[derive(Debug, Clone)]
pub struct BithumbConfig {
    pub base_url: String,
}

impl Default for BithumbConfig {
    fn default() -> Self {
        Self {
            base_url: BITHUMB_BASE_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct BithumbEnvelope<T> {
    status: String,
    #[serde(default)]
    message: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct BithumbTicker {
    closing_price: String,
    #[serde(rename = "units_traded_24H")]
    units_traded_24h: String,
    date: String,
}

#[derive(Debug, Deserialize)]
struct BithumbOrderbook {
    timestamp: String,
    bids: Vec<BithumbLevel>,
    asks: Vec<BithumbLevel>,
}

#[derive(Debug, Deserialize)]
struct BithumbLevel {
    price: String,
    quantity: String,
}

pub struct BithumbAdapter {
    client: reqwest::Client,
    config: BithumbConfig,
}

impl BithumbAdapter {
    pub fn new(config: BithumbConfig) -> Self {
        Self {
            client: create_http_client("bithumb"),
            config,
        }
    }

    async fn fetch<T: DeserializeOwned>(
        &self,
        path: &str,
        market: &str,
        query: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = format!("{}{}", self.config.base_url.trim_end_matches('/'), path);
        let envelope: BithumbEnvelope<T> = get_json(&self.client, &url, query).await?;

        if envelope.status != BITHUMB_OK {
            let message = envelope.message.unwrap_or_default();
            // 5500 "Invalid Parameter" / 5600 "... not found" are both unlisted markets
            return Err(match envelope.status.as_str() {
                "5500" | "5600" => ExchangeError::UnknownMarket(market.to_string()),
                status => ExchangeError::Api {
                    status: status.parse().unwrap_or(0),
                    message,
                },
            });
        }

        envelope
            .data
            .ok_or_else(|| ExchangeError::InvalidResponse("missing data field".to_string()))
    }
}

fn parse_levels(raw: &[BithumbLevel], depth: usize) -> ExchangeResult<Vec<OrderbookLevel>> {
    raw.iter()
        .take(depth)
        .map(|l| {
            Ok(OrderbookLevel::new(
                parse_f64("price", &l.price)?,
                parse_f64("quantity", &l.quantity)?,
            ))
        })
        .collect()
}

#[async_trait]
impl ExchangeAdapter for BithumbAdapter {
    async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker> {
        let ticker: BithumbTicker = self
            .fetch(&format!("/public/ticker/{}", market), market, &[])
            .await?;

        Ok(Ticker {
            price: parse_f64("closing_price", &ticker.closing_price)?,
            volume: parse_f64("units_traded_24H", &ticker.units_traded_24h)?,
            timestamp: ticker.date.parse().unwrap_or_else(|_| current_time_ms()),
        })
    }

    async fn get_orderbook(&self, market: &str, depth: usize) -> ExchangeResult<Orderbook> {
        let depth = depth.clamp(1, BITHUMB_MAX_DEPTH);
        let book: BithumbOrderbook = self
            .fetch(
                &format!("/public/orderbook/{}", market),
                market,
                &[("count", depth.to_string())],
            )
            .await?;

        Ok(Orderbook {
            asks: parse_levels(&book.asks, depth)?,
            bids: parse_levels(&book.bids, depth)?,
            timestamp: book.timestamp.parse().unwrap_or_else(|_| current_time_ms()),
        })
    }

    async fn get_balance(&self, _credentials: &ApiCredentials) -> ExchangeResult<Balance> {
        Err(ExchangeError::Unsupported(
            "bithumb balance requires signed requests".to_string(),
        ))
    }

    fn exchange_name(&self) -> &'static str {
        "bithumb"
    }
}
