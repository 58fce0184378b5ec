//! Foreign -> domestic currency conversion rate
//!
//! # Architecture
//! - `FxRateSource`: where a rate comes from (`FixedFxRate`, `MarketFxRate`)
//! - `FxRateCache`: keeps the last good rate so one failed fetch does not
//!   blank a whole monitoring cycle
//!
//! Rates that are not finite and strictly positive are rejected.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::adapters::{ExchangeAdapter, ExchangeError, ExchangeRegistry, ExchangeResult};
use crate::config::constants::fx_rate_max_age;
use crate::config::FxConfig;
use crate::error::AppError;

/// Rate change threshold for WARN logging (5%)
const RATE_CHANGE_WARN_THRESHOLD: f64 = 0.05;

fn is_valid_rate(rate: f64) -> bool {
    rate.is_finite() && rate > 0.0
}

// =============================================================================
// Sources
// =============================================================================

#[async_trait]
pub trait FxRateSource: Send + Sync {
    /// Units of quote currency per unit of foreign currency
    async fn fetch_rate(&self) -> ExchangeResult<f64>;

    /// Human readable origin for logs
    fn describe(&self) -> String;
}

/// Constant rate
#[derive(Debug, Clone, Copy)]
pub struct FixedFxRate(pub f64);

#[async_trait]
impl FxRateSource for FixedFxRate {
    async fn fetch_rate(&self) -> ExchangeResult<f64> {
        Ok(self.0)
    }

    fn describe(&self) -> String {
        format!("fixed:{}", self.0)
    }
}

/// Last traded price of a domestic market quoted in the foreign currency
/// (e.g. Upbit `KRW-USDT`)
pub struct MarketFxRate {
    adapter: Arc<dyn ExchangeAdapter>,
    market: String,
}

impl MarketFxRate {
    pub fn new(adapter: Arc<dyn ExchangeAdapter>, market: impl Into<String>) -> Self {
        Self {
            adapter,
            market: market.into(),
        }
    }
}

#[async_trait]
impl FxRateSource for MarketFxRate {
    async fn fetch_rate(&self) -> ExchangeResult<f64> {
        Ok(self.adapter.get_ticker(&self.market).await?.price)
    }

    fn describe(&self) -> String {
        format!("{}:{}", self.adapter.exchange_name(), self.market)
    }
}

/// Build the configured source
pub fn fx_source_from_config(
    config: &FxConfig,
    registry: &ExchangeRegistry,
) -> Result<Arc<dyn FxRateSource>, AppError> {
    match config {
        FxConfig::Fixed { rate } => Ok(Arc::new(FixedFxRate(*rate))),
        FxConfig::Market { exchange, market } => {
            let adapter = registry.adapter(exchange).ok_or_else(|| {
                AppError::Config(format!("fx.exchange '{}' is not registered", exchange))
            })?;
            Ok(Arc::new(MarketFxRate::new(adapter, market.clone())))
        }
    }
}

// =============================================================================
// FxRateCache
// =============================================================================

#[derive(Debug, Clone, Copy)]
struct CachedRate {
    rate: f64,
    fetched_at: Instant,
}

/// Last-good-rate cache in front of a source
pub struct FxRateCache {
    source: Arc<dyn FxRateSource>,
    last: RwLock<Option<CachedRate>>,
}

impl FxRateCache {
    pub fn new(source: Arc<dyn FxRateSource>) -> Self {
        Self {
            source,
            last: RwLock::new(None),
        }
    }

    /// Last accepted rate without fetching
    pub async fn cached_rate(&self) -> Option<f64> {
        self.last.read().await.map(|c| c.rate)
    }

    /// Fetch a fresh rate, falling back to the last good one
    ///
    /// Returns `Err` only when the fetch fails (or yields an invalid rate)
    /// and no earlier rate was ever accepted.
    pub async fn current_rate(&self) -> ExchangeResult<f64> {
        let fetched = self.source.fetch_rate().await.and_then(|rate| {
            if is_valid_rate(rate) {
                Ok(rate)
            } else {
                Err(ExchangeError::InvalidResponse(format!("FX rate rejected: {}", rate)))
            }
        });

        match fetched {
            Ok(rate) => {
                let mut last = self.last.write().await;
                if let Some(previous) = *last {
                    let change = ((rate - previous.rate) / previous.rate).abs();
                    if change > RATE_CHANGE_WARN_THRESHOLD {
                        tracing::warn!(
                            source = %self.source.describe(),
                            old_rate = %format!("{:.4}", previous.rate),
                            new_rate = %format!("{:.4}", rate),
                            change_pct = %format!("{:.2}%", change * 100.0),
                            "FX rate significant change detected"
                        );
                    }
                }
                *last = Some(CachedRate {
                    rate,
                    fetched_at: Instant::now(),
                });
                Ok(rate)
            }
            Err(e) => {
                let last = *self.last.read().await;
                match last {
                    Some(cached) => {
                        let age = cached.fetched_at.elapsed();
                        if age > fx_rate_max_age() {
                            tracing::warn!(
                                source = %self.source.describe(),
                                age_secs = age.as_secs(),
                                error = %e,
                                "FX fetch failed, using stale rate"
                            );
                        } else {
                            tracing::debug!(
                                source = %self.source.describe(),
                                error = %e,
                                "FX fetch failed, using last good rate"
                            );
                        }
                        Ok(cached.rate)
                    }
                    None => Err(e),
                }
            }
        }
    }
}
