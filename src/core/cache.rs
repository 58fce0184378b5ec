//! Read model written by the monitor and read by dashboards
//!
//! Latest premium per symbol and latest cycle summary expire after their
//! TTL (expired entries read as absent). Intensity snapshots are replaced
//! every cycle and only cover the scopes that cycle processed.
//! Opportunities live in a bounded ring, newest first.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tokio::time::Instant;

use crate::core::channels::TradingOpportunity;
use crate::core::intensity::{IntensityState, Scope};
use crate::core::premium::PremiumResult;

/// Premium of one coin inside a cycle summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoinPremium {
    pub symbol: String,
    pub premium_percent: f64,
    /// Last traded price on the domestic market (KRW), if the ticker answered
    pub domestic_last_price: Option<f64>,
    /// Last traded price on the foreign market (USDT), if the ticker answered
    pub foreign_last_price: Option<f64>,
}

/// Outcome of one monitoring cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleSummary {
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub total_coins: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// FX rate used, `None` if no rate was available
    pub fx_rate: Option<f64>,
    pub premiums: Vec<CoinPremium>,
    /// Opportunities emitted across all scopes
    pub opportunities: usize,
    /// User scopes processed in the per-user pass
    pub users_processed: usize,
}

struct Expiring<T> {
    value: T,
    stored_at: Instant,
}

#[derive(Default)]
struct CacheInner {
    premiums: HashMap<String, Expiring<PremiumResult>>,
    summary: Option<Expiring<CycleSummary>>,
    intensities: HashMap<Scope, Vec<IntensityState>>,
    opportunities: VecDeque<TradingOpportunity>,
}

pub struct ResultCache {
    premium_ttl: Duration,
    summary_ttl: Duration,
    history_capacity: usize,
    inner: RwLock<CacheInner>,
}

impl ResultCache {
    pub fn new(premium_ttl: Duration, summary_ttl: Duration, history_capacity: usize) -> Self {
        Self {
            premium_ttl,
            summary_ttl,
            history_capacity,
            inner: RwLock::new(CacheInner::default()),
        }
    }

    pub async fn put_premium(&self, result: PremiumResult) {
        let mut inner = self.inner.write().await;
        inner.premiums.insert(
            result.symbol.clone(),
            Expiring {
                value: result,
                stored_at: Instant::now(),
            },
        );
    }

    pub async fn premium(&self, symbol: &str) -> Option<PremiumResult> {
        let inner = self.inner.read().await;
        inner
            .premiums
            .get(symbol)
            .filter(|e| e.stored_at.elapsed() < self.premium_ttl)
            .map(|e| e.value.clone())
    }

    /// Unexpired premiums, ordered by symbol
    pub async fn premiums(&self) -> Vec<PremiumResult> {
        let inner = self.inner.read().await;
        let mut live: Vec<PremiumResult> = inner
            .premiums
            .values()
            .filter(|e| e.stored_at.elapsed() < self.premium_ttl)
            .map(|e| e.value.clone())
            .collect();
        live.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        live
    }

    pub async fn put_summary(&self, summary: CycleSummary) {
        self.inner.write().await.summary = Some(Expiring {
            value: summary,
            stored_at: Instant::now(),
        });
    }

    pub async fn summary(&self) -> Option<CycleSummary> {
        let inner = self.inner.read().await;
        inner
            .summary
            .as_ref()
            .filter(|e| e.stored_at.elapsed() < self.summary_ttl)
            .map(|e| e.value.clone())
    }

    pub async fn put_intensities(&self, scope: Scope, states: Vec<IntensityState>) {
        self.inner.write().await.intensities.insert(scope, states);
    }

    /// Drop snapshots of scopes not in `processed`
    pub async fn retain_intensity_scopes(&self, processed: &HashSet<Scope>) {
        self.inner
            .write()
            .await
            .intensities
            .retain(|scope, _| processed.contains(scope));
    }

    /// Intensity snapshots of the scopes still tracked, global first
    pub async fn intensities(&self) -> Vec<(Scope, Vec<IntensityState>)> {
        let inner = self.inner.read().await;
        let mut all: Vec<(Scope, Vec<IntensityState>)> = inner
            .intensities
            .iter()
            .map(|(scope, states)| (scope.clone(), states.clone()))
            .collect();
        all.sort_by(|a, b| a.0.cmp(&b.0));
        all
    }

    /// Record an opportunity, evicting the oldest beyond capacity
    pub async fn push_opportunity(&self, opportunity: TradingOpportunity) {
        let mut inner = self.inner.write().await;
        inner.opportunities.push_front(opportunity);
        inner.opportunities.truncate(self.history_capacity);
    }

    /// Recent opportunities, newest first
    pub async fn opportunities(&self) -> Vec<TradingOpportunity> {
        self.inner.read().await.opportunities.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn premium(symbol: &str, p: f64) -> PremiumResult {
        PremiumResult {
            symbol: symbol.to_string(),
            timestamp: 0,
            sell_side_price: 100.0,
            buy_side_price_foreign: 1.0,
            buy_side_price_quote: 100.0,
            fx_rate: 100.0,
            premium_percent: p,
            is_positive: p > 0.0,
        }
    }

    fn opportunity(i: u32) -> TradingOpportunity {
        TradingOpportunity {
            symbol: "BTC".to_string(),
            scope: "global".to_string(),
            premium_percent: 3.0,
            intensity: i,
            timestamp: i as u64,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_premium_expires_after_ttl() {
        let cache = ResultCache::new(Duration::from_secs(300), Duration::from_secs(300), 100);
        cache.put_premium(premium("BTC", 3.0)).await;
        assert!(cache.premium("BTC").await.is_some());

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.premium("BTC").await.is_none());
        assert!(cache.premiums().await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_expires_after_ttl() {
        let cache = ResultCache::new(Duration::from_secs(300), Duration::from_secs(10), 100);
        cache
            .put_summary(CycleSummary {
                started_at: Utc::now(),
                duration_ms: 5,
                total_coins: 2,
                succeeded: 2,
                failed: 0,
                fx_rate: Some(1500.0),
                premiums: vec![],
                opportunities: 0,
                users_processed: 0,
            })
            .await;
        assert_eq!(cache.summary().await.map(|s| s.total_coins), Some(2));
        tokio::time::advance(Duration::from_secs(11)).await;
        assert!(cache.summary().await.is_none());
    }

    #[tokio::test]
    async fn test_opportunity_ring_is_bounded_newest_first() {
        let cache = ResultCache::new(Duration::from_secs(1), Duration::from_secs(1), 100);
        for i in 0..150 {
            cache.push_opportunity(opportunity(i)).await;
        }
        let recent = cache.opportunities().await;
        assert_eq!(recent.len(), 100);
        assert_eq!(recent[0].intensity, 149);
        assert_eq!(recent[99].intensity, 50);
    }

    #[tokio::test]
    async fn test_unprocessed_scopes_are_dropped() {
        let cache = ResultCache::new(Duration::from_secs(60), Duration::from_secs(60), 10);
        let alice = Scope::User("alice".to_string());
        cache.put_intensities(Scope::Global, vec![]).await;
        cache.put_intensities(alice.clone(), vec![]).await;
        assert_eq!(cache.intensities().await.len(), 2);

        cache.retain_intensity_scopes(&HashSet::from([Scope::Global])).await;
        let left = cache.intensities().await;
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].0, Scope::Global);
    }

    #[tokio::test]
    async fn test_premiums_sorted_by_symbol() {
        let cache = ResultCache::new(Duration::from_secs(60), Duration::from_secs(60), 10);
        cache.put_premium(premium("XRP", 1.0)).await;
        cache.put_premium(premium("BTC", 2.0)).await;
        cache.put_premium(premium("BTC", 2.5)).await;
        let all = cache.premiums().await;
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].symbol, "BTC");
        assert_eq!(all[0].premium_percent, 2.5);
    }
}
