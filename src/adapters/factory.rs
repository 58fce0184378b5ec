//! Adapter factory for config-driven exchange selection
//!
//! Creates `ExchangeAdapter` instances from the `exchanges` table of the
//! YAML config. Uses an enum-based dispatch so the concrete adapters stay
//! monomorphized behind a single type.

use async_trait::async_trait;

use crate::adapters::binance::{BinanceAdapter, BinanceConfig};
use crate::adapters::bithumb::{BithumbAdapter, BithumbConfig};
use crate::adapters::errors::ExchangeResult;
use crate::adapters::traits::ExchangeAdapter;
use crate::adapters::types::{ApiCredentials, Balance, Orderbook, Ticker};
use crate::adapters::upbit::{UpbitAdapter, UpbitConfig};
use crate::config::{ExchangeConfig, ExchangeKind};

// =============================================================================
// AnyAdapter - enum-based dispatch for configured exchanges
// =============================================================================

/// Enum wrapping all concrete adapter types for runtime dispatch.
pub enum AnyAdapter {
    Upbit(UpbitAdapter),
    Bithumb(BithumbAdapter),
    Binance(BinanceAdapter),
}

/// Macro to reduce boilerplate for delegating trait methods
macro_rules! delegate {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyAdapter::Upbit(a) => a.$method($($arg),*),
            AnyAdapter::Bithumb(a) => a.$method($($arg),*),
            AnyAdapter::Binance(a) => a.$method($($arg),*),
        }
    };
    (await $self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyAdapter::Upbit(a) => a.$method($($arg),*).await,
            AnyAdapter::Bithumb(a) => a.$method($($arg),*).await,
            AnyAdapter::Binance(a) => a.$method($($arg),*).await,
        }
    };
}

#[async_trait]
impl ExchangeAdapter for AnyAdapter {
    async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker> {
        delegate!(await self, get_ticker(market))
    }

    async fn get_orderbook(&self, market: &str, depth: usize) -> ExchangeResult<Orderbook> {
        delegate!(await self, get_orderbook(market, depth))
    }

    async fn get_balance(&self, credentials: &ApiCredentials) -> ExchangeResult<Balance> {
        delegate!(await self, get_balance(credentials))
    }

    fn exchange_name(&self) -> &'static str {
        delegate!(self, exchange_name())
    }
}

// =============================================================================
// Factory Functions
// =============================================================================

/// All supported exchange kinds.
pub const SUPPORTED_EXCHANGES: &[ExchangeKind] =
    &[ExchangeKind::Upbit, ExchangeKind::Bithumb, ExchangeKind::Binance];

/// Create an adapter for an exchange kind, optionally pointing at another base URL.
pub fn create_adapter(kind: ExchangeKind, base_url: Option<&str>) -> AnyAdapter {
    match kind {
        ExchangeKind::Upbit => {
            let mut config = UpbitConfig::default();
            if let Some(url) = base_url {
                config.base_url = url.to_string();
            }
            AnyAdapter::Upbit(UpbitAdapter::new(config))
        }
        ExchangeKind::Bithumb => {
            let mut config = BithumbConfig::default();
            if let Some(url) = base_url {
                config.base_url = url.to_string();
            }
            AnyAdapter::Bithumb(BithumbAdapter::new(config))
        }
        ExchangeKind::Binance => {
            let mut config = BinanceConfig::default();
            if let Some(url) = base_url {
                config.base_url = url.to_string();
            }
            AnyAdapter::Binance(BinanceAdapter::new(config))
        }
    }
}

/// Create an adapter from one `exchanges` entry of the config.
pub fn create_adapter_from_config(config: &ExchangeConfig) -> AnyAdapter {
    create_adapter(config.kind, config.base_url.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ExchangeRole;

    #[test]
    fn test_create_adapter_matches_kind() {
        for kind in SUPPORTED_EXCHANGES {
            let adapter = create_adapter(*kind, None);
            assert_eq!(adapter.exchange_name(), kind.to_string());
        }
    }

    #[tokio::test]
    async fn test_base_url_override_is_used() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v1/ticker")
            .match_query(mockito::Matcher::Any)
            .with_status(200)
            .with_body(r#"[{"trade_price":1.0,"acc_trade_volume_24h":2.0,"timestamp":3}]"#)
            .create_async()
            .await;

        let config = ExchangeConfig {
            id: "upbit".to_string(),
            kind: ExchangeKind::Upbit,
            role: ExchangeRole::Domestic,
            active: true,
            base_url: Some(server.url()),
        };
        let adapter = create_adapter_from_config(&config);
        let ticker = adapter.get_ticker("KRW-BTC").await.unwrap();
        assert_eq!(ticker.price, 1.0);
        mock.assert_async().await;
    }
}
