//! Exchange adapter trait definition
//!
//! The ExchangeAdapter trait defines the common interface that all
//! exchange back ends must implement. Everything is request/response:
//! the monitor polls on its own schedule instead of holding a stream.

use async_trait::async_trait;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::types::{ApiCredentials, Balance, Orderbook, Ticker};

/// Common trait for all exchange adapters
///
/// # Example Implementation
///
/// ```ignore
/// use async_trait::async_trait;
///
/// struct UpbitAdapter { client: reqwest::Client, base_url: String }
///
/// #[async_trait]
/// impl ExchangeAdapter for UpbitAdapter {
///     async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker> {
///         // GET /v1/ticker?markets=KRW-BTC
///     }
///     // ... other methods
/// }
/// ```
#[async_trait]
pub trait ExchangeAdapter: Send + Sync {
    /// Fetch the latest trade price for a market id (e.g. "KRW-BTC", "BTCUSDT")
    async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker>;

    /// Fetch an orderbook snapshot limited to `depth` levels per side
    async fn get_orderbook(&self, market: &str, depth: usize) -> ExchangeResult<Orderbook>;

    /// Fetch the account balance for the given credentials
    ///
    /// Must return `ExchangeError::Authentication` when the exchange rejects
    /// the credentials, so callers can tell bad keys from outages.
    async fn get_balance(&self, credentials: &ApiCredentials) -> ExchangeResult<Balance>;

    /// Static exchange identifier such as "upbit" or "binance"
    fn exchange_name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::errors::ExchangeError;
    use crate::adapters::test_utils::TestMockAdapter;

    #[tokio::test]
    async fn test_mock_adapter_returns_configured_orderbook() {
        let adapter = TestMockAdapter::new("mock").with_book("KRW-BTC", 100.0, 99.0);
        let ob = adapter.get_orderbook("KRW-BTC", 5).await.unwrap();
        assert_eq!(ob.best_ask(), Some(100.0));
        assert_eq!(ob.best_bid(), Some(99.0));
    }

    #[tokio::test]
    async fn test_mock_adapter_unknown_market() {
        let adapter = TestMockAdapter::new("mock");
        let err = adapter.get_ticker("KRW-DOGE").await.unwrap_err();
        assert!(matches!(err, ExchangeError::UnknownMarket(_)));
    }

    #[tokio::test]
    async fn test_mock_adapter_rejects_credentials() {
        let mut adapter = TestMockAdapter::new("mock");
        adapter.reject_credentials = true;
        let creds = ApiCredentials {
            access_key: "a".into(),
            secret_key: "b".into(),
        };
        let err = adapter.get_balance(&creds).await.unwrap_err();
        assert!(err.is_authentication());
        assert_eq!(adapter.exchange_name(), "mock");
    }
}
