//! Exchange adapters for Upbit, Bithumb and Binance
//!
//! This module provides the core abstractions for reading market data
//! from the exchanges over their public REST APIs.

pub mod errors;
pub mod types;
pub mod traits;
pub(crate) mod shared;
pub mod upbit;
pub mod bithumb;
pub mod binance;
pub mod factory;
pub mod registry;

#[cfg(test)]
pub mod test_utils;

// Re-export commonly used types for convenience
pub use errors::{ExchangeError, ExchangeResult};
pub use types::{
    ApiCredentials, Balance, BookSide, CoinBalance, Orderbook, OrderbookLevel, Ticker,
};
pub use traits::ExchangeAdapter;
pub use factory::{create_adapter, create_adapter_from_config, AnyAdapter, SUPPORTED_EXCHANGES};
pub use registry::{ExchangeRegistry, RegisteredExchange};
pub use upbit::{UpbitAdapter, UpbitConfig};
pub use bithumb::{BithumbAdapter, BithumbConfig};
pub use binance::{BinanceAdapter, BinanceConfig};
