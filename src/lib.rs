//! Kimchi premium arbitrage engine
//!
//! - Public market-data adapters for domestic (KRW) and foreign (USDT) exchanges
//! - Depth-averaged premium calculation and per-scope trading intensity
//! - Scheduled monitoring with a read-model cache
//! - Lock-guarded trade execution state machine (dry-run)

pub mod adapters;
pub mod config;
pub mod core;
pub mod error;
pub mod storage;

pub use error::AppError;
