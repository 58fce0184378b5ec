//! Application-wide error types using thiserror
//!
//! Layer errors (exchange, storage, settings) convert into AppError so the
//! binary and the library entry points share one error type.

use thiserror::Error;

use crate::adapters::errors::ExchangeError;
use crate::config::SettingsError;
use crate::core::monitoring::MonitorError;
use crate::storage::StorageError;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Exchange error: {0}")]
    Exchange(#[from] ExchangeError),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Monitor error: {0}")]
    Monitor(#[from] MonitorError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
