//! Configuration module for engine settings and YAML loading
//!
//! This module provides:
//! - Configuration types (`AppConfig`, `MonitoringConfig`, `ExchangeConfig`, `CoinMapping`)
//! - YAML loading functionality (`load_config`)
//! - Typed bot settings decoded from the settings store (`BotSettings`)
//! - Application constants with environment variable overrides

pub mod constants;
pub mod logging;
mod loader;
pub mod settings;
pub mod supabase;
pub(crate) mod types;

// Re-export types
pub use types::{
    AppConfig, CoinMapping, ExchangeConfig, ExchangeKind, ExchangeRole, FxConfig,
    MonitoringConfig, TradingConfig,
};
pub use settings::{BotSettings, RawSettings, SettingsError};
pub use supabase::{SupabaseConfig, SupabaseConfigError};

// Re-export loader functions
pub use loader::{load_config, load_config_from_str};
