//! Configuration types for the monitor and the trade executor
//!
//! This module defines all configuration structs that are loaded from YAML
//! once at startup. The coin basket and exchange table are immutable for
//! the lifetime of a run.

use serde::{Deserialize, Serialize};

use crate::config::settings::BotSettings;
use crate::error::AppError;

// ============================================================================
// Enums
// ============================================================================

/// Supported exchange back ends
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeKind {
    Upbit,
    Bithumb,
    Binance,
}

impl std::fmt::Display for ExchangeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExchangeKind::Upbit => write!(f, "upbit"),
            ExchangeKind::Bithumb => write!(f, "bithumb"),
            ExchangeKind::Binance => write!(f, "binance"),
        }
    }
}

/// Which side of the premium an exchange sits on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeRole {
    /// Quotes in the local currency (KRW)
    Domestic,
    /// Quotes in a foreign currency (USD/USDT)
    Foreign,
}

// ============================================================================
// Configuration Structs
// ============================================================================

fn default_true() -> bool {
    true
}

/// One exchange back end
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExchangeConfig {
    /// Identifier used everywhere else (e.g. "upbit")
    pub id: String,
    pub kind: ExchangeKind,
    pub role: ExchangeRole,
    #[serde(default = "default_true")]
    pub active: bool,
    /// Override of the public REST endpoint
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Market ids of one coin on both sides of the premium
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CoinMapping {
    /// Coin symbol (e.g. "BTC")
    pub symbol: String,
    /// Market id on the domestic exchange (e.g. "KRW-BTC")
    pub domestic_market: String,
    /// Market id on the foreign exchange (e.g. "BTCUSDT")
    pub foreign_market: String,
    /// Withdrawal fee charged in coin units when moving between exchanges
    #[serde(default)]
    pub withdrawal_fee: f64,
    /// Whether the coin may be traded
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Scheduler and read-model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitoringConfig {
    /// Exchange id quoted in the local currency
    pub domestic_exchange: String,
    /// Exchange id quoted in the foreign currency
    pub foreign_exchange: String,
    #[serde(default = "MonitoringConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// Order book levels averaged per side
    #[serde(default = "MonitoringConfig::default_orderbook_depth")]
    pub orderbook_depth: usize,
    #[serde(default = "MonitoringConfig::default_cache_ttl_secs")]
    pub premium_ttl_secs: u64,
    #[serde(default = "MonitoringConfig::default_cache_ttl_secs")]
    pub summary_ttl_secs: u64,
    /// Capacity of the recent-opportunities ring
    #[serde(default = "MonitoringConfig::default_opportunity_history")]
    pub opportunity_history: usize,
}

impl MonitoringConfig {
    fn default_interval_secs() -> u64 {
        60
    }
    fn default_orderbook_depth() -> usize {
        5
    }
    fn default_cache_ttl_secs() -> u64 {
        300
    }
    fn default_opportunity_history() -> usize {
        100
    }
}

/// Source of the foreign -> domestic conversion rate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "source", rename_all = "lowercase")]
pub enum FxConfig {
    /// Constant rate (tests, offline runs)
    Fixed { rate: f64 },
    /// Last price of a market on a configured exchange (e.g. upbit KRW-USDT)
    Market { exchange: String, market: String },
}

/// Trading defaults and execution tunables
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// |premium| in percent that counts as a qualifying observation
    pub premium_threshold: f64,
    /// Intensity at which a trading opportunity fires
    pub trading_intensity_threshold: u32,
    pub min_trade_amount: f64,
    pub max_trade_amount: f64,
    /// Taker fee rate applied to each leg (0.0025 = 0.25%)
    #[serde(default = "TradingConfig::default_fee_rate")]
    pub fee_rate: f64,
    /// Unfavourable price buffer applied to both legs (0.001 = 0.1%)
    #[serde(default = "TradingConfig::default_slippage_rate")]
    pub slippage_rate: f64,
    /// Execution lock lifetime
    #[serde(default = "TradingConfig::default_lock_ttl_secs")]
    pub lock_ttl_secs: u64,
    /// Simulated duration of each dry-run phase
    #[serde(default = "TradingConfig::default_dry_run_step_delay_ms")]
    pub dry_run_step_delay_ms: u64,
}

impl TradingConfig {
    fn default_fee_rate() -> f64 {
        0.0025
    }
    fn default_slippage_rate() -> f64 {
        0.001
    }
    fn default_lock_ttl_secs() -> u64 {
        300
    }
    fn default_dry_run_step_delay_ms() -> u64 {
        500
    }

    /// Global-scope bot settings derived from this section
    pub fn default_bot_settings(&self, monitoring_interval_secs: u64) -> BotSettings {
        BotSettings {
            premium_threshold: self.premium_threshold,
            trading_intensity_threshold: self.trading_intensity_threshold,
            min_trade_amount: self.min_trade_amount,
            max_trade_amount: self.max_trade_amount,
            enabled: true,
            monitoring_interval_secs,
        }
    }
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            premium_threshold: 2.0,
            trading_intensity_threshold: 5,
            min_trade_amount: 10_000.0,
            max_trade_amount: 10_000_000.0,
            fee_rate: Self::default_fee_rate(),
            slippage_rate: Self::default_slippage_rate(),
            lock_ttl_secs: Self::default_lock_ttl_secs(),
            dry_run_step_delay_ms: Self::default_dry_run_step_delay_ms(),
        }
    }
}

/// Root application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub monitoring: MonitoringConfig,
    pub exchanges: Vec<ExchangeConfig>,
    pub coins: Vec<CoinMapping>,
    pub fx: FxConfig,
    #[serde(default)]
    pub trading: TradingConfig,
}

impl AppConfig {
    pub fn exchange(&self, id: &str) -> Option<&ExchangeConfig> {
        self.exchanges.iter().find(|e| e.id == id)
    }

    pub fn coin(&self, symbol: &str) -> Option<&CoinMapping> {
        self.coins.iter().find(|c| c.symbol == symbol)
    }

    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.coins.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one coin".to_string(),
            ));
        }

        for (i, coin) in self.coins.iter().enumerate() {
            if coin.symbol.trim().is_empty() {
                return Err(AppError::Config(format!("Coin #{}: symbol cannot be empty", i)));
            }
            if self.coins[..i].iter().any(|c| c.symbol == coin.symbol) {
                return Err(AppError::Config(format!(
                    "Coin '{}' is listed more than once",
                    coin.symbol
                )));
            }
            if coin.withdrawal_fee < 0.0 {
                return Err(AppError::Config(format!(
                    "Coin '{}': withdrawal_fee must be >= 0 (got {})",
                    coin.symbol, coin.withdrawal_fee
                )));
            }
        }

        let m = &self.monitoring;
        if m.domestic_exchange == m.foreign_exchange {
            return Err(AppError::Config(format!(
                "domestic_exchange and foreign_exchange cannot be the same (both are {})",
                m.domestic_exchange
            )));
        }
        self.check_exchange_role(&m.domestic_exchange, ExchangeRole::Domestic)?;
        self.check_exchange_role(&m.foreign_exchange, ExchangeRole::Foreign)?;

        if m.interval_secs == 0 {
            return Err(AppError::Config("monitoring.interval_secs must be > 0".to_string()));
        }
        if m.orderbook_depth == 0 {
            return Err(AppError::Config("monitoring.orderbook_depth must be > 0".to_string()));
        }
        if m.opportunity_history == 0 {
            return Err(AppError::Config(
                "monitoring.opportunity_history must be > 0".to_string(),
            ));
        }

        match &self.fx {
            FxConfig::Fixed { rate } if !(rate.is_finite() && *rate > 0.0) => {
                return Err(AppError::Config(format!("fx.rate must be > 0 (got {})", rate)));
            }
            FxConfig::Market { exchange, .. } if self.exchange(exchange).is_none() => {
                return Err(AppError::Config(format!(
                    "fx.exchange '{}' is not a configured exchange",
                    exchange
                )));
            }
            _ => {}
        }

        let t = &self.trading;
        self.trading
            .default_bot_settings(m.interval_secs)
            .validate()
            .map_err(|e| AppError::Config(format!("trading: {}", e)))?;
        if !(0.0..1.0).contains(&t.fee_rate) {
            return Err(AppError::Config(format!(
                "trading.fee_rate must be in [0, 1) (got {})",
                t.fee_rate
            )));
        }
        if !(0.0..1.0).contains(&t.slippage_rate) {
            return Err(AppError::Config(format!(
                "trading.slippage_rate must be in [0, 1) (got {})",
                t.slippage_rate
            )));
        }
        if t.lock_ttl_secs == 0 {
            return Err(AppError::Config("trading.lock_ttl_secs must be > 0".to_string()));
        }

        Ok(())
    }

    fn check_exchange_role(&self, id: &str, role: ExchangeRole) -> Result<(), AppError> {
        match self.exchange(id) {
            None => Err(AppError::Config(format!("Exchange '{}' is not configured", id))),
            Some(ex) if ex.role != role => Err(AppError::Config(format!(
                "Exchange '{}' must have role {:?} (got {:?})",
                id, role, ex.role
            ))),
            Some(_) => Ok(()),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
