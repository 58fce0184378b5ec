//! Core module - premium, intensity, monitoring, trade execution
//!
//! # Module Architecture
//!
//! This module uses **explicit re-exports** instead of glob exports (`pub use module::*`)
//! to provide better API visibility and prevent accidental public API changes.
//!
//! ## Usage
//! Prefer importing from `crate::core`:
//! ```ignore
//! use crate::core::{MonitoringService, PremiumCalculator, TradeExecutor};
//! ```
//!
//! ## Adding New Public Types
//! When adding new public types to submodules, explicitly add them to the
//! re-exports below to make them part of the public API.

pub mod cache;
pub mod channels;
pub mod events;
pub mod execution;
pub mod fx;
pub mod intensity;
pub mod lock;
pub mod monitoring;
pub mod premium;
pub mod state;
pub mod vwap;

// Explicit re-exports for vwap module
pub use vwap::{calculate_depth_average, DepthAverage, DEFAULT_DEPTH};

// Explicit re-exports for premium module
pub use premium::{calculate_premium, PremiumCalculator, PremiumResult, PriceSample};

// Explicit re-exports for fx module
pub use fx::{fx_source_from_config, FixedFxRate, FxRateCache, FxRateSource, MarketFxRate};

// Explicit re-exports for intensity module
pub use intensity::{
    next_intensity, IntensityAccumulator, IntensityState, IntensityThresholds, IntensityUpdate, Scope,
};

// Explicit re-exports for state module
pub use state::{ProfitBreakdown, StateError, TradeRecord, TradeStatus};

// Explicit re-exports for cache module
pub use cache::{CoinPremium, CycleSummary, ResultCache};

// Explicit re-exports for channels module
pub use channels::{ChannelBundle, TradingOpportunity, DEFAULT_CHANNEL_CAPACITY};

// Explicit re-exports for events module
pub use events::{log_event, sanitize, SanitizedValue, TradingEvent, TradingEventType};

// Explicit re-exports for lock module
pub use lock::{lock_key, ExecutionLock, LockGuard};

// Explicit re-exports for monitoring module
pub use monitoring::{
    LatestResults, MonitorCommand, MonitorContext, MonitorError, MonitorHandle, MonitorStatus,
    MonitoringService,
};

// Explicit re-exports for execution module
pub use execution::{
    calculate_profit, calculate_trade_parameters, ExecutionMode, ExecutionOutcome, ExecutorContext,
    MarketAnalysis, TradeDirection, TradeError, TradeExecutor, TradeParameters, TradeRequest,
};
