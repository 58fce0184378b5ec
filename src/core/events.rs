//! Trading Event System
//!
//! Structured event types for logging monitor and trade operations. All
//! events share one schema so a run can be reconstructed from the logs.
//!
//! # Event Types
//!
//! - **MonitorStarted / MonitorStopped**: scheduler state changes
//! - **CycleCompleted**: one monitoring pass over the coin basket
//! - **PremiumCalculated**: premium of one coin (DEBUG)
//! - **OpportunityDetected**: a scope's intensity reached its trigger
//! - **TradeStarted / TradePhase / TradeCompleted / TradeFailed**: executor
//!
//! # Example
//!
//! ```ignore
//! use crate::core::events::{TradingEvent, log_event};
//!
//! log_event(&TradingEvent::opportunity_detected("BTC", "global", 3.59, 5));
//! ```

use std::fmt;

use tracing::{debug, info, warn};

use crate::adapters::types::current_time_ms;

/// Trading event types for structured logging
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradingEventType {
    // Monitor Events
    MonitorStarted,
    MonitorStopped,
    CycleCompleted,
    PremiumCalculated,
    OpportunityDetected,

    // Trade Events
    TradeStarted,
    TradePhase,
    TradeCompleted,
    TradeFailed,
}

impl fmt::Display for TradingEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TradingEventType::MonitorStarted => write!(f, "MONITOR_STARTED"),
            TradingEventType::MonitorStopped => write!(f, "MONITOR_STOPPED"),
            TradingEventType::CycleCompleted => write!(f, "CYCLE_COMPLETED"),
            TradingEventType::PremiumCalculated => write!(f, "PREMIUM_CALCULATED"),
            TradingEventType::OpportunityDetected => write!(f, "OPPORTUNITY_DETECTED"),
            TradingEventType::TradeStarted => write!(f, "TRADE_STARTED"),
            TradingEventType::TradePhase => write!(f, "TRADE_PHASE"),
            TradingEventType::TradeCompleted => write!(f, "TRADE_COMPLETED"),
            TradingEventType::TradeFailed => write!(f, "TRADE_FAILED"),
        }
    }
}

/// Trading event with all context fields for structured logging
#[derive(Debug, Clone, Default)]
pub struct TradingEvent {
    pub event_type: Option<TradingEventType>,
    pub timestamp_ms: u64,
    pub symbol: Option<String>,
    /// "global" or "user:<id>"
    pub scope: Option<String>,
    pub premium: Option<f64>,
    pub intensity: Option<u32>,
    pub trade_id: Option<String>,
    /// Trade status after a phase change
    pub status: Option<String>,
    pub net_profit: Option<f64>,
    pub profit_rate: Option<f64>,
    pub error: Option<String>,
    pub duration_ms: Option<u64>,
    pub succeeded: Option<usize>,
    pub failed: Option<usize>,
}

impl TradingEvent {
    /// Create a new event with the current timestamp
    pub fn new(event_type: TradingEventType) -> Self {
        Self {
            event_type: Some(event_type),
            timestamp_ms: current_time_ms(),
            ..Default::default()
        }
    }

    pub fn monitor_started(interval_secs: u64) -> Self {
        Self {
            duration_ms: Some(interval_secs * 1000),
            ..Self::new(TradingEventType::MonitorStarted)
        }
    }

    pub fn monitor_stopped() -> Self {
        Self::new(TradingEventType::MonitorStopped)
    }

    pub fn cycle_completed(succeeded: usize, failed: usize, duration_ms: u64) -> Self {
        Self {
            succeeded: Some(succeeded),
            failed: Some(failed),
            duration_ms: Some(duration_ms),
            ..Self::new(TradingEventType::CycleCompleted)
        }
    }

    pub fn premium_calculated(symbol: &str, premium: f64) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            premium: Some(premium),
            ..Self::new(TradingEventType::PremiumCalculated)
        }
    }

    pub fn opportunity_detected(symbol: &str, scope: &str, premium: f64, intensity: u32) -> Self {
        Self {
            symbol: Some(symbol.to_string()),
            scope: Some(scope.to_string()),
            premium: Some(premium),
            intensity: Some(intensity),
            ..Self::new(TradingEventType::OpportunityDetected)
        }
    }

    pub fn trade_started(trade_id: &str, symbol: &str, user_id: &str) -> Self {
        Self {
            trade_id: Some(trade_id.to_string()),
            symbol: Some(symbol.to_string()),
            scope: Some(format!("user:{}", user_id)),
            ..Self::new(TradingEventType::TradeStarted)
        }
    }

    pub fn trade_phase(trade_id: &str, symbol: &str, status: &str) -> Self {
        Self {
            trade_id: Some(trade_id.to_string()),
            symbol: Some(symbol.to_string()),
            status: Some(status.to_string()),
            ..Self::new(TradingEventType::TradePhase)
        }
    }

    pub fn trade_completed(trade_id: &str, symbol: &str, net_profit: f64, profit_rate: f64) -> Self {
        Self {
            trade_id: Some(trade_id.to_string()),
            symbol: Some(symbol.to_string()),
            net_profit: Some(net_profit),
            profit_rate: Some(profit_rate),
            ..Self::new(TradingEventType::TradeCompleted)
        }
    }

    pub fn trade_failed(trade_id: &str, symbol: &str, error: &str) -> Self {
        Self {
            trade_id: Some(trade_id.to_string()),
            symbol: Some(symbol.to_string()),
            error: Some(error.to_string()),
            ..Self::new(TradingEventType::TradeFailed)
        }
    }
}

/// Log a trading event using structured tracing fields
///
/// Premium ticks go to DEBUG, failures to WARN, everything else to INFO.
pub fn log_event(event: &TradingEvent) {
    let Some(event_type) = event.event_type else {
        return;
    };
    let premium_str = event.premium.map(|p| format!("{:.4}%", p));
    let profit_rate_str = event.profit_rate.map(|p| format!("{:.4}%", p));

    match event_type {
        TradingEventType::PremiumCalculated => {
            debug!(
                event_type = %event_type,
                timestamp = event.timestamp_ms,
                symbol = ?event.symbol,
                premium = ?premium_str,
                ""
            );
        }
        TradingEventType::TradeFailed => {
            warn!(
                event_type = %event_type,
                timestamp = event.timestamp_ms,
                trade_id = ?event.trade_id,
                symbol = ?event.symbol,
                error = ?event.error,
                ""
            );
        }
        _ => {
            info!(
                event_type = %event_type,
                timestamp = event.timestamp_ms,
                symbol = ?event.symbol,
                scope = ?event.scope,
                premium = ?premium_str,
                intensity = ?event.intensity,
                trade_id = ?event.trade_id,
                status = ?event.status,
                net_profit = ?event.net_profit,
                profit_rate = ?profit_rate_str,
                duration_ms = ?event.duration_ms,
                succeeded = ?event.succeeded,
                failed = ?event.failed,
                ""
            );
        }
    }
}

// =============================================================================
// Sanitization
// =============================================================================

/// Wrapper for sensitive data that should be redacted in logs.
///
/// Long values keep their first four characters; short ones are fully
/// redacted.
#[derive(Clone)]
pub struct SanitizedValue<'a>(&'a str);

impl<'a> SanitizedValue<'a> {
    pub fn new(value: &'a str) -> Self {
        Self(value)
    }
}

impl fmt::Display for SanitizedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.chars().count() > 8 {
            let prefix: String = self.0.chars().take(4).collect();
            write!(f, "{}...REDACTED", prefix)
        } else {
            write!(f, "REDACTED")
        }
    }
}

impl fmt::Debug for SanitizedValue<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self)
    }
}

/// Shorthand for `SanitizedValue::new(value)`
pub fn sanitize(value: &str) -> SanitizedValue<'_> {
    SanitizedValue::new(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_type_display() {
        assert_eq!(TradingEventType::OpportunityDetected.to_string(), "OPPORTUNITY_DETECTED");
        assert_eq!(TradingEventType::TradePhase.to_string(), "TRADE_PHASE");
        assert_eq!(TradingEventType::CycleCompleted.to_string(), "CYCLE_COMPLETED");
    }

    #[test]
    fn test_opportunity_event() {
        let event = TradingEvent::opportunity_detected("BTC", "user:u1", 3.59, 5);
        assert_eq!(event.event_type, Some(TradingEventType::OpportunityDetected));
        assert_eq!(event.symbol.as_deref(), Some("BTC"));
        assert_eq!(event.scope.as_deref(), Some("user:u1"));
        assert_eq!(event.intensity, Some(5));
        assert!(event.timestamp_ms > 1_704_067_200_000);
    }

    #[test]
    fn test_trade_events() {
        let done = TradingEvent::trade_completed("t1", "ETH", 1200.0, 0.12);
        assert_eq!(done.net_profit, Some(1200.0));
        assert!(done.error.is_none());

        let failed = TradingEvent::trade_failed("t2", "ETH", "timeout");
        assert_eq!(failed.event_type, Some(TradingEventType::TradeFailed));
        assert_eq!(failed.error.as_deref(), Some("timeout"));
        log_event(&failed);
    }

    #[test]
    fn test_cycle_event() {
        let event = TradingEvent::cycle_completed(4, 1, 850);
        assert_eq!(event.succeeded, Some(4));
        assert_eq!(event.failed, Some(1));
        assert_eq!(event.duration_ms, Some(850));
    }

    #[test]
    fn test_sanitized_value() {
        assert_eq!(sanitize("sk-1234567890abcdef").to_string(), "sk-1...REDACTED");
        assert_eq!(sanitize("abc").to_string(), "REDACTED");
        assert_eq!(sanitize("").to_string(), "REDACTED");
        assert_eq!(format!("{:?}", sanitize("키키키키키키키키키키")), "\"키키키키...REDACTED\"");
    }
}
