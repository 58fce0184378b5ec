//! Application-wide constants and configuration defaults
//!
//! Runtime tunables that are not part of the YAML file. Values can be
//! overridden via environment variables.

use std::time::Duration;

// =============================================================================
// Scheduler Channels
// =============================================================================

/// Capacity of the monitor command channel (default: 32)
///
/// Environment variable: `MONITOR_COMMAND_CAPACITY`
pub fn monitor_command_capacity() -> usize {
    std::env::var("MONITOR_COMMAND_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(32)
}

/// Capacity of the trading-opportunity channel (default: 64 events)
///
/// Environment variable: `OPPORTUNITY_CHANNEL_CAPACITY`
pub fn opportunity_channel_capacity() -> usize {
    std::env::var("OPPORTUNITY_CHANNEL_CAPACITY")
        .ok()
        .and_then(|s| s.parse().ok())
        .filter(|&n: &usize| n > 0)
        .unwrap_or(64)
}

// =============================================================================
// Exchange Calls
// =============================================================================

/// Upper bound for one credential verification call (default: 10 seconds)
///
/// Environment variable: `CREDENTIAL_CHECK_TIMEOUT_SECS`
pub fn credential_check_timeout() -> Duration {
    let secs = std::env::var("CREDENTIAL_CHECK_TIMEOUT_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(10);
    Duration::from_secs(secs)
}

/// Age after which a cached FX rate is reported as stale (default: 600 seconds)
///
/// The last good rate is still used; staleness is only logged.
///
/// Environment variable: `FX_RATE_MAX_AGE_SECS`
pub fn fx_rate_max_age() -> Duration {
    let secs = std::env::var("FX_RATE_MAX_AGE_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(600);
    Duration::from_secs(secs)
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Print all configuration values (for startup logs)
pub fn log_configuration() {
    tracing::info!("=== Runtime Configuration ===");
    tracing::info!("  - Monitor command capacity: {}", monitor_command_capacity());
    tracing::info!("  - Opportunity channel capacity: {}", opportunity_channel_capacity());
    tracing::info!("  - Credential check timeout: {:?}", credential_check_timeout());
    tracing::info!("  - FX rate max age: {:?}", fx_rate_max_age());
    tracing::info!("=============================");
}
