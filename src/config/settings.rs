//! Typed bot settings decoded from the external settings bag
//!
//! Settings are stored per scope as a string-keyed map of loosely typed
//! values. `BotSettings::decode` is the single place where that bag is
//! turned into a typed struct; nothing downstream reads raw keys.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Raw settings as stored (numbers may arrive as JSON numbers or strings)
pub type RawSettings = HashMap<String, Value>;

pub const KEY_PREMIUM_THRESHOLD: &str = "premium_threshold";
pub const KEY_TRADING_INTENSITY_THRESHOLD: &str = "trading_intensity_threshold";
pub const KEY_MIN_TRADE_AMOUNT: &str = "min_trade_amount";
pub const KEY_MAX_TRADE_AMOUNT: &str = "max_trade_amount";
pub const KEY_ENABLED: &str = "enabled";
pub const KEY_MONITORING_INTERVAL: &str = "monitoring_interval";

const DEFAULT_MONITORING_INTERVAL_SECS: u64 = 60;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum SettingsError {
    #[error("Missing required setting: {0}")]
    Missing(&'static str),

    #[error("Invalid value for setting {key}: {value}")]
    Invalid { key: &'static str, value: String },

    #[error("Setting out of range: {0}")]
    OutOfRange(String),
}

/// Bot settings of one scope (global or a single user)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BotSettings {
    /// |premium| in percent that counts toward intensity
    pub premium_threshold: f64,
    /// Intensity at which a trading opportunity is emitted
    pub trading_intensity_threshold: u32,
    pub min_trade_amount: f64,
    pub max_trade_amount: f64,
    pub enabled: bool,
    /// Scheduler period; only meaningful for the global scope
    pub monitoring_interval_secs: u64,
}

impl BotSettings {
    /// Decode a raw settings bag
    ///
    /// With `defaults`, every missing key falls back to the default (global
    /// scope). Without defaults, the four trading keys are required (user
    /// scope); `enabled` then defaults to `false`.
    pub fn decode(raw: &RawSettings, defaults: Option<&BotSettings>) -> Result<Self, SettingsError> {
        let premium_threshold = match raw.get(KEY_PREMIUM_THRESHOLD) {
            Some(v) => as_f64(KEY_PREMIUM_THRESHOLD, v)?,
            None => defaults
                .map(|d| d.premium_threshold)
                .ok_or(SettingsError::Missing(KEY_PREMIUM_THRESHOLD))?,
        };
        let trading_intensity_threshold = match raw.get(KEY_TRADING_INTENSITY_THRESHOLD) {
            Some(v) => as_u32(KEY_TRADING_INTENSITY_THRESHOLD, v)?,
            None => defaults
                .map(|d| d.trading_intensity_threshold)
                .ok_or(SettingsError::Missing(KEY_TRADING_INTENSITY_THRESHOLD))?,
        };
        let min_trade_amount = match raw.get(KEY_MIN_TRADE_AMOUNT) {
            Some(v) => as_f64(KEY_MIN_TRADE_AMOUNT, v)?,
            None => defaults
                .map(|d| d.min_trade_amount)
                .ok_or(SettingsError::Missing(KEY_MIN_TRADE_AMOUNT))?,
        };
        let max_trade_amount = match raw.get(KEY_MAX_TRADE_AMOUNT) {
            Some(v) => as_f64(KEY_MAX_TRADE_AMOUNT, v)?,
            None => defaults
                .map(|d| d.max_trade_amount)
                .ok_or(SettingsError::Missing(KEY_MAX_TRADE_AMOUNT))?,
        };
        let enabled = match raw.get(KEY_ENABLED) {
            Some(v) => as_bool(KEY_ENABLED, v)?,
            None => defaults.map(|d| d.enabled).unwrap_or(false),
        };
        let monitoring_interval_secs = match raw.get(KEY_MONITORING_INTERVAL) {
            Some(v) => as_u32(KEY_MONITORING_INTERVAL, v)? as u64,
            None => defaults
                .map(|d| d.monitoring_interval_secs)
                .unwrap_or(DEFAULT_MONITORING_INTERVAL_SECS),
        };

        let settings = Self {
            premium_threshold,
            trading_intensity_threshold,
            min_trade_amount,
            max_trade_amount,
            enabled,
            monitoring_interval_secs,
        };
        settings.validate()?;
        Ok(settings)
    }

    /// Inverse of `decode`, used when seeding a settings store
    pub fn encode(&self) -> RawSettings {
        let mut raw = RawSettings::new();
        raw.insert(KEY_PREMIUM_THRESHOLD.to_string(), Value::from(self.premium_threshold));
        raw.insert(
            KEY_TRADING_INTENSITY_THRESHOLD.to_string(),
            Value::from(self.trading_intensity_threshold),
        );
        raw.insert(KEY_MIN_TRADE_AMOUNT.to_string(), Value::from(self.min_trade_amount));
        raw.insert(KEY_MAX_TRADE_AMOUNT.to_string(), Value::from(self.max_trade_amount));
        raw.insert(KEY_ENABLED.to_string(), Value::from(self.enabled));
        raw.insert(
            KEY_MONITORING_INTERVAL.to_string(),
            Value::from(self.monitoring_interval_secs),
        );
        raw
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if !(self.premium_threshold.is_finite() && self.premium_threshold > 0.0) {
            return Err(SettingsError::OutOfRange(format!(
                "premium_threshold must be > 0 (got {})",
                self.premium_threshold
            )));
        }
        if self.trading_intensity_threshold == 0 {
            return Err(SettingsError::OutOfRange(
                "trading_intensity_threshold must be >= 1".to_string(),
            ));
        }
        if !(self.min_trade_amount.is_finite() && self.min_trade_amount > 0.0) {
            return Err(SettingsError::OutOfRange(format!(
                "min_trade_amount must be > 0 (got {})",
                self.min_trade_amount
            )));
        }
        if !(self.max_trade_amount.is_finite() && self.max_trade_amount >= self.min_trade_amount) {
            return Err(SettingsError::OutOfRange(format!(
                "max_trade_amount must be >= min_trade_amount (got {} < {})",
                self.max_trade_amount, self.min_trade_amount
            )));
        }
        if self.monitoring_interval_secs == 0 {
            return Err(SettingsError::OutOfRange(
                "monitoring_interval must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether `amount` lies within [min_trade_amount, max_trade_amount]
    pub fn allows_amount(&self, amount: f64) -> bool {
        amount >= self.min_trade_amount && amount <= self.max_trade_amount
    }
}

// ============================================================================
// Value coercion
// ============================================================================

fn invalid(key: &'static str, value: &Value) -> SettingsError {
    SettingsError::Invalid {
        key,
        value: value.to_string(),
    }
}

fn as_f64(key: &'static str, value: &Value) -> Result<f64, SettingsError> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| invalid(key, value))
}

fn as_u32(key: &'static str, value: &Value) -> Result<u32, SettingsError> {
    let n = as_f64(key, value)?;
    if n < 0.0 || n.fract() != 0.0 || n > u32::MAX as f64 {
        return Err(invalid(key, value));
    }
    Ok(n as u32)
}

fn as_bool(key: &'static str, value: &Value) -> Result<bool, SettingsError> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
        Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "1" => Ok(true),
            "false" | "0" => Ok(false),
            _ => Err(invalid(key, value)),
        },
        _ => Err(invalid(key, value)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn defaults() -> BotSettings {
        BotSettings {
            premium_threshold: 2.0,
            trading_intensity_threshold: 5,
            min_trade_amount: 10_000.0,
            max_trade_amount: 10_000_000.0,
            enabled: true,
            monitoring_interval_secs: 60,
        }
    }

    fn raw(pairs: &[(&str, Value)]) -> RawSettings {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_global_scope_falls_back_to_defaults() {
        let decoded = BotSettings::decode(&raw(&[("premium_threshold", json!("3.5"))]), Some(&defaults())).unwrap();
        assert_eq!(decoded.premium_threshold, 3.5);
        assert_eq!(decoded.trading_intensity_threshold, 5);
        assert!(decoded.enabled);
    }

    #[test]
    fn test_user_scope_requires_every_trading_key() {
        let partial = raw(&[
            ("premium_threshold", json!(2.0)),
            ("trading_intensity_threshold", json!(3)),
            ("min_trade_amount", json!(10000)),
        ]);
        assert_eq!(
            BotSettings::decode(&partial, None),
            Err(SettingsError::Missing(KEY_MAX_TRADE_AMOUNT))
        );
    }

    #[test]
    fn test_user_scope_complete() {
        let full = raw(&[
            ("premium_threshold", json!("1.5")),
            ("trading_intensity_threshold", json!("4")),
            ("min_trade_amount", json!(50000)),
            ("max_trade_amount", json!("2000000")),
            ("enabled", json!("true")),
        ]);
        let decoded = BotSettings::decode(&full, None).unwrap();
        assert_eq!(decoded.trading_intensity_threshold, 4);
        assert_eq!(decoded.max_trade_amount, 2_000_000.0);
        assert!(decoded.enabled);
        assert_eq!(decoded.monitoring_interval_secs, 60);
    }

    #[test]
    fn test_malformed_value_rejected() {
        let bad = raw(&[("trading_intensity_threshold", json!("2.5"))]);
        assert!(matches!(
            BotSettings::decode(&bad, Some(&defaults())),
            Err(SettingsError::Invalid { key: "trading_intensity_threshold", .. })
        ));

        let bad_bool = raw(&[("enabled", json!("maybe"))]);
        assert!(BotSettings::decode(&bad_bool, Some(&defaults())).is_err());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let bad = raw(&[("min_trade_amount", json!(500)), ("max_trade_amount", json!(100))]);
        assert!(matches!(
            BotSettings::decode(&bad, Some(&defaults())),
            Err(SettingsError::OutOfRange(_))
        ));
    }

    #[test]
    fn test_encode_then_decode_without_defaults() {
        let settings = defaults();
        assert_eq!(BotSettings::decode(&settings.encode(), None).unwrap(), settings);
    }

    #[test]
    fn test_allows_amount_is_inclusive() {
        let s = defaults();
        assert!(s.allows_amount(10_000.0));
        assert!(s.allows_amount(10_000_000.0));
        assert!(!s.allows_amount(9_999.0));
        assert!(!s.allows_amount(10_000_001.0));
    }
}
