//! Supabase settings for the trade record store
//!
//! Trade records go to a PostgREST table when Supabase is configured and
//! stay in memory otherwise. Environment variables:
//!
//! | Variable | Default | Notes |
//! |---|---|---|
//! | `SUPABASE_ENABLED` | `true` | `false` keeps records in memory |
//! | `SUPABASE_URL` | unset | unset or placeholder keeps records in memory |
//! | `SUPABASE_ANON_KEY` | required | required once a URL is set |
//! | `SUPABASE_TRADE_TABLE` | `trade_records` | lowercase identifier |
//! | `SUPABASE_TIMEOUT_SECS` | `10` | per request, 1 to 60 |

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

/// Default table holding trade lifecycle records
pub const DEFAULT_TRADE_TABLE: &str = "trade_records";

const DEFAULT_TIMEOUT_SECS: u64 = 10;
const MAX_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Error)]
pub enum SupabaseConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid Supabase URL format: {0}")]
    InvalidUrl(String),

    #[error("Invalid trade table name: {0}")]
    InvalidTable(String),

    #[error("Invalid request timeout: {0}")]
    InvalidTimeout(String),
}

/// Where and how trade records are written
#[derive(Debug, Clone)]
pub struct SupabaseConfig {
    /// Project URL (e.g., <https://xxx.supabase.co>)
    pub url: String,
    pub anon_key: String,
    pub trade_table: String,
    pub request_timeout: Duration,
}

impl SupabaseConfig {
    pub fn new(url: &str, anon_key: &str) -> Self {
        Self {
            url: url.to_string(),
            anon_key: anon_key.to_string(),
            trade_table: DEFAULT_TRADE_TABLE.to_string(),
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// PostgREST endpoint of the trade table
    pub fn table_endpoint(&self) -> String {
        format!("{}/rest/v1/{}", self.url.trim_end_matches('/'), self.trade_table)
    }

    /// Read the settings from the process environment
    ///
    /// `Ok(None)` means records stay in memory.
    pub fn from_env() -> Result<Option<Self>, SupabaseConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, SupabaseConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let enabled = lookup("SUPABASE_ENABLED")
            .map(|v| !v.eq_ignore_ascii_case("false"))
            .unwrap_or(true);
        if !enabled {
            info!("[SUPABASE] Disabled via SUPABASE_ENABLED=false, trade records stay in memory");
            return Ok(None);
        }

        let url = match lookup("SUPABASE_URL").filter(|u| !u.is_empty()) {
            None => {
                debug!("[SUPABASE] SUPABASE_URL not set, trade records stay in memory");
                return Ok(None);
            }
            Some(u) if is_placeholder(&u) => {
                warn!("[SUPABASE] SUPABASE_URL is a placeholder, trade records stay in memory");
                return Ok(None);
            }
            Some(u) => u,
        };
        if !url.starts_with("https://") || !url.contains("supabase") {
            return Err(SupabaseConfigError::InvalidUrl(url));
        }

        let anon_key = match lookup("SUPABASE_ANON_KEY") {
            Some(key) if !key.is_empty() && !is_placeholder(&key) => key,
            Some(_) => {
                return Err(SupabaseConfigError::MissingEnvVar(
                    "SUPABASE_ANON_KEY (contains placeholder)".to_string(),
                ))
            }
            None => return Err(SupabaseConfigError::MissingEnvVar("SUPABASE_ANON_KEY".to_string())),
        };

        let trade_table = match lookup("SUPABASE_TRADE_TABLE").filter(|t| !t.is_empty()) {
            Some(table) if is_table_name(&table) => table,
            Some(table) => return Err(SupabaseConfigError::InvalidTable(table)),
            None => DEFAULT_TRADE_TABLE.to_string(),
        };

        let request_timeout = match lookup("SUPABASE_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if (1..=MAX_TIMEOUT_SECS).contains(&secs) => Duration::from_secs(secs),
                _ => return Err(SupabaseConfigError::InvalidTimeout(raw)),
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        info!(
            url = %url,
            table = %trade_table,
            timeout_secs = request_timeout.as_secs(),
            "[SUPABASE] Trade records persisted to Supabase"
        );
        Ok(Some(Self {
            url,
            anon_key,
            trade_table,
            request_timeout,
        }))
    }
}

fn is_placeholder(value: &str) -> bool {
    value.contains("your-project") || value.contains("your-anon-key")
}

/// Lowercase PostgREST identifier, safe to splice into a path
fn is_table_name(name: &str) -> bool {
    matches!(name.chars().next(), Some(c) if c.is_ascii_lowercase())
        && name.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

// ============================================================================
// Tests
// ============================================================================
