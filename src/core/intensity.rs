//! Trading intensity accumulator
//!
//! One non-negative counter per (coin, scope). Every cycle the counter
//! moves up by one when `|premium| >= threshold` and down by one (floored
//! at zero) otherwise. A scope triggers while its counter is at or above
//! its trading intensity threshold, so the trigger repeats every cycle the
//! condition holds.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::storage::{IntensityStore, StorageError};

/// Owner of an intensity counter
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// System-wide monitor, no owning user
    Global,
    /// A user's bot
    User(String),
}

impl Scope {
    pub fn user_id(&self) -> Option<&str> {
        match self {
            Scope::Global => None,
            Scope::User(id) => Some(id),
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => write!(f, "global"),
            Scope::User(id) => write!(f, "user:{}", id),
        }
    }
}

/// Persisted counter row keyed by (coin_id, scope)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntensityState {
    pub scope: Scope,
    pub coin_id: String,
    pub current_intensity: u32,
    pub last_premium_rate: f64,
    pub last_updated: DateTime<Utc>,
}

impl IntensityState {
    /// State of a pair that has never been written
    pub fn initial(scope: Scope, coin_id: &str) -> Self {
        Self {
            scope,
            coin_id: coin_id.to_string(),
            current_intensity: 0,
            last_premium_rate: 0.0,
            last_updated: Utc::now(),
        }
    }
}

/// Thresholds of one scope
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IntensityThresholds {
    /// |premium| in percent that counts as a hit
    pub premium_threshold: f64,
    /// Intensity at which the scope triggers
    pub trigger_threshold: u32,
}

/// Result of one observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntensityUpdate {
    pub previous: u32,
    pub current: u32,
    /// True when the new value was written to the store
    pub changed: bool,
    pub triggered: bool,
}

/// Counter transition for a single observation
pub fn next_intensity(current: u32, premium: f64, premium_threshold: f64) -> u32 {
    if premium.abs() >= premium_threshold {
        current.saturating_add(1)
    } else {
        current.saturating_sub(1)
    }
}

/// Applies observations to persisted counters
#[derive(Clone)]
pub struct IntensityAccumulator {
    store: Arc<dyn IntensityStore>,
}

impl IntensityAccumulator {
    pub fn new(store: Arc<dyn IntensityStore>) -> Self {
        Self { store }
    }

    /// Feed one premium observation into the (coin, scope) counter
    ///
    /// Writes only when the counter value changes. The returned update is
    /// produced after the write, so a trigger never precedes its state.
    pub async fn observe(
        &self,
        scope: &Scope,
        coin_id: &str,
        premium: f64,
        thresholds: IntensityThresholds,
    ) -> Result<IntensityUpdate, StorageError> {
        let state = self
            .store
            .get(coin_id, scope)
            .await?
            .unwrap_or_else(|| IntensityState::initial(scope.clone(), coin_id));

        let previous = state.current_intensity;
        let current = next_intensity(previous, premium, thresholds.premium_threshold);
        let changed = current != previous;

        if changed {
            self.store
                .upsert(IntensityState {
                    current_intensity: current,
                    last_premium_rate: premium,
                    last_updated: Utc::now(),
                    ..state
                })
                .await?;
            debug!(
                scope = %scope,
                coin = %coin_id,
                previous,
                current,
                premium = %format!("{:.4}%", premium),
                "[INTENSITY] Updated"
            );
        }

        Ok(IntensityUpdate {
            previous,
            current,
            changed,
            triggered: current >= thresholds.trigger_threshold,
        })
    }

    /// Current counters of a scope, for the read model
    pub async fn snapshot(&self, scope: &Scope) -> Result<Vec<IntensityState>, StorageError> {
        self.store.list(scope).await
    }
}
