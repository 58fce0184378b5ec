//! Persistence boundaries of the engine
//!
//! Every external store the monitor and the executor talk to is an async
//! trait here. `memory` holds `tokio::sync::RwLock` implementations used by
//! the binary and the tests; `supabase` persists trade records over the
//! Supabase REST API.

pub mod memory;
pub mod supabase;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::config::{BotSettings, RawSettings, SettingsError};
use crate::core::intensity::{IntensityState, Scope};
use crate::core::state::TradeRecord;

pub use memory::{
    MemoryActiveBots, MemoryCredentialStore, MemoryDepositAddressStore, MemoryIntensityStore,
    MemoryLockStore, MemorySettingsStore, MemoryTradeRecordStore, PlaintextCipher,
};
pub use supabase::SupabaseTradeRecordStore;

/// Errors for store operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// Backend rejected or failed the operation
    #[error("Database error: {0}")]
    Database(String),

    #[error("Record not found: {0}")]
    NotFound(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Settings error: {0}")]
    Settings(#[from] SettingsError),

    #[error("Cipher error: {0}")]
    Cipher(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}

// ============================================================================
// Intensity
// ============================================================================

#[async_trait]
pub trait IntensityStore: Send + Sync {
    async fn get(&self, coin_id: &str, scope: &Scope) -> Result<Option<IntensityState>, StorageError>;

    /// Insert or replace the row keyed by (coin_id, scope)
    async fn upsert(&self, state: IntensityState) -> Result<(), StorageError>;

    /// All rows of a scope, ordered by coin id
    async fn list(&self, scope: &Scope) -> Result<Vec<IntensityState>, StorageError>;
}

// ============================================================================
// Trade records
// ============================================================================

#[async_trait]
pub trait TradeRecordStore: Send + Sync {
    async fn create(&self, record: &TradeRecord) -> Result<(), StorageError>;

    /// Replace the stored row with the same id
    async fn update(&self, record: &TradeRecord) -> Result<(), StorageError>;

    async fn get(&self, id: Uuid) -> Result<Option<TradeRecord>, StorageError>;

    /// Newest first, optionally filtered by owner
    async fn recent(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<TradeRecord>, StorageError>;
}

// ============================================================================
// Settings and active bots
// ============================================================================

#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// Raw settings bag of a scope, `None` when nothing was ever saved
    async fn get_raw(&self, scope: &Scope) -> Result<Option<RawSettings>, StorageError>;

    async fn put_raw(&self, scope: &Scope, raw: RawSettings) -> Result<(), StorageError>;

    /// Typed settings of a scope
    ///
    /// The global scope falls back to `defaults` for absent keys (and for an
    /// absent bag). A user scope without a saved bag yields `Ok(None)`; a bag
    /// with missing or malformed keys is a `StorageError::Settings`.
    async fn get_bot_settings(
        &self,
        scope: &Scope,
        defaults: &BotSettings,
    ) -> Result<Option<BotSettings>, StorageError> {
        let raw = self.get_raw(scope).await?;
        match (scope, raw) {
            (Scope::Global, raw) => Ok(Some(BotSettings::decode(
                &raw.unwrap_or_default(),
                Some(defaults),
            )?)),
            (Scope::User(_), None) => Ok(None),
            (Scope::User(_), Some(raw)) => Ok(Some(BotSettings::decode(&raw, None)?)),
        }
    }
}

/// Source of user ids whose bot is currently enabled
#[async_trait]
pub trait ActiveBotSource: Send + Sync {
    async fn active_user_ids(&self) -> Result<Vec<String>, StorageError>;
}

// ============================================================================
// Credentials and deposit addresses
// ============================================================================

/// API key pair of one user on one exchange, as stored (encrypted)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EncryptedCredential {
    pub exchange_id: String,
    pub access_key_blob: String,
    pub secret_key_blob: String,
}

#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn credentials_for(&self, user_id: &str) -> Result<Vec<EncryptedCredential>, StorageError>;
}

/// Opaque encryption at rest
pub trait SecretCipher: Send + Sync {
    fn encrypt(&self, plaintext: &str) -> Result<String, StorageError>;
    fn decrypt(&self, blob: &str) -> Result<String, StorageError>;
}

/// Destination of a coin withdrawal
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DepositAddress {
    pub address: String,
    /// Destination tag / memo for coins that need one (XRP, EOS, ...)
    pub memo: Option<String>,
}

#[async_trait]
pub trait DepositAddressStore: Send + Sync {
    async fn get(
        &self,
        user_id: &str,
        exchange_id: &str,
        symbol: &str,
    ) -> Result<Option<DepositAddress>, StorageError>;
}

// ============================================================================
// Locks
// ============================================================================

/// Keyed mutual exclusion with expiry and owner tokens
#[async_trait]
pub trait LockStore: Send + Sync {
    /// Take `key` for `ttl` unless a live lock exists; true when taken
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, StorageError>;

    /// Delete `key` only if it is still held by `token`; true when deleted
    async fn release(&self, key: &str, token: &str) -> Result<bool, StorageError>;
}
