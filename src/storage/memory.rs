//! In-memory store implementations
//!
//! Backed by `tokio::sync::RwLock` maps. Used by the binary when no
//! database is configured, and by the tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

use super::{
    ActiveBotSource, CredentialStore, DepositAddress, DepositAddressStore, EncryptedCredential,
    IntensityStore, LockStore, SecretCipher, SettingsStore, StorageError, TradeRecordStore,
};
use crate::config::RawSettings;
use crate::core::intensity::{IntensityState, Scope};
use crate::core::state::{TradeRecord, TradeStatus};

// ============================================================================
// Intensity
// ============================================================================

#[derive(Default)]
pub struct MemoryIntensityStore {
    rows: RwLock<HashMap<(String, Scope), IntensityState>>,
    writes: AtomicU64,
}

impl MemoryIntensityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of upserts performed
    pub fn write_count(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl IntensityStore for MemoryIntensityStore {
    async fn get(&self, coin_id: &str, scope: &Scope) -> Result<Option<IntensityState>, StorageError> {
        let rows = self.rows.read().await;
        Ok(rows.get(&(coin_id.to_string(), scope.clone())).cloned())
    }

    async fn upsert(&self, state: IntensityState) -> Result<(), StorageError> {
        let key = (state.coin_id.clone(), state.scope.clone());
        self.rows.write().await.insert(key, state);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn list(&self, scope: &Scope) -> Result<Vec<IntensityState>, StorageError> {
        let rows = self.rows.read().await;
        let mut states: Vec<IntensityState> = rows
            .values()
            .filter(|s| &s.scope == scope)
            .cloned()
            .collect();
        states.sort_by(|a, b| a.coin_id.cmp(&b.coin_id));
        Ok(states)
    }
}

// ============================================================================
// Trade records
// ============================================================================

/// Keeps every persisted status per record so tests can inspect the sequence
#[derive(Default)]
pub struct MemoryTradeRecordStore {
    records: RwLock<HashMap<Uuid, TradeRecord>>,
    history: RwLock<HashMap<Uuid, Vec<TradeStatus>>>,
}

impl MemoryTradeRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Statuses in the order they were written
    pub async fn status_history(&self, id: Uuid) -> Vec<TradeStatus> {
        self.history.read().await.get(&id).cloned().unwrap_or_default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl TradeRecordStore for MemoryTradeRecordStore {
    async fn create(&self, record: &TradeRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StorageError::Database(format!(
                "Trade record already exists: {}",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        self.history
            .write()
            .await
            .insert(record.id, vec![record.status]);
        Ok(())
    }

    async fn update(&self, record: &TradeRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        match records.get_mut(&record.id) {
            Some(existing) => *existing = record.clone(),
            None => return Err(StorageError::NotFound(record.id.to_string())),
        }
        self.history
            .write()
            .await
            .entry(record.id)
            .or_default()
            .push(record.status);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<TradeRecord>, StorageError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn recent(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<TradeRecord>, StorageError> {
        let records = self.records.read().await;
        let mut matching: Vec<TradeRecord> = records
            .values()
            .filter(|r| user_id.is_none() || r.user_id.as_deref() == user_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }
}

// ============================================================================
// Settings and active bots
// ============================================================================

#[derive(Default)]
pub struct MemorySettingsStore {
    bags: RwLock<HashMap<Scope, RawSettings>>,
}

impl MemorySettingsStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn get_raw(&self, scope: &Scope) -> Result<Option<RawSettings>, StorageError> {
        Ok(self.bags.read().await.get(scope).cloned())
    }

    async fn put_raw(&self, scope: &Scope, raw: RawSettings) -> Result<(), StorageError> {
        self.bags.write().await.insert(scope.clone(), raw);
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryActiveBots {
    users: RwLock<Vec<String>>,
}

impl MemoryActiveBots {
    pub fn new(users: Vec<String>) -> Self {
        Self {
            users: RwLock::new(users),
        }
    }

    pub async fn set(&self, users: Vec<String>) {
        *self.users.write().await = users;
    }
}

#[async_trait]
impl ActiveBotSource for MemoryActiveBots {
    async fn active_user_ids(&self) -> Result<Vec<String>, StorageError> {
        Ok(self.users.read().await.clone())
    }
}

// ============================================================================
// Credentials and deposit addresses
// ============================================================================

#[derive(Default)]
pub struct MemoryCredentialStore {
    by_user: RwLock<HashMap<String, Vec<EncryptedCredential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the user's credential for `credential.exchange_id`
    pub async fn insert(&self, user_id: &str, credential: EncryptedCredential) {
        let mut by_user = self.by_user.write().await;
        let creds = by_user.entry(user_id.to_string()).or_default();
        creds.retain(|c| c.exchange_id != credential.exchange_id);
        creds.push(credential);
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn credentials_for(&self, user_id: &str) -> Result<Vec<EncryptedCredential>, StorageError> {
        Ok(self
            .by_user
            .read()
            .await
            .get(user_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Identity cipher for development setups without a key service
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextCipher;

impl SecretCipher for PlaintextCipher {
    fn encrypt(&self, plaintext: &str) -> Result<String, StorageError> {
        Ok(plaintext.to_string())
    }

    fn decrypt(&self, blob: &str) -> Result<String, StorageError> {
        if blob.is_empty() {
            return Err(StorageError::Cipher("empty secret".to_string()));
        }
        Ok(blob.to_string())
    }
}

#[derive(Default)]
pub struct MemoryDepositAddressStore {
    addresses: RwLock<HashMap<(String, String, String), DepositAddress>>,
}

impl MemoryDepositAddressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, user_id: &str, exchange_id: &str, symbol: &str, address: DepositAddress) {
        self.addresses.write().await.insert(
            (user_id.to_string(), exchange_id.to_string(), symbol.to_string()),
            address,
        );
    }

    pub async fn remove(&self, user_id: &str, exchange_id: &str, symbol: &str) -> Option<DepositAddress> {
        self.addresses
            .write()
            .await
            .remove(&(user_id.to_string(), exchange_id.to_string(), symbol.to_string()))
    }
}

#[async_trait]
impl DepositAddressStore for MemoryDepositAddressStore {
    async fn get(
        &self,
        user_id: &str,
        exchange_id: &str,
        symbol: &str,
    ) -> Result<Option<DepositAddress>, StorageError> {
        let key = (user_id.to_string(), exchange_id.to_string(), symbol.to_string());
        Ok(self.addresses.read().await.get(&key).cloned())
    }
}

// ============================================================================
// Locks
// ============================================================================

struct HeldLock {
    token: String,
    expires_at: Instant,
}

#[derive(Default)]
pub struct MemoryLockStore {
    locks: Mutex<HashMap<String, HeldLock>>,
}

impl MemoryLockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether a live (unexpired) lock exists for `key`
    pub async fn is_held(&self, key: &str) -> bool {
        self.locks
            .lock()
            .await
            .get(key)
            .map(|l| l.expires_at > Instant::now())
            .unwrap_or(false)
    }
}

#[async_trait]
impl LockStore for MemoryLockStore {
    async fn try_acquire(&self, key: &str, token: &str, ttl: Duration) -> Result<bool, StorageError> {
        let mut locks = self.locks.lock().await;
        let now = Instant::now();
        if let Some(held) = locks.get(key) {
            if held.expires_at > now {
                return Ok(false);
            }
        }
        locks.insert(
            key.to_string(),
            HeldLock {
                token: token.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn release(&self, key: &str, token: &str) -> Result<bool, StorageError> {
        let mut locks = self.locks.lock().await;
        match locks.get(key) {
            Some(held) if held.token == token => {
                locks.remove(key);
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
