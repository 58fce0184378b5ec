//! Exchange registry, the table of configured exchange back ends.
//!
//! Holds one shared adapter per exchange id together with its role and
//! active flag. Built once at startup from the config; the monitor and
//! the executor both look adapters up here by id.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::info;

use crate::adapters::factory::create_adapter_from_config;
use crate::adapters::traits::ExchangeAdapter;
use crate::config::{ExchangeRole, AppConfig};

/// One registered exchange
#[derive(Clone)]
pub struct RegisteredExchange {
    pub id: String,
    pub role: ExchangeRole,
    pub active: bool,
    pub adapter: Arc<dyn ExchangeAdapter>,
}

impl std::fmt::Debug for RegisteredExchange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RegisteredExchange")
            .field("id", &self.id)
            .field("role", &self.role)
            .field("active", &self.active)
            .field("adapter", &self.adapter.exchange_name())
            .finish()
    }
}

/// Lookup table of exchange id -> adapter
#[derive(Debug, Clone, Default)]
pub struct ExchangeRegistry {
    exchanges: HashMap<String, RegisteredExchange>,
}

impl ExchangeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build adapters for every `exchanges` entry of the config
    pub fn from_config(config: &AppConfig) -> Self {
        let mut registry = Self::new();
        for ex in &config.exchanges {
            let adapter = Arc::new(create_adapter_from_config(ex));
            registry.register(&ex.id, ex.role, ex.active, adapter);
        }
        info!(
            phase = "init",
            exchanges = ?registry.ids(),
            "Exchange registry ready"
        );
        registry
    }

    /// Register (or replace) an adapter under `id`
    pub fn register(
        &mut self,
        id: &str,
        role: ExchangeRole,
        active: bool,
        adapter: Arc<dyn ExchangeAdapter>,
    ) {
        self.exchanges.insert(
            id.to_string(),
            RegisteredExchange {
                id: id.to_string(),
                role,
                active,
                adapter,
            },
        );
    }

    pub fn get(&self, id: &str) -> Option<&RegisteredExchange> {
        self.exchanges.get(id)
    }

    pub fn adapter(&self, id: &str) -> Option<Arc<dyn ExchangeAdapter>> {
        self.exchanges.get(id).map(|e| Arc::clone(&e.adapter))
    }

    /// Unknown ids count as inactive
    pub fn is_active(&self, id: &str) -> bool {
        self.exchanges.get(id).map(|e| e.active).unwrap_or(false)
    }

    /// Registered ids, sorted for stable output
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.exchanges.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::TestMockAdapter;

    #[test]
    fn test_register_and_lookup() {
        let mut registry = ExchangeRegistry::new();
        registry.register(
            "upbit",
            ExchangeRole::Domestic,
            true,
            Arc::new(TestMockAdapter::new("upbit")),
        );
        registry.register(
            "binance",
            ExchangeRole::Foreign,
            false,
            Arc::new(TestMockAdapter::new("binance")),
        );

        assert_eq!(registry.len(), 2);
        assert!(registry.is_active("upbit"));
        assert!(!registry.is_active("binance"));
        assert!(!registry.is_active("kraken"));
        assert_eq!(registry.adapter("upbit").unwrap().exchange_name(), "upbit");
        assert_eq!(registry.ids(), vec!["binance".to_string(), "upbit".to_string()]);
    }

    #[test]
    fn test_from_config_builds_every_exchange() {
        let config = crate::config::types::tests::sample_config();
        let registry = ExchangeRegistry::from_config(&config);
        assert_eq!(registry.len(), config.exchanges.len());
        assert_eq!(registry.get("binance").unwrap().role, ExchangeRole::Foreign);
        assert_eq!(registry.adapter("upbit").unwrap().exchange_name(), "upbit");
    }
}
