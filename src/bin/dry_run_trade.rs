//! Dry-run one arbitrage trade against live public market data
//!
//! Usage:
//!   cargo run --bin dry_run_trade -- BTC 1000000 [USER_ID]
//!
//! Prices come from the real exchanges in `config.yaml`. Accounts are
//! paper accounts: every configured exchange accepts the seeded
//! credentials and deposit addresses, and no order leaves the process.
//! Trade records go to Supabase when `SUPABASE_ENABLED=true`, otherwise
//! they stay in memory.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use kimchi_arb::adapters::{
    create_adapter_from_config, AnyAdapter, ApiCredentials, Balance, ExchangeAdapter, ExchangeRegistry,
    ExchangeResult, Orderbook, Ticker,
};
use kimchi_arb::config::{self, logging, SupabaseConfig};
use kimchi_arb::core::{
    fx_source_from_config, ExecutionMode, ExecutorContext, FxRateCache, Scope, TradeExecutor, TradeRequest,
};
use kimchi_arb::storage::{
    DepositAddress, EncryptedCredential, MemoryCredentialStore, MemoryDepositAddressStore, MemoryLockStore,
    MemorySettingsStore, MemoryTradeRecordStore, PlaintextCipher, SecretCipher, SettingsStore,
    SupabaseTradeRecordStore, TradeRecordStore,
};

/// Real market data, paper balance
struct PaperAccount {
    inner: AnyAdapter,
}

#[async_trait]
impl ExchangeAdapter for PaperAccount {
    async fn get_ticker(&self, market: &str) -> ExchangeResult<Ticker> {
        self.inner.get_ticker(market).await
    }

    async fn get_orderbook(&self, market: &str, depth: usize) -> ExchangeResult<Orderbook> {
        self.inner.get_orderbook(market, depth).await
    }

    async fn get_balance(&self, _credentials: &ApiCredentials) -> ExchangeResult<Balance> {
        Ok(Balance {
            fiat_currency: "PAPER".to_string(),
            fiat_balance: 0.0,
            coin_balances: Vec::new(),
        })
    }

    fn exchange_name(&self) -> &'static str {
        self.inner.exchange_name()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init_logging();

    let mut args = std::env::args().skip(1);
    let symbol = args.next().unwrap_or_else(|| "BTC".to_string()).to_uppercase();
    let budget: f64 = match args.next() {
        Some(raw) => raw.parse().map_err(|_| anyhow::anyhow!("budget must be a number, got '{}'", raw))?,
        None => 1_000_000.0,
    };
    let user_id = args.next().unwrap_or_else(|| "dry-run".to_string());

    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"));
    let config = Arc::new(config::load_config(&config_path)?);

    let mut registry = ExchangeRegistry::new();
    for ex in &config.exchanges {
        let adapter = PaperAccount {
            inner: create_adapter_from_config(ex),
        };
        registry.register(&ex.id, ex.role, ex.active, Arc::new(adapter));
    }
    let registry = Arc::new(registry);
    let fx = Arc::new(FxRateCache::new(fx_source_from_config(&config.fx, &registry)?));

    // Paper user: config defaults, one credential and one address per exchange
    let cipher = PlaintextCipher;
    let settings = Arc::new(MemorySettingsStore::new());
    let defaults = config.trading.default_bot_settings(config.monitoring.interval_secs);
    settings.put_raw(&Scope::User(user_id.clone()), defaults.encode()).await?;
    let credentials = Arc::new(MemoryCredentialStore::new());
    let addresses = Arc::new(MemoryDepositAddressStore::new());
    for ex in config.exchanges.iter().filter(|e| e.active) {
        credentials
            .insert(
                &user_id,
                EncryptedCredential {
                    exchange_id: ex.id.clone(),
                    access_key_blob: cipher.encrypt(&format!("paper-{}-access", ex.id))?,
                    secret_key_blob: cipher.encrypt(&format!("paper-{}-secret", ex.id))?,
                },
            )
            .await;
        addresses
            .insert(
                &user_id,
                &ex.id,
                &symbol,
                DepositAddress {
                    address: format!("paper-{}-{}", ex.id, symbol.to_lowercase()),
                    memo: None,
                },
            )
            .await;
    }

    let records: Arc<dyn TradeRecordStore> = match SupabaseConfig::from_env()? {
        Some(supabase) => {
            info!(url = %supabase.url, table = %supabase.trade_table, "Persisting trade records to Supabase");
            Arc::new(SupabaseTradeRecordStore::new(supabase)?)
        }
        None => Arc::new(MemoryTradeRecordStore::new()),
    };

    let executor = TradeExecutor::new(ExecutorContext {
        config: config.clone(),
        registry,
        fx,
        settings,
        credentials,
        cipher: Arc::new(cipher),
        deposit_addresses: addresses,
        records: records.clone(),
        locks: Arc::new(MemoryLockStore::new()),
    })?;

    info!(symbol = %symbol, budget, user_id = %user_id, "[TRADE] Dry run requested");
    let outcome = executor
        .execute_once(TradeRequest {
            user_id: user_id.clone(),
            symbol,
            budget,
            mode: ExecutionMode::DryRun,
        })
        .await;

    println!("{}", serde_json::to_string_pretty(&outcome)?);
    if let Some(id) = outcome.trade_id {
        if let Some(record) = records.get(id).await? {
            println!("{}", serde_json::to_string_pretty(&record)?);
        }
    }

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}
