//! Trade execution engine
//!
//! Runs one arbitrage trade for a (user, symbol) pair through the
//! `pending -> buying -> transferring -> selling -> completed` state
//! machine, with `failed` reachable from every non-terminal state.
//!
//! # Flow
//! 1. Preconditions (no side effects on failure): user settings, budget
//!    bounds, coin active, both exchanges active, two verified credentials,
//!    deposit addresses on both exchanges.
//! 2. Execution lock for the pair; a held lock aborts before any record.
//! 3. Pending record, fresh market analysis, trade parameters.
//! 4. Buy, transfer, sell. Every transition is persisted on its own.
//! 5. Profit, `completed`; or `failed` with the error message.
//! 6. Lock released by compare-and-delete on every path.
//!
//! Dry-run steps are simulated with a delay. Live order placement and
//! on-chain withdrawal are not implemented and fail the trade loudly.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::adapters::types::ApiCredentials;
use crate::adapters::{ExchangeAdapter, ExchangeRegistry};
use crate::config::constants::credential_check_timeout;
use crate::config::{AppConfig, BotSettings, CoinMapping};
use crate::core::events::{log_event, sanitize, TradingEvent};
use crate::core::fx::FxRateCache;
use crate::core::intensity::Scope;
use crate::core::lock::{lock_key, ExecutionLock};
use crate::core::premium::{PremiumCalculator, PremiumResult, PriceSample};
use crate::core::state::{ProfitBreakdown, StateError, TradeRecord, TradeStatus};
use crate::error::AppError;
use crate::storage::{
    CredentialStore, DepositAddressStore, EncryptedCredential, LockStore, SecretCipher, SettingsStore,
    StorageError, TradeRecordStore,
};

/// Verified credentials required before a trade may start
const MIN_VERIFIED_EXCHANGES: usize = 2;

// =============================================================================
// Types
// =============================================================================

#[derive(Debug, Error)]
pub enum TradeError {
    /// A precondition failed; nothing was written
    #[error("{0}")]
    Validation(String),

    /// Another attempt holds the (user, symbol) lock
    #[error("Trade already in progress for {0}")]
    Concurrency(String),

    /// Buy, transfer, sell or analysis failed after the record was created
    #[error("{0}")]
    ExecutionStep(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl From<StateError> for TradeError {
    fn from(err: StateError) -> Self {
        TradeError::ExecutionStep(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    /// Simulated buy, transfer and sell
    DryRun,
    /// Real orders; not implemented, fails the trade
    Live,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRequest {
    pub user_id: String,
    pub symbol: String,
    /// Quote currency amount to deploy on the buy leg
    pub budget: f64,
    pub mode: ExecutionMode,
}

/// Structured result returned to the caller for every path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub success: bool,
    /// `None` when the attempt stopped before a record was created
    pub trade_id: Option<Uuid>,
    pub net_profit: Option<f64>,
    pub profit_rate: Option<f64>,
    pub error: Option<String>,
}

impl ExecutionOutcome {
    fn rejected(err: &TradeError) -> Self {
        Self {
            success: false,
            trade_id: None,
            net_profit: None,
            profit_rate: None,
            error: Some(err.to_string()),
        }
    }
}

// =============================================================================
// Trade parameters
// =============================================================================

/// Which way the coin travels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeDirection {
    /// Positive premium: buy abroad, sell at home
    ForeignToDomestic,
    /// Non-positive premium: buy at home, sell abroad
    DomesticToForeign,
}

impl TradeDirection {
    pub fn from_premium(premium_percent: f64) -> Self {
        if premium_percent > 0.0 {
            TradeDirection::ForeignToDomestic
        } else {
            TradeDirection::DomesticToForeign
        }
    }
}

/// Fresh prices of one coin on both exchanges
#[derive(Debug, Clone)]
pub struct MarketAnalysis {
    pub domestic: PriceSample,
    pub foreign: PriceSample,
    pub premium: PremiumResult,
}

/// Prices (quote currency, slippage applied) and size of one trade
#[derive(Debug, Clone, PartialEq)]
pub struct TradeParameters {
    pub direction: TradeDirection,
    pub buy_exchange_id: String,
    pub sell_exchange_id: String,
    pub buy_price: f64,
    pub sell_price: f64,
    pub quantity: f64,
}

/// Size a trade from a fresh analysis
///
/// Both reference prices move against us by `slippage_rate`. The buy-side
/// fee is taken out of the budget before sizing. `None` when the adjusted
/// buy price is not positive.
pub fn calculate_trade_parameters(
    analysis: &MarketAnalysis,
    domestic_id: &str,
    foreign_id: &str,
    budget: f64,
    fee_rate: f64,
    slippage_rate: f64,
) -> Option<TradeParameters> {
    let fx = analysis.premium.fx_rate;
    let direction = TradeDirection::from_premium(analysis.premium.premium_percent);
    let (buy_exchange_id, sell_exchange_id, buy_ref, sell_ref) = match direction {
        TradeDirection::ForeignToDomestic => (
            foreign_id,
            domestic_id,
            analysis.foreign.ask_average_price * fx,
            analysis.domestic.bid_average_price,
        ),
        TradeDirection::DomesticToForeign => (
            domestic_id,
            foreign_id,
            analysis.domestic.ask_average_price,
            analysis.foreign.bid_average_price * fx,
        ),
    };

    let buy_price = buy_ref * (1.0 + slippage_rate);
    let sell_price = sell_ref * (1.0 - slippage_rate);
    if !(buy_price.is_finite() && buy_price > 0.0) {
        return None;
    }
    let quantity = (budget - budget * fee_rate) / buy_price;

    Some(TradeParameters {
        direction,
        buy_exchange_id: buy_exchange_id.to_string(),
        sell_exchange_id: sell_exchange_id.to_string(),
        buy_price,
        sell_price,
        quantity,
    })
}

/// Profit of a filled trade
///
/// The withdrawal fee is denominated in the coin and valued at the sell
/// price.
pub fn calculate_profit(params: &TradeParameters, fee_rate: f64, withdrawal_fee: f64) -> ProfitBreakdown {
    let TradeParameters {
        buy_price,
        sell_price,
        quantity,
        ..
    } = *params;
    let gross_profit = (sell_price - buy_price) * quantity;
    let trading_fees = fee_rate * (buy_price + sell_price) * quantity;
    let transfer_fees = withdrawal_fee * sell_price;
    let net_profit = gross_profit - trading_fees - transfer_fees;
    let cost = buy_price * quantity;
    let profit_rate = if cost > 0.0 { net_profit / cost * 100.0 } else { 0.0 };

    ProfitBreakdown {
        gross_profit,
        trading_fees,
        transfer_fees,
        net_profit,
        profit_rate,
    }
}

// =============================================================================
// TradeExecutor
// =============================================================================

/// Collaborators of the executor
#[derive(Clone)]
pub struct ExecutorContext {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ExchangeRegistry>,
    pub fx: Arc<FxRateCache>,
    pub settings: Arc<dyn SettingsStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub cipher: Arc<dyn SecretCipher>,
    pub deposit_addresses: Arc<dyn DepositAddressStore>,
    pub records: Arc<dyn TradeRecordStore>,
    pub locks: Arc<dyn LockStore>,
}

/// Validated inputs of one attempt
struct Prepared {
    coin: CoinMapping,
    settings: BotSettings,
}

pub struct TradeExecutor {
    ctx: ExecutorContext,
    domestic: Arc<dyn ExchangeAdapter>,
    foreign: Arc<dyn ExchangeAdapter>,
    calculator: PremiumCalculator,
    lock: ExecutionLock,
    step_delay: Duration,
}

impl TradeExecutor {
    pub fn new(ctx: ExecutorContext) -> Result<Self, AppError> {
        let monitoring = &ctx.config.monitoring;
        let resolve = |id: &str| {
            ctx.registry
                .adapter(id)
                .ok_or_else(|| AppError::Config(format!("exchange '{}' is not registered", id)))
        };
        let domestic = resolve(&monitoring.domestic_exchange)?;
        let foreign = resolve(&monitoring.foreign_exchange)?;
        let calculator = PremiumCalculator::new(
            monitoring.domestic_exchange.clone(),
            monitoring.foreign_exchange.clone(),
            monitoring.orderbook_depth,
        );
        let trading = &ctx.config.trading;
        let lock = ExecutionLock::new(ctx.locks.clone(), Duration::from_secs(trading.lock_ttl_secs));
        let step_delay = Duration::from_millis(trading.dry_run_step_delay_ms);

        Ok(Self {
            ctx,
            domestic,
            foreign,
            calculator,
            lock,
            step_delay,
        })
    }

    /// Run one trade; every failure is folded into the outcome
    pub async fn execute_once(&self, request: TradeRequest) -> ExecutionOutcome {
        match self.execute(request).await {
            Ok(outcome) => outcome,
            Err(e) => ExecutionOutcome::rejected(&e),
        }
    }

    /// Run one trade
    ///
    /// `Err` means the attempt stopped before a record existed (validation,
    /// concurrency, or a storage failure while creating it). Once a record
    /// exists the result is always `Ok`, with `success == false` when the
    /// trade ended in `failed`.
    pub async fn execute(&self, request: TradeRequest) -> Result<ExecutionOutcome, TradeError> {
        let prepared = self.check_preconditions(&request).await.map_err(|e| {
            info!(
                user_id = %request.user_id,
                symbol = %request.symbol,
                error = %e,
                "[TRADE] Rejected"
            );
            e
        })?;

        let guard = self
            .lock
            .acquire(&request.user_id, &request.symbol)
            .await?
            .ok_or_else(|| TradeError::Concurrency(lock_key(&request.user_id, &request.symbol)))?;

        let result = self.run_locked(&request, prepared).await;
        self.lock.release(&guard).await;
        result
    }

    async fn run_locked(&self, request: &TradeRequest, prepared: Prepared) -> Result<ExecutionOutcome, TradeError> {
        let mut record = TradeRecord::new_pending(Some(request.user_id.clone()), &request.symbol);
        self.ctx.records.create(&record).await?;

        let trade_id = record.id.to_string();
        log_event(&TradingEvent::trade_started(&trade_id, &request.symbol, &request.user_id));
        debug!(
            trade_id = %trade_id,
            budget = request.budget,
            max_amount = prepared.settings.max_trade_amount,
            mode = ?request.mode,
            "[TRADE] Pending record created"
        );

        match self.run_steps(&mut record, request, &prepared.coin).await {
            Ok(profit) => {
                log_event(&TradingEvent::trade_completed(
                    &trade_id,
                    &request.symbol,
                    profit.net_profit,
                    profit.profit_rate,
                ));
                Ok(ExecutionOutcome {
                    success: true,
                    trade_id: Some(record.id),
                    net_profit: Some(profit.net_profit),
                    profit_rate: Some(profit.profit_rate),
                    error: None,
                })
            }
            Err(e) => {
                let message = e.to_string();
                self.mark_failed(&mut record, &message).await;
                log_event(&TradingEvent::trade_failed(&trade_id, &request.symbol, &message));
                Ok(ExecutionOutcome {
                    success: false,
                    trade_id: Some(record.id),
                    net_profit: None,
                    profit_rate: None,
                    error: Some(message),
                })
            }
        }
    }

    async fn run_steps(
        &self,
        record: &mut TradeRecord,
        request: &TradeRequest,
        coin: &CoinMapping,
    ) -> Result<ProfitBreakdown, TradeError> {
        let trading = &self.ctx.config.trading;
        let analysis = self.analyze(coin).await?;
        let params = calculate_trade_parameters(
            &analysis,
            &self.calculator.domestic_exchange,
            &self.calculator.foreign_exchange,
            request.budget,
            trading.fee_rate,
            trading.slippage_rate,
        )
        .ok_or_else(|| TradeError::ExecutionStep(format!("no valid buy price for {}", coin.symbol)))?;

        record.buy_exchange_id = Some(params.buy_exchange_id.clone());
        record.sell_exchange_id = Some(params.sell_exchange_id.clone());
        record.buy_price = Some(params.buy_price);
        record.sell_price = Some(params.sell_price);
        record.quantity = Some(params.quantity);

        self.advance(record, TradeStatus::Buying).await?;
        self.buy(request.mode, &params).await?;

        self.advance(record, TradeStatus::Transferring).await?;
        self.transfer(request, &params).await?;

        self.advance(record, TradeStatus::Selling).await?;
        self.sell(request.mode, &params).await?;

        let profit = calculate_profit(&params, trading.fee_rate, coin.withdrawal_fee);
        let mut completed = record.clone();
        completed.complete(profit)?;
        self.persist(record, completed).await?;
        Ok(profit)
    }

    /// Transition, persist, log
    async fn advance(&self, record: &mut TradeRecord, next: TradeStatus) -> Result<(), TradeError> {
        let mut staged = record.clone();
        staged.transition(next)?;
        self.persist(record, staged).await?;
        log_event(&TradingEvent::trade_phase(&record.id.to_string(), &record.coin_id, next.as_str()));
        Ok(())
    }

    /// `record` only takes the staged state once the store accepted it, so a
    /// failed write leaves it at the last persisted status
    async fn persist(&self, record: &mut TradeRecord, staged: TradeRecord) -> Result<(), TradeError> {
        self.ctx.records.update(&staged).await?;
        *record = staged;
        Ok(())
    }

    async fn mark_failed(&self, record: &mut TradeRecord, message: &str) {
        if let Err(e) = record.fail(message) {
            warn!(trade_id = %record.id, error = %e, "[TRADE] Cannot mark record failed");
            return;
        }
        if let Err(e) = self.ctx.records.update(record).await {
            warn!(trade_id = %record.id, error = %e, "[TRADE] Failed to persist failed record");
        }
    }

    /// Fresh prices and premium, independent of the monitor's cache
    pub async fn analyze(&self, coin: &CoinMapping) -> Result<MarketAnalysis, TradeError> {
        let step = |e: String| TradeError::ExecutionStep(format!("market analysis failed: {}", e));

        let fx_rate = self.ctx.fx.current_rate().await.map_err(|e| step(e.to_string()))?;
        let depth = self.calculator.depth;
        let (domestic_book, foreign_book) = tokio::join!(
            self.domestic.get_orderbook(&coin.domestic_market, depth),
            self.foreign.get_orderbook(&coin.foreign_market, depth),
        );
        let domestic_book = domestic_book.map_err(|e| step(e.to_string()))?;
        let foreign_book = foreign_book.map_err(|e| step(e.to_string()))?;

        let (domestic, foreign) = self
            .calculator
            .sample(&coin.symbol, &domestic_book, &foreign_book)
            .ok_or_else(|| step("orderbook has no usable depth".to_string()))?;
        let premium = self
            .calculator
            .from_samples(&domestic, &foreign, fx_rate)
            .ok_or_else(|| step("premium not computable".to_string()))?;

        Ok(MarketAnalysis {
            domestic,
            foreign,
            premium,
        })
    }

    // -------------------------------------------------------------------------
    // Steps
    // -------------------------------------------------------------------------

    async fn buy(&self, mode: ExecutionMode, params: &TradeParameters) -> Result<(), TradeError> {
        match mode {
            ExecutionMode::DryRun => {
                debug!(
                    exchange = %params.buy_exchange_id,
                    price = params.buy_price,
                    quantity = params.quantity,
                    "[TRADE] Simulated buy"
                );
                tokio::time::sleep(self.step_delay).await;
                Ok(())
            }
            ExecutionMode::Live => Err(TradeError::ExecutionStep(
                "live order placement is not implemented".to_string(),
            )),
        }
    }

    async fn transfer(&self, request: &TradeRequest, params: &TradeParameters) -> Result<(), TradeError> {
        let destination = self
            .ctx
            .deposit_addresses
            .get(&request.user_id, &params.sell_exchange_id, &request.symbol)
            .await?
            .ok_or_else(|| {
                TradeError::ExecutionStep(format!(
                    "no deposit address for {} on {}",
                    request.symbol, params.sell_exchange_id
                ))
            })?;

        match request.mode {
            ExecutionMode::DryRun => {
                debug!(
                    from = %params.buy_exchange_id,
                    to = %params.sell_exchange_id,
                    address = %sanitize(&destination.address),
                    has_memo = destination.memo.is_some(),
                    "[TRADE] Simulated transfer"
                );
                tokio::time::sleep(self.step_delay).await;
                Ok(())
            }
            ExecutionMode::Live => Err(TradeError::ExecutionStep(
                "live withdrawal is not implemented".to_string(),
            )),
        }
    }

    async fn sell(&self, mode: ExecutionMode, params: &TradeParameters) -> Result<(), TradeError> {
        match mode {
            ExecutionMode::DryRun => {
                debug!(
                    exchange = %params.sell_exchange_id,
                    price = params.sell_price,
                    quantity = params.quantity,
                    "[TRADE] Simulated sell"
                );
                tokio::time::sleep(self.step_delay).await;
                Ok(())
            }
            ExecutionMode::Live => Err(TradeError::ExecutionStep(
                "live order placement is not implemented".to_string(),
            )),
        }
    }

    // -------------------------------------------------------------------------
    // Preconditions
    // -------------------------------------------------------------------------

    async fn check_preconditions(&self, request: &TradeRequest) -> Result<Prepared, TradeError> {
        let config = &self.ctx.config;
        let scope = Scope::User(request.user_id.clone());
        let defaults = config.trading.default_bot_settings(config.monitoring.interval_secs);

        let settings = match self.ctx.settings.get_bot_settings(&scope, &defaults).await {
            Ok(Some(settings)) => settings,
            Ok(None) => return Err(TradeError::Validation("bot settings are not configured".to_string())),
            Err(StorageError::Settings(e)) => {
                return Err(TradeError::Validation(format!("bot settings are incomplete: {}", e)))
            }
            Err(e) => return Err(e.into()),
        };
        settings
            .validate()
            .map_err(|e| TradeError::Validation(format!("bot settings are invalid: {}", e)))?;

        if !(request.budget.is_finite() && request.budget > 0.0) || !settings.allows_amount(request.budget) {
            return Err(TradeError::Validation(format!(
                "budget {} is outside the allowed range [{}, {}]",
                request.budget, settings.min_trade_amount, settings.max_trade_amount
            )));
        }

        let coin = config
            .coin(&request.symbol)
            .filter(|c| c.active)
            .cloned()
            .ok_or_else(|| TradeError::Validation(format!("coin {} is not active", request.symbol)))?;

        for id in [&config.monitoring.domestic_exchange, &config.monitoring.foreign_exchange] {
            if !self.ctx.registry.is_active(id) {
                return Err(TradeError::Validation(format!("exchange {} is not active", id)));
            }
        }

        let verified = self.verified_exchanges(&request.user_id).await?;
        if verified.len() < MIN_VERIFIED_EXCHANGES {
            return Err(TradeError::Validation(format!(
                "verified credentials required on at least {} exchanges (found {})",
                MIN_VERIFIED_EXCHANGES,
                verified.len()
            )));
        }

        for id in [&config.monitoring.domestic_exchange, &config.monitoring.foreign_exchange] {
            if self
                .ctx
                .deposit_addresses
                .get(&request.user_id, id, &request.symbol)
                .await?
                .is_none()
            {
                return Err(TradeError::Validation(format!(
                    "no deposit address for {} on {}",
                    request.symbol, id
                )));
            }
        }

        Ok(Prepared { coin, settings })
    }

    /// Exchanges on which the user's stored credentials are accepted
    ///
    /// Rejected keys (authentication errors, undecryptable blobs, unknown
    /// exchanges) just do not count. Any other failure means verification
    /// was impossible and fails validation.
    async fn verified_exchanges(&self, user_id: &str) -> Result<HashSet<String>, TradeError> {
        let stored = self.ctx.credentials.credentials_for(user_id).await?;
        let checks = join_all(stored.iter().map(|cred| self.verify_credential(cred))).await;

        let mut verified = HashSet::new();
        for (cred, check) in stored.iter().zip(checks) {
            if check? {
                verified.insert(cred.exchange_id.clone());
            }
        }
        Ok(verified)
    }

    async fn verify_credential(&self, cred: &EncryptedCredential) -> Result<bool, TradeError> {
        let Some(adapter) = self.ctx.registry.adapter(&cred.exchange_id) else {
            debug!(exchange = %cred.exchange_id, "[TRADE] Credential for unregistered exchange ignored");
            return Ok(false);
        };
        let decrypted = self
            .ctx
            .cipher
            .decrypt(&cred.access_key_blob)
            .and_then(|access_key| {
                Ok(ApiCredentials {
                    access_key,
                    secret_key: self.ctx.cipher.decrypt(&cred.secret_key_blob)?,
                })
            });
        let credentials = match decrypted {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(exchange = %cred.exchange_id, error = %e, "[TRADE] Credential cannot be decrypted");
                return Ok(false);
            }
        };

        match tokio::time::timeout(credential_check_timeout(), adapter.get_balance(&credentials)).await {
            Ok(Ok(_)) => Ok(true),
            Ok(Err(e)) if e.is_authentication() => {
                debug!(exchange = %cred.exchange_id, credentials = ?credentials, "[TRADE] Credential rejected");
                Ok(false)
            }
            Ok(Err(e)) => Err(TradeError::Validation(format!(
                "unable to verify credentials on {}: {}",
                cred.exchange_id, e
            ))),
            Err(_) => Err(TradeError::Validation(format!(
                "unable to verify credentials on {}: timed out",
                cred.exchange_id
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::test_utils::TestMockAdapter;
    use crate::config::types::tests::sample_config;
    use crate::config::ExchangeRole;
    use crate::core::fx::FixedFxRate;
    use crate::storage::memory::{
        MemoryCredentialStore, MemoryDepositAddressStore, MemoryLockStore, MemorySettingsStore,
        MemoryTradeRecordStore, PlaintextCipher,
    };
    use crate::storage::DepositAddress;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    /// Memory store whose `update` can be made to fail for one status
    struct ScriptedRecords {
        inner: Arc<MemoryTradeRecordStore>,
        fail_on: Mutex<Option<TradeStatus>>,
    }

    #[async_trait]
    impl TradeRecordStore for ScriptedRecords {
        async fn create(&self, record: &TradeRecord) -> Result<(), StorageError> {
            self.inner.create(record).await
        }

        async fn update(&self, record: &TradeRecord) -> Result<(), StorageError> {
            if *self.fail_on.lock().await == Some(record.status) {
                return Err(StorageError::Database("write timeout".to_string()));
            }
            self.inner.update(record).await
        }

        async fn get(&self, id: Uuid) -> Result<Option<TradeRecord>, StorageError> {
            self.inner.get(id).await
        }

        async fn recent(&self, user_id: Option<&str>, limit: usize) -> Result<Vec<TradeRecord>, StorageError> {
            self.inner.recent(user_id, limit).await
        }
    }

    fn sample(exchange: &str, ask: f64, bid: f64) -> PriceSample {
        PriceSample {
            exchange: exchange.to_string(),
            symbol: "BTC".to_string(),
            ask_average_price: ask,
            bid_average_price: bid,
            ask_depth_quantity: 1.0,
            bid_depth_quantity: 1.0,
            timestamp: 0,
        }
    }

    fn analysis(premium_percent: f64) -> MarketAnalysis {
        MarketAnalysis {
            domestic: sample("upbit", 101_500_000.0, 101_000_000.0),
            foreign: sample("binance", 65_000.0, 64_900.0),
            premium: PremiumResult {
                symbol: "BTC".to_string(),
                timestamp: 0,
                sell_side_price: 101_000_000.0,
                buy_side_price_foreign: 65_000.0,
                buy_side_price_quote: 97_500_000.0,
                fx_rate: 1_500.0,
                premium_percent,
                is_positive: premium_percent > 0.0,
            },
        }
    }

    #[test]
    fn test_positive_premium_buys_abroad() {
        let params = calculate_trade_parameters(&analysis(3.59), "upbit", "binance", 1_000_000.0, 0.0025, 0.001).unwrap();
        assert_eq!(params.direction, TradeDirection::ForeignToDomestic);
        assert_eq!(params.buy_exchange_id, "binance");
        assert_eq!(params.sell_exchange_id, "upbit");
        assert!((params.buy_price - 97_500_000.0 * 1.001).abs() < 1e-6);
        assert!((params.sell_price - 101_000_000.0 * 0.999).abs() < 1e-6);
        assert!((params.quantity - 997_500.0 / (97_500_000.0 * 1.001)).abs() < 1e-12);
    }

    #[test]
    fn test_negative_premium_buys_at_home() {
        let params = calculate_trade_parameters(&analysis(-1.0), "upbit", "binance", 1_000_000.0, 0.0025, 0.0).unwrap();
        assert_eq!(params.direction, TradeDirection::DomesticToForeign);
        assert_eq!(params.buy_exchange_id, "upbit");
        assert_eq!(params.buy_price, 101_500_000.0);
        assert_eq!(params.sell_price, 64_900.0 * 1_500.0);
    }

    #[test]
    fn test_quantity_reference_example() {
        let mut a = analysis(3.0);
        a.foreign.ask_average_price = 100_250_000.0 / 1_500.0;
        let params = calculate_trade_parameters(&a, "upbit", "binance", 1_000_000.0, 0.0025, 0.0).unwrap();
        assert!((params.quantity - 997_500.0 / 100_250_000.0).abs() < 1e-12);
    }

    #[test]
    fn test_profit_breakdown() {
        let params = TradeParameters {
            direction: TradeDirection::ForeignToDomestic,
            buy_exchange_id: "binance".to_string(),
            sell_exchange_id: "upbit".to_string(),
            buy_price: 100.0,
            sell_price: 110.0,
            quantity: 10.0,
        };
        let profit = calculate_profit(&params, 0.01, 0.5);
        assert!((profit.gross_profit - 100.0).abs() < 1e-9);
        assert!((profit.trading_fees - 21.0).abs() < 1e-9);
        assert!((profit.transfer_fees - 55.0).abs() < 1e-9);
        assert!((profit.net_profit - 24.0).abs() < 1e-9);
        assert!((profit.profit_rate - 2.4).abs() < 1e-9);
    }

    struct Fixture {
        executor: TradeExecutor,
        records: Arc<MemoryTradeRecordStore>,
        record_writes: Arc<ScriptedRecords>,
        settings: Arc<MemorySettingsStore>,
        credentials: Arc<MemoryCredentialStore>,
        addresses: Arc<MemoryDepositAddressStore>,
        locks: Arc<MemoryLockStore>,
    }

    fn user_settings() -> BotSettings {
        BotSettings {
            premium_threshold: 2.0,
            trading_intensity_threshold: 5,
            min_trade_amount: 10_000.0,
            max_trade_amount: 5_000_000.0,
            enabled: true,
            monitoring_interval_secs: 60,
        }
    }

    fn credential(exchange: &str) -> EncryptedCredential {
        EncryptedCredential {
            exchange_id: exchange.to_string(),
            access_key_blob: format!("{}-access", exchange),
            secret_key_blob: format!("{}-secret", exchange),
        }
    }

    async fn fixture_with(binance: TestMockAdapter, binance_active: bool) -> Fixture {
        let mut config = sample_config();
        config.trading.dry_run_step_delay_ms = 10;
        let upbit = Arc::new(TestMockAdapter::new("upbit").with_book("KRW-BTC", 101_500_000.0, 101_000_000.0));
        let binance = Arc::new(binance.with_book("BTCUSDT", 65_000.0, 64_900.0));
        let mut registry = ExchangeRegistry::new();
        registry.register("upbit", ExchangeRole::Domestic, true, upbit);
        registry.register("binance", ExchangeRole::Foreign, binance_active, binance);

        let records = Arc::new(MemoryTradeRecordStore::new());
        let record_writes = Arc::new(ScriptedRecords {
            inner: records.clone(),
            fail_on: Mutex::new(None),
        });
        let settings = Arc::new(MemorySettingsStore::new());
        let credentials = Arc::new(MemoryCredentialStore::new());
        let addresses = Arc::new(MemoryDepositAddressStore::new());
        let locks = Arc::new(MemoryLockStore::new());

        let user = Scope::User("u1".to_string());
        settings.put_raw(&user, user_settings().encode()).await.unwrap();
        credentials.insert("u1", credential("upbit")).await;
        credentials.insert("u1", credential("binance")).await;
        for exchange in ["upbit", "binance"] {
            addresses
                .insert(
                    "u1",
                    exchange,
                    "BTC",
                    DepositAddress {
                        address: format!("bc1q{}deposit", exchange),
                        memo: None,
                    },
                )
                .await;
        }

        let executor = TradeExecutor::new(ExecutorContext {
            config: Arc::new(config),
            registry: Arc::new(registry),
            fx: Arc::new(FxRateCache::new(Arc::new(FixedFxRate(1_500.0)))),
            settings: settings.clone(),
            credentials: credentials.clone(),
            cipher: Arc::new(PlaintextCipher),
            deposit_addresses: addresses.clone(),
            records: record_writes.clone(),
            locks: locks.clone(),
        })
        .unwrap();

        Fixture {
            executor,
            records,
            record_writes,
            settings,
            credentials,
            addresses,
            locks,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(TestMockAdapter::new("binance"), true).await
    }

    fn request(budget: f64, mode: ExecutionMode) -> TradeRequest {
        TradeRequest {
            user_id: "u1".to_string(),
            symbol: "BTC".to_string(),
            budget,
            mode,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_dry_run_completes() {
        let f = fixture().await;
        let outcome = f.executor.execute_once(request(1_000_000.0, ExecutionMode::DryRun)).await;
        assert!(outcome.success, "{:?}", outcome.error);
        let id = outcome.trade_id.unwrap();

        assert_eq!(
            f.records.status_history(id).await,
            vec![
                TradeStatus::Pending,
                TradeStatus::Buying,
                TradeStatus::Transferring,
                TradeStatus::Selling,
                TradeStatus::Completed,
            ]
        );
        let record = f.records.get(id).await.unwrap().unwrap();
        assert!(record.completed_at.is_some());
        assert_eq!(record.buy_exchange_id.as_deref(), Some("binance"));
        assert_eq!(record.net_profit, outcome.net_profit);
        assert!(!f.locks.is_held("u1:BTC").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_live_mode_fails_loudly() {
        let f = fixture().await;
        let outcome = f.executor.execute_once(request(1_000_000.0, ExecutionMode::Live)).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("live order placement is not implemented"));

        let id = outcome.trade_id.unwrap();
        assert_eq!(
            f.records.status_history(id).await,
            vec![TradeStatus::Pending, TradeStatus::Buying, TradeStatus::Failed]
        );
        let record = f.records.get(id).await.unwrap().unwrap();
        assert!(record.completed_at.is_some());
        assert!(!f.locks.is_held("u1:BTC").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_completion_write_marks_record_failed() {
        let f = fixture().await;
        *f.record_writes.fail_on.lock().await = Some(TradeStatus::Completed);

        let outcome = f.executor.execute_once(request(1_000_000.0, ExecutionMode::DryRun)).await;
        assert!(!outcome.success);
        let message = outcome.error.clone().unwrap();
        assert!(message.contains("write timeout"), "{}", message);

        let id = outcome.trade_id.unwrap();
        assert_eq!(
            f.records.status_history(id).await,
            vec![
                TradeStatus::Pending,
                TradeStatus::Buying,
                TradeStatus::Transferring,
                TradeStatus::Selling,
                TradeStatus::Failed,
            ]
        );
        let record = f.records.get(id).await.unwrap().unwrap();
        assert_eq!(record.status, TradeStatus::Failed);
        assert!(record.completed_at.is_some());
        assert_eq!(record.error_message.as_deref(), Some(message.as_str()));
        assert!(record.net_profit.is_none());
        assert!(!f.locks.is_held("u1:BTC").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_phase_write_keeps_last_persisted_status() {
        let f = fixture().await;
        *f.record_writes.fail_on.lock().await = Some(TradeStatus::Transferring);

        let outcome = f.executor.execute_once(request(1_000_000.0, ExecutionMode::DryRun)).await;
        assert!(!outcome.success);
        let id = outcome.trade_id.unwrap();
        assert_eq!(
            f.records.status_history(id).await,
            vec![TradeStatus::Pending, TradeStatus::Buying, TradeStatus::Failed]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_address_removed_mid_trade_fails_in_transfer() {
        let f = fixture().await;
        let remove_during_buy = async {
            // Buy step sleeps 10ms; the address vanishes halfway through
            tokio::time::sleep(Duration::from_millis(5)).await;
            f.addresses.remove("u1", "upbit", "BTC").await;
        };
        let (outcome, _) = tokio::join!(
            f.executor.execute_once(request(1_000_000.0, ExecutionMode::DryRun)),
            remove_during_buy,
        );

        assert!(!outcome.success);
        assert_eq!(outcome.error.as_deref(), Some("no deposit address for BTC on upbit"));
        let id = outcome.trade_id.unwrap();
        assert_eq!(
            f.records.status_history(id).await,
            vec![
                TradeStatus::Pending,
                TradeStatus::Buying,
                TradeStatus::Transferring,
                TradeStatus::Failed,
            ]
        );
        let record = f.records.get(id).await.unwrap().unwrap();
        assert!(record.completed_at.is_some());
        assert_eq!(record.error_message.as_deref(), Some("no deposit address for BTC on upbit"));
    }

    #[tokio::test]
    async fn test_budget_outside_bounds_rejected_without_record() {
        let f = fixture().await;
        for budget in [5_000.0, 6_000_000.0, f64::NAN] {
            let err = f.executor.execute(request(budget, ExecutionMode::DryRun)).await.unwrap_err();
            assert!(matches!(err, TradeError::Validation(_)));
        }
        assert!(f.records.is_empty().await);
    }

    #[tokio::test]
    async fn test_missing_settings_rejected() {
        let f = fixture().await;
        let mut req = request(1_000_000.0, ExecutionMode::DryRun);
        req.user_id = "stranger".to_string();
        let err = f.executor.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "bot settings are not configured");
    }

    #[tokio::test]
    async fn test_incomplete_settings_rejected() {
        let f = fixture().await;
        let mut raw = user_settings().encode();
        raw.remove("max_trade_amount");
        f.settings.put_raw(&Scope::User("u1".to_string()), raw).await.unwrap();
        let err = f.executor.execute(request(1_000_000.0, ExecutionMode::DryRun)).await.unwrap_err();
        assert!(err.to_string().starts_with("bot settings are incomplete"));
    }

    #[tokio::test]
    async fn test_unknown_or_inactive_coin_rejected() {
        let f = fixture().await;
        let mut req = request(1_000_000.0, ExecutionMode::DryRun);
        req.symbol = "DOGE".to_string();
        let err = f.executor.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "coin DOGE is not active");
    }

    #[tokio::test]
    async fn test_inactive_exchange_rejected() {
        let f = fixture_with(TestMockAdapter::new("binance"), false).await;
        let err = f.executor.execute(request(1_000_000.0, ExecutionMode::DryRun)).await.unwrap_err();
        assert_eq!(err.to_string(), "exchange binance is not active");
    }

    #[tokio::test]
    async fn test_rejected_credentials_do_not_count() {
        let mut binance = TestMockAdapter::new("binance");
        binance.reject_credentials = true;
        let f = fixture_with(binance, true).await;
        let err = f.executor.execute(request(1_000_000.0, ExecutionMode::DryRun)).await.unwrap_err();
        assert!(err.to_string().contains("found 1"), "{}", err);
        assert!(f.records.is_empty().await);
    }

    #[tokio::test]
    async fn test_undecryptable_credential_does_not_count() {
        let f = fixture().await;
        let mut broken = credential("binance");
        broken.secret_key_blob = String::new();
        f.credentials.insert("u1", broken).await;
        let err = f.executor.execute(request(1_000_000.0, ExecutionMode::DryRun)).await.unwrap_err();
        assert!(matches!(err, TradeError::Validation(_)));
    }

    #[tokio::test]
    async fn test_missing_deposit_address_rejected() {
        let f = fixture().await;
        let u2 = Scope::User("u2".to_string());
        f.settings.put_raw(&u2, user_settings().encode()).await.unwrap();
        f.credentials.insert("u2", credential("upbit")).await;
        f.credentials.insert("u2", credential("binance")).await;

        let mut req = request(1_000_000.0, ExecutionMode::DryRun);
        req.user_id = "u2".to_string();
        let err = f.executor.execute(req).await.unwrap_err();
        assert_eq!(err.to_string(), "no deposit address for BTC on upbit");
        assert!(f.records.is_empty().await);
    }

    #[tokio::test]
    async fn test_held_lock_is_concurrency_error() {
        let f = fixture().await;
        assert!(f
            .locks
            .try_acquire("u1:BTC", "someone-else", Duration::from_secs(300))
            .await
            .unwrap());
        let err = f.executor.execute(request(1_000_000.0, ExecutionMode::DryRun)).await.unwrap_err();
        assert!(matches!(err, TradeError::Concurrency(_)));
        assert!(err.to_string().contains("already in progress"));
        assert!(f.records.is_empty().await);
        // The foreign lock is untouched
        assert!(f.locks.is_held("u1:BTC").await);
    }

    #[tokio::test]
    async fn test_analysis_uses_fresh_books() {
        let f = fixture().await;
        let mut coin = sample_config().coins[0].clone();
        let analysis = f.executor.analyze(&coin).await.unwrap();
        assert!((analysis.premium.premium_percent - 3.5897).abs() < 1e-3);

        coin.foreign_market = "ETHUSDT".to_string();
        let err = f.executor.analyze(&coin).await.unwrap_err();
        assert!(err.to_string().starts_with("market analysis failed"));
    }
}
