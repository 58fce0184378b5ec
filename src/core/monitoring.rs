//! Premium monitoring scheduler
//!
//! # Architecture
//! - One owner task holds the scheduler state (running flag, interval,
//!   timer). Nothing else can touch it.
//! - `MonitorHandle` talks to the task over an mpsc command channel with
//!   oneshot replies, so `start`/`stop` are serialized by construction.
//! - Cycles run inline in the owner task, so two cycles never overlap. A
//!   slow cycle makes the timer skip ticks instead of queueing them.
//!
//! # One cycle
//! 1. FX rate from `FxRateCache`
//! 2. Per coin, in parallel: both orderbooks and both tickers in parallel,
//!    depth averages, premium. A failing coin is counted, never fatal. A
//!    failing ticker only blanks the last price in the summary.
//! 3. Global scope intensity for every premium, then a sequential pass over
//!    the users with an enabled bot, each with their own thresholds.
//! 4. Opportunities, premiums, intensity snapshots and the summary go to
//!    the `ResultCache`.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::adapters::types::{current_time_ms, Ticker};
use crate::adapters::{ExchangeAdapter, ExchangeError, ExchangeRegistry, ExchangeResult};
use crate::config::constants::monitor_command_capacity;
use crate::config::{AppConfig, BotSettings, CoinMapping};
use crate::core::cache::{CoinPremium, CycleSummary, ResultCache};
use crate::core::channels::TradingOpportunity;
use crate::core::events::{log_event, TradingEvent};
use crate::core::fx::FxRateCache;
use crate::core::intensity::{IntensityAccumulator, IntensityState, IntensityThresholds, Scope};
use crate::core::premium::{PremiumCalculator, PremiumResult};
use crate::error::AppError;
use crate::storage::{ActiveBotSource, IntensityStore, SettingsStore};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("monitor task is not running")]
    Closed,
}

// =============================================================================
// Public types
// =============================================================================

/// Scheduler state as seen by control surfaces
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub is_running: bool,
    pub interval_secs: u64,
    /// Global settings loaded on the last start or cycle
    pub settings: Option<BotSettings>,
    pub next_execution_time: Option<DateTime<Utc>>,
}

/// Dashboard view of the read model
#[derive(Debug, Clone, Serialize)]
pub struct LatestResults {
    pub summary: Option<CycleSummary>,
    pub premiums: Vec<PremiumResult>,
    pub intensities: Vec<(Scope, Vec<IntensityState>)>,
    pub opportunities: Vec<TradingOpportunity>,
}

#[derive(Debug)]
pub enum MonitorCommand {
    Start { reply: oneshot::Sender<bool> },
    Stop { reply: oneshot::Sender<bool> },
    /// Run one cycle now, whether or not the timer is armed
    RunOnce { reply: oneshot::Sender<CycleSummary> },
    Status { reply: oneshot::Sender<MonitorStatus> },
    Shutdown { reply: oneshot::Sender<()> },
}

/// Collaborators of the monitor
#[derive(Clone)]
pub struct MonitorContext {
    pub config: Arc<AppConfig>,
    pub registry: Arc<ExchangeRegistry>,
    pub fx: Arc<FxRateCache>,
    pub intensity_store: Arc<dyn IntensityStore>,
    pub settings: Arc<dyn SettingsStore>,
    pub active_bots: Arc<dyn ActiveBotSource>,
    pub cache: Arc<ResultCache>,
}

// =============================================================================
// Handle
// =============================================================================

/// Cloneable control surface of a spawned monitor
#[derive(Clone)]
pub struct MonitorHandle {
    commands: mpsc::Sender<MonitorCommand>,
    cache: Arc<ResultCache>,
}

impl MonitorHandle {
    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> MonitorCommand) -> Result<T, MonitorError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(build(reply))
            .await
            .map_err(|_| MonitorError::Closed)?;
        response.await.map_err(|_| MonitorError::Closed)
    }

    /// Start monitoring; `false` when already running
    ///
    /// Resolves after the first cycle has completed.
    pub async fn start(&self) -> Result<bool, MonitorError> {
        self.request(|reply| MonitorCommand::Start { reply }).await
    }

    /// Stop future cycles; `false` when not running
    pub async fn stop(&self) -> Result<bool, MonitorError> {
        self.request(|reply| MonitorCommand::Stop { reply }).await
    }

    pub async fn run_once(&self) -> Result<CycleSummary, MonitorError> {
        self.request(|reply| MonitorCommand::RunOnce { reply }).await
    }

    pub async fn status(&self) -> Result<MonitorStatus, MonitorError> {
        self.request(|reply| MonitorCommand::Status { reply }).await
    }

    /// Stop the owner task; the handle is unusable afterwards
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        self.request(|reply| MonitorCommand::Shutdown { reply }).await
    }

    pub async fn latest_results(&self) -> LatestResults {
        LatestResults {
            summary: self.cache.summary().await,
            premiums: self.cache.premiums().await,
            intensities: self.cache.intensities().await,
            opportunities: self.cache.opportunities().await,
        }
    }
}

// =============================================================================
// Service
// =============================================================================

struct SchedulerState {
    running: bool,
    interval_secs: u64,
    settings: Option<BotSettings>,
    next_execution: Option<DateTime<Utc>>,
    timer: Option<Interval>,
}

/// Last traded prices of one coin, blank where the ticker failed
struct LastPrices {
    domestic: Option<f64>,
    foreign: Option<f64>,
}

pub struct MonitoringService {
    ctx: MonitorContext,
    domestic: Arc<dyn ExchangeAdapter>,
    foreign: Arc<dyn ExchangeAdapter>,
    calculator: PremiumCalculator,
    intensity: IntensityAccumulator,
    opportunity_tx: Option<mpsc::Sender<TradingOpportunity>>,
}

impl MonitoringService {
    /// Resolve the monitored exchange pair from the registry
    pub fn new(ctx: MonitorContext) -> Result<Self, AppError> {
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
        let intensity = IntensityAccumulator::new(ctx.intensity_store.clone());

        Ok(Self {
            ctx,
            domestic,
            foreign,
            calculator,
            intensity,
            opportunity_tx: None,
        })
    }

    /// Also offer every opportunity on `tx` (dropped with a warning when full)
    pub fn with_opportunity_sender(mut self, tx: mpsc::Sender<TradingOpportunity>) -> Self {
        self.opportunity_tx = Some(tx);
        self
    }

    pub fn spawn(self) -> MonitorHandle {
        let (commands, rx) = mpsc::channel(monitor_command_capacity());
        let handle = MonitorHandle {
            commands,
            cache: self.ctx.cache.clone(),
        };
        tokio::spawn(self.run(rx));
        handle
    }

    async fn run(self, mut rx: mpsc::Receiver<MonitorCommand>) {
        let mut state = SchedulerState {
            running: false,
            interval_secs: self.ctx.config.monitoring.interval_secs,
            settings: None,
            next_execution: None,
            timer: None,
        };
        debug!("[MONITOR] Owner task started");

        loop {
            tokio::select! {
                command = rx.recv() => {
                    let Some(command) = command else {
                        debug!("[MONITOR] All handles dropped");
                        break;
                    };
                    if !self.handle(command, &mut state).await {
                        break;
                    }
                }
                _ = next_tick(&mut state.timer) => {
                    if state.running {
                        self.run_cycle(&mut state).await;
                    }
                }
            }
        }
        info!("[MONITOR] Owner task exited");
    }

    /// Returns false when the task must exit
    async fn handle(&self, command: MonitorCommand, state: &mut SchedulerState) -> bool {
        match command {
            MonitorCommand::Start { reply } => {
                let started = self.start(state).await;
                let _ = reply.send(started);
            }
            MonitorCommand::Stop { reply } => {
                let _ = reply.send(stop(state));
            }
            MonitorCommand::RunOnce { reply } => {
                let summary = self.run_cycle(state).await;
                let _ = reply.send(summary);
            }
            MonitorCommand::Status { reply } => {
                let _ = reply.send(MonitorStatus {
                    is_running: state.running,
                    interval_secs: state.interval_secs,
                    settings: state.settings.clone(),
                    next_execution_time: state.next_execution,
                });
            }
            MonitorCommand::Shutdown { reply } => {
                stop(state);
                let _ = reply.send(());
                return false;
            }
        }
        true
    }

    async fn start(&self, state: &mut SchedulerState) -> bool {
        if state.running {
            debug!("[MONITOR] Start ignored, already running");
            return false;
        }
        let settings = self.global_settings().await;
        state.interval_secs = settings.monitoring_interval_secs;
        state.settings = Some(settings);
        state.running = true;
        log_event(&TradingEvent::monitor_started(state.interval_secs));

        self.run_cycle(state).await;

        let period = Duration::from_secs(state.interval_secs);
        let mut timer = interval_at(Instant::now() + period, period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        state.timer = Some(timer);
        state.next_execution = Some(next_execution_after(state.interval_secs));
        true
    }

    /// Global settings from the store, config defaults for absent keys
    async fn global_settings(&self) -> BotSettings {
        let config = &self.ctx.config;
        let defaults = config.trading.default_bot_settings(config.monitoring.interval_secs);
        match self.ctx.settings.get_bot_settings(&Scope::Global, &defaults).await {
            Ok(Some(settings)) => match settings.validate() {
                Ok(()) => settings,
                Err(e) => {
                    warn!(error = %e, "[MONITOR] Invalid global settings, using defaults");
                    defaults
                }
            },
            Ok(None) => defaults,
            Err(e) => {
                warn!(error = %e, "[MONITOR] Failed to load global settings, using defaults");
                defaults
            }
        }
    }

    async fn run_cycle(&self, state: &mut SchedulerState) -> CycleSummary {
        let started_at = Utc::now();
        let clock = Instant::now();

        let global = self.global_settings().await;
        state.settings = Some(global.clone());

        let coins: Vec<&CoinMapping> = self.ctx.config.coins.iter().filter(|c| c.active).collect();

        let fx_rate = match self.ctx.fx.current_rate().await {
            Ok(rate) => Some(rate),
            Err(e) => {
                warn!(error = %e, "[MONITOR] No FX rate available, skipping premium calculation");
                None
            }
        };

        let mut premiums: Vec<PremiumResult> = Vec::with_capacity(coins.len());
        let mut last_prices: Vec<LastPrices> = Vec::with_capacity(coins.len());
        if let Some(rate) = fx_rate {
            let results = join_all(coins.iter().map(|coin| self.fetch_coin(coin, rate))).await;
            for (coin, result) in coins.iter().zip(results) {
                match result {
                    Ok((premium, last)) => {
                        premiums.push(premium);
                        last_prices.push(last);
                    }
                    Err(e) => warn!(symbol = %coin.symbol, error = %e, "[MONITOR] Coin fetch failed"),
                }
            }
        }

        let mut opportunities = 0;

        // Global scope
        let global_thresholds = thresholds_of(&global);
        for premium in &premiums {
            self.ctx.cache.put_premium(premium.clone()).await;
            log_event(&TradingEvent::premium_calculated(&premium.symbol, premium.premium_percent));
            if self.observe(&Scope::Global, premium, global_thresholds).await {
                opportunities += 1;
            }
        }
        self.refresh_snapshot(&Scope::Global).await;

        // User scopes, sequential
        let users = match self.ctx.active_bots.active_user_ids().await {
            Ok(users) => users,
            Err(e) => {
                warn!(error = %e, "[MONITOR] Failed to list active bots");
                Vec::new()
            }
        };
        let mut users_processed = 0;
        let mut processed = HashSet::from([Scope::Global]);
        for user_id in users {
            let scope = Scope::User(user_id);
            let Some(settings) = self.user_settings(&scope, &global).await else {
                continue;
            };
            let thresholds = thresholds_of(&settings);
            for premium in &premiums {
                if self.observe(&scope, premium, thresholds).await {
                    opportunities += 1;
                }
            }
            self.refresh_snapshot(&scope).await;
            processed.insert(scope);
            users_processed += 1;
        }
        // Disabled or misconfigured users drop out of the read model
        self.ctx.cache.retain_intensity_scopes(&processed).await;

        let duration_ms = clock.elapsed().as_millis() as u64;
        let summary = CycleSummary {
            started_at,
            duration_ms,
            total_coins: coins.len(),
            succeeded: premiums.len(),
            failed: coins.len() - premiums.len(),
            fx_rate,
            premiums: premiums
                .iter()
                .zip(&last_prices)
                .map(|(p, last)| CoinPremium {
                    symbol: p.symbol.clone(),
                    premium_percent: p.premium_percent,
                    domestic_last_price: last.domestic,
                    foreign_last_price: last.foreign,
                })
                .collect(),
            opportunities,
            users_processed,
        };
        self.ctx.cache.put_summary(summary.clone()).await;
        log_event(&TradingEvent::cycle_completed(summary.succeeded, summary.failed, duration_ms));

        if state.running {
            state.next_execution = Some(next_execution_after(state.interval_secs));
        }
        summary
    }

    async fn fetch_coin(
        &self,
        coin: &CoinMapping,
        fx_rate: f64,
    ) -> Result<(PremiumResult, LastPrices), ExchangeError> {
        let depth = self.calculator.depth;
        let (domestic, foreign, domestic_ticker, foreign_ticker) = tokio::join!(
            self.domestic.get_orderbook(&coin.domestic_market, depth),
            self.foreign.get_orderbook(&coin.foreign_market, depth),
            self.domestic.get_ticker(&coin.domestic_market),
            self.foreign.get_ticker(&coin.foreign_market),
        );
        let (domestic, foreign) = (domestic?, foreign?);
        let premium = self
            .calculator
            .calculate(&coin.symbol, &domestic, &foreign, fx_rate)
            .ok_or_else(|| {
                ExchangeError::InvalidResponse(format!("{}: orderbook has no usable depth", coin.symbol))
            })?;

        let last_price = |market: &str, ticker: ExchangeResult<Ticker>| match ticker {
            Ok(t) => Some(t.price),
            Err(e) => {
                debug!(market = %market, error = %e, "[MONITOR] Ticker unavailable");
                None
            }
        };
        let last = LastPrices {
            domestic: last_price(&coin.domestic_market, domestic_ticker),
            foreign: last_price(&coin.foreign_market, foreign_ticker),
        };
        Ok((premium, last))
    }

    /// Settings of a user scope, `None` (with a warning) when unusable
    async fn user_settings(&self, scope: &Scope, global: &BotSettings) -> Option<BotSettings> {
        match self.ctx.settings.get_bot_settings(scope, global).await {
            Ok(Some(settings)) => match settings.validate() {
                Ok(()) => Some(settings),
                Err(e) => {
                    warn!(scope = %scope, error = %e, "[MONITOR] Skipping user with invalid settings");
                    None
                }
            },
            Ok(None) => {
                warn!(scope = %scope, "[MONITOR] Skipping user without settings");
                None
            }
            Err(e) => {
                warn!(scope = %scope, error = %e, "[MONITOR] Skipping user, settings unreadable");
                None
            }
        }
    }

    /// Feed one premium into a scope; true when an opportunity was emitted
    async fn observe(&self, scope: &Scope, premium: &PremiumResult, thresholds: IntensityThresholds) -> bool {
        let update = match self
            .intensity
            .observe(scope, &premium.symbol, premium.premium_percent, thresholds)
            .await
        {
            Ok(update) => update,
            Err(e) => {
                warn!(scope = %scope, symbol = %premium.symbol, error = %e, "[INTENSITY] Update failed");
                return false;
            }
        };
        if !update.triggered {
            return false;
        }

        let opportunity = TradingOpportunity {
            symbol: premium.symbol.clone(),
            scope: scope.to_string(),
            premium_percent: premium.premium_percent,
            intensity: update.current,
            timestamp: current_time_ms(),
        };
        self.emit(opportunity).await;
        true
    }

    async fn emit(&self, opportunity: TradingOpportunity) {
        log_event(&TradingEvent::opportunity_detected(
            &opportunity.symbol,
            &opportunity.scope,
            opportunity.premium_percent,
            opportunity.intensity,
        ));
        self.ctx.cache.push_opportunity(opportunity.clone()).await;

        if let Some(tx) = &self.opportunity_tx {
            match tx.try_send(opportunity) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(dropped)) => {
                    warn!(symbol = %dropped.symbol, scope = %dropped.scope, "[MONITOR] Opportunity channel full, dropped");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!("[MONITOR] Opportunity channel closed");
                }
            }
        }
    }

    async fn refresh_snapshot(&self, scope: &Scope) {
        match self.intensity.snapshot(scope).await {
            Ok(states) => self.ctx.cache.put_intensities(scope.clone(), states).await,
            Err(e) => warn!(scope = %scope, error = %e, "[INTENSITY] Snapshot failed"),
        }
    }
}

fn stop(state: &mut SchedulerState) -> bool {
    if !state.running {
        debug!("[MONITOR] Stop ignored, not running");
        return false;
    }
    state.running = false;
    state.timer = None;
    state.next_execution = None;
    log_event(&TradingEvent::monitor_stopped());
    true
}

fn thresholds_of(settings: &BotSettings) -> IntensityThresholds {
    IntensityThresholds {
        premium_threshold: settings.premium_threshold,
        trigger_threshold: settings.trading_intensity_threshold,
    }
}

fn next_execution_after(interval_secs: u64) -> DateTime<Utc> {
    Utc::now() + chrono::Duration::seconds(interval_secs as i64)
}

/// Next timer tick, or never while the timer is disarmed
async fn next_tick(timer: &mut Option<Interval>) {
    match timer {
        Some(timer) => {
            timer.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
