//! Kimchi premium monitor entry point
//!
//! 1. Loads `.env` and `config.yaml` (`CONFIG_PATH` overrides the path)
//! 2. Builds the exchange registry, FX source and in-memory stores
//! 3. Starts the monitor and logs every trading opportunity
//! 4. Stops cleanly on Ctrl+C

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::signal;
use tracing::{error, info};

use kimchi_arb::adapters::ExchangeRegistry;
use kimchi_arb::config::{self, constants, logging};
use kimchi_arb::core::{
    fx_source_from_config, ChannelBundle, FxRateCache, MonitorContext, MonitoringService, ResultCache,
};
use kimchi_arb::storage::{MemoryActiveBots, MemoryIntensityStore, MemorySettingsStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file (if it exists)
    dotenvy::dotenv().ok();
    logging::init_logging();

    info!("Kimchi premium monitor starting...");
    constants::log_configuration();

    let config_path = std::env::var("CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.yaml"));
    let config = match config::load_config(&config_path) {
        Ok(cfg) => {
            let coins: Vec<&str> = cfg.coins.iter().filter(|c| c.active).map(|c| c.symbol.as_str()).collect();
            info!(
                path = %config_path.display(),
                domestic = %cfg.monitoring.domestic_exchange,
                foreign = %cfg.monitoring.foreign_exchange,
                "[CONFIG] Loaded coins: {:?}",
                coins
            );
            Arc::new(cfg)
        }
        Err(e) => {
            error!("[ERROR] Configuration failed: {}", e);
            std::process::exit(1);
        }
    };

    let registry = Arc::new(ExchangeRegistry::from_config(&config));
    let fx = Arc::new(FxRateCache::new(fx_source_from_config(&config.fx, &registry)?));
    let cache = Arc::new(ResultCache::new(
        Duration::from_secs(config.monitoring.premium_ttl_secs),
        Duration::from_secs(config.monitoring.summary_ttl_secs),
        config.monitoring.opportunity_history,
    ));

    let channels = ChannelBundle::new(constants::opportunity_channel_capacity());
    let ctx = MonitorContext {
        config: config.clone(),
        registry,
        fx,
        intensity_store: Arc::new(MemoryIntensityStore::new()),
        settings: Arc::new(MemorySettingsStore::new()),
        active_bots: Arc::new(MemoryActiveBots::new(Vec::new())),
        cache,
    };
    let monitor = MonitoringService::new(ctx)?
        .with_opportunity_sender(channels.opportunity_tx.clone())
        .spawn();

    // Opportunity consumer: automatic trading would hook in here
    let mut opportunity_rx = channels.opportunity_rx;
    let mut consumer_shutdown = channels.shutdown_tx.subscribe();
    let consumer = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = consumer_shutdown.recv() => break,
                opportunity = opportunity_rx.recv() => {
                    let Some(opportunity) = opportunity else { break };
                    info!(
                        symbol = %opportunity.symbol,
                        scope = %opportunity.scope,
                        premium = %format!("{:.4}%", opportunity.premium_percent),
                        intensity = opportunity.intensity,
                        "[OPPORTUNITY] Trading opportunity"
                    );
                }
            }
        }
    });

    if !monitor.start().await? {
        error!("[MONITOR] Monitor was already running");
    }
    let status = monitor.status().await?;
    info!(
        interval_secs = status.interval_secs,
        next = ?status.next_execution_time,
        "Monitoring started. Press Ctrl+C to stop."
    );

    signal::ctrl_c().await?;
    info!("[SHUTDOWN] Graceful shutdown initiated");

    monitor.stop().await?;
    monitor.shutdown().await?;
    let _ = channels.shutdown_tx.send(());
    let _ = consumer.await;

    if let Some(summary) = monitor.latest_results().await.summary {
        info!(
            succeeded = summary.succeeded,
            failed = summary.failed,
            opportunities = summary.opportunities,
            "[SHUTDOWN] Last cycle"
        );
    }
    info!("[SHUTDOWN] Clean exit");
    Ok(())
}
