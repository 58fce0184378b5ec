//! Channel bundle for inter-task communication
//!
//! The monitor offers every detected `TradingOpportunity` on a bounded
//! mpsc channel; a consumer (logging today, automatic trading later) reads
//! the other end. A broadcast channel carries the shutdown signal.

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, mpsc};

/// Default channel capacity for bounded channels
pub const DEFAULT_CHANNEL_CAPACITY: usize = 100;

/// A scope whose intensity reached its trigger threshold
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingOpportunity {
    pub symbol: String,
    /// "global" or "user:<id>"
    pub scope: String,
    pub premium_percent: f64,
    pub intensity: u32,
    /// Unix ms
    pub timestamp: u64,
}

/// Bundle of all inter-task communication channels
#[derive(Debug)]
pub struct ChannelBundle {
    /// Monitor -> consumer: trading opportunities
    pub opportunity_tx: mpsc::Sender<TradingOpportunity>,
    pub opportunity_rx: mpsc::Receiver<TradingOpportunity>,

    /// Shutdown broadcast: main -> all tasks
    pub shutdown_tx: broadcast::Sender<()>,
}

impl ChannelBundle {
    pub fn new(capacity: usize) -> Self {
        let (opportunity_tx, opportunity_rx) = mpsc::channel(capacity);
        let (shutdown_tx, _) = broadcast::channel(1);

        Self {
            opportunity_tx,
            opportunity_rx,
            shutdown_tx,
        }
    }

    pub fn subscribe_shutdown(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }
}

impl Default for ChannelBundle {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}
