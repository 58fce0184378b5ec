//! Trade lifecycle state
//!
//! `TradeRecord` is the persisted row of one execution attempt. Its status
//! follows `pending -> buying -> transferring -> selling -> completed`, with
//! `failed` reachable from every non-terminal state. All status changes go
//! through [`TradeRecord::transition`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Status of a trade execution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeStatus {
    Pending,
    Buying,
    Transferring,
    Selling,
    Completed,
    Failed,
}

impl TradeStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TradeStatus::Completed | TradeStatus::Failed)
    }

    /// Whether `self -> next` is an edge of the state machine
    pub fn can_transition_to(self, next: TradeStatus) -> bool {
        use TradeStatus::*;
        match (self, next) {
            (Pending, Buying) | (Buying, Transferring) | (Transferring, Selling) | (Selling, Completed) => true,
            (from, Failed) => !from.is_terminal(),
            _ => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TradeStatus::Pending => "pending",
            TradeStatus::Buying => "buying",
            TradeStatus::Transferring => "transferring",
            TradeStatus::Selling => "selling",
            TradeStatus::Completed => "completed",
            TradeStatus::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TradeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors for trade state changes
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StateError {
    #[error("Invalid trade transition: {from} -> {to}")]
    InvalidTransition { from: TradeStatus, to: TradeStatus },
}

/// Realized profit figures written when a trade completes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfitBreakdown {
    pub gross_profit: f64,
    pub trading_fees: f64,
    pub transfer_fees: f64,
    pub net_profit: f64,
    /// Net profit as a percentage of the buy notional
    pub profit_rate: f64,
}

/// Persisted lifecycle record of one trade execution
///
/// Price and profit columns stay empty until the execution reaches the
/// step that computes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub id: Uuid,
    /// Owning user; `None` for system-level trades
    pub user_id: Option<String>,
    /// Coin symbol (e.g. "BTC")
    pub coin_id: String,
    pub buy_exchange_id: Option<String>,
    pub sell_exchange_id: Option<String>,
    pub buy_price: Option<f64>,
    pub sell_price: Option<f64>,
    pub quantity: Option<f64>,
    pub gross_profit: Option<f64>,
    pub net_profit: Option<f64>,
    pub profit_rate: Option<f64>,
    pub trading_fees: Option<f64>,
    pub transfer_fees: Option<f64>,
    pub status: TradeStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

impl TradeRecord {
    /// New record in `pending` with a fresh id
    pub fn new_pending(user_id: Option<String>, coin_id: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            coin_id: coin_id.to_string(),
            buy_exchange_id: None,
            sell_exchange_id: None,
            buy_price: None,
            sell_price: None,
            quantity: None,
            gross_profit: None,
            net_profit: None,
            profit_rate: None,
            trading_fees: None,
            transfer_fees: None,
            status: TradeStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
            error_message: None,
        }
    }

    /// Move to `next`, stamping `completed_at` on terminal states
    pub fn transition(&mut self, next: TradeStatus) -> Result<(), StateError> {
        if !self.status.can_transition_to(next) {
            return Err(StateError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
        }
        Ok(())
    }

    /// Transition to `completed` and record the profit figures
    pub fn complete(&mut self, profit: ProfitBreakdown) -> Result<(), StateError> {
        self.transition(TradeStatus::Completed)?;
        self.gross_profit = Some(profit.gross_profit);
        self.trading_fees = Some(profit.trading_fees);
        self.transfer_fees = Some(profit.transfer_fees);
        self.net_profit = Some(profit.net_profit);
        self.profit_rate = Some(profit.profit_rate);
        Ok(())
    }

    /// Transition to `failed` with the captured error
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), StateError> {
        self.transition(TradeStatus::Failed)?;
        self.error_message = Some(message.into());
        Ok(())
    }
}
