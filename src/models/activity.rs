//! Riff activity log entries.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of event recorded against a riff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    Upload,
    Mint,
    Favorite,
    Unfavorite,
    Stake,
    Unstake,
    RewardClaim,
}

/// A recorded event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    /// Position in the riff's activity log
    pub seq: u64,
    pub riff_id: u64,
    pub kind: ActivityKind,
    pub wallet_address: String,
    /// Amount moved by stake, unstake and claim events
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub created_at: DateTime<Utc>,
}

impl ActivityEvent {
    pub fn new(riff_id: u64, kind: ActivityKind, wallet_address: impl Into<String>) -> Self {
        Self {
            seq: 0,
            riff_id,
            kind,
            wallet_address: wallet_address.into(),
            amount: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_amount(mut self, amount: f64) -> Self {
        self.amount = Some(amount);
        self
    }
}

/// Activity of one riff, newest first
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityResponse {
    pub riff_id: u64,
    pub events: Vec<ActivityEvent>,
}
