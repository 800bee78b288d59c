//! Stake positions and reward accrual.
//!
//! Rewards accrue continuously on the staked amount:
//!
//! ```text
//! amount * (elapsed_secs / SECONDS_PER_YEAR) * annual_rate * (share_percent / 100)
//! ```
//!
//! Every change to the amount first checkpoints what has accrued so far, so a
//! position never loses rewards earned at an earlier amount.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 365 days
pub const SECONDS_PER_YEAR: f64 = 31_536_000.0;

/// Reward parameters in effect for a riff
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RewardTerms {
    /// Riff's staking royalty share, 0-100
    pub share_percent: u8,
    /// Configured yearly rate (0.12 = 12%)
    pub annual_rate: f64,
}

impl RewardTerms {
    /// Reward earned by `amount` over `elapsed_secs`
    pub fn accrual(&self, amount: f64, elapsed_secs: f64) -> f64 {
        // Scale time down first so huge amounts do not overflow
        amount
            * (elapsed_secs / SECONDS_PER_YEAR)
            * self.annual_rate
            * (f64::from(self.share_percent) / 100.0)
    }
}

/// A wallet's stake on one riff
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StakePosition {
    pub riff_id: u64,
    pub wallet_address: String,
    /// Currently staked amount
    pub amount: f64,
    /// Rewards accrued up to `last_checkpoint` and not yet claimed
    pub accrued: f64,
    pub total_claimed: f64,
    pub last_checkpoint: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl StakePosition {
    pub fn new(riff_id: u64, wallet_address: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            riff_id,
            wallet_address: wallet_address.into(),
            amount: 0.0,
            accrued: 0.0,
            total_claimed: 0.0,
            last_checkpoint: now,
            created_at: now,
        }
    }

    fn elapsed_secs(&self, now: DateTime<Utc>) -> f64 {
        let millis = (now - self.last_checkpoint).num_milliseconds().max(0);
        millis as f64 / 1000.0
    }

    /// Unclaimed rewards as of `now`
    pub fn pending_rewards(&self, terms: &RewardTerms, now: DateTime<Utc>) -> f64 {
        self.accrued + terms.accrual(self.amount, self.elapsed_secs(now))
    }

    /// Fold rewards earned since the last checkpoint into `accrued`
    pub fn checkpoint(&mut self, terms: &RewardTerms, now: DateTime<Utc>) {
        self.accrued = self.pending_rewards(terms, now);
        self.last_checkpoint = now;
    }

    /// Add to the staked amount
    pub fn stake(&mut self, amount: f64, terms: &RewardTerms, now: DateTime<Utc>) {
        self.checkpoint(terms, now);
        self.amount += amount;
    }

    /// Release the whole staked amount; accrued rewards stay claimable
    pub fn unstake(&mut self, terms: &RewardTerms, now: DateTime<Utc>) -> f64 {
        self.checkpoint(terms, now);
        std::mem::take(&mut self.amount)
    }

    /// Move pending rewards into `total_claimed`, returning the claimed amount
    pub fn claim(&mut self, terms: &RewardTerms, now: DateTime<Utc>) -> f64 {
        self.checkpoint(terms, now);
        let claimed = std::mem::take(&mut self.accrued);
        self.total_claimed += claimed;
        claimed
    }

    pub fn is_active(&self) -> bool {
        self.amount > 0.0
    }

    /// Non-finite values do not survive a JSON round trip
    pub fn is_finite(&self) -> bool {
        self.amount.is_finite() && self.accrued.is_finite() && self.total_claimed.is_finite()
    }
}

/// Staking state of a wallet on a riff
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakingRewardsResponse {
    pub riff_id: u64,
    pub wallet_address: String,
    pub staked_amount: f64,
    pub pending_rewards: f64,
    pub total_claimed: f64,
    pub staking_royalty_share: u8,
    pub annual_reward_rate: f64,
}

impl StakingRewardsResponse {
    /// Report for `position`, or zeros when the wallet never staked
    pub fn new(
        riff_id: u64,
        wallet_address: &str,
        position: Option<&StakePosition>,
        terms: &RewardTerms,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            riff_id,
            wallet_address: wallet_address.to_string(),
            staked_amount: position.map_or(0.0, |p| p.amount),
            pending_rewards: position.map_or(0.0, |p| p.pending_rewards(terms, now)),
            total_claimed: position.map_or(0.0, |p| p.total_claimed),
            staking_royalty_share: terms.share_percent,
            annual_reward_rate: terms.annual_rate,
        }
    }
}

/// Result of a stake
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StakeResponse {
    pub riff_id: u64,
    pub wallet_address: String,
    pub staked_amount: f64,
    pub pending_rewards: f64,
}

/// Result of an unstake
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnstakeResponse {
    pub riff_id: u64,
    pub wallet_address: String,
    pub unstaked_amount: f64,
    pub pending_rewards: f64,
}

/// Result of a reward claim
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClaimResponse {
    pub riff_id: u64,
    pub wallet_address: String,
    pub claimed: f64,
    pub total_claimed: f64,
}
