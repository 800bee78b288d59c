//! The operations the riff routes dispatch to.
//!
//! Handlers only see this trait, so the route table can run against any
//! implementation. [`RiffService`](super::RiffService) is the real one.

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{
    ActivityResponse, ClaimResponse, FavoriteResponse, MintResponse, RiffFilter, RiffPage,
    RiffResponse, StakeResponse, StakingRewardsResponse, UnstakeResponse, UploadRiffRequest,
};
use crate::validation::UploadFiles;

/// Riff marketplace operations.
///
/// Ids arrive exactly as validated from the request (any `i64`); ids that
/// cannot name a riff are reported as not found.
#[async_trait]
pub trait RiffController: Send + Sync {
    /// Filtered, sorted, paginated listing
    async fn get_all_riffs(&self, filter: RiffFilter) -> Result<RiffPage>;

    async fn get_riff_by_id(&self, id: i64) -> Result<RiffResponse>;

    /// Activity log of a riff, newest first
    async fn get_riff_activity(&self, id: i64) -> Result<ActivityResponse>;

    /// Store the uploaded media and create the riff
    async fn upload_riff(&self, request: UploadRiffRequest, files: UploadFiles)
        -> Result<RiffResponse>;

    /// Record an off-chain mint by the riff's creator
    async fn mint_riff(&self, id: i64, wallet_address: String) -> Result<MintResponse>;

    async fn stake_riff(&self, id: i64, wallet_address: String, amount: f64)
        -> Result<StakeResponse>;

    async fn unstake_riff(&self, id: i64, wallet_address: String) -> Result<UnstakeResponse>;

    async fn get_staking_rewards(
        &self,
        id: i64,
        wallet_address: String,
    ) -> Result<StakingRewardsResponse>;

    async fn claim_rewards(&self, id: i64, wallet_address: String) -> Result<ClaimResponse>;

    async fn add_to_favorites(&self, id: i64, wallet_address: String)
        -> Result<FavoriteResponse>;

    async fn remove_from_favorites(
        &self,
        id: i64,
        wallet_address: String,
    ) -> Result<FavoriteResponse>;

    /// Most recently uploaded riff
    async fn get_latest_riff(&self) -> Result<RiffResponse>;

    /// Uniformly chosen riff
    async fn get_random_riff(&self) -> Result<RiffResponse>;
}
