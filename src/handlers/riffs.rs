//! Riff marketplace routes.
//!
//! Every route validates its request with one of the `Valid*` extractors
//! before the handler body runs, then makes exactly one call on the
//! [`RiffController`](crate::services::RiffController).
//!
//! ## Endpoints
//!
//! - `GET /` - Filtered, paginated listing
//! - `GET /riff/{id}` - Single riff
//! - `GET /activity/{id}` - Activity log of a riff
//! - `POST /upload` - Multipart upload (`audio`, `cover`, text fields)
//! - `POST /riff/{id}/mint` - Mint by the creator
//! - `POST /stake/riff/{id}/{walletAddress}` - Open or grow a stake
//! - `POST /unstake/riff/{id}/{walletAddress}` - Close a stake
//! - `GET /rewards/{id}/{walletAddress}` - Pending staking rewards
//! - `POST /rewards-claim/riff/{id}/{walletAddress}` - Claim rewards
//! - `POST /favorite/add/riff/{id}/{walletAddress}`
//! - `POST /favorite/remove/riff/{id}/{walletAddress}`
//! - `GET /latest` - Most recent riff
//! - `GET /random` - Random riff

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    routing::{get, post, MethodRouter},
    Json, Router,
};

use crate::error::Result;
use crate::models::{
    ActivityResponse, ClaimResponse, FavoriteResponse, MintResponse, RiffFilter, RiffIdParams,
    RiffPage, RiffResponse, RiffWalletParams, StakeBody, StakeResponse, StakingRewardsResponse,
    UnstakeResponse, WalletBody,
};
use crate::state::RiffApi;
use crate::validation::{ValidParams, ValidParamsBody, ValidQuery, ValidUpload};

/// GET /
async fn list_riffs(
    State(api): State<RiffApi>,
    ValidQuery(filter): ValidQuery<RiffFilter>,
) -> Result<Json<RiffPage>> {
    api.controller.get_all_riffs(filter).await.map(Json)
}

/// GET /riff/{id}
async fn get_riff(
    State(api): State<RiffApi>,
    ValidParams(params): ValidParams<RiffIdParams>,
) -> Result<Json<RiffResponse>> {
    api.controller.get_riff_by_id(params.id).await.map(Json)
}

/// GET /activity/{id}
async fn get_activity(
    State(api): State<RiffApi>,
    ValidParams(params): ValidParams<RiffIdParams>,
) -> Result<Json<ActivityResponse>> {
    api.controller.get_riff_activity(params.id).await.map(Json)
}

/// POST /upload
///
/// Returns 201 with the created riff.
async fn upload_riff(
    State(api): State<RiffApi>,
    ValidUpload { request, files }: ValidUpload,
) -> Result<(StatusCode, Json<RiffResponse>)> {
    let riff = api.controller.upload_riff(request, files).await?;
    Ok((StatusCode::CREATED, Json(riff)))
}

/// POST /riff/{id}/mint
async fn mint_riff(
    State(api): State<RiffApi>,
    ValidParamsBody(params, body): ValidParamsBody<RiffIdParams, WalletBody>,
) -> Result<Json<MintResponse>> {
    api.controller
        .mint_riff(params.id, body.wallet_address)
        .await
        .map(Json)
}

/// POST /stake/riff/{id}/{walletAddress}
async fn stake_riff(
    State(api): State<RiffApi>,
    ValidParamsBody(params, body): ValidParamsBody<RiffWalletParams, StakeBody>,
) -> Result<Json<StakeResponse>> {
    api.controller
        .stake_riff(params.id, params.wallet_address, body.amount)
        .await
        .map(Json)
}

/// POST /unstake/riff/{id}/{walletAddress}
async fn unstake_riff(
    State(api): State<RiffApi>,
    ValidParams(params): ValidParams<RiffWalletParams>,
) -> Result<Json<UnstakeResponse>> {
    api.controller
        .unstake_riff(params.id, params.wallet_address)
        .await
        .map(Json)
}

/// GET /rewards/{id}/{walletAddress}
async fn get_rewards(
    State(api): State<RiffApi>,
    ValidParams(params): ValidParams<RiffWalletParams>,
) -> Result<Json<StakingRewardsResponse>> {
    api.controller
        .get_staking_rewards(params.id, params.wallet_address)
        .await
        .map(Json)
}

/// POST /rewards-claim/riff/{id}/{walletAddress}
async fn claim_rewards(
    State(api): State<RiffApi>,
    ValidParams(params): ValidParams<RiffWalletParams>,
) -> Result<Json<ClaimResponse>> {
    api.controller
        .claim_rewards(params.id, params.wallet_address)
        .await
        .map(Json)
}

/// POST /favorite/add/riff/{id}/{walletAddress}
async fn add_favorite(
    State(api): State<RiffApi>,
    ValidParams(params): ValidParams<RiffWalletParams>,
) -> Result<Json<FavoriteResponse>> {
    api.controller
        .add_to_favorites(params.id, params.wallet_address)
        .await
        .map(Json)
}

/// POST /favorite/remove/riff/{id}/{walletAddress}
async fn remove_favorite(
    State(api): State<RiffApi>,
    ValidParams(params): ValidParams<RiffWalletParams>,
) -> Result<Json<FavoriteResponse>> {
    api.controller
        .remove_from_favorites(params.id, params.wallet_address)
        .await
        .map(Json)
}

/// GET /latest
async fn latest_riff(State(api): State<RiffApi>) -> Result<Json<RiffResponse>> {
    api.controller.get_latest_riff().await.map(Json)
}

/// GET /random
async fn random_riff(State(api): State<RiffApi>) -> Result<Json<RiffResponse>> {
    api.controller.get_random_riff().await.map(Json)
}

/// Create the riff route table over `api`.
///
/// The returned router carries its own state, so it can be nested into a
/// router of any state type.
pub fn riff_routes<S>(api: RiffApi) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let upload_limit = DefaultBodyLimit::max(api.uploads.max_request_size());

    Router::new()
        .route("/", get(list_riffs))
        .route("/riff/{id}", get(get_riff))
        .route("/activity/{id}", get(get_activity))
        .route("/upload", post(upload_riff).layer(upload_limit))
        .route("/riff/{id}/mint", post(mint_riff))
        .route("/stake/riff/{id}/{walletAddress}", post(stake_riff))
        .route("/unstake/riff/{id}/{walletAddress}", post(unstake_riff))
        .route("/rewards/{id}/{walletAddress}", get(get_rewards))
        .route(
            "/rewards-claim/riff/{id}/{walletAddress}",
            post(claim_rewards),
        )
        .route("/favorite/add/riff/{id}/{walletAddress}", post(add_favorite))
        .route(
            "/favorite/remove/riff/{id}/{walletAddress}",
            post(remove_favorite),
        )
        .route("/latest", get(latest_riff))
        .route("/random", get(random_riff))
        .with_state(api)
}

/// Listing route for the trailing-slash form of the mount point.
///
/// A nested `/` only matches the bare prefix, so `/api/riffs/` is routed
/// separately.
pub fn riff_listing_route<S>(api: RiffApi) -> MethodRouter<S>
where
    S: Clone + Send + Sync + 'static,
{
    get(list_riffs).with_state(api)
}
