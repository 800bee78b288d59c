//! Health check endpoints.
//!
//! Provides endpoints for monitoring server health and readiness.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tracing::warn;

use crate::services::StorageStats;
use crate::state::AppState;

/// Health check response
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Server status
    pub status: &'static str,
    /// Server version
    pub version: &'static str,
}

/// Liveness probe - server is running
///
/// GET /health/live
async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness response
#[derive(Debug, Serialize)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: &'static str,
}

/// Readiness probe - database is reachable
///
/// GET /health/ready
///
/// Answers 503 while the database cannot be read.
async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    match state.db.ping() {
        Ok(()) => (
            StatusCode::OK,
            Json(ReadinessResponse {
                status: "ready",
                database: "connected",
            }),
        ),
        Err(e) => {
            warn!(error = %e, "Readiness check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ReadinessResponse {
                    status: "not_ready",
                    database: "disconnected",
                }),
            )
        }
    }
}

/// Stats response
#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub riff_count: u64,
    pub media_count: u64,
    pub storage: Option<StorageStats>,
}

/// Catalogue and storage stats
///
/// GET /health/stats
async fn stats(State(state): State<AppState>) -> Json<StatsResponse> {
    let storage = state.storage.get_stats().await.ok();

    Json(StatsResponse {
        riff_count: state.db.get_riff_count().unwrap_or(0),
        media_count: state.db.get_media_count().unwrap_or(0),
        storage,
    })
}

/// Create health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/live", get(liveness))
        .route("/ready", get(readiness))
        .route("/stats", get(stats))
}
