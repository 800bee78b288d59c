//! # Riff Marketplace Server
//!
//! HTTP API for a marketplace of "riffs": uploaded audio assets that can be
//! minted, staked for rewards and favorited by wallet-identified users.
//!
//! ## Features
//!
//! - **Riff API**: upload, listing with filters, mint, stake, rewards, favorites
//! - **Request validation**: every route checks its fields before dispatch
//! - **Media serving**: audio and cover files with immutable caching
//! - **Content Deduplication**: identical files are stored once
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────┐
//! │                  HTTP Server                     │
//! │  ┌─────────────┐ ┌─────────────┐ ┌───────────┐ │
//! │  │  Riff API   │ │  Media API  │ │  Health   │ │
//! │  └──────┬──────┘ └─────────────┘ └───────────┘ │
//! │   validators → RiffController                    │
//! ├─────────────────────────────────────────────────┤
//! │                   Services                       │
//! │  ┌─────────────┐ ┌─────────────┐ ┌───────────┐ │
//! │  │  Storage    │ │   Media     │ │ Database  │ │
//! │  │  Service    │ │  Processor  │ │  Service  │ │
//! │  └─────────────┘ └─────────────┘ └───────────┘ │
//! ├─────────────────────────────────────────────────┤
//! │              File System / RocksDB               │
//! └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! # Start the server
//! cargo run --release
//!
//! # Upload a riff
//! curl -X POST http://localhost:3000/api/riffs/upload \
//!   -F "audio=@riff.mp3" -F "cover=@cover.png" \
//!   -F "title=First riff" -F "walletAddress=0xabc"
//!
//! # List riffs
//! curl "http://localhost:3000/api/riffs?genre=rock&limit=10"
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod validation;

pub use config::Config;
pub use error::{AppError, Result};
pub use middleware::RateLimiter;
pub use state::{AppState, RiffApi};

use anyhow::Context;
use axum::Router;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};
use tracing::info;

/// How often idle rate limiter buckets are pruned
const LIMITER_CLEANUP_INTERVAL: Duration = Duration::from_secs(300);

/// Run the server with the given configuration until it fails.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("Invalid server address")?;

    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    serve(listener, config).await
}

/// Serve the API on an already bound listener.
///
/// Tests bind port 0 and pass the listener here to learn the real address.
pub async fn serve(listener: TcpListener, config: Config) -> anyhow::Result<()> {
    let state = AppState::new(config).await?;
    let rate_limiter = RateLimiter::new(&state.config.rate_limit);

    if rate_limiter.is_enabled() {
        info!(
            requests_per_window = state.config.rate_limit.requests_per_window,
            window_seconds = state.config.rate_limit.window_seconds,
            "Rate limiting enabled"
        );

        let limiter = rate_limiter.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(LIMITER_CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                limiter.cleanup();
            }
        });
    }

    let app = create_router(state, &rate_limiter);

    info!(address = %listener.local_addr()?, "API server starting");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// Create the API router
pub fn create_router(state: AppState, rate_limiter: &RateLimiter) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Uploads are the largest requests the API accepts
    let body_limit = RequestBodyLimitLayer::new(state.config.upload.max_request_size());

    Router::new()
        .nest("/api/riffs", handlers::riff_routes(state.riffs.clone()))
        .route("/api/riffs/", handlers::riff_listing_route(state.riffs.clone()))
        .nest("/media", handlers::media_routes())
        .nest("/health", handlers::health_routes())
        .layer(cors)
        .layer(body_limit)
        .layer(rate_limiter.layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
