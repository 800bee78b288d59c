//! Media serving handlers.
//!
//! Streams the audio and cover files referenced by riff responses
//! (`audioUrl`, `coverUrl`).
//!
//! ## Endpoints
//!
//! - `GET /media/{id}` - Stored file with its detected content type
//!
//! ## Caching
//!
//! Stored files never change, so responses carry
//! `Cache-Control: public, max-age={server.cache_max_age}, immutable` and an
//! `ETag` built from the content hash. A matching `If-None-Match` gets `304`.

use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tracing::debug;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::state::AppState;

/// Serve a stored media file
///
/// GET /media/{id}
async fn serve_media(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response> {
    // Anything that is not a UUID cannot name a stored file
    let not_found = || AppError::not_found(format!("Media not found: {}", id));
    let uuid = Uuid::parse_str(&id).map_err(|_| not_found())?;

    let media = state.db.get_media(uuid)?.ok_or_else(not_found)?;

    let etag = format!("\"{}\"", media.content_hash);
    let cached = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.split(',').any(|tag| tag.trim() == etag));
    if cached {
        return Ok((StatusCode::NOT_MODIFIED, [(header::ETAG, etag)]).into_response());
    }

    let file_path = state.storage.media_path(&media);
    let file = match File::open(&file_path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AppError::not_found(format!(
                "File missing for media: {}",
                uuid
            )));
        }
        Err(e) => return Err(e.into()),
    };
    let body = Body::from_stream(ReaderStream::new(file));

    let cache_control = format!("public, max-age={}, immutable", state.cache_max_age());

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, &media.mime_type)
        .header(header::CONTENT_LENGTH, media.size)
        .header(header::CACHE_CONTROL, cache_control)
        .header(header::ETAG, etag)
        .header("X-Content-Type-Options", "nosniff")
        .body(body)
        .map_err(|e| AppError::internal(format!("Failed to build response: {}", e)))?;

    debug!(id = %uuid, kind = media.kind.as_str(), "Served media");

    Ok(response)
}

/// Create media routes
pub fn media_routes() -> Router<AppState> {
    Router::new().route("/{id}", get(serve_media))
}
