//! HTTP request handlers.
//!
//! - `riffs`: the riff marketplace route table (`/api/riffs`)
//! - `media`: streams stored audio and cover files (`/media`)
//! - `health`: liveness, readiness and stats (`/health`)

pub mod health;
pub mod media;
pub mod riffs;

pub use health::health_routes;
pub use media::media_routes;
pub use riffs::{riff_listing_route, riff_routes};
