//! Middleware components.
//!
//! Currently only per-IP rate limiting.

pub mod rate_limit;

pub use rate_limit::{RateLimiter, RateLimiterLayer};
