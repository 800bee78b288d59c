//! Per-IP rate limiting middleware.
//!
//! Each client IP gets its own `governor` token bucket allowing
//! `requests_per_window` requests per `window_seconds`. Rejected requests get
//! the standard JSON error body with status 429.
//!
//! ```rust,ignore
//! let rate_limiter = RateLimiter::new(&config.rate_limit);
//! let app = Router::new()
//!     .nest("/api/riffs", riff_routes(api))
//!     .layer(rate_limiter.layer());
//! ```

use axum::{
    body::Body,
    extract::ConnectInfo,
    http::{header, HeaderValue, Request},
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter as GovRateLimiter,
};
use std::{
    net::{IpAddr, Ipv4Addr, SocketAddr},
    num::NonZeroU32,
    sync::Arc,
    task::{Context, Poll},
    time::Duration,
};
use tower::{Layer, Service};
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::error::AppError;

type IpLimiter = GovRateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Tracked IPs above which idle buckets are dropped
const MAX_TRACKED_IPS: usize = 10_000;

/// Rate limiter state shared across requests
#[derive(Clone)]
pub struct RateLimiter {
    /// Per-IP rate limiters
    limiters: Arc<DashMap<IpAddr, Arc<IpLimiter>>>,
    /// Bucket shape; `None` when rate limiting is disabled
    quota: Option<Quota>,
    window_seconds: u64,
}

impl RateLimiter {
    /// Create a new rate limiter from configuration
    pub fn new(config: &RateLimitConfig) -> Self {
        let quota = if config.enabled {
            let burst = NonZeroU32::new(config.requests_per_window);
            // One token is restored every window / requests
            let replenish = Duration::from_secs(config.window_seconds)
                / config.requests_per_window.max(1);
            burst.and_then(|burst| Quota::with_period(replenish).map(|q| q.allow_burst(burst)))
        } else {
            None
        };

        Self {
            limiters: Arc::new(DashMap::new()),
            quota,
            window_seconds: config.window_seconds,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.quota.is_some()
    }

    /// Create a Tower Layer for this rate limiter
    pub fn layer(&self) -> RateLimiterLayer {
        RateLimiterLayer {
            rate_limiter: self.clone(),
        }
    }

    /// Check if a request from the given IP is allowed
    pub fn check(&self, ip: IpAddr) -> bool {
        let Some(quota) = self.quota else {
            return true;
        };

        let limiter = self
            .limiters
            .entry(ip)
            .or_insert_with(|| Arc::new(GovRateLimiter::direct(quota)))
            .clone();

        limiter.check().is_ok()
    }

    /// Number of IPs with a bucket
    pub fn tracked_ips(&self) -> usize {
        self.limiters.len()
    }

    /// Drop buckets of idle IPs once too many are tracked (call periodically).
    ///
    /// A bucket that would admit a full burst carries no state worth keeping.
    pub fn cleanup(&self) {
        if self.limiters.len() <= MAX_TRACKED_IPS {
            return;
        }

        let Some(quota) = self.quota else {
            self.limiters.clear();
            return;
        };
        let burst = quota.burst_size();
        self.limiters
            .retain(|_, limiter| limiter.check_n(burst).map_or(true, |admitted| admitted.is_err()));
    }
}

/// Tower Layer for rate limiting
#[derive(Clone)]
pub struct RateLimiterLayer {
    rate_limiter: RateLimiter,
}

impl<S> Layer<S> for RateLimiterLayer {
    type Service = RateLimiterMiddleware<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RateLimiterMiddleware {
            inner,
            rate_limiter: self.rate_limiter.clone(),
        }
    }
}

/// Rate limiting middleware service
#[derive(Clone)]
pub struct RateLimiterMiddleware<S> {
    inner: S,
    rate_limiter: RateLimiter,
}

impl<S> Service<Request<Body>> for RateLimiterMiddleware<S>
where
    S: Service<Request<Body>, Response = Response> + Send + Clone + 'static,
    S::Future: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = std::pin::Pin<
        Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>,
    >;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        // Extract client IP from various sources
        let ip = extract_client_ip(&req);

        let rate_limiter = self.rate_limiter.clone();
        let mut inner = self.inner.clone();

        Box::pin(async move {
            // Check rate limit
            if !rate_limiter.check(ip) {
                warn!(ip = %ip, "Rate limit exceeded");
                return Ok(rate_limit_response(rate_limiter.window_seconds));
            }

            // Proceed with request
            inner.call(req).await
        })
    }
}

/// Extract client IP from request
fn extract_client_ip<B>(req: &Request<B>) -> IpAddr {
    // Try X-Forwarded-For header first (for reverse proxy setups)
    if let Some(forwarded) = req.headers().get("x-forwarded-for") {
        if let Ok(forwarded_str) = forwarded.to_str() {
            // Take the first IP in the chain
            if let Some(first_ip) = forwarded_str.split(',').next() {
                if let Ok(ip) = first_ip.trim().parse::<IpAddr>() {
                    return ip;
                }
            }
        }
    }

    // Try X-Real-IP header
    if let Some(real_ip) = req.headers().get("x-real-ip") {
        if let Ok(ip_str) = real_ip.to_str() {
            if let Ok(ip) = ip_str.parse::<IpAddr>() {
                return ip;
            }
        }
    }

    // Try to get from connection info (requires ConnectInfo extractor)
    if let Some(connect_info) = req.extensions().get::<ConnectInfo<SocketAddr>>() {
        return connect_info.0.ip();
    }

    IpAddr::V4(Ipv4Addr::LOCALHOST)
}

/// 429 with the standard error body and a `Retry-After` of one window
fn rate_limit_response(window_seconds: u64) -> Response {
    let mut response =
        AppError::RateLimitExceeded("Too many requests. Please try again later.".to_string())
            .into_response();
    if let Ok(value) = HeaderValue::from_str(&window_seconds.to_string()) {
        response.headers_mut().insert(header::RETRY_AFTER, value);
    }
    response
}
