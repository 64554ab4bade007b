//! # Middleware Module
//!
//! Rate limiting for the HTTP API.
//!
//! ## Configuration
//!
//! - `METAGRAPH_RATE_LIMIT`: requests per second across all callers
//!   (default: 100, 0 to disable)
//! - `METAGRAPH_USER_RATE_LIMIT`: requests per second per `X-User-Id`
//!   (default: 0, disabled)

use super::auth::USER_ID_HEADER;
use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::Response,
};
use governor::{
    DefaultKeyedRateLimiter, Quota, RateLimiter,
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Default rate limit: 100 requests per second.
const DEFAULT_RPS: NonZeroU32 = match NonZeroU32::new(100) {
    Some(rps) => rps,
    None => NonZeroU32::MIN,
};

/// Idle per-user buckets are dropped once every this many checks.
const PRUNE_INTERVAL: u64 = 1024;

// =============================================================================
// RATE LIMITERS
// =============================================================================

pub type GlobalRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// One bucket per caller id.
pub type UserRateLimiter = Arc<DefaultKeyedRateLimiter<String>>;

/// The limiters active for a router. Either may be disabled.
#[derive(Clone, Default)]
pub struct RateLimits {
    pub global: Option<GlobalRateLimiter>,
    pub per_user: Option<UserRateLimiter>,
    checks: Arc<AtomicU64>,
}

impl RateLimits {
    /// Build from explicit rates; 0 disables a limiter.
    pub fn new(global_rps: u32, per_user_rps: u32) -> Self {
        Self {
            global: (global_rps > 0).then(|| create_rate_limiter(global_rps)),
            per_user: (per_user_rps > 0).then(|| create_user_rate_limiter(per_user_rps)),
            checks: Arc::default(),
        }
    }

    pub fn from_env() -> Self {
        Self::new(
            get_rate_limit_from_env("METAGRAPH_RATE_LIMIT", 100),
            get_rate_limit_from_env("METAGRAPH_USER_RATE_LIMIT", 0),
        )
    }

    pub fn is_enabled(&self) -> bool {
        self.global.is_some() || self.per_user.is_some()
    }

    /// Forget callers whose bucket is back at full capacity.
    ///
    /// Keys come from the caller-supplied `X-User-Id`, so without this the
    /// map grows with every distinct header value.
    pub fn prune_idle_users(&self) {
        if let Some(per_user) = &self.per_user {
            per_user.retain_recent();
            per_user.shrink_to_fit();
        }
    }
}

pub fn create_rate_limiter(requests_per_second: u32) -> GlobalRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::direct(Quota::per_second(rps)))
}

pub fn create_user_rate_limiter(requests_per_second: u32) -> UserRateLimiter {
    let rps = NonZeroU32::new(requests_per_second).unwrap_or(DEFAULT_RPS);
    Arc::new(RateLimiter::keyed(Quota::per_second(rps)))
}

/// Read a requests-per-second value, falling back to `default` when the
/// variable is unset or not a number.
pub fn get_rate_limit_from_env(var: &str, default: u32) -> u32 {
    std::env::var(var)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

/// Returns 429 Too Many Requests when either limiter is exhausted.
pub async fn rate_limit_middleware(
    State(limits): State<RateLimits>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, (StatusCode, &'static str)> {
    if let Some(global) = &limits.global {
        if global.check().is_err() {
            tracing::warn!("Rate limit exceeded");
            return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
        }
    }
    if let Some(per_user) = &limits.per_user {
        let user = request
            .headers()
            .get(USER_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .trim()
            .to_string();
        let allowed = per_user.check_key(&user).is_ok();
        if limits.checks.fetch_add(1, Ordering::Relaxed) % PRUNE_INTERVAL == PRUNE_INTERVAL - 1 {
            limits.prune_idle_users();
        }
        if !allowed {
            tracing::warn!(user_id = %user, "Per-user rate limit exceeded");
            return Err((StatusCode::TOO_MANY_REQUESTS, "Too Many Requests"));
        }
    }
    Ok(next.run(request).await)
}

// =============================================================================
// TESTS
// =============================================================================
