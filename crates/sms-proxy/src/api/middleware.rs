//! Rate limiting and request logging middleware.

use crate::error::ProxyError;
use axum::{
    extract::{MatchedPath, Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::{num::NonZeroU32, sync::Arc, time::Instant};
use tracing::{debug, warn};

type GlobalLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// One quota shared by every caller of the limited routes.
#[derive(Clone)]
pub struct RateLimitState {
    limiter: Arc<GlobalLimiter>,
    per_minute: NonZeroU32,
}

impl RateLimitState {
    /// A zero limit is raised to one request per minute.
    pub fn new(requests_per_minute: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);

        Self {
            limiter: Arc::new(RateLimiter::direct(Quota::per_minute(per_minute))),
            per_minute,
        }
    }

    /// Effectively unlimited, for tests.
    pub fn permissive() -> Self {
        Self::new(100_000)
    }

    /// Spend one request from the quota.
    pub fn check(&self) -> Result<(), ProxyError> {
        self.limiter
            .check()
            .map_err(|_| ProxyError::RateLimitExceeded)
    }
}

pub async fn rate_limit_middleware(
    State(rate_limit): State<RateLimitState>,
    request: Request,
    next: Next,
) -> Result<Response, ProxyError> {
    if let Err(e) = rate_limit.check() {
        warn!(
            route = route_of(&request),
            per_minute = rate_limit.per_minute.get(),
            "Rate limit exceeded"
        );
        return Err(e);
    }

    Ok(next.run(request).await)
}

/// Logs by route template so phone numbers in paths stay out of the logs.
pub async fn logging_middleware(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let route = route_of(&request).to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let elapsed = start.elapsed();
    if status.is_server_error() {
        warn!(%method, %route, %status, ?elapsed, "Request failed");
    } else {
        debug!(%method, %route, %status, ?elapsed, "Request completed");
    }

    response
}

fn route_of(request: &Request) -> &str {
    request
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or("unmatched")
}
