//! Request rate limits in front of the `/api` routes
//!
//! Each [`RateLimiter`] runs the generic cell rate algorithm over a keyed
//! map of theoretical arrival times: a client may burst up to `burst`
//! requests at once and is then held to `per_second`.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

use super::auth::API_KEY_HEADER;
use super::error::ApiError;
use super::AppState;

/// Requests per second (and burst) allowed from one client address
pub const ADDR_RATE: u32 = 10;

/// Requests per second (and burst) allowed with one API key
pub const KEY_RATE: u32 = 100;

const FORWARDED_FOR_HEADER: &str = "X-Forwarded-For";

/// Tracked keys before idle entries are pruned
const MAX_TRACKED: usize = 16384;

#[derive(Debug)]
pub struct RateLimiter {
    interval: Duration,
    tolerance: Duration,
    arrivals: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new(per_second: u32, burst: u32) -> Self {
        let interval = Duration::from_secs(1) / per_second.max(1);
        Self {
            interval,
            tolerance: interval * burst.max(1),
            arrivals: Mutex::new(HashMap::new()),
        }
    }

    /// Count one request for `key`; `false` if it is over the quota
    pub fn check(&self, key: &str) -> bool {
        let now = Instant::now();
        let mut arrivals = self.arrivals.lock();

        let arrival = arrivals.get(key).map_or(now, |&tat| tat.max(now));
        let next = arrival + self.interval;
        if next.duration_since(now) > self.tolerance {
            return false;
        }

        if arrivals.len() >= MAX_TRACKED && !arrivals.contains_key(key) {
            arrivals.retain(|_, tat| *tat > now);
        }
        arrivals.insert(key.to_string(), next);
        true
    }
}

/// Reject requests over the per-key or per-address quota with 429
pub async fn limit_rate(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(key) = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
    {
        if !state.key_limiter.check(key) {
            debug!("api: rate limited by key");
            return Err(ApiError::KeyRateLimited);
        }
    }

    let addr = client_addr(&request);
    if !state.addr_limiter.check(&addr) {
        debug!(%addr, "api: rate limited by address");
        return Err(ApiError::AddrRateLimited);
    }

    Ok(next.run(request).await)
}

/// First `X-Forwarded-For` hop, else the peer IP
fn client_addr(request: &Request) -> String {
    let forwarded = request
        .headers()
        .get(FORWARDED_FOR_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .map(str::trim)
        .filter(|addr| !addr.is_empty());

    match forwarded {
        Some(addr) => addr.to_string(),
        None => request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_default(),
    }
}
