//! HTTP surface: JSON snapshots, history dump, map image and the SSE live stream
//!
//! ```text
//! GET /health                      no key
//! GET /map.svg                     no key
//! GET /api/states[?short]          X-API-Key
//! GET /api/states/:id              X-API-Key
//! GET /api/states/live[/:id]       X-API-Key, text/event-stream
//! GET /api/history                 X-API-Key, one call per key per minute
//! ```
//!
//! Every `/api` route is also limited to 100 requests per second per key
//! and 10 per second per client address.

pub mod auth;
pub mod error;
pub mod http;
pub mod rate_limit;
pub mod rest;
pub mod sse;

use std::sync::Arc;

use crate::history::HistoryLog;
use crate::map::MapRenderer;
use crate::pubsub::Topic;
use crate::shutdown::Shutdown;
use crate::types::{SharedState, Update};

pub use auth::{ApiKey, ApiKeys, API_KEY_HEADER};
pub use error::ApiError;
pub use http::{create_router, serve, ServerError};
pub use rate_limit::RateLimiter;
pub use rest::history::Cooldown;

/// Shared state of every HTTP handler
pub struct AppState {
    pub state: SharedState,
    pub updates: Arc<Topic<Update>>,
    pub api_keys: ApiKeys,
    pub history: Arc<HistoryLog>,
    pub history_cooldown: Cooldown,
    pub key_limiter: RateLimiter,
    pub addr_limiter: RateLimiter,
    pub map: Arc<MapRenderer>,
    pub shutdown: Shutdown,
}

impl AppState {
    pub fn new(
        state: SharedState,
        updates: Arc<Topic<Update>>,
        api_keys: ApiKeys,
        history: Arc<HistoryLog>,
        map: Arc<MapRenderer>,
        shutdown: Shutdown,
    ) -> Self {
        Self {
            state,
            updates,
            api_keys,
            history,
            history_cooldown: Cooldown::new(rest::history::HISTORY_COOLDOWN),
            key_limiter: RateLimiter::new(rate_limit::KEY_RATE, rate_limit::KEY_RATE),
            addr_limiter: RateLimiter::new(rate_limit::ADDR_RATE, rate_limit::ADDR_RATE),
            map,
            shutdown,
        }
    }
}
