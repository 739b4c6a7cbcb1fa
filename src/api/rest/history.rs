//! History dump with a per-key cooldown

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::{Extension, Json};
use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::error;

use crate::api::{ApiError, ApiKey, AppState};
use crate::history::Record;

/// Minimum interval between two history calls with the same key
pub const HISTORY_COOLDOWN: Duration = Duration::from_secs(60);

/// Tracks the last accepted call per API key
#[derive(Debug)]
pub struct Cooldown {
    period: Duration,
    last_calls: Mutex<HashMap<String, Instant>>,
}

impl Cooldown {
    pub fn new(period: Duration) -> Self {
        Self {
            period,
            last_calls: Mutex::new(HashMap::new()),
        }
    }

    /// Record a call for `key`, or return the whole seconds left to wait
    pub fn try_acquire(&self, key: &str) -> Result<(), u64> {
        let now = Instant::now();
        let mut last_calls = self.last_calls.lock();

        if let Some(&last) = last_calls.get(key) {
            let elapsed = now.duration_since(last);
            if elapsed < self.period {
                return Err((self.period - elapsed).as_secs());
            }
        }

        last_calls.insert(key.to_string(), now);
        Ok(())
    }
}

/// GET /api/history
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Extension(ApiKey(key)): Extension<ApiKey>,
) -> Result<Json<Vec<Record>>, ApiError> {
    state
        .history_cooldown
        .try_acquire(&key)
        .map_err(|wait_secs| ApiError::RateLimited { wait_secs })?;

    let history = Arc::clone(&state.history);
    let records = tokio::task::spawn_blocking(move || history.list_records())
        .await
        .map_err(|e| e.to_string())
        .and_then(|result| result.map_err(|e| e.to_string()))
        .map_err(|e| {
            error!("api: list records: {e}");
            ApiError::Internal("Internal server error while fetching history".to_string())
        })?;

    Ok(Json(records))
}
