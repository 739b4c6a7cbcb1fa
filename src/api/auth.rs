//! API key authentication shared by the HTTP and TCP surfaces

use std::collections::HashSet;
use std::sync::Arc;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use super::error::ApiError;
use super::AppState;

pub const API_KEY_HEADER: &str = "X-API-Key";

/// Set of accepted API keys
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: Arc<HashSet<String>>,
}

impl ApiKeys {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: Arc::new(keys.into_iter().map(Into::into).collect()),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Key the current request was authenticated with
#[derive(Debug, Clone)]
pub struct ApiKey(pub String);

/// Reject requests without a known `X-API-Key` header
pub async fn require_api_key(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let key = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|key| state.api_keys.contains(key))
        .map(str::to_string)
        .ok_or(ApiError::Unauthorized)?;

    request.extensions_mut().insert(ApiKey(key));
    Ok(next.run(request).await)
}
