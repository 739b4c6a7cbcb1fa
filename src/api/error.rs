//! Error responses of the JSON API

use axum::extract::rejection::PathRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;

/// Errors a handler or middleware turns into a `{"error": ...}` response
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Unknown or missing X-API-Key value")]
    Unauthorized,

    #[error("Please wait {wait_secs} seconds")]
    RateLimited { wait_secs: u64 },

    #[error("Too many requests using your API key")]
    KeyRateLimited,

    #[error("Too many requests from your address")]
    AddrRateLimited,

    #[error("Not found")]
    NotFound,

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Unauthorized => StatusCode::FORBIDDEN,
            Self::RateLimited { .. } | Self::KeyRateLimited | Self::AddrRateLimited => {
                StatusCode::TOO_MANY_REQUESTS
            }
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.to_string() });
        (self.status(), Json(body)).into_response()
    }
}

/// Region ids in the path are digits only; anything else is an unknown route
impl From<PathRejection> for ApiError {
    fn from(_: PathRejection) -> Self {
        Self::NotFound
    }
}
