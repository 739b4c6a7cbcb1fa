//! HTTP server setup with Axum

use std::net::SocketAddr;
use std::sync::Arc;

use axum::http::{header, HeaderName, Method};
use axum::{middleware, routing::get, Router};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use super::auth::require_api_key;
use super::rate_limit::limit_rate;
use super::rest::{history, map, states};
use super::sse;
use super::AppState;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("api: bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("api: server stopped: {0}")]
    Serve(#[source] std::io::Error),
}

/// Create the Axum router with all endpoints
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD, Method::OPTIONS])
        .allow_headers([
            HeaderName::from_static("x-api-key"),
            header::CONTENT_TYPE,
            header::CACHE_CONTROL,
        ]);

    let api = Router::new()
        .route("/states", get(states::list_states))
        .route("/states/live", get(sse::live_all))
        .route("/states/live/:id", get(sse::live_region))
        .route("/states/:id", get(states::get_state))
        .route("/history", get(history::list_history))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            require_api_key,
        ))
        .layer(middleware::from_fn_with_state(
            Arc::clone(&state),
            limit_rate,
        ))
        .layer(cors);

    Router::new()
        .route("/health", get(health_check))
        .route("/map.svg", get(map::get_map))
        .nest("/api", api)
        .with_state(state)
}

/// Bind `addr` and serve until the shutdown token fires
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<(), ServerError> {
    let listener = TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind { addr, source })?;
    info!(%addr, "api: listen");

    let shutdown = state.shutdown.clone();
    let app = create_router(state).into_make_service_with_connect_info::<SocketAddr>();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(ServerError::Serve)?;

    info!("api: stopped");
    Ok(())
}

/// Health check endpoint
async fn health_check() -> &'static str {
    "OK"
}
