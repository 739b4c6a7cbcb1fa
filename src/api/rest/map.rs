use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::IntoResponse;

use crate::api::AppState;

/// GET /map.svg
pub async fn get_map(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let data = state.map.map_data();
    (
        [
            (header::CONTENT_TYPE, data.content_type),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        data.bytes,
    )
}
