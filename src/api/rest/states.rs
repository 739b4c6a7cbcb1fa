//! Region state snapshots

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::rejection::PathRejection;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::api::{ApiError, AppState};
use crate::types::Region;

#[derive(Debug, Serialize)]
pub struct StatesResponse {
    pub states: Vec<Region>,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ShortState {
    pub id: u32,
    pub alert: bool,
}

#[derive(Debug, Serialize)]
pub struct StatesShortResponse {
    pub states: Vec<ShortState>,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct StateResponse {
    pub state: Option<Region>,
    pub last_update: DateTime<Utc>,
}

/// GET /api/states[?short]
pub async fn list_states(
    State(state): State<Arc<AppState>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let snapshot = state.state.read();

    if params.contains_key("short") {
        let states = snapshot
            .regions
            .iter()
            .map(|r| ShortState {
                id: r.id,
                alert: r.alert,
            })
            .collect();
        Json(StatesShortResponse {
            states,
            last_update: snapshot.last_update,
        })
        .into_response()
    } else {
        Json(StatesResponse {
            states: snapshot.regions.clone(),
            last_update: snapshot.last_update,
        })
        .into_response()
    }
}

/// GET /api/states/:id
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    id: Result<Path<u32>, PathRejection>,
) -> Result<Json<StateResponse>, ApiError> {
    let Path(id) = id?;
    let snapshot = state.state.read();
    Ok(Json(StateResponse {
        state: snapshot.find_region(id).cloned(),
        last_update: snapshot.last_update,
    }))
}
