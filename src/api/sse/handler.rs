//! Live stream of fresh region updates

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::extract::rejection::PathRejection;
use axum::extract::{Path, State};
use axum::http::header;
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::Serialize;
use tracing::{debug, error, info};
use uuid::Uuid;

use super::encode_event;
use crate::api::{ApiError, AppState};
use crate::types::{Region, Update};

/// Keepalive interval when no update arrives
pub const PING_INTERVAL: Duration = Duration::from_secs(5);

/// Payload of an `update` event
#[derive(Debug, Serialize)]
pub struct UpdateEvent<'a> {
    pub state: &'a Region,
    pub notification_id: Uuid,
}

/// GET /api/states/live
pub async fn live_all(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    live_stream(state, 0).await
}

/// GET /api/states/live/:id
pub async fn live_region(
    State(state): State<Arc<AppState>>,
    region: Result<Path<u32>, PathRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Path(region) = region?;
    Ok(live_stream(state, region).await)
}

async fn live_stream(state: Arc<AppState>, region: u32) -> impl IntoResponse {
    if region == 0 {
        info!("api: subscribe to events");
    } else {
        info!(region, "api: subscribe to events for state");
    }

    let mut subscription = state
        .updates
        .subscribe(format!("api-sse-{region}"), move |u: &Update| {
            u.matches_live(region)
        })
        .await;

    // The subscription is dropped with the stream if the client goes away,
    // which closes its queue and detaches it from the topic
    let stream = async_stream::stream! {
        match encode_event("hello", &()) {
            Ok(frame) => yield Ok::<Bytes, Infallible>(frame),
            Err(e) => error!("api: send SSE hello: {e}"),
        }

        loop {
            let frame = tokio::select! {
                _ = state.shutdown.cancelled() => break,
                update = subscription.recv() => {
                    let Some(update) = update else {
                        break;
                    };
                    encode_event("update", &UpdateEvent {
                        state: &update.region,
                        notification_id: Uuid::new_v4(),
                    })
                }
                _ = tokio::time::sleep(PING_INTERVAL) => encode_event("ping", &()),
            };

            match frame {
                Ok(frame) => yield Ok(frame),
                Err(e) => {
                    error!("api: send SSE event: {e}");
                    break;
                }
            }
        }

        state.updates.unsubscribe(subscription).await;
        debug!("api: unsubscribe from events");
    };

    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(stream),
    )
}
