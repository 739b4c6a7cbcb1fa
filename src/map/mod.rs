//! Map snapshot of the current alert state
//!
//! Re-rendered on every fresh update and served as-is by the HTTP layer.

mod svg;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::debug;

use crate::pubsub::Subscription;
use crate::shutdown::Shutdown;
use crate::types::{SharedState, Update};

pub use svg::render_svg;

pub const SVG_CONTENT_TYPE: &str = "image/svg+xml";

/// Latest rendered image
#[derive(Debug, Clone)]
pub struct MapData {
    pub content_type: &'static str,
    pub bytes: Bytes,
}

pub struct MapRenderer {
    state: SharedState,
    latest: RwLock<MapData>,
}

impl MapRenderer {
    /// Create a renderer with an initial image of the current state
    pub fn new(state: SharedState) -> Self {
        let latest = RwLock::new(render(&state));
        Self { state, latest }
    }

    pub fn map_data(&self) -> MapData {
        self.latest.read().clone()
    }

    /// Regenerate the image from the current canonical state
    pub fn refresh(&self) {
        let data = render(&self.state);
        *self.latest.write() = data;
    }

    /// Re-render after each update on `subscription` until shutdown or the
    /// queue closes. Subscribe with [`Update::matches_live`] and region `0`.
    pub async fn run(&self, mut subscription: Subscription<Update>, shutdown: Shutdown) {
        loop {
            let update = tokio::select! {
                _ = shutdown.cancelled() => break,
                update = subscription.recv() => update,
            };
            let Some(update) = update else {
                break;
            };

            self.refresh();
            debug!(region = update.region.id, "map: rendered");
        }

        debug!("map: exit");
    }
}

fn render(state: &SharedState) -> MapData {
    let svg = render_svg(&state.read().regions);
    MapData {
        content_type: SVG_CONTENT_TYPE,
        bytes: Bytes::from(svg),
    }
}
