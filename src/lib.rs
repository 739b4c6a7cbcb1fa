//! Raid Relay
//!
//! Watches a public channel of regional air raid alert announcements,
//! keeps the alert state of every region and relays each change in real
//! time over server-sent events and a plain TCP line protocol.
//!
//! # Modules
//!
//! - `types`: Region table, canonical state and update events
//! - `pubsub`: Generic publish/subscribe topic with pluggable backpressure
//! - `feed`: Feed source contract and the Telegram channel scraper
//! - `updater`: Ingestion state machine and message classification
//! - `api`: HTTP surface (JSON snapshots, history, map, SSE live stream)
//! - `tcp`: TCP line-protocol adapter
//! - `persistence`: JSON state file
//! - `history`: Append-only history log
//! - `map`: SVG map renderer
//! - `settings`: Environment configuration
//! - `shutdown`: Cooperative cancellation token
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use parking_lot::RwLock;
//! use raid_relay::pubsub::{filter_all, Topic};
//! use raid_relay::types::{CanonicalState, Update};
//!
//! # async fn demo() {
//! let state = Arc::new(RwLock::new(CanonicalState::default()));
//! let updates: Topic<Update> = Topic::new();
//! let mut everything = updates.subscribe("log", filter_all).await;
//!
//! let region = state.read().regions[8].clone();
//! updates.broadcast(Update::new(true, region)).await;
//! assert!(everything.recv().await.is_some());
//! # }
//! ```

pub mod api;
pub mod error;
pub mod feed;
pub mod history;
pub mod map;
pub mod persistence;
pub mod pubsub;
pub mod settings;
pub mod shutdown;
pub mod tcp;
pub mod types;
pub mod updater;
pub mod utils;

// Re-export commonly used items at crate root
pub use error::{AppError, AppResult};
pub use pubsub::{filter_all, Subscription, Topic};
pub use settings::Settings;
pub use shutdown::Shutdown;
pub use types::{CanonicalState, FeedMessage, Region, SharedState, Update};
pub use updater::Updater;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
