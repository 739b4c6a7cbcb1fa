//! Ingestion state machine
//!
//! Turns the ordered, possibly gappy channel history into region state
//! changes and publishes each one on the update topic.
//!
//! ```text
//! UNINITIALIZED ──backlog replay (is_fresh = false)──► POLLING ◄─┐
//!       │                                                 │      │
//!       └──── cursor already known (resumed) ────────────►└──────┘
//! ```
//!
//! While polling, a batch of new messages is followed by an immediate
//! re-poll, an empty batch by a short idle delay and a failed fetch by a
//! longer backoff. Every wait is raced against shutdown.

mod classify;

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use chrono_tz::Tz;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::feed::{FeedError, FeedSource};
use crate::pubsub::Topic;
use crate::shutdown::Shutdown;
use crate::types::{FeedMessage, SharedState, Update};

pub use classify::{classify, find_region, ALERT_CLEARED, ALERT_RAISED};

/// Delay before the next poll after an empty batch (and after backlog replay)
pub const IDLE_DELAY: Duration = Duration::from_secs(2);

/// Delay before the next attempt after a failed fetch
pub const RETRY_DELAY: Duration = Duration::from_secs(10);

/// Errors that stop the updater
#[derive(Debug, Error)]
pub enum UpdaterError {
    /// The startup backlog could not be fetched.
    #[error("updater: fetch initial batch: {0}")]
    Backlog(#[source] FeedError),
}

/// Sole writer of the canonical state
pub struct Updater<F> {
    feed: F,
    timezone: Tz,
    backlog_size: usize,
    state: SharedState,
    updates: Arc<Topic<Update>>,
}

impl<F: FeedSource> Updater<F> {
    pub fn new(
        feed: F,
        timezone: Tz,
        backlog_size: usize,
        state: SharedState,
        updates: Arc<Topic<Update>>,
    ) -> Self {
        Self {
            feed,
            timezone,
            backlog_size,
            state,
            updates,
        }
    }

    /// Run until `shutdown` is cancelled
    pub async fn run(&self, shutdown: Shutdown) -> Result<(), UpdaterError> {
        let cursor = self.state.read().last_cursor;
        let mut wait = match cursor {
            Some(cursor) => {
                info!(cursor, "updater: continue from cursor");
                Duration::ZERO
            }
            None => {
                info!("updater: no previous cursor, will fetch backlog");
                if !self.replay_backlog(&shutdown).await? {
                    return Ok(());
                }
                IDLE_DELAY
            }
        };

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(wait) => {}
            }

            match self.poll(&shutdown).await {
                Some(next) => wait = next,
                None => break,
            }
        }

        debug!("updater: exit");
        Ok(())
    }

    /// Replay the most recent messages as non-fresh updates.
    /// Returns `false` if shutdown interrupted the replay.
    async fn replay_backlog(&self, shutdown: &Shutdown) -> Result<bool, UpdaterError> {
        loop {
            let result = tokio::select! {
                _ = shutdown.cancelled() => return Ok(false),
                result = self.feed.fetch_last(self.backlog_size) => result,
            };

            let messages = match result {
                Ok(messages) => messages,
                Err(err) if err.is_cancelled() => return Ok(false),
                Err(err) => return Err(UpdaterError::Backlog(err)),
            };

            let Some(newest) = messages.last().map(|m| m.id) else {
                warn!("updater: backlog is empty, will retry");
                tokio::select! {
                    _ = shutdown.cancelled() => return Ok(false),
                    _ = tokio::time::sleep(RETRY_DELAY) => {}
                }
                continue;
            };

            info!(count = messages.len(), "updater: fetch last messages");
            self.process_messages(&messages, false).await;

            let mut state = self.state.write();
            state.last_cursor = Some(newest);
            state.last_update = Utc::now();
            return Ok(true);
        }
    }

    /// One poll for newer messages. Returns the delay before the next poll,
    /// or `None` on shutdown.
    async fn poll(&self, shutdown: &Shutdown) -> Option<Duration> {
        let cursor = self.state.read().last_cursor.unwrap_or_default();

        let result = tokio::select! {
            _ = shutdown.cancelled() => return None,
            result = self.feed.fetch_newer(cursor) => result,
        };

        let messages = match result {
            Ok(messages) => messages,
            Err(err) if err.is_cancelled() => return None,
            Err(err) => {
                error!(cursor, "updater: {err}, will retry after {}s", RETRY_DELAY.as_secs());
                return Some(RETRY_DELAY);
            }
        };

        self.state.write().last_update = Utc::now();

        let Some(newest) = messages.last().map(|m| m.id) else {
            return Some(IDLE_DELAY);
        };

        info!(count = messages.len(), "updater: fetch new messages");
        self.process_messages(&messages, true).await;

        let mut state = self.state.write();
        state.last_cursor = Some(state.last_cursor.map_or(newest, |c| c.max(newest)));
        Some(Duration::ZERO)
    }

    /// Classify each message, write the matched region and broadcast a snapshot of it
    pub async fn process_messages(&self, messages: &[FeedMessage], is_fresh: bool) {
        for message in messages {
            let Some(sentence) = message.text_lines.get(1) else {
                debug!(
                    id = message.id,
                    lines = ?message.text_lines,
                    "updater: not enough text in message"
                );
                continue;
            };

            // An unrecognised phrase still proceeds to region matching with `on = false`
            let on = classify(sentence).unwrap_or_else(|| {
                error!(id = message.id, "updater: don't know how to parse \"{sentence}\"");
                false
            });

            let region = {
                let mut state = self.state.write();
                let Some(index) = find_region(&state.regions, sentence) else {
                    debug!(id = message.id, "updater: no known regions found in \"{sentence}\"");
                    continue;
                };

                let region = &mut state.regions[index];
                let changed_at = message.published_at.with_timezone(&self.timezone);
                region.changed_at = Some(changed_at.fixed_offset());
                region.alert = on;
                region.clone()
            };

            debug!(
                region = region.id,
                name = %region.native_name,
                alert = on,
                is_fresh,
                "updater: new state"
            );
            self.updates.broadcast(Update::new(is_fresh, region)).await;
        }
    }
}
