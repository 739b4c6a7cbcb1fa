//! Feed sources: where alert announcements come from
//!
//! The updater only depends on the [`FeedSource`] contract. The production
//! implementation scrapes the public web preview of a Telegram channel.

mod telegram;

use std::future::Future;

use thiserror::Error;

use crate::types::FeedMessage;

pub use telegram::TelegramChannel;

/// Result type for feed operations
pub type FeedResult<T> = Result<T, FeedError>;

/// Errors surfaced by a feed source
#[derive(Debug, Error)]
pub enum FeedError {
    /// HTTP request failed.
    #[error("feed: request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Remote answered with a non-success status.
    #[error("feed: unexpected status {0}")]
    Status(u16),

    /// Response body was not the expected JSON envelope.
    #[error("feed: decode response: {0}")]
    Json(#[from] serde_json::Error),

    /// Page markup could not be turned into messages.
    #[error("feed: parse page: {0}")]
    Parse(String),

    /// Shutdown was requested while fetching.
    #[error("feed: cancelled")]
    Cancelled,
}

impl FeedError {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, FeedError::Cancelled)
    }
}

/// Ordered source of channel messages
///
/// Both operations return messages sorted by ascending id.
pub trait FeedSource: Send + Sync + 'static {
    /// The most recent `count` messages
    fn fetch_last(&self, count: usize) -> impl Future<Output = FeedResult<Vec<FeedMessage>>> + Send;

    /// Every message with an id greater than `after`
    fn fetch_newer(&self, after: i64) -> impl Future<Output = FeedResult<Vec<FeedMessage>>> + Send;
}
