//! Messages produced by a feed source

use std::fmt;

use chrono::{DateTime, Utc};

/// One message of the external channel
#[derive(Debug, Clone, PartialEq)]
pub struct FeedMessage {
    /// Monotonically increasing per-channel id, used as the resume cursor
    pub id: i64,
    pub author: String,
    pub text_lines: Vec<String>,
    pub published_at: DateTime<Utc>,
}

impl FeedMessage {
    pub fn new(
        id: i64,
        author: impl Into<String>,
        text_lines: Vec<String>,
        published_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            author: author.into(),
            text_lines,
            published_at,
        }
    }
}

impl fmt::Display for FeedMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[id:{} author:{} text:{:?} date:{}]",
            self.id, self.author, self.text_lines, self.published_at
        )
    }
}
