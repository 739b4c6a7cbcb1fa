//! Telegram public channel preview scraper

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{debug, warn};

use super::{FeedError, FeedResult, FeedSource};
use crate::shutdown::Shutdown;
use crate::types::FeedMessage;

const DEFAULT_BASE_URL: &str = "https://t.me/s";
const FETCH_ATTEMPTS: u32 = 5;
const RETRY_DELAY: Duration = Duration::from_secs(10);
const PAGE_DELAY: Duration = Duration::from_millis(50);

struct Selectors {
    message: Selector,
    author: Selector,
    text: Selector,
    date: Selector,
}

impl Selectors {
    fn new() -> FeedResult<Self> {
        let parse = |css: &str| Selector::parse(css).map_err(|e| FeedError::Parse(e.to_string()));
        Ok(Self {
            message: parse(".tgme_widget_message")?,
            author: parse(".tgme_widget_message_author span")?,
            text: parse(".tgme_widget_message_text")?,
            date: parse(".tgme_widget_message_footer time[datetime]")?,
        })
    }
}

/// Client for one public channel, paging backwards through its preview
pub struct TelegramChannel {
    http: Client,
    base_url: String,
    channel: String,
    selectors: Selectors,
    shutdown: Shutdown,
}

impl TelegramChannel {
    pub fn new(channel: impl Into<String>, shutdown: Shutdown) -> FeedResult<Self> {
        Self::with_base_url(DEFAULT_BASE_URL, channel, shutdown)
    }

    /// Point the client at another preview host
    pub fn with_base_url(
        base_url: impl Into<String>,
        channel: impl Into<String>,
        shutdown: Shutdown,
    ) -> FeedResult<Self> {
        let http = Client::builder().timeout(Duration::from_secs(30)).build()?;

        Ok(Self {
            http,
            base_url: base_url.into(),
            channel: channel.into(),
            selectors: Selectors::new()?,
            shutdown,
        })
    }

    fn page_url(&self, before: Option<i64>) -> String {
        let url = format!("{}/{}", self.base_url, urlencoding::encode(&self.channel));
        match before {
            Some(id) => format!("{url}?before={id}"),
            None => url,
        }
    }

    async fn fetch_html(&self, url: &str) -> FeedResult<String> {
        let response = self
            .http
            .post(url)
            .header("X-Requested-With", "XMLHttpRequest")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(FeedError::Status(response.status().as_u16()));
        }

        // The preview endpoint wraps the page markup in a JSON string
        let body = response.text().await?;
        Ok(serde_json::from_str::<String>(&body)?)
    }

    /// Fetch one page of messages older than `before` (newest page if `None`),
    /// retrying transient failures a bounded number of times
    async fn fetch_page(&self, before: Option<i64>) -> FeedResult<Vec<FeedMessage>> {
        let url = self.page_url(before);
        let mut attempts = FETCH_ATTEMPTS;

        loop {
            if self.shutdown.is_cancelled() {
                return Err(FeedError::Cancelled);
            }

            let err = match self.fetch_html(&url).await {
                Ok(html) => return self.parse_page(&html),
                Err(err) => err,
            };

            attempts -= 1;
            if attempts == 0 {
                return Err(err);
            }

            warn!(url = %url, "{err}, will retry after {}s", RETRY_DELAY.as_secs());
            tokio::select! {
                _ = self.shutdown.cancelled() => return Err(FeedError::Cancelled),
                _ = tokio::time::sleep(RETRY_DELAY) => {}
            }
        }
    }

    /// Extract messages from the preview markup, in page order
    fn parse_page(&self, html: &str) -> FeedResult<Vec<FeedMessage>> {
        let document = Html::parse_fragment(html);
        let mut messages = Vec::new();

        for node in document.select(&self.selectors.message) {
            let id = node
                .value()
                .attr("data-post")
                .and_then(|post| post.rsplit('/').next())
                .and_then(|id| id.parse::<i64>().ok())
                .ok_or_else(|| FeedError::Parse("missing or invalid message id".to_string()))?;

            let published_at = node
                .select(&self.selectors.date)
                .next()
                .and_then(|date| date.value().attr("datetime"))
                .ok_or_else(|| FeedError::Parse(format!("message {id} has no date")))?;
            let published_at = DateTime::parse_from_rfc3339(published_at)
                .map_err(|e| FeedError::Parse(format!("message {id} date: {e}")))?
                .with_timezone(&Utc);

            let author = node
                .select(&self.selectors.author)
                .next()
                .map(|author| text_lines(author).join(" "))
                .unwrap_or_default();

            let lines = node
                .select(&self.selectors.text)
                .next()
                .map(text_lines)
                .unwrap_or_default();

            messages.push(FeedMessage::new(id, author, lines, published_at));
        }

        Ok(messages)
    }

    async fn pause_between_pages(&self) -> FeedResult<()> {
        tokio::select! {
            _ = self.shutdown.cancelled() => Err(FeedError::Cancelled),
            _ = tokio::time::sleep(PAGE_DELAY) => Ok(()),
        }
    }
}

/// Trimmed, non-empty text nodes under `element`, in document order
fn text_lines(element: ElementRef<'_>) -> Vec<String> {
    element
        .text()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string)
        .collect()
}

impl FeedSource for TelegramChannel {
    async fn fetch_last(&self, count: usize) -> FeedResult<Vec<FeedMessage>> {
        let mut messages: Vec<FeedMessage> = Vec::new();
        let mut before = None;

        while messages.len() < count {
            let mut page = self.fetch_page(before).await?;
            let Some(oldest) = page.first().map(|m| m.id) else {
                break;
            };
            before = Some(oldest);
            page.append(&mut messages);
            messages = page;

            self.pause_between_pages().await?;
        }

        let excess = messages.len().saturating_sub(count);
        messages.drain(..excess);
        debug!(channel = %self.channel, count = messages.len(), "feed: fetch last");

        Ok(messages)
    }

    async fn fetch_newer(&self, after: i64) -> FeedResult<Vec<FeedMessage>> {
        let mut messages: Vec<FeedMessage> = Vec::new();
        let mut before = None;

        loop {
            let mut page = self.fetch_page(before).await?;
            let Some(oldest) = page.first().map(|m| m.id) else {
                break;
            };
            before = Some(oldest);
            page.append(&mut messages);
            messages = page;

            if oldest <= after {
                break;
            }
            self.pause_between_pages().await?;
        }

        messages.retain(|m| m.id > after);
        Ok(messages)
    }
}
