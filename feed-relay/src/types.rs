use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// A single item read from the syndication feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    /// Feed-provided identifier (guid / atom id), used for diagnostics only.
    pub id: String,
    pub title: Option<String>,
    pub link: Option<String>,
    /// Raw body, possibly HTML.
    pub content: Option<String>,
    /// `None` when the item carries neither a published nor an updated date.
    pub published_at: Option<DateTime<Utc>>,
}

impl FeedEntry {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: None,
            link: None,
            content: None,
            published_at: None,
        }
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn published(mut self, at: DateTime<Utc>) -> Self {
        self.published_at = Some(at);
        self
    }
}

#[derive(Debug, Clone)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub retry_delay_seconds: u64,
    pub max_feed_size_mb: usize,
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: concat!("feed-relay/", env!("CARGO_PKG_VERSION")).to_string(),
            timeout_seconds: 30,
            max_retries: 2,
            retry_delay_seconds: 1,
            max_feed_size_mb: 10,
            max_redirects: 5,
        }
    }
}

/// Why a message could not be handed to the messaging service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    #[error("rejected by messaging API (code {code}): {description}")]
    Rejected { code: i64, description: String },

    #[error("messaging API request timed out")]
    Timeout,

    #[error("messaging transport failure: {0}")]
    Transport(String),
}

impl DeliveryError {
    /// Aborting errors stop the batch but keep the run alive; the rest are fatal.
    pub fn is_abort(&self) -> bool {
        matches!(self, DeliveryError::Rejected { .. } | DeliveryError::Timeout)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Feed parse error: {0}")]
    Parse(String),

    #[error("Corrupt checkpoint at {}: {reason}", .path.display())]
    CorruptCheckpoint { path: PathBuf, reason: String },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("Feed size exceeds limit: {size_mb}MB")]
    FeedTooLarge { size_mb: usize },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delivery failed: {0}")]
    Delivery(#[from] DeliveryError),
}

pub type Result<T> = std::result::Result<T, RelayError>;
