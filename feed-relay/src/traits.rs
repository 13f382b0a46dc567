use crate::types::{DeliveryError, FeedEntry, Result};
use async_trait::async_trait;

/// Trait for pulling the current entry set of a feed.
#[async_trait]
pub trait PullFeed: Send + Sync {
    /// Identifier of the source, used in logs.
    fn source_id(&self) -> String;

    /// Fetch every entry the source currently exposes, in feed order.
    async fn pull(&self) -> Result<Vec<FeedEntry>>;
}

/// Trait for handing plain text messages to a messaging service.
#[async_trait]
pub trait MessageSink: Send + Sync {
    /// Send `text` to `channel`, resolving once the remote side acknowledged it.
    async fn send_message(&self, channel: &str, text: &str) -> std::result::Result<(), DeliveryError>;
}
