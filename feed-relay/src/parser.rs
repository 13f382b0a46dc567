use crate::types::{FeedEntry, RelayError, Result};
use chrono::Utc;
use feed_rs::parser;
use tracing::{debug, info};

/// Turns RSS, Atom and JSON Feed documents into [`FeedEntry`] values.
pub struct FeedParser;

impl FeedParser {
    /// Parses a raw feed document. The character encoding is taken from the
    /// XML declaration or byte order mark, defaulting to UTF-8.
    pub fn parse_feed(content: &[u8]) -> Result<Vec<FeedEntry>> {
        debug!("Parsing feed content ({} bytes)", content.len());

        let feed = parser::parse(content)
            .map_err(|e| RelayError::Parse(format!("Failed to parse feed: {}", e)))?;

        let entries: Vec<FeedEntry> = feed.entries.into_iter().map(Self::parse_entry).collect();

        info!("Parsed feed with {} entries", entries.len());
        Ok(entries)
    }

    fn parse_entry(entry: feed_rs::model::Entry) -> FeedEntry {
        // RSS `description` lands in `summary`; Atom may carry only `content`.
        let content = entry
            .summary
            .map(|s| s.content)
            .or_else(|| entry.content.and_then(|c| c.body));

        let published_at = entry
            .published
            .or(entry.updated)
            .map(|dt| dt.with_timezone(&Utc));

        FeedEntry {
            id: entry.id,
            title: entry.title.map(|t| t.content),
            link: entry.links.into_iter().next().map(|l| l.href),
            content,
            published_at,
        }
    }
}
