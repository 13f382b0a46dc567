use crate::fetcher::Fetcher;
use crate::parser::FeedParser;
use crate::traits::PullFeed;
use crate::types::{FeedEntry, FetchConfig, Result};
use async_trait::async_trait;
use tracing::info;

/// Feed published at an HTTP(S) URL.
pub struct HttpFeedSource {
    pub url: String,
    fetcher: Fetcher,
}

impl HttpFeedSource {
    pub fn new(url: String, fetch_config: FetchConfig) -> Result<Self> {
        Ok(Self {
            url,
            fetcher: Fetcher::new(fetch_config)?,
        })
    }
}

#[async_trait]
impl PullFeed for HttpFeedSource {
    fn source_id(&self) -> String {
        self.url.clone()
    }

    async fn pull(&self) -> Result<Vec<FeedEntry>> {
        info!("Pulling feed: {}", self.url);

        let content = self.fetcher.fetch_feed(&self.url).await?;
        FeedParser::parse_feed(&content)
    }
}
