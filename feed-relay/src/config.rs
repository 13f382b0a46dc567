use crate::telegram::DEFAULT_BASE_URL;
use crate::types::{FetchConfig, RelayError, Result};
use clap::Parser;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

/// Relay new items of a syndication feed to a Telegram channel, then exit.
#[derive(Debug, Clone, Parser)]
#[command(name = "feed-relay", version, about)]
pub struct Cli {
    /// URL of the RSS/Atom/JSON feed to watch
    #[arg(long, env = "RSS_URL")]
    pub feed_url: String,

    /// Destination chat: `@channelname` or a numeric chat id
    #[arg(long, env = "TGM_CHANNEL")]
    pub channel: String,

    /// Telegram bot access token
    #[arg(long, env = "TGM_BOT_ACCESS_TOKEN", hide_env_values = true)]
    pub bot_token: String,

    /// File holding the last relayed publish date
    #[arg(long, env = "CHECKPOINT_PATH", default_value = "db.json")]
    pub checkpoint: PathBuf,

    /// Minimum pause between two messages, in milliseconds
    #[arg(long, env = "DELIVERY_INTERVAL_MS", default_value_t = 1000)]
    pub delivery_interval_ms: u64,

    /// Timeout of every outbound HTTP request, in seconds
    #[arg(long, env = "REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Bot API base URL; the token is appended to it
    #[arg(long, env = "TELEGRAM_BASE_URL", default_value = DEFAULT_BASE_URL)]
    pub telegram_base_url: String,

    /// How many times a failed feed download is retried
    #[arg(long, env = "FETCH_RETRIES", default_value_t = 2)]
    pub fetch_retries: u32,
}

/// Everything one relay run needs to know.
#[derive(Clone)]
pub struct RelayConfig {
    pub feed_url: String,
    pub channel: String,
    pub bot_token: String,
    pub checkpoint_path: PathBuf,
    pub delivery_interval: Duration,
    pub request_timeout: Duration,
    pub telegram_base_url: String,
    pub fetch: FetchConfig,
}

impl fmt::Debug for RelayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RelayConfig")
            .field("feed_url", &self.feed_url)
            .field("channel", &self.channel)
            .field("bot_token", &"***")
            .field("checkpoint_path", &self.checkpoint_path)
            .field("delivery_interval", &self.delivery_interval)
            .field("request_timeout", &self.request_timeout)
            .field("telegram_base_url", &self.telegram_base_url)
            .field("fetch", &self.fetch)
            .finish()
    }
}

impl TryFrom<Cli> for RelayConfig {
    type Error = RelayError;

    fn try_from(cli: Cli) -> Result<Self> {
        let feed_url = Url::parse(&cli.feed_url)?;
        if !matches!(feed_url.scheme(), "http" | "https") {
            return Err(RelayError::Config(format!(
                "feed URL must be http or https, got {}",
                feed_url.scheme()
            )));
        }

        if cli.channel.trim().is_empty() {
            return Err(RelayError::Config("channel must not be empty".to_string()));
        }
        if cli.bot_token.trim().is_empty() {
            return Err(RelayError::Config("bot token must not be empty".to_string()));
        }
        if cli.request_timeout_secs == 0 {
            return Err(RelayError::Config("request timeout must be positive".to_string()));
        }

        let fetch = FetchConfig {
            timeout_seconds: cli.request_timeout_secs,
            max_retries: cli.fetch_retries,
            ..FetchConfig::default()
        };

        Ok(Self {
            feed_url: cli.feed_url,
            channel: cli.channel,
            bot_token: cli.bot_token,
            checkpoint_path: cli.checkpoint,
            delivery_interval: Duration::from_millis(cli.delivery_interval_ms),
            request_timeout: Duration::from_secs(cli.request_timeout_secs),
            telegram_base_url: cli.telegram_base_url,
            fetch,
        })
    }
}

impl RelayConfig {
    /// Loads `.env` if present, then reads flags and environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Self::try_from(Cli::parse())
    }
}
