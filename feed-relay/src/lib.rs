pub mod checkpoint;
pub mod config;
pub mod delivery;
pub mod fetcher;
pub mod markup;
pub mod novelty;
pub mod parser;
pub mod relay;
pub mod source;
pub mod telegram;
pub mod traits;
pub mod types;

pub use checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
pub use config::RelayConfig;
pub use delivery::{BatchEnd, DeliveryOutcome, DeliveryPipeline, DeliveryReport};
pub use fetcher::Fetcher;
pub use parser::FeedParser;
pub use relay::{Relay, RunOutcome, RunState, RunSummary};
pub use source::HttpFeedSource;
pub use telegram::TelegramClient;
pub use traits::{MessageSink, PullFeed};
pub use types::*;
