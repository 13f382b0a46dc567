use crate::checkpoint::{Checkpoint, CheckpointStore, FileCheckpointStore};
use crate::config::RelayConfig;
use crate::delivery::{BatchEnd, DeliveryPipeline};
use crate::novelty::select_new_entries;
use crate::source::HttpFeedSource;
use crate::telegram::TelegramClient;
use crate::traits::{MessageSink, PullFeed};
use crate::types::{DeliveryError, RelayError, Result};
use chrono::{DateTime, Utc};
use std::time::Duration;
use tracing::{debug, error, info};

/// Steps of a single run, in the order they are taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Init,
    Fetching,
    Filtering,
    Delivering,
    Persisting,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// Every queued entry was delivered or skipped.
    Completed,
    /// Delivery stopped early; progress up to that point was saved.
    Aborted(DeliveryError),
}

impl RunOutcome {
    /// Process exit status for a run that ended without a fatal error.
    pub fn exit_code(&self) -> u8 {
        match self {
            RunOutcome::Completed => 0,
            RunOutcome::Aborted(_) => 2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub previous_checkpoint: Checkpoint,
    pub checkpoint: Checkpoint,
    pub fetched: usize,
    pub queued: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub outcome: RunOutcome,
}

/// One feed, one channel, one checkpoint.
pub struct Relay<F, S, C> {
    source: F,
    sink: S,
    store: C,
    channel: String,
    delivery_interval: Duration,
}

impl Relay<HttpFeedSource, TelegramClient, FileCheckpointStore> {
    pub fn from_config(config: &RelayConfig) -> Result<Self> {
        let source = HttpFeedSource::new(config.feed_url.clone(), config.fetch.clone())?;
        let sink = TelegramClient::new(
            &config.telegram_base_url,
            &config.bot_token,
            config.request_timeout,
        )?;
        let store = FileCheckpointStore::new(config.checkpoint_path.clone());

        Ok(Self::new(
            source,
            sink,
            store,
            config.channel.clone(),
            config.delivery_interval,
        ))
    }
}

impl<F, S, C> Relay<F, S, C>
where
    F: PullFeed,
    S: MessageSink,
    C: CheckpointStore,
{
    pub fn new(source: F, sink: S, store: C, channel: String, delivery_interval: Duration) -> Self {
        Self {
            source,
            sink,
            store,
            channel,
            delivery_interval,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        self.run_started_at(Utc::now()).await
    }

    /// Fetch, filter, deliver and persist, treating `started_at` as the run start.
    ///
    /// Failures before delivery leave the checkpoint untouched. Once delivery
    /// began, the checkpoint is saved before any delivery failure is returned.
    pub async fn run_started_at(&self, started_at: DateTime<Utc>) -> Result<RunSummary> {
        let mut state = RunState::Init;

        let previous = self.store.load().map_err(|e| fatal(state, e))?;
        info!("last_post_date: {}", previous);

        transition(&mut state, RunState::Fetching);
        let entries = self.source.pull().await.map_err(|e| fatal(state, e))?;
        let fetched = entries.len();
        info!("Fetched {} entries from {}", fetched, self.source.source_id());

        transition(&mut state, RunState::Filtering);
        let queue = select_new_entries(previous, entries);
        let queued = queue.len();

        transition(&mut state, RunState::Delivering);
        let pipeline = DeliveryPipeline::new(&self.sink, &self.channel, self.delivery_interval);
        let report = pipeline.deliver(queue, previous, started_at).await;

        transition(&mut state, RunState::Persisting);
        self.store
            .save(report.checkpoint)
            .map_err(|e| fatal(state, e))?;

        let outcome = match report.end {
            BatchEnd::Completed => RunOutcome::Completed,
            BatchEnd::Aborted(e) => RunOutcome::Aborted(e),
            BatchEnd::Fatal(e) => return Err(fatal(state, e.into())),
        };

        transition(&mut state, RunState::Done);
        info!(
            "Run finished: {} delivered, {} skipped of {} new, checkpoint {} -> {}",
            report.delivered, report.skipped, queued, previous, report.checkpoint
        );

        Ok(RunSummary {
            started_at,
            previous_checkpoint: previous,
            checkpoint: report.checkpoint,
            fetched,
            queued,
            delivered: report.delivered,
            skipped: report.skipped,
            outcome,
        })
    }
}

fn transition(state: &mut RunState, next: RunState) {
    debug!("{:?} -> {:?}", state, next);
    *state = next;
}

fn fatal(state: RunState, e: RelayError) -> RelayError {
    error!("Run failed while {:?}: {}", state, e);
    e
}
