use crate::checkpoint::Checkpoint;
use crate::markup::strip_markup;
use crate::novelty::QueuedEntry;
use crate::traits::MessageSink;
use crate::types::DeliveryError;
use chrono::{DateTime, Utc};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// What happened to a single queued entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    Delivered,
    /// The entry could not be turned into a message; the batch goes on.
    Skipped(String),
    /// The messaging API refused the entry or timed out; the batch stops.
    Aborted(DeliveryError),
    /// The messaging transport broke; the batch stops and the run fails.
    Fatal(DeliveryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryReport {
    pub id: String,
    pub published_at: DateTime<Utc>,
    pub outcome: DeliveryOutcome,
}

/// How a batch ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchEnd {
    Completed,
    Aborted(DeliveryError),
    Fatal(DeliveryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryReport {
    /// One report per entry that was looked at, in delivery order.
    pub entries: Vec<EntryReport>,
    pub delivered: usize,
    pub skipped: usize,
    /// Watermark to persist, however the batch ended.
    pub checkpoint: Checkpoint,
    pub end: BatchEnd,
}

/// Sends queued entries one by one, oldest first, to a single channel.
pub struct DeliveryPipeline<'a, S: MessageSink + ?Sized> {
    sink: &'a S,
    channel: &'a str,
    interval: Duration,
}

impl<'a, S: MessageSink + ?Sized> DeliveryPipeline<'a, S> {
    /// `interval` is the minimum spacing between two send attempts.
    pub fn new(sink: &'a S, channel: &'a str, interval: Duration) -> Self {
        Self {
            sink,
            channel,
            interval,
        }
    }

    /// Delivers `queue` in order and computes the next checkpoint.
    ///
    /// The checkpoint is `previous`, moved forward to `run_started_at` and to the
    /// publish time of every delivered entry. Delivery stops at the first
    /// rejected or failed send; skipped entries never stop it.
    pub async fn deliver(
        &self,
        queue: Vec<QueuedEntry>,
        previous: Checkpoint,
        run_started_at: DateTime<Utc>,
    ) -> DeliveryReport {
        let mut report = DeliveryReport {
            entries: Vec::with_capacity(queue.len()),
            delivered: 0,
            skipped: 0,
            checkpoint: previous.advance_to(run_started_at),
            end: BatchEnd::Completed,
        };
        let mut last_attempt: Option<Instant> = None;

        for queued in queue {
            let QueuedEntry { published_at, entry } = queued;

            let message = match entry.content.as_deref().map(strip_markup) {
                Some(Ok(message)) => message,
                Some(Err(e)) => {
                    warn!("Skipping entry {}: {}", entry.id, e);
                    report.skipped += 1;
                    report.entries.push(EntryReport {
                        id: entry.id,
                        published_at,
                        outcome: DeliveryOutcome::Skipped(e.to_string()),
                    });
                    continue;
                }
                None => {
                    warn!("Skipping entry {}: no content", entry.id);
                    report.skipped += 1;
                    report.entries.push(EntryReport {
                        id: entry.id,
                        published_at,
                        outcome: DeliveryOutcome::Skipped("no content".to_string()),
                    });
                    continue;
                }
            };
            debug!("Raw message:\n{:?}\nmessage:\n{}", entry.content, message);

            if let Some(last) = last_attempt {
                let elapsed = last.elapsed();
                if elapsed < self.interval {
                    tokio::time::sleep(self.interval - elapsed).await;
                }
            }
            last_attempt = Some(Instant::now());

            let outcome = match self.sink.send_message(self.channel, &message).await {
                Ok(()) => {
                    report.delivered += 1;
                    report.checkpoint = report.checkpoint.advance_to(published_at);
                    info!("Delivered entry {} published at {}", entry.id, published_at);
                    DeliveryOutcome::Delivered
                }
                Err(e) if e.is_abort() => {
                    error!("Stopping delivery at entry {}: {}", entry.id, e);
                    report.end = BatchEnd::Aborted(e.clone());
                    DeliveryOutcome::Aborted(e)
                }
                Err(e) => {
                    error!("Delivery of entry {} failed: {}", entry.id, e);
                    report.end = BatchEnd::Fatal(e.clone());
                    DeliveryOutcome::Fatal(e)
                }
            };

            report.entries.push(EntryReport {
                id: entry.id,
                published_at,
                outcome,
            });

            if report.end != BatchEnd::Completed {
                break;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FeedEntry;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use std::sync::Mutex;

    /// Records every send and fails the ones listed in `failures` (by message text).
    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<(String, String, Instant)>>,
        failures: Vec<(String, DeliveryError)>,
    }

    impl RecordingSink {
        fn failing_on(text: &str, error: DeliveryError) -> Self {
            Self {
                failures: vec![(text.to_string(), error)],
                ..Default::default()
            }
        }

        fn texts(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|(_, t, _)| t.clone()).collect()
        }
    }

    #[async_trait]
    impl MessageSink for RecordingSink {
        async fn send_message(&self, channel: &str, text: &str) -> Result<(), DeliveryError> {
            self.sent
                .lock()
                .unwrap()
                .push((channel.to_string(), text.to_string(), Instant::now()));

            match self.failures.iter().find(|(t, _)| t == text) {
                Some((_, error)) => Err(error.clone()),
                None => Ok(()),
            }
        }
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn queued(id: &str, secs: i64, content: Option<&str>) -> QueuedEntry {
        let mut entry = FeedEntry::new(id);
        entry.content = content.map(str::to_string);
        QueuedEntry {
            published_at: at(secs),
            entry,
        }
    }

    fn rejection() -> DeliveryError {
        DeliveryError::Rejected {
            code: 400,
            description: "Bad Request: chat not found".to_string(),
        }
    }

    #[tokio::test]
    async fn delivers_everything_in_order_and_advances_checkpoint() {
        let sink = RecordingSink::default();
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);
        let queue = vec![
            queued("1", 10, Some("<p>one</p>")),
            queued("2", 20, Some("two<br/>lines")),
        ];

        let report = pipeline.deliver(queue, Checkpoint::at(at(0)), at(5)).await;

        assert_eq!(sink.texts(), vec!["one", "two\nlines"]);
        assert!(sink.sent.lock().unwrap().iter().all(|(c, _, _)| c == "@channel"));
        assert_eq!(report.delivered, 2);
        assert_eq!(report.end, BatchEnd::Completed);
        assert_eq!(report.checkpoint, Checkpoint::at(at(20)));
    }

    #[tokio::test]
    async fn run_start_wins_when_later_than_delivered_entries() {
        let sink = RecordingSink::default();
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);

        let report = pipeline
            .deliver(vec![queued("1", 10, Some("one"))], Checkpoint::earliest(), at(100))
            .await;

        assert_eq!(report.checkpoint, Checkpoint::at(at(100)));
    }

    #[tokio::test]
    async fn empty_queue_moves_checkpoint_to_run_start() {
        let sink = RecordingSink::default();
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);

        let report = pipeline.deliver(Vec::new(), Checkpoint::at(at(0)), at(42)).await;

        assert!(sink.texts().is_empty());
        assert_eq!(report.checkpoint, Checkpoint::at(at(42)));
        assert_eq!(report.end, BatchEnd::Completed);
    }

    #[tokio::test]
    async fn checkpoint_never_moves_back() {
        let sink = RecordingSink::default();
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);

        let report = pipeline.deliver(Vec::new(), Checkpoint::at(at(500)), at(42)).await;

        assert_eq!(report.checkpoint, Checkpoint::at(at(500)));
    }

    #[tokio::test]
    async fn malformed_entries_are_skipped_without_stopping() {
        let sink = RecordingSink::default();
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);
        let queue = vec![
            queued("bad", 10, Some("<p class=\"oops")),
            queued("missing", 20, None),
            queued("good", 30, Some("fine")),
        ];

        let report = pipeline.deliver(queue, Checkpoint::earliest(), at(0)).await;

        assert_eq!(sink.texts(), vec!["fine"]);
        assert_eq!(report.skipped, 2);
        assert_eq!(report.delivered, 1);
        assert!(matches!(report.entries[0].outcome, DeliveryOutcome::Skipped(_)));
        assert!(matches!(report.entries[1].outcome, DeliveryOutcome::Skipped(_)));
        assert_eq!(report.checkpoint, Checkpoint::at(at(30)));
    }

    #[tokio::test]
    async fn skipped_entry_does_not_advance_checkpoint() {
        let sink = RecordingSink::default();
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);
        let queue = vec![queued("good", 10, Some("fine")), queued("bad", 20, Some(""))];

        let report = pipeline.deliver(queue, Checkpoint::earliest(), at(0)).await;

        assert_eq!(report.checkpoint, Checkpoint::at(at(10)));
    }

    #[tokio::test]
    async fn rejection_stops_the_batch() {
        let sink = RecordingSink::failing_on("three", rejection());
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);
        let queue = vec![
            queued("1", 10, Some("one")),
            queued("2", 20, Some("two")),
            queued("3", 30, Some("three")),
            queued("4", 40, Some("four")),
            queued("5", 50, Some("five")),
        ];

        let report = pipeline.deliver(queue, Checkpoint::earliest(), at(0)).await;

        assert_eq!(sink.texts(), vec!["one", "two", "three"]);
        assert_eq!(report.delivered, 2);
        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.end, BatchEnd::Aborted(rejection()));
        assert_eq!(report.checkpoint, Checkpoint::at(at(20)));
    }

    #[tokio::test]
    async fn timeout_aborts_and_transport_failure_is_fatal() {
        let sink = RecordingSink::failing_on("one", DeliveryError::Timeout);
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);
        let report = pipeline
            .deliver(vec![queued("1", 10, Some("one"))], Checkpoint::earliest(), at(0))
            .await;
        assert_eq!(report.end, BatchEnd::Aborted(DeliveryError::Timeout));

        let broken = DeliveryError::Transport("connection reset".to_string());
        let sink = RecordingSink::failing_on("two", broken.clone());
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::ZERO);
        let report = pipeline
            .deliver(
                vec![queued("1", 10, Some("one")), queued("2", 20, Some("two"))],
                Checkpoint::earliest(),
                at(0),
            )
            .await;
        assert_eq!(report.end, BatchEnd::Fatal(broken));
        assert_eq!(report.checkpoint, Checkpoint::at(at(10)));
    }

    #[tokio::test(start_paused = true)]
    async fn sends_are_spaced_by_the_interval() {
        let sink = RecordingSink::default();
        let pipeline = DeliveryPipeline::new(&sink, "@channel", Duration::from_secs(1));
        let queue = vec![
            queued("1", 10, Some("one")),
            queued("skip", 15, None),
            queued("2", 20, Some("two")),
            queued("3", 30, Some("three")),
        ];

        pipeline.deliver(queue, Checkpoint::earliest(), at(0)).await;

        let sent = sink.sent.lock().unwrap();
        assert_eq!(sent.len(), 3);
        for pair in sent.windows(2) {
            assert!(pair[1].2.duration_since(pair[0].2) >= Duration::from_secs(1));
        }
    }
}
