#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use feed_relay::{DeliveryError, FeedEntry, MessageSink, PullFeed, RelayError, Result};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

static INIT: Once = Once::new();

pub fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// Seconds after a fixed reference instant.
pub fn at(secs: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
}

pub fn entry(id: &str, secs: i64, content: &str) -> FeedEntry {
    FeedEntry::new(id).with_content(content).published(at(secs))
}

/// Feed that always answers with the same entries.
#[derive(Clone, Default)]
pub struct StaticFeed {
    pub entries: Vec<FeedEntry>,
    pub pulls: Arc<AtomicUsize>,
}

impl StaticFeed {
    pub fn new(entries: Vec<FeedEntry>) -> Self {
        Self {
            entries,
            pulls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pull_count(&self) -> usize {
        self.pulls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PullFeed for StaticFeed {
    fn source_id(&self) -> String {
        "static".to_string()
    }

    async fn pull(&self) -> Result<Vec<FeedEntry>> {
        self.pulls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entries.clone())
    }
}

/// Feed whose download always fails.
pub struct UnreachableFeed;

#[async_trait]
impl PullFeed for UnreachableFeed {
    fn source_id(&self) -> String {
        "unreachable".to_string()
    }

    async fn pull(&self) -> Result<Vec<FeedEntry>> {
        Err(RelayError::Parse("connection refused".to_string()))
    }
}

/// Sink that records messages and fails on chosen texts.
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub sent: Arc<Mutex<Vec<String>>>,
    pub failures: Arc<Mutex<Vec<(String, DeliveryError)>>>,
}

impl RecordingSink {
    pub fn fail_on(&self, text: &str, error: DeliveryError) {
        self.failures.lock().unwrap().push((text.to_string(), error));
    }

    pub fn clear_failures(&self) {
        self.failures.lock().unwrap().clear();
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl MessageSink for RecordingSink {
    async fn send_message(&self, _channel: &str, text: &str) -> std::result::Result<(), DeliveryError> {
        self.sent.lock().unwrap().push(text.to_string());

        let failures = self.failures.lock().unwrap();
        match failures.iter().find(|(t, _)| t == text) {
            Some((_, error)) => Err(error.clone()),
            None => Ok(()),
        }
    }
}
