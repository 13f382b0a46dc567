use crate::checkpoint::Checkpoint;
use crate::types::FeedEntry;
use chrono::{DateTime, Utc};
use tracing::{info, warn};

/// A feed entry queued for delivery, with its publish time resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuedEntry {
    pub published_at: DateTime<Utc>,
    pub entry: FeedEntry,
}

/// Builds the delivery queue: entries published after `checkpoint`, oldest first.
///
/// Entries without a publish time are logged and left out. Entries sharing a
/// publish time keep their feed order.
pub fn select_new_entries(checkpoint: Checkpoint, entries: Vec<FeedEntry>) -> Vec<QueuedEntry> {
    let mut queue: Vec<QueuedEntry> = entries
        .into_iter()
        .filter_map(|entry| match entry.published_at {
            Some(published_at) => Some(QueuedEntry { published_at, entry }),
            None => {
                warn!("Entry {} has no publish date, ignoring it", entry.id);
                None
            }
        })
        .filter(|queued| checkpoint.precedes(queued.published_at))
        .collect();

    // `sort_by_key` is stable, which keeps feed order for equal timestamps.
    queue.sort_by_key(|queued| queued.published_at);

    if queue.is_empty() {
        info!("New entries are not found");
    } else {
        info!(
            "The number of new entries: {}, entries: {:?}",
            queue.len(),
            queue
                .iter()
                .map(|q| (q.entry.id.as_str(), q.published_at.to_rfc3339()))
                .collect::<Vec<_>>()
        );
    }

    queue
}
