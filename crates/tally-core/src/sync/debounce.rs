//! Debounce window for change notifications

use std::collections::HashSet;
use std::time::Duration;

use tokio::time::{sleep_until, Instant};

use crate::models::RecordId;
use crate::store::{ChangeFeed, ChangeSet};

/// Coalesces change sets arriving within a fixed window after the first one.
///
/// The window starts at the first change set and is not extended by later
/// ones, so a steady stream of edits still drains once per window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Debouncer {
    window: Duration,
}

/// Change sets gathered during one window
#[derive(Debug, Default)]
pub struct Batch {
    pub changes: Vec<ChangeSet>,
    /// The feed ended while gathering; no further batches will follow
    pub feed_closed: bool,
}

impl Batch {
    /// Distinct record ids in first-seen order
    pub fn record_ids(&self) -> Vec<RecordId> {
        let mut seen = HashSet::new();
        self.changes
            .iter()
            .flat_map(ChangeSet::ids)
            .filter(|id| seen.insert(**id))
            .copied()
            .collect()
    }
}

impl Debouncer {
    #[must_use]
    pub const fn new(window: Duration) -> Self {
        Self { window }
    }

    #[must_use]
    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Starting from `first`, pull change sets from `feed` until the window closes.
    pub async fn gather(&self, first: ChangeSet, feed: &mut ChangeFeed) -> Batch {
        let deadline = Instant::now() + self.window;
        let mut batch = Batch {
            changes: vec![first],
            feed_closed: false,
        };

        loop {
            tokio::select! {
                () = sleep_until(deadline) => return batch,
                change = feed.next() => match change {
                    Some(change) => batch.changes.push(change),
                    None => {
                        batch.feed_closed = true;
                        return batch;
                    }
                },
            }
        }
    }
}
