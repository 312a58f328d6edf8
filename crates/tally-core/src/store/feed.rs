//! Change notifications emitted by stores after each commit

use tokio::sync::broadcast;

use crate::models::RecordId;

pub(crate) const CHANNEL_CAPACITY: usize = 1024;

/// One committed change notification for a collection.
///
/// Ids reference records in the store's current snapshot; listeners resolve
/// them with [`super::Store::object_for_id`]. Removals are never reported.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet {
    pub collection: String,
    pub insertions: Vec<RecordId>,
    pub modifications: Vec<RecordId>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.insertions.is_empty() && self.modifications.is_empty()
    }

    /// All referenced ids, insertions first
    pub fn ids(&self) -> impl Iterator<Item = &RecordId> {
        self.insertions.iter().chain(&self.modifications)
    }
}

/// Fan-out of change sets to subscribers, one per store.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    sender: broadcast::Sender<ChangeSet>,
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeNotifier {
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish a change set. Nobody listening is not an error.
    pub fn notify(&self, change: ChangeSet) {
        if change.is_empty() {
            return;
        }
        let _ = self.sender.send(change);
    }

    /// Feed restricted to `collection`
    pub fn subscribe(&self, collection: &str) -> ChangeFeed {
        ChangeFeed {
            collection: collection.to_string(),
            receiver: self.sender.subscribe(),
            lost: 0,
        }
    }
}

/// Stream of change sets for a single collection
#[derive(Debug)]
pub struct ChangeFeed {
    collection: String,
    receiver: broadcast::Receiver<ChangeSet>,
    lost: u64,
}

impl ChangeFeed {
    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next change set for this collection, or `None` once the store is gone.
    ///
    /// A slow subscriber that falls behind loses the overflowed notifications.
    /// They are counted; see [`Self::take_lost`].
    pub async fn next(&mut self) -> Option<ChangeSet> {
        loop {
            match self.receiver.recv().await {
                Ok(change) if change.collection == self.collection => return Some(change),
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    self.lost += skipped;
                    tracing::warn!(
                        "Change feed for {} lagged, {} notifications dropped",
                        self.collection,
                        skipped
                    );
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Notifications lost to lag since the last call
    pub fn take_lost(&mut self) -> u64 {
        std::mem::take(&mut self.lost)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn feed_only_yields_its_collection() {
        let notifier = ChangeNotifier::new();
        let mut feed = notifier.subscribe("customers");
        let id = RecordId::new();

        notifier.notify(ChangeSet {
            collection: "products".to_string(),
            insertions: vec![RecordId::new()],
            modifications: Vec::new(),
        });
        notifier.notify(ChangeSet {
            collection: "customers".to_string(),
            insertions: Vec::new(),
            modifications: vec![id],
        });

        let change = feed.next().await.unwrap();
        assert_eq!(change.collection, "customers");
        assert_eq!(change.ids().copied().collect::<Vec<_>>(), vec![id]);
    }

    #[tokio::test]
    async fn feed_ends_when_notifier_dropped() {
        let notifier = ChangeNotifier::new();
        let mut feed = notifier.subscribe("customers");
        drop(notifier);
        assert!(feed.next().await.is_none());
    }

    #[tokio::test]
    async fn lagging_feed_counts_lost_notifications() {
        let notifier = ChangeNotifier::new();
        let mut feed = notifier.subscribe("customers");
        for _ in 0..CHANNEL_CAPACITY + 3 {
            notifier.notify(ChangeSet {
                collection: "customers".to_string(),
                insertions: vec![RecordId::new()],
                modifications: Vec::new(),
            });
        }

        assert!(feed.next().await.is_some());
        assert_eq!(feed.take_lost(), 3);
        assert_eq!(feed.take_lost(), 0);
    }

    #[test]
    fn empty_change_sets_are_not_published() {
        let notifier = ChangeNotifier::new();
        let mut feed = notifier.subscribe("customers");
        notifier.notify(ChangeSet {
            collection: "customers".to_string(),
            insertions: Vec::new(),
            modifications: Vec::new(),
        });
        assert!(feed.receiver.try_recv().is_err());
    }
}
