//! Change feed listener
//!
//! Turns a source collection's change feed into write jobs. Listeners only
//! enqueue; the write queue is the sole writer of the destination.

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::debounce::{Batch, Debouncer};
use super::partition;
use super::queue::{WriteJob, WriteQueue};
use super::state::SyncProgress;
use crate::models::{Flow, Record};
use crate::store::{ChangeFeed, Existing, Store};

/// Listener for one collection of one flow
pub struct ChangeFeedListener {
    pub collection: String,
    pub flow: Flow,
    pub partition: String,
    pub source: Arc<dyn Store>,
    pub queue: Arc<WriteQueue>,
    pub progress: Arc<SyncProgress>,
    pub debouncer: Debouncer,
}

impl ChangeFeedListener {
    /// Run until `cancel` fires or the feed ends
    pub fn spawn(self, mut feed: ChangeFeed, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                let first = tokio::select! {
                    () = cancel.cancelled() => break,
                    change = feed.next() => change,
                };
                let Some(first) = first else {
                    tracing::debug!("Change feed for {} closed", self.collection);
                    break;
                };

                let batch = tokio::select! {
                    () = cancel.cancelled() => break,
                    batch = self.debouncer.gather(first, &mut feed) => batch,
                };
                let feed_closed = batch.feed_closed;
                self.note_lost(&mut feed);
                self.drain(&batch).await;
                if feed_closed {
                    break;
                }
            }
            tracing::debug!("Listener for {} ({}) stopped", self.collection, self.flow);
        })
    }

    /// Changes the feed dropped are only recovered by a catch-up copy, so the
    /// checkpoint must not move past them until one has run.
    pub fn note_lost(&self, feed: &mut ChangeFeed) {
        let lost = feed.take_lost();
        if lost > 0 {
            tracing::warn!(
                "{} lost {} {} notification(s); holding its checkpoint until the next catch-up",
                self.flow,
                lost,
                self.collection
            );
            self.queue.mark_gap(&self.collection);
        }
    }

    /// Resolve a batch against the source snapshot and enqueue the survivors in
    /// ascending `updated_at` order. Returns the number of jobs enqueued.
    pub async fn drain(&self, batch: &Batch) -> usize {
        let mut records: Vec<Record> = Vec::new();
        for id in batch.record_ids() {
            match self.source.object_for_id(&self.collection, &id).await {
                Ok(Existing::Present(record)) => {
                    if partition::belongs(&record, &self.partition) {
                        records.push(record);
                    }
                }
                Ok(Existing::Absent | Existing::Unreadable) => {
                    tracing::debug!(
                        "{}/{} is gone from {}; nothing to replicate",
                        self.collection,
                        id,
                        self.source.name()
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        "Could not resolve {}/{} from {}: {}",
                        self.collection,
                        id,
                        self.source.name(),
                        error
                    );
                }
            }
        }

        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));
        let checkpoint = self.progress.is_live(self.flow, &self.collection);

        let mut enqueued = 0;
        for record in records {
            if self
                .queue
                .enqueue(WriteJob::live(self.collection.clone(), record, checkpoint))
            {
                enqueued += 1;
            }
        }
        if enqueued > 0 {
            tracing::debug!(
                "Enqueued {} {} change(s) for {}",
                enqueued,
                self.collection,
                self.flow
            );
        }
        enqueued
    }
}
