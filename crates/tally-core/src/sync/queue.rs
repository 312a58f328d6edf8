//! Serialized write queue
//!
//! One queue per destination store. `enqueue` never blocks; a single worker
//! task drains jobs in FIFO order, running at most one destination transaction
//! at a time. The conflict check runs inside that transaction, so the decision
//! reflects the destination as of apply time, not enqueue time.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::checkpoint::CheckpointStore;
use super::{conflict, partition};
use crate::models::{Flow, Record, RecordId, SyncCheckpoint};
use crate::store::{Existing, Store, WriteOutcome};
use crate::util::unix_millis_now;

/// How a committed job moves its collection's checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckpointPolicy {
    /// Advance timestamp and cursor (bulk copy, sorted input)
    Cursor,
    /// Advance timestamp only (live sync after the collection's bulk copy)
    Timestamp,
    /// Leave the checkpoint alone (live sync racing an unfinished bulk copy)
    Hold,
}

/// A single record to replicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteJob {
    pub collection: String,
    pub record: Record,
    pub checkpoint: CheckpointPolicy,
    /// Unix ms
    pub enqueued_at: i64,
}

impl WriteJob {
    /// Job produced by a bulk copy pass
    pub fn bulk(collection: impl Into<String>, record: Record) -> Self {
        Self::new(collection, record, CheckpointPolicy::Cursor)
    }

    /// Job produced by a change feed listener
    pub fn live(collection: impl Into<String>, record: Record, checkpoint: bool) -> Self {
        let policy = if checkpoint {
            CheckpointPolicy::Timestamp
        } else {
            CheckpointPolicy::Hold
        };
        Self::new(collection, record, policy)
    }

    fn new(collection: impl Into<String>, record: Record, checkpoint: CheckpointPolicy) -> Self {
        Self {
            collection: collection.into(),
            record,
            checkpoint,
            enqueued_at: unix_millis_now(),
        }
    }
}

/// How to stop a queue
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Apply everything already enqueued, then stop
    Drain,
    /// Drop pending jobs; the job being applied still finishes
    Discard,
}

/// Counter snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueStats {
    pub enqueued: u64,
    pub applied: u64,
    pub skipped: u64,
    pub failed: u64,
    /// Subset of `failed` where the destination was unreachable
    pub unavailable: u64,
}

impl QueueStats {
    /// Jobs handled by the worker so far
    pub const fn processed(&self) -> u64 {
        self.applied + self.skipped + self.failed
    }
}

#[derive(Debug, Default)]
struct Counters {
    enqueued: AtomicU64,
    applied: AtomicU64,
    skipped: AtomicU64,
    failed: AtomicU64,
    unavailable: AtomicU64,
}

impl Counters {
    fn snapshot(&self) -> QueueStats {
        QueueStats {
            enqueued: self.enqueued.load(Ordering::Relaxed),
            applied: self.applied.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            unavailable: self.unavailable.load(Ordering::Relaxed),
        }
    }
}

/// Per-collection bookkeeping shared by the queue and its worker.
///
/// A collection's checkpoint may only move while nothing below it is still
/// owed to the destination: no transient failure awaiting a retry at or below
/// the candidate timestamp, and no lost change notifications.
#[derive(Debug, Default)]
struct Track {
    stats: QueueStats,
    /// Transiently failed records and the `updated_at` that failed
    retry: BTreeMap<RecordId, i64>,
    /// Bumped whenever change notifications were lost
    gap_epoch: u64,
    gap_open: bool,
}

impl Track {
    fn allows_checkpoint_at(&self, updated_at: i64) -> bool {
        !self.gap_open
            && self
                .retry
                .values()
                .min()
                .is_none_or(|floor| updated_at < *floor)
    }
}

#[derive(Debug, Default)]
struct Tracks(Mutex<HashMap<String, Track>>);

impl Tracks {
    fn with<R>(&self, collection: &str, f: impl FnOnce(&mut Track) -> R) -> Option<R> {
        let mut tracks = self.0.lock().ok()?;
        Some(f(tracks.entry(collection.to_string()).or_default()))
    }
}

enum Command {
    Apply(Box<WriteJob>),
    Flush(oneshot::Sender<()>),
    Close,
}

/// Single-writer queue feeding one destination store
pub struct WriteQueue {
    flow: Flow,
    sender: mpsc::UnboundedSender<Command>,
    discard: CancellationToken,
    counters: Arc<Counters>,
    tracks: Arc<Tracks>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl WriteQueue {
    /// Start the worker for `destination`. Must be called inside a tokio runtime.
    pub fn spawn(
        destination: Arc<dyn Store>,
        checkpoints: Arc<dyn CheckpointStore>,
        flow: Flow,
        partition: impl Into<String>,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let discard = CancellationToken::new();
        let counters = Arc::new(Counters::default());
        let tracks = Arc::new(Tracks::default());

        let worker = Worker {
            destination,
            checkpoints,
            flow,
            partition: partition.into(),
            counters: Arc::clone(&counters),
            tracks: Arc::clone(&tracks),
        };
        let handle = tokio::spawn(worker.run(receiver, discard.clone()));

        Self {
            flow,
            sender,
            discard,
            counters,
            tracks,
            worker: Mutex::new(Some(handle)),
        }
    }

    pub const fn flow(&self) -> Flow {
        self.flow
    }

    /// Queue a job. Returns `false` if the queue has shut down.
    pub fn enqueue(&self, job: WriteJob) -> bool {
        let collection = job.collection.clone();
        self.counters.enqueued.fetch_add(1, Ordering::Relaxed);
        self.tracks
            .with(&collection, |track| track.stats.enqueued += 1);
        let queued = self.sender.send(Command::Apply(Box::new(job))).is_ok();
        if !queued {
            self.counters.enqueued.fetch_sub(1, Ordering::Relaxed);
            self.tracks
                .with(&collection, |track| track.stats.enqueued -= 1);
        }
        queued
    }

    /// Wait until every job enqueued before this call has been handled.
    ///
    /// Returns `false` if the queue shut down first.
    pub async fn flush(&self) -> bool {
        let (done, wait) = oneshot::channel();
        if self.sender.send(Command::Flush(done)).is_err() {
            return false;
        }
        wait.await.is_ok()
    }

    pub fn stats(&self) -> QueueStats {
        self.counters.snapshot()
    }

    /// Counters for the jobs of one collection
    pub fn collection_stats(&self, collection: &str) -> QueueStats {
        self.tracks
            .with(collection, |track| track.stats)
            .unwrap_or_default()
    }

    /// Records of `collection` whose write failed transiently and has not
    /// been applied since
    pub fn pending_retries(&self, collection: &str) -> usize {
        self.tracks
            .with(collection, |track| track.retry.len())
            .unwrap_or_default()
    }

    /// Record that change notifications for `collection` were lost. The
    /// checkpoint stays put until a copy started after this call succeeds.
    pub fn mark_gap(&self, collection: &str) {
        self.tracks.with(collection, |track| {
            track.gap_epoch += 1;
            track.gap_open = true;
        });
    }

    /// Token to pass to [`Self::close_gap`] once a copy has finished
    pub fn gap_epoch(&self, collection: &str) -> u64 {
        self.tracks
            .with(collection, |track| track.gap_epoch)
            .unwrap_or_default()
    }

    /// Close the gap unless notifications were lost again since `epoch`.
    pub fn close_gap(&self, collection: &str, epoch: u64) {
        self.tracks.with(collection, |track| {
            if track.gap_epoch == epoch {
                track.gap_open = false;
            }
        });
    }

    /// Stop the worker and wait for it. Never interrupts a transaction.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        match mode {
            ShutdownMode::Drain => {
                let _ = self.sender.send(Command::Close);
            }
            ShutdownMode::Discard => self.discard.cancel(),
        }

        let handle = self.worker.lock().ok().and_then(|mut worker| worker.take());
        if let Some(handle) = handle {
            if let Err(error) = handle.await {
                tracing::error!("Write queue worker for {} panicked: {}", self.flow, error);
            }
        }
    }
}

impl Drop for WriteQueue {
    fn drop(&mut self) {
        self.discard.cancel();
    }
}

struct Worker {
    destination: Arc<dyn Store>,
    checkpoints: Arc<dyn CheckpointStore>,
    flow: Flow,
    partition: String,
    counters: Arc<Counters>,
    tracks: Arc<Tracks>,
}

impl Worker {
    async fn run(self, mut receiver: mpsc::UnboundedReceiver<Command>, discard: CancellationToken) {
        tracing::debug!(
            "Write queue for {} into {} started",
            self.flow,
            self.destination.name()
        );

        loop {
            let command = tokio::select! {
                biased;
                () = discard.cancelled() => break,
                command = receiver.recv() => command,
            };
            match command {
                Some(Command::Apply(job)) => self.apply(*job).await,
                Some(Command::Flush(done)) => {
                    let _ = done.send(());
                }
                Some(Command::Close) | None => break,
            }
        }

        tracing::debug!(
            "Write queue for {} stopped: {:?}",
            self.flow,
            self.counters.snapshot()
        );
    }

    async fn apply(&self, job: WriteJob) {
        let record = &job.record;
        if !partition::belongs(record, &self.partition) {
            tracing::warn!(
                "Refusing to write {}/{} from partition '{}' while syncing '{}'",
                job.collection,
                record.id,
                record.partition,
                self.partition
            );
            self.counters.skipped.fetch_add(1, Ordering::Relaxed);
            self.tracks
                .with(&job.collection, |track| track.stats.skipped += 1);
            return;
        }

        let guard = |existing: &Existing| conflict::should_apply(record, existing);
        match self.destination.write(&job.collection, record, &guard).await {
            Ok(WriteOutcome::Applied) => {
                self.counters.applied.fetch_add(1, Ordering::Relaxed);
                let may_advance = self
                    .tracks
                    .with(&job.collection, |track| {
                        track.stats.applied += 1;
                        settle(track, record);
                        track.allows_checkpoint_at(record.updated_at)
                    })
                    .unwrap_or(false);
                if may_advance {
                    self.advance_checkpoint(&job).await;
                } else {
                    tracing::debug!(
                        "Holding {} checkpoint for {}: earlier writes still owed",
                        self.flow,
                        job.collection
                    );
                }
            }
            Ok(WriteOutcome::Skipped) => {
                self.counters.skipped.fetch_add(1, Ordering::Relaxed);
                self.tracks.with(&job.collection, |track| {
                    track.stats.skipped += 1;
                    settle(track, record);
                });
                tracing::trace!(
                    "Skipped {}/{}: destination is as new or newer",
                    job.collection,
                    record.id
                );
            }
            Err(error) => {
                let transient = error.is_transient();
                self.counters.failed.fetch_add(1, Ordering::Relaxed);
                if transient {
                    self.counters.unavailable.fetch_add(1, Ordering::Relaxed);
                }
                self.tracks.with(&job.collection, |track| {
                    track.stats.failed += 1;
                    if transient {
                        track.stats.unavailable += 1;
                        let failed_at = track.retry.entry(record.id).or_insert(record.updated_at);
                        *failed_at = (*failed_at).min(record.updated_at);
                    }
                });
                tracing::warn!(
                    "Dropping write job for {}/{} into {}: {}",
                    job.collection,
                    record.id,
                    self.destination.name(),
                    error
                );
            }
        }
    }

    async fn advance_checkpoint(&self, job: &WriteJob) {
        let cursor = match job.checkpoint {
            CheckpointPolicy::Hold => return,
            CheckpointPolicy::Cursor => Some(job.record.id),
            CheckpointPolicy::Timestamp => None,
        };
        let candidate = SyncCheckpoint {
            collection: job.collection.clone(),
            flow: self.flow,
            partition: self.partition.clone(),
            last_synced_at: job.record.updated_at,
            cursor,
        };
        if let Err(error) = self.checkpoints.advance(candidate).await {
            tracing::warn!(
                "Failed to advance {} checkpoint for {}: {}",
                self.flow,
                job.collection,
                error
            );
        }
    }
}

/// The destination now holds `record` or something newer, so an earlier
/// transient failure of the same record is settled.
fn settle(track: &mut Track, record: &Record) {
    if track
        .retry
        .get(&record.id)
        .is_some_and(|failed_at| record.updated_at >= *failed_at)
    {
        track.retry.remove(&record.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::CollectionRegistry;
    use crate::store::MemoryStore;
    use crate::sync::checkpoint::MemoryCheckpointStore;
    use serde_json::{json, Map};
    use std::time::Duration;

    struct Fixture {
        destination: Arc<MemoryStore>,
        checkpoints: Arc<MemoryCheckpointStore>,
        queue: WriteQueue,
    }

    fn fixture() -> Fixture {
        let destination = Arc::new(MemoryStore::new("remote", CollectionRegistry::ledger()));
        let checkpoints = Arc::new(MemoryCheckpointStore::new());
        let queue = WriteQueue::spawn(
            destination.clone(),
            checkpoints.clone(),
            Flow::LocalToRemote,
            "biz-42",
        );
        Fixture {
            destination,
            checkpoints,
            queue,
        }
    }

    fn customer(name: &str, updated_at: i64) -> Record {
        let mut data = Map::new();
        data.insert("name".to_string(), json!(name));
        let mut record = Record::new("biz-42", data);
        record.updated_at = updated_at;
        record
    }

    #[tokio::test]
    async fn applies_jobs_in_order_and_advances_checkpoint() {
        let fx = fixture();
        let first = customer("Acme", 10);
        let second = customer("Globex", 11);

        assert!(fx.queue.enqueue(WriteJob::bulk("customers", first.clone())));
        assert!(fx.queue.enqueue(WriteJob::bulk("customers", second.clone())));
        assert!(fx.queue.flush().await);

        assert_eq!(fx.destination.get("customers", &first.id), first);
        assert_eq!(fx.destination.get("customers", &second.id), second);
        let checkpoint = fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.last_synced_at, 11);
        assert_eq!(checkpoint.cursor, Some(second.id));
        assert_eq!(fx.queue.stats().applied, 2);
    }

    #[tokio::test]
    async fn applying_same_job_twice_is_idempotent() {
        let fx = fixture();
        let record = customer("Acme", 10);

        fx.queue.enqueue(WriteJob::bulk("customers", record.clone()));
        fx.queue.enqueue(WriteJob::bulk("customers", record.clone()));
        fx.queue.flush().await;

        assert_eq!(fx.destination.get("customers", &record.id), record);
        assert_eq!(fx.destination.applied_writes(), 1);
        let stats = fx.queue.stats();
        assert_eq!((stats.applied, stats.skipped), (1, 1));
    }

    #[tokio::test]
    async fn stale_job_is_rechecked_at_apply_time() {
        let fx = fixture();
        let mut tombstone = customer("Acme", 20);
        tombstone.is_deleted = true;
        let mut stale = tombstone.clone();
        stale.updated_at = 15;
        stale.is_deleted = false;

        fx.queue.enqueue(WriteJob::live("customers", tombstone.clone(), true));
        fx.queue.enqueue(WriteJob::live("customers", stale, true));
        fx.queue.flush().await;

        let stored = fx.destination.get("customers", &tombstone.id);
        assert!(stored.is_deleted);
        assert_eq!(stored.updated_at, 20);
        let checkpoint = fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.last_synced_at, 20);
    }

    #[tokio::test]
    async fn failed_job_is_dropped_and_queue_continues() {
        let fx = fixture();
        let bad = customer("Ghost", 5);
        let good = customer("Acme", 6);

        fx.queue.enqueue(WriteJob::bulk("payments", bad));
        fx.queue.enqueue(WriteJob::bulk("customers", good.clone()));
        fx.queue.flush().await;

        assert_eq!(fx.destination.get("customers", &good.id), good);
        let stats = fx.queue.stats();
        assert_eq!((stats.failed, stats.applied), (1, 1));
        assert_eq!(stats.unavailable, 0);
    }

    #[tokio::test]
    async fn failed_job_does_not_advance_checkpoint() {
        let fx = fixture();
        fx.destination.set_online(false);
        fx.queue.enqueue(WriteJob::bulk("customers", customer("Acme", 10)));
        fx.queue.flush().await;

        let stats = fx.queue.stats();
        assert_eq!((stats.failed, stats.unavailable), (1, 1));
        assert!(fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn unreached_write_holds_later_checkpoints_until_retried() {
        let fx = fixture();
        let missed = customer("Acme", 10);
        let later = customer("Globex", 20);

        fx.destination.set_online(false);
        fx.queue.enqueue(WriteJob::live("customers", missed.clone(), true));
        fx.queue.flush().await;
        fx.destination.set_online(true);
        fx.queue.enqueue(WriteJob::live("customers", later.clone(), true));
        fx.queue.flush().await;

        assert_eq!(fx.destination.get("customers", &later.id), later);
        assert_eq!(fx.queue.pending_retries("customers"), 1);
        assert!(fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .is_none());

        fx.queue.enqueue(WriteJob::bulk("customers", missed.clone()));
        fx.queue.enqueue(WriteJob::bulk("customers", later.clone()));
        fx.queue.flush().await;

        assert_eq!(fx.queue.pending_retries("customers"), 0);
        let checkpoint = fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.last_synced_at, 10);
        assert_eq!(checkpoint.cursor, Some(missed.id));
    }

    #[tokio::test]
    async fn checkpoint_still_moves_below_an_unreached_write() {
        let fx = fixture();
        fx.destination.set_online(false);
        fx.queue.enqueue(WriteJob::live("customers", customer("Acme", 10), true));
        fx.queue.flush().await;
        fx.destination.set_online(true);

        let earlier = customer("Globex", 5);
        fx.queue.enqueue(WriteJob::bulk("customers", earlier.clone()));
        fx.queue.enqueue(WriteJob::bulk("products", customer("Rice", 30)));
        fx.queue.flush().await;

        let customers = fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(customers.last_synced_at, 5);
        let products = fx
            .checkpoints
            .get("products", Flow::LocalToRemote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(products.last_synced_at, 30);
    }

    #[tokio::test]
    async fn lost_notifications_hold_checkpoint_until_gap_closes() {
        let fx = fixture();
        fx.queue.mark_gap("customers");
        let stale_epoch = fx.queue.gap_epoch("customers");
        fx.queue.mark_gap("customers");

        fx.queue
            .enqueue(WriteJob::live("customers", customer("Acme", 10), true));
        fx.queue.flush().await;
        fx.queue.close_gap("customers", stale_epoch);
        fx.queue
            .enqueue(WriteJob::live("customers", customer("Globex", 11), true));
        fx.queue.flush().await;
        assert!(fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .is_none());

        fx.queue.close_gap("customers", fx.queue.gap_epoch("customers"));
        fx.queue
            .enqueue(WriteJob::live("customers", customer("Initech", 12), true));
        fx.queue.flush().await;
        let checkpoint = fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(checkpoint.last_synced_at, 12);
        assert_eq!(fx.destination.applied_writes(), 3);
    }

    #[tokio::test]
    async fn collection_stats_count_only_their_collection() {
        let fx = fixture();
        fx.destination.set_online(false);
        fx.queue.enqueue(WriteJob::live("receipts", customer("Sale", 10), true));
        fx.queue.flush().await;
        fx.destination.set_online(true);
        fx.queue.enqueue(WriteJob::bulk("customers", customer("Acme", 11)));
        fx.queue.flush().await;

        let receipts = fx.queue.collection_stats("receipts");
        assert_eq!((receipts.enqueued, receipts.unavailable), (1, 1));
        let customers = fx.queue.collection_stats("customers");
        assert_eq!(
            customers,
            QueueStats {
                enqueued: 1,
                applied: 1,
                ..QueueStats::default()
            }
        );
        assert_eq!(fx.queue.stats().unavailable, 1);
        assert_eq!(fx.queue.pending_retries("customers"), 0);
    }

    #[tokio::test]
    async fn unreadable_destination_is_skipped() {
        let fx = fixture();
        let record = customer("Acme", 10);
        fx.destination.corrupt("customers", record.id);

        fx.queue.enqueue(WriteJob::bulk("customers", record));
        fx.queue.flush().await;

        assert_eq!(fx.queue.stats().skipped, 1);
        assert_eq!(fx.destination.applied_writes(), 0);
    }

    #[tokio::test]
    async fn foreign_partition_is_never_written() {
        let fx = fixture();
        let mut foreign = customer("Initech", 10);
        foreign.partition = "biz-7".to_string();

        fx.queue.enqueue(WriteJob::bulk("customers", foreign));
        fx.queue.flush().await;

        assert_eq!(fx.destination.applied_writes(), 0);
    }

    #[tokio::test]
    async fn held_live_jobs_do_not_move_checkpoint() {
        let fx = fixture();
        fx.queue
            .enqueue(WriteJob::live("customers", customer("Acme", 50), false));
        fx.queue.flush().await;

        assert_eq!(fx.destination.applied_writes(), 1);
        assert!(fx
            .checkpoints
            .get("customers", Flow::LocalToRemote)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn never_runs_two_transactions_at_once() {
        let fx = Arc::new(fixture());
        fx.destination.set_write_delay(Duration::from_millis(2));

        let producers: Vec<_> = (0..4)
            .map(|producer| {
                let fx = Arc::clone(&fx);
                tokio::spawn(async move {
                    for n in 0..10 {
                        fx.queue.enqueue(WriteJob::live(
                            "customers",
                            customer(&format!("c{producer}-{n}"), n),
                            true,
                        ));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }
        fx.queue.flush().await;

        assert_eq!(fx.destination.applied_writes(), 40);
        assert_eq!(fx.destination.max_concurrent_writes(), 1);
    }

    #[tokio::test]
    async fn drain_applies_pending_jobs_before_stopping() {
        let fx = fixture();
        for n in 0..5 {
            fx.queue.enqueue(WriteJob::bulk("customers", customer("Acme", n)));
        }
        fx.queue.shutdown(ShutdownMode::Drain).await;

        assert_eq!(fx.destination.applied_writes(), 5);
        assert!(!fx.queue.enqueue(WriteJob::bulk("customers", customer("Late", 9))));
        assert!(!fx.queue.flush().await);
    }

    #[tokio::test(start_paused = true)]
    async fn discard_drops_backlog_without_interrupting_current_job() {
        let fx = fixture();
        fx.destination.set_write_delay(Duration::from_millis(100));
        for n in 0..5 {
            fx.queue.enqueue(WriteJob::bulk("customers", customer("Acme", n)));
        }
        tokio::time::sleep(Duration::from_millis(10)).await;

        fx.queue.shutdown(ShutdownMode::Discard).await;

        assert_eq!(fx.destination.applied_writes(), 1);
        assert_eq!(fx.destination.max_concurrent_writes(), 1);
    }
}
