//! Sync coordinator
//!
//! Owns a sync session: the partition, the direction, one write queue per
//! destination and one change feed listener per collection and flow. A
//! session starts with a bulk copy of every collection in schema order, then
//! stays in live sync until it is stopped. A periodic catch-up tick retries
//! collections whose copy failed and refreshes replica stores.

use std::sync::Arc;

use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use super::checkpoint::CheckpointStore;
use super::debounce::Debouncer;
use super::listener::ChangeFeedListener;
use super::partition;
use super::queue::{QueueStats, ShutdownMode, WriteJob, WriteQueue};
use super::state::{BulkCopyStatus, CollectionState, SyncProgress};
use crate::collections::CollectionRegistry;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::models::{Flow, Record, SyncDirection};
use crate::store::{ChangeFeed, RecordFilter, Store};

/// Drives replication between a local and a remote store
pub struct SyncCoordinator {
    engine: Arc<Engine>,
    sessions: Mutex<Sessions>,
}

struct Engine {
    local: Arc<dyn Store>,
    remote: Arc<dyn Store>,
    checkpoints: Arc<dyn CheckpointStore>,
    collections: CollectionRegistry,
    config: EngineConfig,
    status: watch::Sender<BulkCopyStatus>,
    progress: Arc<SyncProgress>,
}

#[derive(Default)]
struct Sessions {
    running: Option<Session>,
    last_direction: Option<SyncDirection>,
}

struct Session {
    partition: String,
    direction: SyncDirection,
    cancel: CancellationToken,
    pipelines: Arc<Vec<Pipeline>>,
    tasks: Vec<JoinHandle<()>>,
}

/// One flow of a session
struct Pipeline {
    flow: Flow,
    source: Arc<dyn Store>,
    destination: Arc<dyn Store>,
    queue: Arc<WriteQueue>,
    /// Collections with a registered listener, in schema order
    collections: Vec<String>,
}

impl SyncCoordinator {
    pub fn new(
        local: Arc<dyn Store>,
        remote: Arc<dyn Store>,
        checkpoints: Arc<dyn CheckpointStore>,
        collections: CollectionRegistry,
        config: EngineConfig,
    ) -> Self {
        let (status, _) = watch::channel(BulkCopyStatus::Idle);
        Self {
            engine: Arc::new(Engine {
                local,
                remote,
                checkpoints,
                collections,
                config,
                status,
                progress: Arc::new(SyncProgress::new()),
            }),
            sessions: Mutex::new(Sessions::default()),
        }
    }

    /// Start syncing `partition` in `direction`, replacing any running session.
    ///
    /// Returns once listeners are registered; the bulk copy continues in the
    /// background and is observable through [`Self::bulk_copy_status`].
    pub async fn start_sync(&self, partition: &str, direction: SyncDirection) -> Result<()> {
        let partition = validate_partition(partition)?;
        let mut sessions = self.sessions.lock().await;
        if let Some(previous) = sessions.running.take() {
            self.engine.teardown(previous).await;
        }
        sessions.last_direction = Some(direction);
        sessions.running = Some(self.engine.open(partition, direction)?);
        Ok(())
    }

    /// Stop the running session. Pending jobs are discarded; a transaction in
    /// flight still completes.
    pub async fn stop_sync(&self) {
        let mut sessions = self.sessions.lock().await;
        if let Some(session) = sessions.running.take() {
            let partition = session.partition.clone();
            self.engine.teardown(session).await;
            tracing::info!("Stopped syncing partition '{}'", partition);
        }
    }

    /// Forget all progress for the session's flows and copy everything again.
    ///
    /// Uses the direction of the running (or last) session, `Both` if none.
    pub async fn force_resync(&self, partition: &str) -> Result<()> {
        let partition = validate_partition(partition)?;
        let mut sessions = self.sessions.lock().await;
        let direction = sessions
            .running
            .as_ref()
            .map(|session| session.direction)
            .or(sessions.last_direction)
            .unwrap_or(SyncDirection::Both);

        if let Some(previous) = sessions.running.take() {
            self.engine.teardown(previous).await;
        }
        for flow in direction.flows() {
            self.engine.checkpoints.reset(Some(*flow)).await?;
        }
        tracing::info!("Checkpoints reset; resyncing partition '{}'", partition);

        sessions.last_direction = Some(direction);
        sessions.running = Some(self.engine.open(partition, direction)?);
        Ok(())
    }

    pub fn bulk_copy_status(&self) -> BulkCopyStatus {
        self.engine.status.borrow().clone()
    }

    /// Receiver notified whenever the bulk copy status changes
    pub fn subscribe_status(&self) -> watch::Receiver<BulkCopyStatus> {
        self.engine.status.subscribe()
    }

    /// Wait until the running bulk copy settles (complete or failed).
    pub async fn wait_for_bulk_copy(&self) -> BulkCopyStatus {
        let mut status = self.subscribe_status();
        let settled = status
            .wait_for(|status| !matches!(status, BulkCopyStatus::InProgress))
            .await
            .map(|status| status.clone());
        settled.unwrap_or_else(|_| self.bulk_copy_status())
    }

    pub fn collection_state(&self, flow: Flow, collection: &str) -> CollectionState {
        self.engine.progress.get(flow, collection)
    }

    pub fn progress(&self) -> Vec<(Flow, String, CollectionState)> {
        self.engine.progress.snapshot()
    }

    /// Partition of the running session
    pub async fn partition(&self) -> Option<String> {
        let sessions = self.sessions.lock().await;
        sessions.running.as_ref().map(|session| session.partition.clone())
    }

    pub async fn is_running(&self) -> bool {
        self.sessions.lock().await.running.is_some()
    }

    /// Write queue counters of the running session, per flow
    pub async fn queue_stats(&self) -> Vec<(Flow, QueueStats)> {
        let sessions = self.sessions.lock().await;
        sessions
            .running
            .as_ref()
            .map(|session| {
                session
                    .pipelines
                    .iter()
                    .map(|pipeline| (pipeline.flow, pipeline.queue.stats()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn validate_partition(partition: &str) -> Result<&str> {
    let partition = partition.trim();
    if partition.is_empty() {
        return Err(Error::InvalidInput("partition must not be empty".to_string()));
    }
    Ok(partition)
}

impl Engine {
    fn endpoints(&self, flow: Flow) -> (Arc<dyn Store>, Arc<dyn Store>) {
        match flow {
            Flow::LocalToRemote => (Arc::clone(&self.local), Arc::clone(&self.remote)),
            Flow::RemoteToLocal => (Arc::clone(&self.remote), Arc::clone(&self.local)),
        }
    }

    /// Register listeners and spawn the session driver.
    fn open(self: &Arc<Self>, partition: &str, direction: SyncDirection) -> Result<Session> {
        self.progress.clear();
        self.status.send_replace(BulkCopyStatus::InProgress);

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        let mut pipelines = Vec::new();

        for &flow in direction.flows() {
            let (source, destination) = self.endpoints(flow);
            let queue = Arc::new(WriteQueue::spawn(
                Arc::clone(&destination),
                Arc::clone(&self.checkpoints),
                flow,
                partition,
            ));

            let mut collections = Vec::new();
            for collection in self.collections.names() {
                let listener = ChangeFeedListener {
                    collection: collection.to_string(),
                    flow,
                    partition: partition.to_string(),
                    source: Arc::clone(&source),
                    queue: Arc::clone(&queue),
                    progress: Arc::clone(&self.progress),
                    debouncer: Debouncer::new(self.config.debounce()),
                };
                match register(&listener, &destination) {
                    Ok(feed) => {
                        self.progress.set(flow, collection, CollectionState::Unsynced);
                        tasks.push(listener.spawn(feed, cancel.child_token()));
                        collections.push(collection.to_string());
                    }
                    Err(error) => {
                        tracing::warn!("Skipping {} for {}: {}", collection, flow, error);
                    }
                }
            }

            pipelines.push(Pipeline {
                flow,
                source,
                destination,
                queue,
                collections,
            });
        }

        if pipelines.iter().all(|pipeline| pipeline.collections.is_empty()) {
            cancel.cancel();
            let reason = "no collection could be registered".to_string();
            self.status.send_replace(BulkCopyStatus::Failed(reason.clone()));
            return Err(Error::InvalidInput(reason));
        }

        let pipelines = Arc::new(pipelines);
        tasks.push(tokio::spawn(Arc::clone(self).drive(
            Arc::clone(&pipelines),
            partition.to_string(),
            cancel.clone(),
        )));

        tracing::info!(
            "Started syncing partition '{}' ({:?})",
            partition,
            direction
        );
        Ok(Session {
            partition: partition.to_string(),
            direction,
            cancel,
            pipelines,
            tasks,
        })
    }

    async fn teardown(&self, session: Session) {
        session.cancel.cancel();
        for task in session.tasks {
            if let Err(error) = task.await {
                tracing::error!("Sync task panicked: {}", error);
            }
        }
        for pipeline in session.pipelines.iter() {
            pipeline.queue.shutdown(ShutdownMode::Discard).await;
        }
        self.progress.clear();
        self.status.send_replace(BulkCopyStatus::Idle);
    }

    /// Bulk copy, then keep retrying on the catch-up tick until cancelled.
    async fn drive(
        self: Arc<Self>,
        pipelines: Arc<Vec<Pipeline>>,
        partition: String,
        cancel: CancellationToken,
    ) {
        let failures = tokio::select! {
            () = cancel.cancelled() => return,
            failures = self.copy_all(&pipelines, &partition) => failures,
        };
        self.publish(&failures);

        let period = self.config.catch_up_interval();
        let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }
            let failures = tokio::select! {
                () = cancel.cancelled() => break,
                failures = self.catch_up(&pipelines, &partition) => failures,
            };
            self.publish(&failures);
        }
    }

    async fn catch_up(&self, pipelines: &[Pipeline], partition: &str) -> Vec<String> {
        for store in [&self.local, &self.remote] {
            if let Err(error) = store.refresh().await {
                tracing::warn!("Failed to refresh {}: {}", store.name(), error);
            }
        }
        self.copy_all(pipelines, partition).await
    }

    /// Copy every registered collection, flow by flow, returning what failed.
    async fn copy_all(&self, pipelines: &[Pipeline], partition: &str) -> Vec<String> {
        let mut failures = Vec::new();
        for pipeline in pipelines {
            for collection in &pipeline.collections {
                match self.copy_collection(pipeline, collection, partition).await {
                    Ok(copied) => tracing::debug!(
                        "Copied {} {} record(s) for {}",
                        copied,
                        collection,
                        pipeline.flow
                    ),
                    Err(error) => {
                        tracing::warn!(
                            "Bulk copy of {} for {} failed: {}",
                            collection,
                            pipeline.flow,
                            error
                        );
                        failures.push(format!("{collection} ({}): {error}", pipeline.flow));
                    }
                }
            }
        }
        failures
    }

    /// Copy one collection from its checkpoint. Returns the number of records
    /// enqueued.
    async fn copy_collection(
        &self,
        pipeline: &Pipeline,
        collection: &str,
        partition: &str,
    ) -> Result<usize> {
        let flow = pipeline.flow;
        if !self.progress.is_live(flow, collection) {
            self.progress.set(flow, collection, CollectionState::BulkCopying);
        }

        let gap_epoch = pipeline.queue.gap_epoch(collection);
        let checkpoint = self
            .checkpoints
            .get(collection, flow)
            .await?
            .filter(|checkpoint| checkpoint.partition == partition);
        let filter = RecordFilter::all()
            .in_partition(partition)
            .updated_since(checkpoint.as_ref().map(|checkpoint| checkpoint.last_synced_at));

        let mut records: Vec<Record> = pipeline
            .source
            .query(collection, &filter)
            .await?
            .into_iter()
            .filter(|record| partition::belongs(record, partition))
            .filter(|record| {
                !checkpoint
                    .as_ref()
                    .is_some_and(|checkpoint| checkpoint.covers(record))
            })
            .collect();
        records.sort_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.id.cmp(&b.id)));

        let before = pipeline.queue.collection_stats(collection);
        let total = records.len();
        let batch_size = self.config.bulk_batch_size.max(1);
        for (index, record) in records.into_iter().enumerate() {
            if !pipeline.queue.enqueue(WriteJob::bulk(collection, record)) {
                return Err(Error::Unavailable("write queue closed".to_string()));
            }
            if (index + 1) % batch_size == 0 {
                tokio::task::yield_now().await;
            }
        }
        if !pipeline.queue.flush().await {
            return Err(Error::Unavailable("write queue closed".to_string()));
        }

        let unavailable =
            pipeline.queue.collection_stats(collection).unavailable - before.unavailable;
        if unavailable > 0 {
            return Err(Error::Unavailable(format!(
                "{unavailable} of {total} writes could not reach {}",
                pipeline.destination.name()
            )));
        }
        // Live writes that failed before this pass and were not copied again
        let owed = pipeline.queue.pending_retries(collection);
        if owed > 0 {
            return Err(Error::Unavailable(format!(
                "{owed} earlier write(s) still waiting to reach {}",
                pipeline.destination.name()
            )));
        }
        pipeline.queue.close_gap(collection, gap_epoch);

        self.progress.set(flow, collection, CollectionState::LiveSyncing);
        Ok(total)
    }

    fn publish(&self, failures: &[String]) {
        let next = if failures.is_empty() {
            BulkCopyStatus::Complete
        } else {
            BulkCopyStatus::Failed(failures.join("; "))
        };
        self.status.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            if next.is_complete() {
                tracing::info!("Bulk copy complete");
            }
            *current = next;
            true
        });
    }
}

/// Subscribe to the listener's source, provided the destination also knows
/// the collection.
fn register(
    listener: &ChangeFeedListener,
    destination: &Arc<dyn Store>,
) -> Result<ChangeFeed> {
    if !destination.has_collection(&listener.collection) {
        return Err(Error::UnknownCollection(format!(
            "{} in {}",
            listener.collection,
            destination.name()
        )));
    }
    listener.source.subscribe(&listener.collection)
}
