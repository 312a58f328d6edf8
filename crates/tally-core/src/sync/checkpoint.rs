//! Checkpoint store contract
//!
//! Checkpoints are written only by the write queue, after a job's transaction
//! committed. A crash between commit and checkpoint merely means a few records
//! get re-evaluated on the next run.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::models::{Flow, SyncCheckpoint};

/// Durable per-`(collection, flow)` sync progress
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// Current checkpoint, if any
    async fn get(&self, collection: &str, flow: Flow) -> Result<Option<SyncCheckpoint>>;

    /// Persist `checkpoint` as-is
    async fn put(&self, checkpoint: &SyncCheckpoint) -> Result<()>;

    /// Every stored checkpoint
    async fn list(&self) -> Result<Vec<SyncCheckpoint>>;

    /// Forget progress for one flow, or for all flows when `None`
    async fn reset(&self, flow: Option<Flow>) -> Result<()>;

    /// Move the checkpoint forward to `candidate` unless it is already there.
    ///
    /// Returns whether anything was written.
    async fn advance(&self, candidate: SyncCheckpoint) -> Result<bool> {
        let current = self.get(&candidate.collection, candidate.flow).await?;
        match SyncCheckpoint::merge(current.as_ref(), candidate) {
            Some(next) => {
                self.put(&next).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

/// Non-durable checkpoint store, for tests and throwaway sessions
#[derive(Debug, Default)]
pub struct MemoryCheckpointStore {
    checkpoints: Mutex<BTreeMap<(String, Flow), SyncCheckpoint>>,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, BTreeMap<(String, Flow), SyncCheckpoint>>> {
        self.checkpoints
            .lock()
            .map_err(|_| Error::Database("checkpoint lock poisoned".to_string()))
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn get(&self, collection: &str, flow: Flow) -> Result<Option<SyncCheckpoint>> {
        Ok(self.lock()?.get(&(collection.to_string(), flow)).cloned())
    }

    async fn put(&self, checkpoint: &SyncCheckpoint) -> Result<()> {
        self.lock()?.insert(
            (checkpoint.collection.clone(), checkpoint.flow),
            checkpoint.clone(),
        );
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SyncCheckpoint>> {
        Ok(self.lock()?.values().cloned().collect())
    }

    async fn reset(&self, flow: Option<Flow>) -> Result<()> {
        self.lock()?
            .retain(|(_, stored), _| flow.is_some_and(|flow| flow != *stored));
        Ok(())
    }
}
