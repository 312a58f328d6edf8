//! Replication engine
//!
//! Records flow from a source store to a destination store through a fixed
//! pipeline: partition filter, then a single write queue per destination that
//! re-checks last-writer-wins at apply time, then the checkpoint. Bulk copy
//! and live sync share that pipeline and differ only in where records come
//! from.

pub mod checkpoint;
pub mod conflict;
pub mod coordinator;
pub mod debounce;
pub mod listener;
pub mod partition;
pub mod queue;
pub mod state;

pub use checkpoint::{CheckpointStore, MemoryCheckpointStore};
pub use coordinator::SyncCoordinator;
pub use debounce::{Batch, Debouncer};
pub use listener::ChangeFeedListener;
pub use queue::{CheckpointPolicy, QueueStats, ShutdownMode, WriteJob, WriteQueue};
pub use state::{BulkCopyStatus, CollectionState, SyncProgress};
