//! Object store contract shared by the local and remote replicas
//!
//! The replication engine only talks to stores through [`Store`]. The contract
//! has no physical removal: a deletion is an upsert with `is_deleted = true`,
//! which is the only kind of delete a change feed can observe.

mod feed;
mod memory;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{Record, RecordId};

pub use feed::{ChangeFeed, ChangeNotifier, ChangeSet};
#[cfg(test)]
pub(crate) use feed::CHANNEL_CAPACITY;
pub use memory::MemoryStore;

/// State of a record at a destination, as seen inside a write transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Existing {
    /// No record with this id
    Absent,
    /// A readable record
    Present(Record),
    /// A row exists but cannot be read back (removed or corrupted underneath)
    Unreadable,
}

impl Existing {
    /// The readable record, if any
    pub const fn record(&self) -> Option<&Record> {
        match self {
            Self::Present(record) => Some(record),
            Self::Absent | Self::Unreadable => None,
        }
    }
}

/// Result of a guarded write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The record was written and committed
    Applied,
    /// The guard rejected the write; nothing changed
    Skipped,
}

/// Decides, inside the write transaction, whether the candidate may replace
/// what the destination currently holds.
pub type WriteGuard<'a> = &'a (dyn Fn(&Existing) -> bool + Send + Sync);

/// Query filter for [`Store::query`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordFilter {
    /// Only records in this partition
    pub partition: Option<String>,
    /// Only records with `updated_at >=` this value
    pub updated_since: Option<i64>,
    /// Exclude tombstones
    pub live_only: bool,
}

impl RecordFilter {
    /// Everything, tombstones included
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn in_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    #[must_use]
    pub const fn updated_since(mut self, updated_at: Option<i64>) -> Self {
        self.updated_since = updated_at;
        self
    }

    #[must_use]
    pub const fn live_only(mut self) -> Self {
        self.live_only = true;
        self
    }

    /// Whether `record` passes this filter
    pub fn matches(&self, record: &Record) -> bool {
        if self.live_only && record.is_deleted {
            return false;
        }
        if let Some(partition) = &self.partition {
            if &record.partition != partition {
                return false;
            }
        }
        self.updated_since
            .is_none_or(|since| record.updated_at >= since)
    }
}

/// An object store holding records grouped into collections.
///
/// Implementations serialize their own write transactions; callers still must
/// not issue overlapping writes from the replication engine (the write queue is
/// the only writer it uses).
#[async_trait]
pub trait Store: Send + Sync {
    /// Human readable name for logs
    fn name(&self) -> &str;

    /// Whether this store's schema has `collection`
    fn has_collection(&self, collection: &str) -> bool;

    /// Snapshot query, unordered
    async fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>>;

    /// Look up one record by id
    async fn object_for_id(&self, collection: &str, id: &RecordId) -> Result<Existing>;

    /// Upsert `record` in one transaction if `guard` accepts the current state
    async fn write(
        &self,
        collection: &str,
        record: &Record,
        guard: WriteGuard<'_>,
    ) -> Result<WriteOutcome>;

    /// Subscribe to committed insertions and modifications in `collection`
    fn subscribe(&self, collection: &str) -> Result<ChangeFeed>;

    /// Pull pending changes from an upstream primary, if this store has one
    async fn refresh(&self) -> Result<()> {
        Ok(())
    }
}
