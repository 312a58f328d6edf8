//! In-process store
//!
//! Same contract as the libSQL store, without persistence. Used as an offline
//! stand-in for the remote replica and throughout the engine's tests. Faults
//! (outages, slow or failing commits, unreadable rows) can be injected to
//! exercise the engine's error paths.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use super::{
    ChangeFeed, ChangeNotifier, ChangeSet, Existing, RecordFilter, Store, WriteGuard, WriteOutcome,
};
use crate::collections::CollectionRegistry;
use crate::error::{Error, Result};
use crate::models::{Record, RecordId};

#[derive(Debug, Clone)]
enum Slot {
    Readable(Record),
    Corrupt,
}

type Collections = HashMap<String, BTreeMap<RecordId, Slot>>;

/// Thread-safe in-memory object store
pub struct MemoryStore {
    name: String,
    collections: CollectionRegistry,
    data: Mutex<Collections>,
    notifier: ChangeNotifier,
    online: AtomicBool,
    applied_writes: AtomicU64,
    faults: Faults,
}

/// Injected misbehaviour of the write path
#[derive(Default)]
struct Faults {
    write_delay: Mutex<Option<Duration>>,
    fail_after: Mutex<Option<u64>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl Faults {
    fn write_delay(&self) -> Option<Duration> {
        self.write_delay.lock().ok().and_then(|delay| *delay)
    }

    fn fail_after(&self) -> Option<u64> {
        self.fail_after.lock().ok().and_then(|limit| *limit)
    }
}

impl MemoryStore {
    /// Create an empty store knowing `collections`
    pub fn new(name: impl Into<String>, collections: CollectionRegistry) -> Self {
        Self {
            name: name.into(),
            collections,
            data: Mutex::new(HashMap::new()),
            notifier: ChangeNotifier::new(),
            online: AtomicBool::new(true),
            applied_writes: AtomicU64::new(0),
            faults: Faults::default(),
        }
    }

    /// Simulate connectivity. While offline every operation fails with
    /// [`Error::Unavailable`].
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Number of writes that committed
    pub fn applied_writes(&self) -> u64 {
        self.applied_writes.load(Ordering::SeqCst)
    }

    /// Hold every write for `delay` inside its transaction
    pub fn set_write_delay(&self, delay: Duration) {
        if let Ok(mut current) = self.faults.write_delay.lock() {
            *current = Some(delay);
        }
    }

    /// Fail every write with [`Error::Unavailable`] once `limit` writes have
    /// committed. `None` lifts the limit.
    pub fn fail_writes_after(&self, limit: Option<u64>) {
        if let Ok(mut current) = self.faults.fail_after.lock() {
            *current = limit;
        }
    }

    /// Highest number of writes observed running at the same time
    pub fn max_concurrent_writes(&self) -> usize {
        self.faults.max_in_flight.load(Ordering::SeqCst)
    }

    /// Make a stored record unreadable, as if it vanished underneath a reader
    pub fn corrupt(&self, collection: &str, id: RecordId) {
        if let Ok(mut data) = self.data.lock() {
            data.entry(collection.to_string())
                .or_default()
                .insert(id, Slot::Corrupt);
        }
    }

    fn ensure_ready(&self, collection: &str) -> Result<()> {
        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Unavailable(format!("{} is offline", self.name)));
        }
        if !self.collections.contains(collection) {
            return Err(Error::UnknownCollection(collection.to_string()));
        }
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Collections>> {
        self.data
            .lock()
            .map_err(|_| Error::Database(format!("{} state lock poisoned", self.name)))
    }

    fn lookup(data: &Collections, collection: &str, id: &RecordId) -> Existing {
        match data.get(collection).and_then(|records| records.get(id)) {
            None => Existing::Absent,
            Some(Slot::Readable(record)) => Existing::Present(record.clone()),
            Some(Slot::Corrupt) => Existing::Unreadable,
        }
    }

    fn commit(
        &self,
        collection: &str,
        record: &Record,
        guard: WriteGuard<'_>,
    ) -> Result<WriteOutcome> {
        let mut data = self.lock()?;
        let existing = Self::lookup(&data, collection, &record.id);
        if !guard(&existing) {
            return Ok(WriteOutcome::Skipped);
        }
        data.entry(collection.to_string())
            .or_default()
            .insert(record.id, Slot::Readable(record.clone()));
        drop(data);

        self.applied_writes.fetch_add(1, Ordering::SeqCst);
        let (insertions, modifications) = if matches!(existing, Existing::Absent) {
            (vec![record.id], Vec::new())
        } else {
            (Vec::new(), vec![record.id])
        };
        self.notifier.notify(ChangeSet {
            collection: collection.to_string(),
            insertions,
            modifications,
        });
        Ok(WriteOutcome::Applied)
    }

    async fn guarded_commit(
        &self,
        collection: &str,
        record: &Record,
        guard: WriteGuard<'_>,
    ) -> Result<WriteOutcome> {
        let running = self.faults.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.faults.max_in_flight.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.faults.write_delay() {
            tokio::time::sleep(delay).await;
        }
        let outcome = match self.faults.fail_after() {
            Some(limit) if self.applied_writes() >= limit => {
                Err(Error::Unavailable(format!("{} went offline", self.name)))
            }
            _ => self.commit(collection, record, guard),
        };
        self.faults.in_flight.fetch_sub(1, Ordering::SeqCst);
        outcome
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }

    async fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        self.ensure_ready(collection)?;
        let data = self.lock()?;
        let records = data
            .get(collection)
            .into_iter()
            .flat_map(BTreeMap::values)
            .filter_map(|slot| match slot {
                Slot::Readable(record) => Some(record),
                Slot::Corrupt => None,
            })
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        Ok(records)
    }

    async fn object_for_id(&self, collection: &str, id: &RecordId) -> Result<Existing> {
        self.ensure_ready(collection)?;
        let data = self.lock()?;
        Ok(Self::lookup(&data, collection, id))
    }

    async fn write(
        &self,
        collection: &str,
        record: &Record,
        guard: WriteGuard<'_>,
    ) -> Result<WriteOutcome> {
        self.ensure_ready(collection)?;
        self.guarded_commit(collection, record, guard).await
    }

    fn subscribe(&self, collection: &str) -> Result<ChangeFeed> {
        if !self.collections.contains(collection) {
            return Err(Error::UnknownCollection(collection.to_string()));
        }
        Ok(self.notifier.subscribe(collection))
    }
}

#[cfg(test)]
impl MemoryStore {
    /// Seed a record without notifying subscribers
    pub(crate) fn seed(&self, collection: &str, record: Record) {
        self.data
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .insert(record.id, Slot::Readable(record));
    }

    /// Current record, panicking if missing or unreadable
    pub(crate) fn get(&self, collection: &str, id: &RecordId) -> Record {
        let data = self.data.lock().unwrap();
        match Self::lookup(&data, collection, id) {
            Existing::Present(record) => record,
            other => panic!("expected readable record, found {other:?}"),
        }
    }
}
