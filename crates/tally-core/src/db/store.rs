//! libSQL-backed object store

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Connection, Row, Value};
use serde_json::Map;
use tokio::sync::Mutex;

use super::checkpoint_repository::LibSqlCheckpointStore;
use super::connection::{Database, SyncConfig};
use crate::collections::CollectionRegistry;
use crate::error::{Error, Result};
use crate::models::{Record, RecordId};
use crate::store::{
    ChangeFeed, ChangeNotifier, ChangeSet, Existing, RecordFilter, Store, WriteGuard, WriteOutcome,
};

const RECORD_COLUMNS: &str = "id, partition, created_at, updated_at, is_deleted, data";

/// Records of every collection in one `records` table.
///
/// All statements go through one connection behind an async mutex, so at most
/// one transaction runs at a time. Change sets are published for this store's
/// own commits and, for embedded replicas, for rows pulled by [`Store::refresh`].
pub struct LibSqlStore {
    name: String,
    collections: CollectionRegistry,
    db: Arc<Mutex<Database>>,
    replica: bool,
    notifier: ChangeNotifier,
    /// Highest `updated_at` this store has announced
    high_water: AtomicI64,
}

impl LibSqlStore {
    /// Open a local-only store at `path`
    pub async fn open(path: impl AsRef<Path>, collections: CollectionRegistry) -> Result<Self> {
        let db = Database::open(path).await?;
        Self::from_database("local", db, collections).await
    }

    /// Open an in-memory store (useful for testing)
    pub async fn open_in_memory(collections: CollectionRegistry) -> Result<Self> {
        let db = Database::open_in_memory().await?;
        Self::from_database("memory", db, collections).await
    }

    /// Open an embedded replica of a Turso database
    pub async fn open_with_sync(
        path: impl AsRef<Path>,
        sync_config: SyncConfig,
        collections: CollectionRegistry,
    ) -> Result<Self> {
        let db = Database::open_with_sync(path, sync_config).await?;
        Self::from_database("remote", db, collections).await
    }

    /// Wrap an already migrated database
    pub async fn from_database(
        name: impl Into<String>,
        db: Database,
        collections: CollectionRegistry,
    ) -> Result<Self> {
        let high_water = max_updated_at(db.connection()).await?;
        Ok(Self {
            name: name.into(),
            collections,
            replica: db.is_sync_enabled(),
            db: Arc::new(Mutex::new(db)),
            notifier: ChangeNotifier::new(),
            high_water: AtomicI64::new(high_water),
        })
    }

    /// Rename the store (used in logs)
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Checkpoint store sharing this store's connection
    pub fn checkpoints(&self) -> LibSqlCheckpointStore {
        LibSqlCheckpointStore::new(Arc::clone(&self.db))
    }

    pub async fn schema_version(&self) -> Result<i32> {
        self.db.lock().await.schema_version().await
    }

    fn ensure_collection(&self, collection: &str) -> Result<()> {
        if self.collections.contains(collection) {
            Ok(())
        } else {
            Err(Error::UnknownCollection(collection.to_string()))
        }
    }

    /// Failures talking to a replica's primary are treated as transient
    fn classify(&self, error: Error) -> Error {
        match error {
            Error::LibSql(error) if self.replica => Error::Unavailable(error.to_string()),
            other => other,
        }
    }

    async fn guarded_upsert(
        &self,
        collection: &str,
        record: &Record,
        guard: WriteGuard<'_>,
    ) -> Result<(Existing, WriteOutcome)> {
        let db = self.db.lock().await;
        let tx = db.connection().transaction().await?;

        let existing = read_existing(&tx, collection, &record.id).await?;
        if !guard(&existing) {
            tx.rollback().await?;
            return Ok((existing, WriteOutcome::Skipped));
        }

        let data = serde_json::to_string(&record.data)?;
        tx.execute(
            "INSERT INTO records
                (collection, id, partition, created_at, updated_at, data, is_deleted)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             ON CONFLICT(collection, id) DO UPDATE SET
                partition = excluded.partition,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at,
                data = excluded.data,
                is_deleted = excluded.is_deleted",
            libsql::params![
                collection,
                record.id.as_str(),
                record.partition.as_str(),
                record.created_at,
                record.updated_at,
                data,
                i32::from(record.is_deleted)
            ],
        )
        .await?;
        tx.commit().await?;
        Ok((existing, WriteOutcome::Applied))
    }

    /// Announce rows newer than anything announced before
    async fn announce_pulled(&self) -> Result<()> {
        let since = self.high_water.load(Ordering::SeqCst);
        let mut changed: BTreeMap<String, Vec<RecordId>> = BTreeMap::new();
        let mut newest = since;
        {
            let db = self.db.lock().await;
            let mut rows = db
                .connection()
                .query(
                    "SELECT collection, id, updated_at FROM records WHERE updated_at > ?
                     ORDER BY updated_at",
                    libsql::params![since],
                )
                .await?;
            while let Some(row) = rows.next().await? {
                let collection: String = row.get(0)?;
                let id: String = row.get(1)?;
                newest = newest.max(row.get::<i64>(2)?);
                match id.parse() {
                    Ok(id) => changed.entry(collection).or_default().push(id),
                    Err(_) => tracing::warn!("Ignoring pulled row with invalid id '{}'", id),
                }
            }
        }

        self.high_water.fetch_max(newest, Ordering::SeqCst);
        for (collection, modifications) in changed {
            if self.collections.contains(&collection) {
                tracing::debug!(
                    "{} pulled {} {} change(s)",
                    self.name,
                    modifications.len(),
                    collection
                );
                self.notifier.notify(ChangeSet {
                    collection,
                    insertions: Vec::new(),
                    modifications,
                });
            }
        }
        Ok(())
    }
}

async fn max_updated_at(conn: &Connection) -> Result<i64> {
    let mut rows = conn
        .query("SELECT COALESCE(MAX(updated_at), 0) FROM records", ())
        .await?;
    Ok(match rows.next().await? {
        Some(row) => row.get(0)?,
        None => 0,
    })
}

async fn read_existing(conn: &Connection, collection: &str, id: &RecordId) -> Result<Existing> {
    let mut rows = conn
        .query(
            &format!("SELECT {RECORD_COLUMNS} FROM records WHERE collection = ? AND id = ?"),
            libsql::params![collection, id.as_str()],
        )
        .await?;
    let Some(row) = rows.next().await? else {
        return Ok(Existing::Absent);
    };
    Ok(match decode(&row) {
        Ok(record) => Existing::Present(record),
        Err(error) => {
            tracing::warn!("Row {}/{} is unreadable: {}", collection, id, error);
            Existing::Unreadable
        }
    })
}

fn decode(row: &Row) -> Result<Record> {
    let id: String = row.get(0)?;
    let data: String = row.get(5)?;
    Ok(Record {
        id: id
            .parse()
            .map_err(|_| Error::InvalidInput(format!("invalid record id '{id}'")))?,
        partition: row.get(1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
        is_deleted: row.get::<i32>(4)? != 0,
        data: serde_json::from_str::<Map<_, _>>(&data)?,
    })
}

#[async_trait]
impl Store for LibSqlStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn has_collection(&self, collection: &str) -> bool {
        self.collections.contains(collection)
    }

    async fn query(&self, collection: &str, filter: &RecordFilter) -> Result<Vec<Record>> {
        self.ensure_collection(collection)?;

        let mut sql = format!("SELECT {RECORD_COLUMNS} FROM records WHERE collection = ?");
        let mut params = vec![Value::Text(collection.to_string())];
        if let Some(partition) = &filter.partition {
            sql.push_str(" AND partition = ?");
            params.push(Value::Text(partition.clone()));
        }
        if let Some(since) = filter.updated_since {
            sql.push_str(" AND updated_at >= ?");
            params.push(Value::Integer(since));
        }
        if filter.live_only {
            sql.push_str(" AND is_deleted = 0");
        }
        sql.push_str(" ORDER BY updated_at, id");

        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(&sql, params)
            .await
            .map_err(|error| self.classify(error.into()))?;

        let mut records = Vec::new();
        while let Some(row) = rows.next().await? {
            match decode(&row) {
                Ok(record) => records.push(record),
                Err(error) => tracing::warn!("Skipping unreadable {} row: {}", collection, error),
            }
        }
        Ok(records)
    }

    async fn object_for_id(&self, collection: &str, id: &RecordId) -> Result<Existing> {
        self.ensure_collection(collection)?;
        let db = self.db.lock().await;
        read_existing(db.connection(), collection, id)
            .await
            .map_err(|error| self.classify(error))
    }

    async fn write(
        &self,
        collection: &str,
        record: &Record,
        guard: WriteGuard<'_>,
    ) -> Result<WriteOutcome> {
        self.ensure_collection(collection)?;
        let (existing, outcome) = self
            .guarded_upsert(collection, record, guard)
            .await
            .map_err(|error| self.classify(error))?;

        if outcome == WriteOutcome::Applied {
            self.high_water.fetch_max(record.updated_at, Ordering::SeqCst);
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
        }
        Ok(outcome)
    }

    fn subscribe(&self, collection: &str) -> Result<ChangeFeed> {
        self.ensure_collection(collection)?;
        Ok(self.notifier.subscribe(collection))
    }

    async fn refresh(&self) -> Result<()> {
        if !self.replica {
            return Ok(());
        }
        self.db.lock().await.sync().await?;
        self.announce_pulled().await
    }
}
