//! Checkpoint repository implementation

use std::sync::Arc;

use async_trait::async_trait;
use libsql::{Row, Value};
use tokio::sync::Mutex;

use super::connection::Database;
use crate::error::{Error, Result};
use crate::models::{Flow, SyncCheckpoint};
use crate::sync::CheckpointStore;

/// libSQL implementation of [`CheckpointStore`], table `sync_checkpoints`
#[derive(Clone)]
pub struct LibSqlCheckpointStore {
    db: Arc<Mutex<Database>>,
}

impl LibSqlCheckpointStore {
    /// Create a checkpoint store over a shared database handle
    pub const fn new(db: Arc<Mutex<Database>>) -> Self {
        Self { db }
    }

    fn parse(row: &Row) -> Result<SyncCheckpoint> {
        let flow: String = row.get(1)?;
        let cursor = match row.get_value(4)? {
            Value::Text(cursor) => Some(cursor.parse().map_err(|_| {
                Error::InvalidInput(format!("invalid checkpoint cursor '{cursor}'"))
            })?),
            _ => None,
        };
        Ok(SyncCheckpoint {
            collection: row.get(0)?,
            flow: flow.parse().map_err(Error::InvalidInput)?,
            partition: row.get(2)?,
            last_synced_at: row.get(3)?,
            cursor,
        })
    }
}

#[async_trait]
impl CheckpointStore for LibSqlCheckpointStore {
    async fn get(&self, collection: &str, flow: Flow) -> Result<Option<SyncCheckpoint>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT collection, flow, partition, last_synced_at, cursor
                 FROM sync_checkpoints WHERE collection = ? AND flow = ?",
                [collection, flow.as_str()],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse(&row)?)),
            None => Ok(None),
        }
    }

    async fn put(&self, checkpoint: &SyncCheckpoint) -> Result<()> {
        let cursor = checkpoint
            .cursor
            .map_or(Value::Null, |cursor| Value::Text(cursor.as_str()));
        let db = self.db.lock().await;
        db.connection()
            .execute(
                "INSERT INTO sync_checkpoints (collection, flow, partition, last_synced_at, cursor)
                 VALUES (?, ?, ?, ?, ?)
                 ON CONFLICT(collection, flow) DO UPDATE SET
                    partition = excluded.partition,
                    last_synced_at = excluded.last_synced_at,
                    cursor = excluded.cursor",
                libsql::params![
                    checkpoint.collection.as_str(),
                    checkpoint.flow.as_str(),
                    checkpoint.partition.as_str(),
                    checkpoint.last_synced_at,
                    cursor
                ],
            )
            .await?;
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SyncCheckpoint>> {
        let db = self.db.lock().await;
        let mut rows = db
            .connection()
            .query(
                "SELECT collection, flow, partition, last_synced_at, cursor
                 FROM sync_checkpoints ORDER BY collection, flow",
                (),
            )
            .await?;

        let mut checkpoints = Vec::new();
        while let Some(row) = rows.next().await? {
            checkpoints.push(Self::parse(&row)?);
        }
        Ok(checkpoints)
    }

    async fn reset(&self, flow: Option<Flow>) -> Result<()> {
        let db = self.db.lock().await;
        match flow {
            Some(flow) => {
                db.connection()
                    .execute("DELETE FROM sync_checkpoints WHERE flow = ?", [flow.as_str()])
                    .await?
            }
            None => db.connection().execute("DELETE FROM sync_checkpoints", ()).await?,
        };
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RecordId;
    use pretty_assertions::assert_eq;

    async fn setup() -> LibSqlCheckpointStore {
        let db = Database::open_in_memory().await.unwrap();
        LibSqlCheckpointStore::new(Arc::new(Mutex::new(db)))
    }

    fn checkpoint(flow: Flow, at: i64, cursor: Option<RecordId>) -> SyncCheckpoint {
        SyncCheckpoint {
            collection: "receipts".to_string(),
            flow,
            partition: "biz-42".to_string(),
            last_synced_at: at,
            cursor,
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_put_and_get_round_trip_cursor() {
        let store = setup().await;
        assert!(store.get("receipts", Flow::LocalToRemote).await.unwrap().is_none());

        let saved = checkpoint(Flow::LocalToRemote, 42, Some(RecordId::new()));
        store.put(&saved).await.unwrap();
        assert_eq!(
            store.get("receipts", Flow::LocalToRemote).await.unwrap(),
            Some(saved)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_advance_never_moves_backwards() {
        let store = setup().await;
        assert!(store.advance(checkpoint(Flow::RemoteToLocal, 20, None)).await.unwrap());
        assert!(!store.advance(checkpoint(Flow::RemoteToLocal, 15, None)).await.unwrap());

        let stored = store.get("receipts", Flow::RemoteToLocal).await.unwrap().unwrap();
        assert_eq!(stored.last_synced_at, 20);
        assert_eq!(stored.cursor, None);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_reset_by_flow() {
        let store = setup().await;
        store.put(&checkpoint(Flow::RemoteToLocal, 1, None)).await.unwrap();
        store.put(&checkpoint(Flow::LocalToRemote, 2, None)).await.unwrap();

        store.reset(Some(Flow::RemoteToLocal)).await.unwrap();
        let remaining = store.list().await.unwrap();
        assert_eq!(remaining, vec![checkpoint(Flow::LocalToRemote, 2, None)]);

        store.reset(None).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
    }
}
