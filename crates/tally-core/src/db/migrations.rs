//! Database migrations
//!
//! Every step runs inside its own transaction and stamps its version before
//! committing, so a failed step leaves the store at the previous version.

use libsql::Connection;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::Flow;

/// Current schema version
pub(crate) const CURRENT_VERSION: i32 = 3;

const LEGACY_CHECKPOINT_PREFIX: &str = "checkpoint.";

/// Run all pending migrations
pub async fn run(conn: &Connection) -> Result<()> {
    let version = current_version(conn).await?;

    if version > CURRENT_VERSION {
        return Err(Error::Migration {
            version,
            message: format!("store schema is newer than this build (up to {CURRENT_VERSION})"),
        });
    }
    if version == 0 && !table_exists(conn, "records").await? {
        return create_latest(conn).await;
    }

    migrate_from(conn, version, CURRENT_VERSION).await
}

/// Get the current schema version
pub(crate) async fn current_version(conn: &Connection) -> Result<i32> {
    if !table_exists(conn, "schema_version").await? {
        return Ok(0);
    }

    let mut rows = conn
        .query("SELECT COALESCE(MAX(version), 0) FROM schema_version", ())
        .await?;

    let version: i32 = if let Some(row) = rows.next().await? {
        row.get(0)?
    } else {
        0
    };

    Ok(version)
}

async fn table_exists(conn: &Connection, name: &str) -> Result<bool> {
    let mut rows = conn
        .query(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?)",
            [name],
        )
        .await?;

    Ok(match rows.next().await? {
        Some(row) => row.get::<i32>(0)? != 0,
        None => false,
    })
}

/// Apply every step after `from` up to and including `to`
async fn migrate_from(conn: &Connection, from: i32, to: i32) -> Result<()> {
    for version in (from + 1)..=to {
        apply(conn, version).await.map_err(|error| match error {
            Error::Migration { .. } => error,
            other => Error::Migration {
                version,
                message: other.to_string(),
            },
        })?;
        tracing::info!("Migrated database to version {version}");
    }
    Ok(())
}

async fn apply(conn: &Connection, version: i32) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let outcome = match version {
        1 => migrate_v1(conn).await,
        2 => migrate_v2(conn).await,
        3 => migrate_v3(conn).await,
        other => Err(Error::Database(format!(
            "no migration registered for version {other}"
        ))),
    };
    let outcome = match outcome {
        Ok(()) => stamp(conn, version).await,
        Err(error) => Err(error),
    };

    if let Err(error) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(error);
    }
    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }
    Ok(())
}

async fn stamp(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?)",
        libsql::params![version],
    )
    .await?;
    Ok(())
}

async fn execute_all(conn: &Connection, statements: &[&str]) -> Result<()> {
    for stmt in statements {
        conn.execute(stmt, ()).await?;
    }
    Ok(())
}

/// Fresh install: create the latest schema directly and stamp every version
async fn create_latest(conn: &Connection) -> Result<()> {
    conn.execute("BEGIN TRANSACTION", ()).await?;

    let mut outcome = execute_all(
        conn,
        &[
            "CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                partition TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                data TEXT NOT NULL,
                is_deleted INTEGER NOT NULL DEFAULT 0,
                PRIMARY KEY (collection, id)
            )",
            "CREATE TABLE settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            "CREATE INDEX idx_records_partition ON records(collection, partition, updated_at)",
            "CREATE INDEX idx_records_deleted ON records(is_deleted)",
            "CREATE TABLE sync_checkpoints (
                collection TEXT NOT NULL,
                flow TEXT NOT NULL,
                partition TEXT NOT NULL,
                last_synced_at INTEGER NOT NULL,
                cursor TEXT,
                PRIMARY KEY (collection, flow)
            )",
        ],
    )
    .await;
    for version in 1..=CURRENT_VERSION {
        if outcome.is_err() {
            break;
        }
        outcome = stamp(conn, version).await;
    }

    if let Err(error) = outcome {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(Error::Migration {
            version: CURRENT_VERSION,
            message: error.to_string(),
        });
    }
    if let Err(e) = conn.execute("COMMIT", ()).await {
        conn.execute("ROLLBACK", ()).await.ok();
        return Err(e.into());
    }

    tracing::info!("Created database at version {CURRENT_VERSION}");
    Ok(())
}

/// Migration to version 1: records keyed by collection, tombstone kept in the
/// payload as `_deleted`
async fn migrate_v1(conn: &Connection) -> Result<()> {
    execute_all(
        conn,
        &[
            "CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY
            )",
            "CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                partition TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL,
                data TEXT NOT NULL,
                PRIMARY KEY (collection, id)
            )",
            "CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
        ],
    )
    .await
}

/// Migration to version 2: tombstone becomes a column
async fn migrate_v2(conn: &Connection) -> Result<()> {
    execute_all(
        conn,
        &[
            "ALTER TABLE records ADD COLUMN is_deleted INTEGER NOT NULL DEFAULT 0",
            "UPDATE records SET is_deleted = 1 WHERE json_extract(data, '$._deleted') = 1",
            "UPDATE records SET data = json_remove(data, '$._deleted')
             WHERE json_type(data, '$._deleted') IS NOT NULL",
            "CREATE INDEX IF NOT EXISTS idx_records_partition ON records(collection, partition, updated_at)",
            "CREATE INDEX IF NOT EXISTS idx_records_deleted ON records(is_deleted)",
        ],
    )
    .await
}

/// Legacy checkpoint payload stored under `checkpoint.<flow>.<collection>`
#[derive(Debug, Deserialize)]
struct LegacyCheckpoint {
    partition: String,
    last_synced_at: i64,
}

/// Migration to version 3: checkpoints move out of settings into their own table
async fn migrate_v3(conn: &Connection) -> Result<()> {
    execute_all(
        conn,
        &["CREATE TABLE IF NOT EXISTS sync_checkpoints (
            collection TEXT NOT NULL,
            flow TEXT NOT NULL,
            partition TEXT NOT NULL,
            last_synced_at INTEGER NOT NULL,
            cursor TEXT,
            PRIMARY KEY (collection, flow)
        )"],
    )
    .await?;

    let mut legacy = Vec::new();
    let mut rows = conn
        .query(
            "SELECT key, value FROM settings WHERE key LIKE 'checkpoint.%' ORDER BY key",
            (),
        )
        .await?;
    while let Some(row) = rows.next().await? {
        legacy.push((row.get::<String>(0)?, row.get::<String>(1)?));
    }
    drop(rows);

    for (key, value) in &legacy {
        let (flow, collection) = key
            .strip_prefix(LEGACY_CHECKPOINT_PREFIX)
            .and_then(|rest| rest.split_once('.'))
            .ok_or_else(|| Error::InvalidInput(format!("malformed checkpoint key '{key}'")))?;
        let flow: Flow = flow.parse().map_err(Error::InvalidInput)?;
        let checkpoint: LegacyCheckpoint = serde_json::from_str(value)?;

        conn.execute(
            "INSERT OR REPLACE INTO sync_checkpoints
                (collection, flow, partition, last_synced_at, cursor)
             VALUES (?, ?, ?, ?, NULL)",
            libsql::params![
                collection,
                flow.as_str(),
                checkpoint.partition,
                checkpoint.last_synced_at
            ],
        )
        .await?;
    }

    conn.execute("DELETE FROM settings WHERE key LIKE 'checkpoint.%'", ())
        .await?;
    if !legacy.is_empty() {
        tracing::debug!("Moved {} legacy checkpoint(s) out of settings", legacy.len());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::Database;
    use pretty_assertions::assert_eq;
    use serde_json::Value;

    async fn setup() -> Database {
        Database::open_in_memory_unmigrated().await.unwrap()
    }

    /// A store as an older build would have left it
    async fn setup_at(version: i32) -> Database {
        let db = setup().await;
        migrate_from(db.connection(), 0, version).await.unwrap();
        db
    }

    async fn strings(conn: &Connection, sql: &str) -> Vec<String> {
        let mut rows = conn.query(sql, ()).await.unwrap();
        let mut out = Vec::new();
        while let Some(row) = rows.next().await.unwrap() {
            let mut fields = Vec::new();
            for index in 0..row.column_count() {
                fields.push(format!("{:?}", row.get_value(index).unwrap()));
            }
            out.push(fields.join("|"));
        }
        out
    }

    /// Structure and content, with payloads compared as JSON values
    async fn snapshot(conn: &Connection) -> (Vec<String>, Vec<(String, Value)>, Vec<String>) {
        let mut structure = Vec::new();
        for table in ["records", "settings", "sync_checkpoints", "schema_version"] {
            structure.extend(strings(conn, &format!("PRAGMA table_info({table})")).await);
        }
        structure.extend(
            strings(
                conn,
                "SELECT name, tbl_name FROM sqlite_master WHERE type = 'index'
                 AND name NOT LIKE 'sqlite_autoindex%' ORDER BY name",
            )
            .await,
        );

        let mut records = Vec::new();
        let mut rows = conn
            .query(
                "SELECT collection, id, partition, created_at, updated_at, is_deleted, data
                 FROM records ORDER BY collection, id",
                (),
            )
            .await
            .unwrap();
        while let Some(row) = rows.next().await.unwrap() {
            let key = format!(
                "{}/{}/{}/{}/{}/{}",
                row.get::<String>(0).unwrap(),
                row.get::<String>(1).unwrap(),
                row.get::<String>(2).unwrap(),
                row.get::<i64>(3).unwrap(),
                row.get::<i64>(4).unwrap(),
                row.get::<i32>(5).unwrap(),
            );
            let data: Value = serde_json::from_str(&row.get::<String>(6).unwrap()).unwrap();
            records.push((key, data));
        }

        let mut rest = strings(conn, "SELECT * FROM sync_checkpoints ORDER BY collection, flow").await;
        rest.extend(strings(conn, "SELECT * FROM settings ORDER BY key").await);
        rest.extend(strings(conn, "SELECT version FROM schema_version ORDER BY version").await);
        (structure, records, rest)
    }

    async fn insert_v1(conn: &Connection, id: &str, updated_at: i64, data: &str) {
        conn.execute(
            "INSERT INTO records (collection, id, partition, created_at, updated_at, data)
             VALUES ('customers', ?, 'biz-42', 1, ?, ?)",
            libsql::params![id, updated_at, data],
        )
        .await
        .unwrap();
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations() {
        let db = setup().await;
        run(db.connection()).await.unwrap();

        let version = current_version(db.connection()).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_migrations_idempotent() {
        let db = setup().await;
        run(db.connection()).await.unwrap();
        run(db.connection()).await.unwrap();

        let version = current_version(db.connection()).await.unwrap();
        assert_eq!(version, CURRENT_VERSION);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_v1_store_matches_fresh_store() {
        let migrated = setup_at(1).await;
        let conn = migrated.connection();
        insert_v1(conn, "a", 10, r#"{"_deleted":true,"name":"Acme"}"#).await;
        insert_v1(conn, "b", 12, r#"{"name":"Globex","phone":"555"}"#).await;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES
                ('checkpoint.remote_to_local.customers', '{\"partition\":\"biz-42\",\"last_synced_at\":12}'),
                ('theme', 'dark')",
            (),
        )
        .await
        .unwrap();
        run(conn).await.unwrap();

        let fresh = setup().await;
        let conn = fresh.connection();
        run(conn).await.unwrap();
        conn.execute(
            "INSERT INTO records (collection, id, partition, created_at, updated_at, data, is_deleted)
             VALUES ('customers', 'a', 'biz-42', 1, 10, '{\"name\":\"Acme\"}', 1),
                    ('customers', 'b', 'biz-42', 1, 12, '{\"name\":\"Globex\",\"phone\":\"555\"}', 0)",
            (),
        )
        .await
        .unwrap();
        conn.execute(
            "INSERT INTO sync_checkpoints (collection, flow, partition, last_synced_at, cursor)
             VALUES ('customers', 'remote_to_local', 'biz-42', 12, NULL)",
            (),
        )
        .await
        .unwrap();
        conn.execute("INSERT INTO settings (key, value) VALUES ('theme', 'dark')", ())
            .await
            .unwrap();

        assert_eq!(
            snapshot(migrated.connection()).await,
            snapshot(fresh.connection()).await
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_v2_store_matches_fresh_store() {
        let migrated = setup_at(2).await;
        let fresh = setup().await;
        run(fresh.connection()).await.unwrap();

        for db in [&migrated, &fresh] {
            db.connection()
                .execute(
                    "INSERT INTO records (collection, id, partition, created_at, updated_at, data, is_deleted)
                     VALUES ('receipts', 'r1', 'biz-42', 5, 6, '{\"lines\":[]}', 0)",
                    (),
                )
                .await
                .unwrap();
        }
        run(migrated.connection()).await.unwrap();

        assert_eq!(
            snapshot(migrated.connection()).await,
            snapshot(fresh.connection()).await
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failed_step_rolls_back_and_reports_version() {
        let db = setup_at(2).await;
        db.connection()
            .execute(
                "INSERT INTO settings (key, value) VALUES ('checkpoint.sideways.customers', '{}')",
                (),
            )
            .await
            .unwrap();

        let error = run(db.connection()).await.unwrap_err();
        assert!(matches!(error, Error::Migration { version: 3, .. }));
        assert_eq!(current_version(db.connection()).await.unwrap(), 2);
        assert!(!table_exists(db.connection(), "sync_checkpoints").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_newer_store_is_rejected() {
        let db = setup().await;
        run(db.connection()).await.unwrap();
        stamp(db.connection(), CURRENT_VERSION + 1).await.unwrap();

        let error = run(db.connection()).await.unwrap_err();
        assert!(matches!(error, Error::Migration { version, .. } if version == CURRENT_VERSION + 1));
    }
}
