//! Database connection management

use crate::error::{Error, Result};
use libsql::{Builder, Connection, Database as LibSqlDatabase};
use std::path::Path;
use std::time::Duration;

use super::migrations;

/// Configuration for a Turso embedded replica
#[derive(Debug, Clone, Default)]
pub struct SyncConfig {
    /// Remote database URL (e.g., `libsql://your-db.turso.io`)
    pub url: Option<String>,
    /// Authentication token for remote database
    pub auth_token: Option<String>,
    /// Automatic replica sync interval (default: 60 seconds)
    pub sync_interval: Option<Duration>,
}

impl SyncConfig {
    /// Create a new sync configuration
    pub fn new(url: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            auth_token: Some(auth_token.into()),
            sync_interval: Some(Duration::from_secs(60)),
        }
    }

    /// Set the automatic sync interval
    #[must_use]
    pub const fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = Some(interval);
        self
    }

    /// Disable automatic sync; the replica only pulls on [`Database::sync`]
    #[must_use]
    pub const fn without_auto_sync(mut self) -> Self {
        self.sync_interval = None;
        self
    }

    /// Check if sync is configured
    pub const fn is_configured(&self) -> bool {
        self.url.is_some() && self.auth_token.is_some()
    }

    fn credentials(&self) -> Result<(String, String)> {
        match (&self.url, &self.auth_token) {
            (Some(url), Some(token)) => Ok((url.clone(), token.clone())),
            (None, _) => Err(Error::InvalidInput("Sync URL is required".into())),
            (_, None) => Err(Error::InvalidInput("Auth token is required".into())),
        }
    }
}

/// libSQL database with its single connection, migrated on open
pub struct Database {
    db: LibSqlDatabase,
    conn: Connection,
    sync_config: Option<SyncConfig>,
}

/// Tuning applied to every connection; replicas reject some of these.
const PRAGMAS: [&str; 4] = [
    "PRAGMA journal_mode = WAL;",
    "PRAGMA synchronous = NORMAL;",
    "PRAGMA cache_size = 10000;",
    "PRAGMA busy_timeout = 5000;",
];

impl Database {
    /// Open a local-only database at the given path, creating it if it doesn't exist
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path_str = path.as_ref().to_string_lossy().to_string();
        let database = Self::connect(Builder::new_local(&path_str).build().await?, None).await?;
        database.migrate().await?;
        Ok(database)
    }

    /// Open an in-memory database (useful for testing)
    pub async fn open_in_memory() -> Result<Self> {
        let database = Self::open_in_memory_unmigrated().await?;
        database.migrate().await?;
        Ok(database)
    }

    /// In-memory database without any schema
    pub(crate) async fn open_in_memory_unmigrated() -> Result<Self> {
        Self::connect(Builder::new_local(":memory:").build().await?, None).await
    }

    /// Open an embedded replica of a remote Turso database
    ///
    /// Reads are served from the local file; writes are forwarded to the
    /// primary and become visible locally after the next sync.
    pub async fn open_with_sync(
        local_path: impl AsRef<Path>,
        sync_config: SyncConfig,
    ) -> Result<Self> {
        let path_str = local_path.as_ref().to_string_lossy().to_string();
        let (url, token) = sync_config.credentials()?;

        let mut builder = Builder::new_remote_replica(&path_str, url, token);
        if let Some(interval) = sync_config.sync_interval {
            builder = builder.sync_interval(interval);
            tracing::debug!("Automatic replica sync every {:?}", interval);
        }

        let database = Self::connect(builder.build().await?, Some(sync_config)).await?;

        // Pull the remote schema first so migrations see its real version
        database.sync().await?;
        database.migrate().await?;
        Ok(database)
    }

    async fn connect(db: LibSqlDatabase, sync_config: Option<SyncConfig>) -> Result<Self> {
        let conn = db.connect()?;
        for pragma in PRAGMAS {
            if let Err(error) = conn.execute(pragma, ()).await {
                tracing::debug!("Ignoring '{pragma}': {error}");
            }
        }
        Ok(Self {
            db,
            conn,
            sync_config,
        })
    }

    async fn migrate(&self) -> Result<()> {
        migrations::run(&self.conn).await
    }

    /// Pull changes from the primary (embedded replicas only)
    pub async fn sync(&self) -> Result<()> {
        if self.sync_config.is_some() {
            self.db
                .sync()
                .await
                .map_err(|error| Error::Unavailable(error.to_string()))?;
            tracing::debug!("Database synced with remote");
        }
        Ok(())
    }

    /// Check if this is an embedded replica
    pub const fn is_sync_enabled(&self) -> bool {
        self.sync_config.is_some()
    }

    /// Schema version stamped in the database
    pub async fn schema_version(&self) -> Result<i32> {
        migrations::current_version(&self.conn).await
    }

    /// Get a reference to the underlying connection
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }
}
