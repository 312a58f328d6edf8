use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Core(#[from] tally_core::Error),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("Record data must be a JSON object")]
    DataNotObject,
    #[error("Invalid record ID: {0}")]
    InvalidRecordId(String),
    #[error("Record not found: {0}")]
    RecordNotFound(String),
    #[error("Database initialization failed: {0}")]
    DatabaseInit(String),
    #[error("Bulk copy failed: {0}")]
    SyncFailed(String),
    #[error(
        "No remote ledger configured. Pass --remote-db, or set TURSO_DATABASE_URL and TURSO_AUTH_TOKEN."
    )]
    RemoteNotConfigured,
}
