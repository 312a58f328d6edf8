//! Error types for tally-core

use thiserror::Error;

/// Result type alias using tally-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in tally-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// Database error
    #[error("Database error: {0}")]
    Database(String),

    /// libSQL error
    #[error("libSQL error: {0}")]
    LibSql(#[from] libsql::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found
    #[error("Record not found: {0}")]
    NotFound(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The store does not know the requested collection
    #[error("Unknown collection: {0}")]
    UnknownCollection(String),

    /// The store is temporarily unreachable (offline, signed out, closed)
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A schema migration failed; the store must not be used
    #[error("Migration to schema version {version} failed: {message}")]
    Migration {
        /// Version whose transform failed
        version: i32,
        /// Underlying failure
        message: String,
    },
}

impl Error {
    /// Whether the failure is expected to clear up on its own (retry on a later tick).
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}
