//! Database layer for Tally

mod checkpoint_repository;
mod connection;
mod migrations;
mod store;

pub use checkpoint_repository::LibSqlCheckpointStore;
pub use connection::{Database, SyncConfig};
pub use store::LibSqlStore;
