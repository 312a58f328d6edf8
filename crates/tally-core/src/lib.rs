//! tally-core - Core library for Tally
//!
//! Shared models, storage layer and the replication engine that keeps a
//! device's local ledger and the remote ledger of one business partition in
//! sync. Used by every Tally client (CLI, mobile, desktop).

pub mod collections;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod store;
pub mod sync;
mod util;

pub use error::{Error, Result};
pub use models::{Record, RecordId};
