//! Data models for Tally

mod checkpoint;
mod ledger;
mod record;

pub use checkpoint::{Flow, SyncCheckpoint, SyncDirection};
pub use ledger::{Credit, Customer, Product, Receipt, ReceiptLine, SyncedModel};
pub use record::{Record, RecordId, RecordMeta, META_FIELDS};
