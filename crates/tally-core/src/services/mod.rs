//! Client-facing services

mod ledger;

pub use ledger::LedgerService;
