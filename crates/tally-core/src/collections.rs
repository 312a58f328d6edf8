//! Registry of synced collections
//!
//! Collections are declared up front, in schema order. Bulk copy walks them in
//! that order and the stores only accept collections they were opened with.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::{Error, Result};
use crate::models::{Credit, Customer, Product, Receipt, SyncedModel};

static COLLECTION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9_]*$").expect("Invalid regex"));

/// Ordered set of collection names taking part in replication
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionRegistry {
    names: Vec<String>,
}

impl CollectionRegistry {
    /// An empty registry
    #[must_use]
    pub const fn new() -> Self {
        Self { names: Vec::new() }
    }

    /// The ledger's collections in schema order
    #[must_use]
    pub fn ledger() -> Self {
        Self {
            names: vec![
                Customer::COLLECTION.to_string(),
                Product::COLLECTION.to_string(),
                Receipt::COLLECTION.to_string(),
                Credit::COLLECTION.to_string(),
            ],
        }
    }

    /// Register the collection backing model `M`
    pub fn register<M: SyncedModel>(self) -> Result<Self> {
        self.with_collection(M::COLLECTION)
    }

    /// Register a collection by name, appending it to the schema order
    pub fn with_collection(mut self, name: &str) -> Result<Self> {
        if !COLLECTION_NAME.is_match(name) {
            return Err(Error::InvalidInput(format!(
                "invalid collection name '{name}'"
            )));
        }
        if self.contains(name) {
            return Err(Error::InvalidInput(format!(
                "collection '{name}' is already registered"
            )));
        }
        self.names.push(name.to_string());
        Ok(self)
    }

    /// Whether `name` is registered
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|registered| registered == name)
    }

    /// Collection names in schema order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
