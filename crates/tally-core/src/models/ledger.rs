//! Ledger entities: customers, products, receipts and credits

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::record::{Record, RecordId, RecordMeta};
use crate::error::{Error, Result};

/// A ledger entity that replicates as a [`Record`] in a fixed collection.
pub trait SyncedModel: Serialize + DeserializeOwned + Send + Sync {
    /// Collection this entity lives in
    const COLLECTION: &'static str;

    /// Synced fields
    fn meta(&self) -> &RecordMeta;

    /// Mutable synced fields
    fn meta_mut(&mut self) -> &mut RecordMeta;

    /// Convert to the engine's record representation
    fn to_record(&self) -> Result<Record> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(Record::from_parts(self.meta().clone(), fields)),
            other => Err(Error::InvalidInput(format!(
                "{} did not serialize to an object: {other}",
                Self::COLLECTION
            ))),
        }
    }

    /// Rebuild the entity from a record read out of a store
    fn from_record(record: &Record) -> Result<Self> {
        let mut fields = record.data.clone();
        if let Value::Object(meta) = serde_json::to_value(record.meta())? {
            fields.extend(meta);
        }
        Ok(serde_json::from_value(Value::Object(fields))?)
    }
}

/// A customer of the business
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

impl Customer {
    #[must_use]
    pub fn new(partition: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            meta: RecordMeta::new(partition),
            name: name.into(),
            phone: None,
            address: None,
        }
    }
}

/// An inventory item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    #[serde(default)]
    pub sku: Option<String>,
    /// Unit price in minor currency units
    pub price_cents: i64,
    #[serde(default)]
    pub stock: i64,
}

impl Product {
    #[must_use]
    pub fn new(partition: impl Into<String>, name: impl Into<String>, price_cents: i64) -> Self {
        Self {
            meta: RecordMeta::new(partition),
            name: name.into(),
            sku: None,
            price_cents,
            stock: 0,
        }
    }
}

/// One line on a receipt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReceiptLine {
    #[serde(default)]
    pub product_id: Option<RecordId>,
    pub description: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
}

impl ReceiptLine {
    #[must_use]
    pub const fn total_cents(&self) -> i64 {
        self.quantity.saturating_mul(self.unit_price_cents)
    }
}

/// A sale recorded against an optional customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    #[serde(flatten)]
    pub meta: RecordMeta,
    #[serde(default)]
    pub customer_id: Option<RecordId>,
    #[serde(default)]
    pub lines: Vec<ReceiptLine>,
    /// Time of sale (Unix ms)
    pub issued_at: i64,
}

impl Receipt {
    #[must_use]
    pub fn new(partition: impl Into<String>, lines: Vec<ReceiptLine>) -> Self {
        let meta = RecordMeta::new(partition);
        let issued_at = meta.created_at;
        Self {
            meta,
            customer_id: None,
            lines,
            issued_at,
        }
    }

    /// Sum of all line totals
    #[must_use]
    pub fn total_cents(&self) -> i64 {
        self.lines
            .iter()
            .map(ReceiptLine::total_cents)
            .fold(0, i64::saturating_add)
    }
}

/// Money owed by a customer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credit {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub customer_id: RecordId,
    pub amount_cents: i64,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub settled: bool,
}

impl Credit {
    #[must_use]
    pub fn new(partition: impl Into<String>, customer_id: RecordId, amount_cents: i64) -> Self {
        Self {
            meta: RecordMeta::new(partition),
            customer_id,
            amount_cents,
            note: None,
            settled: false,
        }
    }
}

macro_rules! synced_model {
    ($model:ty, $collection:literal) => {
        impl SyncedModel for $model {
            const COLLECTION: &'static str = $collection;

            fn meta(&self) -> &RecordMeta {
                &self.meta
            }

            fn meta_mut(&mut self) -> &mut RecordMeta {
                &mut self.meta
            }
        }
    };
}

synced_model!(Customer, "customers");
synced_model!(Product, "products");
synced_model!(Receipt, "receipts");
synced_model!(Credit, "credits");

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn customer_record_keeps_meta_out_of_payload() {
        let mut customer = Customer::new("biz-42", "Acme");
        customer.phone = Some("555-0100".to_string());

        let record = customer.to_record().unwrap();
        assert_eq!(record.id, customer.meta.id);
        assert_eq!(record.partition, "biz-42");
        assert!(!record.data.contains_key("id"));
        assert!(!record.data.contains_key("updated_at"));
        assert_eq!(record.data["name"], "Acme");

        let restored = Customer::from_record(&record).unwrap();
        assert_eq!(restored, customer);
    }

    #[test]
    fn tombstoned_record_restores_deleted_flag() {
        let credit = Credit::new("biz-42", RecordId::new(), 1_500);
        let mut record = credit.to_record().unwrap();
        record.tombstone();

        let restored = Credit::from_record(&record).unwrap();
        assert!(restored.meta.is_deleted);
        assert_eq!(restored.meta.updated_at, record.updated_at);
    }

    #[test]
    fn receipt_total_sums_lines() {
        let receipt = Receipt::new(
            "biz-42",
            vec![
                ReceiptLine {
                    product_id: None,
                    description: "Rice".to_string(),
                    quantity: 2,
                    unit_price_cents: 350,
                },
                ReceiptLine {
                    product_id: None,
                    description: "Oil".to_string(),
                    quantity: 1,
                    unit_price_cents: 900,
                },
            ],
        );
        assert_eq!(receipt.total_cents(), 1_600);
    }

    #[test]
    fn from_record_rejects_missing_required_fields() {
        let record = Record::new("biz-42", serde_json::Map::new());
        assert!(Product::from_record(&record).is_err());
    }
}
