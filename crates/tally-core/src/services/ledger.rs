//! Ledger operations used by UI and CLI clients.
//!
//! Every mutation is an upsert through the store's guarded write; deleting a
//! record only sets its tombstone. There is no physical delete.

use std::sync::Arc;

use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::models::{Record, RecordId, SyncedModel};
use crate::store::{Existing, RecordFilter, Store, WriteOutcome};
use crate::sync::conflict;
use crate::util::normalize_text_option;

/// Thread-safe service for ledger reads and writes against one store.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    /// The underlying store
    pub const fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// Create or update a record, stamping a fresh `updated_at`.
    ///
    /// The new timestamp is always later than the stored one, so a local edit
    /// wins over whatever the store held when the edit was made.
    pub async fn save_record(&self, collection: &str, mut record: Record) -> Result<Record> {
        record.partition = normalize_text_option(Some(record.partition))
            .ok_or_else(|| Error::InvalidInput("partition cannot be empty".to_string()))?;

        match self.store.object_for_id(collection, &record.id).await? {
            Existing::Present(current) => {
                if current.partition != record.partition {
                    return Err(Error::InvalidInput(format!(
                        "{collection}/{} belongs to partition '{}'",
                        record.id, current.partition
                    )));
                }
                record.created_at = current.created_at;
                record.updated_at = record.updated_at.max(current.updated_at);
            }
            Existing::Unreadable => {
                return Err(Error::Database(format!(
                    "{collection}/{} is unreadable",
                    record.id
                )));
            }
            Existing::Absent => {}
        }
        record.touch();

        let guard = |existing: &Existing| conflict::should_apply(&record, existing);
        match self.store.write(collection, &record, &guard).await? {
            WriteOutcome::Applied => Ok(record),
            WriteOutcome::Skipped => Err(Error::Database(format!(
                "{collection}/{} was changed concurrently",
                record.id
            ))),
        }
    }

    /// Create a new record from raw entity fields
    pub async fn create_record(
        &self,
        collection: &str,
        partition: &str,
        data: Map<String, Value>,
    ) -> Result<Record> {
        self.save_record(collection, Record::new(partition, data))
            .await
    }

    /// Fetch a record by id, tombstones included
    pub async fn get_record(&self, collection: &str, id: &RecordId) -> Result<Option<Record>> {
        Ok(self
            .store
            .object_for_id(collection, id)
            .await?
            .record()
            .cloned())
    }

    /// Records of a partition, newest first
    pub async fn list_records(
        &self,
        collection: &str,
        partition: &str,
        include_deleted: bool,
    ) -> Result<Vec<Record>> {
        let mut filter = RecordFilter::all().in_partition(partition.trim());
        if !include_deleted {
            filter = filter.live_only();
        }
        let mut records = self.store.query(collection, &filter).await?;
        records.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    /// Soft-delete a record. The tombstone replicates like any other update.
    pub async fn delete_record(&self, collection: &str, id: &RecordId) -> Result<Record> {
        let mut record = self
            .get_record(collection, id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("{collection}/{id}")))?;
        if record.is_deleted {
            return Ok(record);
        }
        record.is_deleted = true;
        self.save_record(collection, record).await
    }

    /// Save a ledger entity, updating its synced fields in place
    pub async fn save<M: SyncedModel>(&self, model: &mut M) -> Result<()> {
        let saved = self.save_record(M::COLLECTION, model.to_record()?).await?;
        *model.meta_mut() = saved.meta();
        Ok(())
    }

    pub async fn get<M: SyncedModel>(&self, id: &RecordId) -> Result<Option<M>> {
        self.get_record(M::COLLECTION, id)
            .await?
            .map(|record| M::from_record(&record))
            .transpose()
    }

    pub async fn list<M: SyncedModel>(
        &self,
        partition: &str,
        include_deleted: bool,
    ) -> Result<Vec<M>> {
        self.list_records(M::COLLECTION, partition, include_deleted)
            .await?
            .iter()
            .map(M::from_record)
            .collect()
    }

    pub async fn delete<M: SyncedModel>(&self, id: &RecordId) -> Result<()> {
        self.delete_record(M::COLLECTION, id).await.map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collections::CollectionRegistry;
    use crate::db::LibSqlStore;
    use crate::models::{Customer, Product};
    use crate::store::MemoryStore;
    use pretty_assertions::assert_eq;

    fn service() -> LedgerService {
        LedgerService::new(Arc::new(MemoryStore::new(
            "local",
            CollectionRegistry::ledger(),
        )))
    }

    #[tokio::test]
    async fn save_stamps_and_round_trips_models() {
        let ledger = service();
        let mut customer = Customer::new("biz-42", "Acme");
        let created = customer.meta.updated_at;

        ledger.save(&mut customer).await.unwrap();
        assert!(customer.meta.updated_at > created);

        let loaded: Customer = ledger.get(&customer.meta.id).await.unwrap().unwrap();
        assert_eq!(loaded, customer);
    }

    #[tokio::test]
    async fn edits_always_move_the_clock_forward() {
        let ledger = service();
        let mut product = Product::new("biz-42", "Rice 5kg", 1_250);
        ledger.save(&mut product).await.unwrap();

        let mut stale = product.clone();
        stale.meta.updated_at -= 1_000;
        stale.price_cents = 1_300;
        ledger.save(&mut stale).await.unwrap();

        assert!(stale.meta.updated_at > product.meta.updated_at);
        let loaded: Product = ledger.get(&product.meta.id).await.unwrap().unwrap();
        assert_eq!(loaded.price_cents, 1_300);
    }

    #[tokio::test]
    async fn delete_leaves_a_tombstone() {
        let ledger = service();
        let mut customer = Customer::new("biz-42", "Acme");
        ledger.save(&mut customer).await.unwrap();

        ledger.delete::<Customer>(&customer.meta.id).await.unwrap();

        let listed: Vec<Customer> = ledger.list("biz-42", false).await.unwrap();
        assert!(listed.is_empty());
        let all: Vec<Customer> = ledger.list("biz-42", true).await.unwrap();
        assert_eq!(all.len(), 1);
        assert!(all[0].meta.is_deleted);
        assert!(all[0].meta.updated_at > customer.meta.updated_at);
    }

    #[tokio::test]
    async fn records_cannot_change_partition() {
        let ledger = service();
        let mut customer = Customer::new("biz-42", "Acme");
        ledger.save(&mut customer).await.unwrap();

        customer.meta.partition = "biz-7".to_string();
        let error = ledger.save(&mut customer).await.unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn blank_partition_is_rejected() {
        let ledger = service();
        let error = ledger
            .create_record("customers", "  ", Map::new())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn deleting_missing_record_is_not_found() {
        let ledger = service();
        let error = ledger
            .delete_record("customers", &RecordId::new())
            .await
            .unwrap_err();
        assert!(matches!(error, Error::NotFound(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn lists_newest_first_on_libsql() {
        let store = LibSqlStore::open_in_memory(CollectionRegistry::ledger())
            .await
            .unwrap();
        let ledger = LedgerService::new(Arc::new(store));

        let mut first = Customer::new("biz-42", "First");
        ledger.save(&mut first).await.unwrap();
        let mut second = Customer::new("biz-42", "Second");
        second.meta.updated_at = first.meta.updated_at + 10;
        ledger.save(&mut second).await.unwrap();

        let names: Vec<String> = ledger
            .list::<Customer>("biz-42", false)
            .await
            .unwrap()
            .into_iter()
            .map(|customer| customer.name)
            .collect();
        assert_eq!(names, vec!["Second", "First"]);
    }
}
