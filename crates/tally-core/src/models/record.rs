//! Replicated record model

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::util::unix_millis_now;

/// Names of the synced columns. Entity payloads never carry these keys.
pub const META_FIELDS: [&str; 5] = ["id", "partition", "created_at", "updated_at", "is_deleted"];

/// A unique identifier for a record, using UUID v7 (time-sortable)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(Uuid);

impl RecordId {
    /// Create a new unique record ID using UUID v7
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }

    /// Get the string representation of this ID
    #[must_use]
    pub fn as_str(&self) -> String {
        self.0.to_string()
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RecordId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The synced fields shared by every ledger entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMeta {
    /// Replication key, immutable once created
    pub id: RecordId,
    /// Tenant/business scope
    pub partition: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last mutation timestamp (Unix ms), the last-writer-wins clock
    pub updated_at: i64,
    /// Tombstone flag; deletions replicate as updates
    pub is_deleted: bool,
}

impl RecordMeta {
    /// Fresh metadata for a record created now in `partition`
    #[must_use]
    pub fn new(partition: impl Into<String>) -> Self {
        let now = unix_millis_now();
        Self {
            id: RecordId::new(),
            partition: partition.into(),
            created_at: now,
            updated_at: now,
            is_deleted: false,
        }
    }

    /// Stamp a new local mutation.
    ///
    /// The clock never moves backwards for a given record, even when two edits
    /// land within the same millisecond.
    pub fn touch(&mut self) {
        self.updated_at = unix_millis_now().max(self.updated_at + 1);
    }
}

/// A record as the replication engine sees it: synced columns plus an opaque
/// JSON object holding the entity's own fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    /// Replication key
    pub id: RecordId,
    /// Tenant/business scope
    pub partition: String,
    /// Creation timestamp (Unix ms)
    pub created_at: i64,
    /// Last mutation timestamp (Unix ms)
    pub updated_at: i64,
    /// Soft delete flag for sync
    pub is_deleted: bool,
    /// Entity fields (never contains the synced column names)
    #[serde(default)]
    pub data: Map<String, Value>,
}

impl Record {
    /// Create a new live record in `partition` with the given entity fields
    #[must_use]
    pub fn new(partition: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::from_parts(RecordMeta::new(partition), data)
    }

    /// Assemble a record from metadata and entity fields
    #[must_use]
    pub fn from_parts(meta: RecordMeta, mut data: Map<String, Value>) -> Self {
        for key in META_FIELDS {
            data.remove(key);
        }
        Self {
            id: meta.id,
            partition: meta.partition,
            created_at: meta.created_at,
            updated_at: meta.updated_at,
            is_deleted: meta.is_deleted,
            data,
        }
    }

    /// The synced fields of this record
    #[must_use]
    pub fn meta(&self) -> RecordMeta {
        RecordMeta {
            id: self.id,
            partition: self.partition.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
            is_deleted: self.is_deleted,
        }
    }

    /// Stamp a new local mutation (see [`RecordMeta::touch`])
    pub fn touch(&mut self) {
        let mut meta = self.meta();
        meta.touch();
        self.updated_at = meta.updated_at;
    }

    /// Mark the record deleted. The record stays in the store as a tombstone.
    pub fn tombstone(&mut self) {
        self.is_deleted = true;
        self.touch();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_record_id_unique() {
        let id1 = RecordId::new();
        let id2 = RecordId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_record_id_parse() {
        let id = RecordId::new();
        let parsed: RecordId = id.as_str().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_record_new() {
        let record = Record::new("biz-42", fields(json!({"name": "Acme"})));
        assert_eq!(record.partition, "biz-42");
        assert!(!record.is_deleted);
        assert!(record.created_at > 0);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.data["name"], "Acme");
    }

    #[test]
    fn test_from_parts_strips_meta_keys_from_payload() {
        let meta = RecordMeta::new("biz-42");
        let record = Record::from_parts(
            meta.clone(),
            fields(json!({"id": "bogus", "updated_at": 1, "name": "Acme"})),
        );
        assert_eq!(record.id, meta.id);
        assert_eq!(record.updated_at, meta.updated_at);
        assert_eq!(record.data.len(), 1);
    }

    #[test]
    fn test_touch_is_strictly_increasing() {
        let mut record = Record::new("biz-42", Map::new());
        record.updated_at = i64::MAX / 2;
        let before = record.updated_at;
        record.touch();
        assert_eq!(record.updated_at, before + 1);
    }

    #[test]
    fn test_tombstone_keeps_record_and_bumps_clock() {
        let mut record = Record::new("biz-42", fields(json!({"name": "Acme"})));
        let before = record.updated_at;
        record.tombstone();
        assert!(record.is_deleted);
        assert!(record.updated_at > before);
        assert_eq!(record.data["name"], "Acme");
    }
}
