//! Sync checkpoint model

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::record::{Record, RecordId};

/// What a sync session replicates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    /// Push local edits to the remote store
    LocalToRemote,
    /// Pull remote edits into the local store
    RemoteToLocal,
    /// Both; pull runs first
    Both,
}

impl SyncDirection {
    /// The one-way flows making up this direction, in execution order
    #[must_use]
    pub const fn flows(self) -> &'static [Flow] {
        match self {
            Self::LocalToRemote => &[Flow::LocalToRemote],
            Self::RemoteToLocal => &[Flow::RemoteToLocal],
            Self::Both => &[Flow::RemoteToLocal, Flow::LocalToRemote],
        }
    }
}

/// A single replication flow: one source store, one destination store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    LocalToRemote,
    RemoteToLocal,
}

impl Flow {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::LocalToRemote => "local_to_remote",
            Self::RemoteToLocal => "remote_to_local",
        }
    }
}

impl fmt::Display for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Flow {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "local_to_remote" | "push" => Ok(Self::LocalToRemote),
            "remote_to_local" | "pull" => Ok(Self::RemoteToLocal),
            other => Err(format!("unknown sync flow '{other}'")),
        }
    }
}

/// Progress marker for one `(collection, flow)` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncCheckpoint {
    pub collection: String,
    pub flow: Flow,
    /// Partition the progress was recorded for
    pub partition: String,
    /// `updated_at` of the last successfully applied record
    pub last_synced_at: i64,
    /// Id of the last record applied by bulk copy at `last_synced_at`
    #[serde(default)]
    pub cursor: Option<RecordId>,
}

impl SyncCheckpoint {
    /// Whether a bulk copy resuming from this checkpoint already handled `record`.
    #[must_use]
    pub fn covers(&self, record: &Record) -> bool {
        if record.updated_at != self.last_synced_at {
            return record.updated_at < self.last_synced_at;
        }
        self.cursor.is_some_and(|cursor| record.id <= cursor)
    }

    /// Merge `candidate` into `current`, returning the checkpoint to persist,
    /// or `None` when `current` is already at or past `candidate`.
    ///
    /// Within one partition `last_synced_at` never decreases. A live apply at
    /// the current timestamp clears the cursor so a later resume re-evaluates
    /// every record at that timestamp.
    #[must_use]
    pub fn merge(current: Option<&Self>, candidate: Self) -> Option<Self> {
        let Some(current) = current else {
            return Some(candidate);
        };
        if current.partition != candidate.partition {
            return Some(candidate);
        }
        if candidate.last_synced_at != current.last_synced_at {
            return (candidate.last_synced_at > current.last_synced_at).then_some(candidate);
        }
        match (current.cursor, candidate.cursor) {
            (Some(_), None) => Some(candidate),
            (None, Some(_)) => Some(candidate),
            (Some(old), Some(new)) if new > old => Some(candidate),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Map;

    fn checkpoint(partition: &str, at: i64, cursor: Option<RecordId>) -> SyncCheckpoint {
        SyncCheckpoint {
            collection: "customers".to_string(),
            flow: Flow::RemoteToLocal,
            partition: partition.to_string(),
            last_synced_at: at,
            cursor,
        }
    }

    fn record_at(at: i64) -> Record {
        let mut record = Record::new("biz-42", Map::new());
        record.updated_at = at;
        record
    }

    #[test]
    fn both_direction_pulls_before_pushing() {
        assert_eq!(
            SyncDirection::Both.flows(),
            &[Flow::RemoteToLocal, Flow::LocalToRemote]
        );
        assert_eq!(SyncDirection::LocalToRemote.flows(), &[Flow::LocalToRemote]);
    }

    #[test]
    fn flow_parses_aliases() {
        assert_eq!("push".parse::<Flow>().unwrap(), Flow::LocalToRemote);
        assert_eq!("remote_to_local".parse::<Flow>().unwrap(), Flow::RemoteToLocal);
        assert!("sideways".parse::<Flow>().is_err());
    }

    #[test]
    fn merge_never_moves_backwards() {
        let current = checkpoint("biz-42", 20, None);
        assert!(SyncCheckpoint::merge(Some(&current), checkpoint("biz-42", 15, None)).is_none());
        assert!(SyncCheckpoint::merge(Some(&current), checkpoint("biz-42", 20, None)).is_none());
        assert_eq!(
            SyncCheckpoint::merge(Some(&current), checkpoint("biz-42", 25, None)),
            Some(checkpoint("biz-42", 25, None))
        );
    }

    #[test]
    fn merge_advances_cursor_at_same_timestamp() {
        let first = RecordId::new();
        let second = RecordId::new();
        let current = checkpoint("biz-42", 20, Some(first));

        assert!(SyncCheckpoint::merge(Some(&current), checkpoint("biz-42", 20, Some(second))).is_some());
        let ahead = checkpoint("biz-42", 20, Some(second));
        assert!(SyncCheckpoint::merge(Some(&ahead), checkpoint("biz-42", 20, Some(first))).is_none());
    }

    #[test]
    fn merge_replaces_checkpoint_from_other_partition() {
        let current = checkpoint("biz-1", 900, None);
        let merged = SyncCheckpoint::merge(Some(&current), checkpoint("biz-42", 5, None));
        assert_eq!(merged.unwrap().partition, "biz-42");
    }

    #[test]
    fn covers_uses_cursor_only_at_checkpoint_timestamp() {
        let older = record_at(10);
        let same = record_at(20);
        let newer = record_at(30);

        let without_cursor = checkpoint("biz-42", 20, None);
        assert!(without_cursor.covers(&older));
        assert!(!without_cursor.covers(&same));
        assert!(!without_cursor.covers(&newer));

        let with_cursor = checkpoint("biz-42", 20, Some(same.id));
        assert!(with_cursor.covers(&same));
        assert!(!with_cursor.covers(&newer));
    }
}
