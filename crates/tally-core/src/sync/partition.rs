//! Partition filter

use crate::models::Record;

/// Does `record` belong to the partition being synced?
///
/// Partitions compare exactly, the same way [`RecordFilter`] and the SQL
/// store do; callers normalise the active partition before syncing. A blank
/// partition never syncs.
///
/// [`RecordFilter`]: crate::store::RecordFilter
pub fn belongs(record: &Record, active_partition: &str) -> bool {
    !active_partition.trim().is_empty() && record.partition == active_partition
}
