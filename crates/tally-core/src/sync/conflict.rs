//! Last-writer-wins conflict resolution
//!
//! The only place "newest wins" is defined. It does not know which side is
//! local and which is remote, so both flows share it. The clock is the
//! writer's wall clock; skew between devices is not compensated.

use crate::models::Record;
use crate::store::Existing;

/// Should `candidate` overwrite what the destination holds?
///
/// Absent destinations always take the candidate. Unreadable ones never do.
/// Otherwise the candidate must be strictly newer, so a record that round-trips
/// back to where it came from is a no-op. Tombstones follow the same rule.
pub fn should_apply(candidate: &Record, existing: &Existing) -> bool {
    match existing {
        Existing::Absent => true,
        Existing::Unreadable => false,
        Existing::Present(current) => candidate.updated_at > current.updated_at,
    }
}
