//! Last-write-wins conflict resolution.

use chrono::{DateTime, Utc};

/// Outcome of comparing an incoming row against the stored one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The incoming row wins and overwrites the stored one.
    Applied,
    /// The stored row is strictly newer; the incoming row is rejected.
    Conflict,
}

/// Compares last-modified timestamps for the same identifier.
///
/// Rejects iff the stored timestamp is strictly greater than the incoming
/// one. Ties resolve in favor of the incoming row, which keeps re-applying
/// an already-merged batch idempotent.
pub fn resolve(existing: DateTime<Utc>, incoming: DateTime<Utc>) -> MergeOutcome {
    if existing > incoming {
        MergeOutcome::Conflict
    } else {
        MergeOutcome::Applied
    }
}
