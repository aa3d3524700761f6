//! Append-only sync log storage.

use branchsync_protocol::{SyncLogEntry, TenantId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

/// Durable record of push/pull outcomes, doubling as the pull cursor.
///
/// Entries are append-only; nothing here is ever mutated or deleted.
pub struct SyncLogStore {
    entries: RwLock<Vec<SyncLogEntry>>,
}

impl SyncLogStore {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Vec::new()),
        }
    }

    /// Appends an entry.
    pub fn append(&self, entry: SyncLogEntry) {
        self.entries.write().push(entry);
    }

    /// Returns the tenant's pull cursor: the greatest watermark among its
    /// confirmed pull entries.
    pub fn latest_pull_watermark(&self, tenant: &TenantId) -> Option<DateTime<Utc>> {
        self.entries
            .read()
            .iter()
            .filter(|entry| &entry.tenant == tenant && entry.is_confirmed_pull())
            .map(|entry| entry.watermark)
            .max()
    }

    /// Returns a snapshot of a tenant's entries, in append order.
    pub fn entries_for(&self, tenant: &TenantId) -> Vec<SyncLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|entry| &entry.tenant == tenant)
            .cloned()
            .collect()
    }

    /// Total number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Returns true if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl Default for SyncLogStore {
    fn default() -> Self {
        Self::new()
    }
}
