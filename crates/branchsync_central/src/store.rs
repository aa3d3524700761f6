//! The central authoritative record store.
//!
//! In-memory reference implementation keyed per tenant and entity kind,
//! with the same role the relational store plays in production. Batch
//! commits are all-or-nothing: every validation happens before the write
//! lock is taken, and the staged writes land in one critical section.

use branchsync_protocol::{EntityKind, RawRecord, TenantId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

/// One row staged for commit.
#[derive(Debug, Clone)]
pub struct StagedWrite {
    /// Owning tenant.
    pub tenant: TenantId,
    /// Entity kind of the row.
    pub kind: EntityKind,
    /// Row identifier.
    pub id: String,
    /// The full incoming row; overwrites all columns on commit.
    pub record: RawRecord,
}

/// Tenant-scoped record store.
pub struct RecordStore {
    tables: RwLock<HashMap<(TenantId, EntityKind), HashMap<String, RawRecord>>>,
    fail_commits: AtomicBool,
}

impl RecordStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            fail_commits: AtomicBool::new(false),
        }
    }

    /// Returns the stored row for an identifier within a tenant.
    pub fn get(&self, tenant: &TenantId, kind: EntityKind, id: &str) -> Option<RawRecord> {
        self.tables
            .read()
            .get(&(tenant.clone(), kind))
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Returns the tenant's rows of one kind modified strictly after
    /// `since`, ordered by last-modified ascending.
    ///
    /// Rows without a well-formed `updated_at` are never returned; every
    /// write path is contracted to stamp one.
    pub fn modified_since(
        &self,
        tenant: &TenantId,
        kind: EntityKind,
        since: Option<DateTime<Utc>>,
    ) -> Vec<RawRecord> {
        let tables = self.tables.read();
        let Some(table) = tables.get(&(tenant.clone(), kind)) else {
            return Vec::new();
        };

        let mut rows: Vec<(DateTime<Utc>, RawRecord)> = table
            .values()
            .filter_map(|record| record.updated_at().map(|at| (at, record.clone())))
            .filter(|(at, _)| match since {
                Some(watermark) => *at > watermark,
                None => true,
            })
            .collect();

        rows.sort_by_key(|(at, _)| *at);
        rows.into_iter().map(|(_, record)| record).collect()
    }

    /// Commits a staged batch atomically.
    ///
    /// Either every write lands or none does; a refused commit leaves the
    /// store exactly as it was.
    pub fn commit(&self, writes: Vec<StagedWrite>) -> Result<(), String> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err("commit refused".to_string());
        }

        let mut tables = self.tables.write();
        for write in writes {
            tables
                .entry((write.tenant, write.kind))
                .or_default()
                .insert(write.id, write.record);
        }
        Ok(())
    }

    /// Number of rows stored for a tenant and kind.
    pub fn len(&self, tenant: &TenantId, kind: EntityKind) -> usize {
        self.tables
            .read()
            .get(&(tenant.clone(), kind))
            .map(|table| table.len())
            .unwrap_or(0)
    }

    /// Returns true if the store holds no rows at all.
    pub fn is_empty(&self) -> bool {
        self.tables.read().values().all(|table| table.is_empty())
    }

    /// Makes every subsequent commit fail. For tests.
    pub fn set_commit_failure(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }
}

impl Default for RecordStore {
    fn default() -> Self {
        Self::new()
    }
}
