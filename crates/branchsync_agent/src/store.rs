//! The branch-local store seam.
//!
//! Domain write paths (external) create rows tagged `pending`/`local`;
//! the agent is the only thing that clears `pending`. The trait below is
//! everything the agent needs from the local transactional store: a
//! `MemoryStore` backs tests, and `JsonStore` gives the daemon single-file
//! persistence.

use crate::error::{AgentError, AgentResult};
use branchsync_protocol::{EntityKind, Origin, RawRecord, SyncLogEntry, SyncState, TenantId};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Access to the branch-local store.
pub trait LocalStore: Send + Sync {
    /// Returns the tenant this store belongs to, discovered from the
    /// first tenant-bearing row present. Resolved once at agent startup.
    fn first_tenant(&self) -> AgentResult<Option<TenantId>>;

    /// Rows awaiting push for one kind: `sync_state = pending`, ordered
    /// by last-modified ascending, capped at `limit`. Every domain write
    /// sets `pending`, and only [`LocalStore::mark_synced`] clears it, so
    /// a confirmed row is never re-sent.
    fn pending_records(&self, kind: EntityKind, limit: usize) -> AgentResult<Vec<RawRecord>>;

    /// Marks pushed rows confirmed: `sync_state = synced`,
    /// `origin = local`, `sync_version` incremented.
    fn mark_synced(&self, kind: EntityKind, ids: &[String]) -> AgentResult<()>;

    /// Upserts central rows verbatim, keyed by identifier. No conflict
    /// detection: the center is authoritative during pull.
    fn apply_remote(&self, kind: EntityKind, records: &[RawRecord]) -> AgentResult<()>;

    /// The tenant's pull cursor: greatest watermark among confirmed pull
    /// log entries.
    fn latest_pull_watermark(&self, tenant: &TenantId) -> AgentResult<Option<DateTime<Utc>>>;

    /// Appends a sync log entry.
    fn append_log(&self, entry: SyncLogEntry) -> AgentResult<()>;
}

type Tables = BTreeMap<EntityKind, BTreeMap<String, RawRecord>>;

fn pending_from(tables: &Tables, kind: EntityKind, limit: usize) -> Vec<RawRecord> {
    let Some(table) = tables.get(&kind) else {
        return Vec::new();
    };

    let mut rows: Vec<RawRecord> = table
        .values()
        .filter(|row| row.sync_state() == Some(SyncState::Pending))
        .cloned()
        .collect();

    rows.sort_by_key(|row| row.updated_at().unwrap_or(DateTime::UNIX_EPOCH));
    rows.truncate(limit);
    rows
}

fn first_tenant_from(tables: &Tables) -> Option<TenantId> {
    for kind in EntityKind::ALL {
        if let Some(tenant) = tables
            .get(&kind)
            .and_then(|table| table.values().find_map(|row| row.tenant_id()))
        {
            return Some(tenant);
        }
    }
    None
}

fn mark_synced_in(tables: &mut Tables, kind: EntityKind, ids: &[String]) {
    if let Some(table) = tables.get_mut(&kind) {
        for id in ids {
            if let Some(row) = table.get_mut(id) {
                row.set_sync_state(SyncState::Synced);
                row.set_origin(Origin::Local);
                row.bump_sync_version();
            }
        }
    }
}

fn apply_remote_in(tables: &mut Tables, kind: EntityKind, records: &[RawRecord]) {
    let table = tables.entry(kind).or_default();
    for record in records {
        match record.id() {
            Some(id) => {
                table.insert(id.to_string(), record.clone());
            }
            None => {
                warn!(entity = %kind, "pulled record has no identifier; skipping");
            }
        }
    }
}

fn watermark_from(log: &[SyncLogEntry], tenant: &TenantId) -> Option<DateTime<Utc>> {
    log.iter()
        .filter(|entry| &entry.tenant == tenant && entry.is_confirmed_pull())
        .map(|entry| entry.watermark)
        .max()
}

/// In-memory local store, for tests and embedding.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    log: RwLock<Vec<SyncLogEntry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a row verbatim, standing in for a domain write path.
    pub fn insert(&self, kind: EntityKind, record: RawRecord) {
        let id = record.id().unwrap_or_default().to_string();
        self.tables.write().entry(kind).or_default().insert(id, record);
    }

    /// Inserts a row tagged the way the change-tracking contract requires
    /// of every domain write: `pending`/`local`.
    pub fn insert_local(&self, kind: EntityKind, mut record: RawRecord) {
        record.set_sync_state(SyncState::Pending);
        record.set_origin(Origin::Local);
        self.insert(kind, record);
    }

    /// Returns a stored row.
    pub fn record(&self, kind: EntityKind, id: &str) -> Option<RawRecord> {
        self.tables
            .read()
            .get(&kind)
            .and_then(|table| table.get(id))
            .cloned()
    }

    /// Number of rows stored for a kind.
    pub fn len(&self, kind: EntityKind) -> usize {
        self.tables.read().get(&kind).map(|t| t.len()).unwrap_or(0)
    }

    /// Returns true if no rows are stored.
    pub fn is_empty(&self) -> bool {
        self.tables.read().values().all(|t| t.is_empty())
    }

    /// Snapshot of the sync log.
    pub fn log_entries(&self) -> Vec<SyncLogEntry> {
        self.log.read().clone()
    }
}

impl LocalStore for MemoryStore {
    fn first_tenant(&self) -> AgentResult<Option<TenantId>> {
        Ok(first_tenant_from(&self.tables.read()))
    }

    fn pending_records(&self, kind: EntityKind, limit: usize) -> AgentResult<Vec<RawRecord>> {
        Ok(pending_from(&self.tables.read(), kind, limit))
    }

    fn mark_synced(&self, kind: EntityKind, ids: &[String]) -> AgentResult<()> {
        mark_synced_in(&mut self.tables.write(), kind, ids);
        Ok(())
    }

    fn apply_remote(&self, kind: EntityKind, records: &[RawRecord]) -> AgentResult<()> {
        apply_remote_in(&mut self.tables.write(), kind, records);
        Ok(())
    }

    fn latest_pull_watermark(&self, tenant: &TenantId) -> AgentResult<Option<DateTime<Utc>>> {
        Ok(watermark_from(&self.log.read(), tenant))
    }

    fn append_log(&self, entry: SyncLogEntry) -> AgentResult<()> {
        self.log.write().push(entry);
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JsonState {
    tables: BTreeMap<String, BTreeMap<String, RawRecord>>,
    log: Vec<SyncLogEntry>,
}

/// Single-file JSON local store for the agent daemon.
///
/// Every mutation rewrites the file, so a crash-and-restart resumes from
/// the last persisted state, pull cursor included. Suitable for the small
/// working sets of one branch; production deployments put a relational
/// store behind [`LocalStore`] instead.
pub struct JsonStore {
    path: PathBuf,
    state: RwLock<JsonState>,
}

impl JsonStore {
    /// Opens (or creates) the store at the given path.
    pub fn open(path: impl AsRef<Path>) -> AgentResult<Self> {
        let path = path.as_ref().to_path_buf();
        let state = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| AgentError::Store(format!("read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| AgentError::Store(format!("parse {}: {e}", path.display())))?
        } else {
            JsonState::default()
        };

        Ok(Self {
            path,
            state: RwLock::new(state),
        })
    }

    // Write-then-rename: an interrupted write leaves the previous state
    // on disk instead of a torn file.
    fn persist(&self, state: &JsonState) -> AgentResult<()> {
        let raw = serde_json::to_string_pretty(state)
            .map_err(|e| AgentError::Store(format!("encode store: {e}")))?;
        let scratch = self.path.with_extension("tmp");
        std::fs::write(&scratch, raw)
            .map_err(|e| AgentError::Store(format!("write {}: {e}", scratch.display())))?;
        std::fs::rename(&scratch, &self.path)
            .map_err(|e| AgentError::Store(format!("replace {}: {e}", self.path.display())))
    }

    fn typed_tables(state: &JsonState) -> Tables {
        let mut tables = Tables::new();
        for (name, table) in &state.tables {
            if let Some(kind) = EntityKind::parse(name) {
                tables.insert(kind, table.clone());
            }
        }
        tables
    }

    fn store_tables(state: &mut JsonState, tables: Tables) {
        state.tables = tables
            .into_iter()
            .map(|(kind, table)| (kind.as_str().to_string(), table))
            .collect();
    }

    /// Inserts a row tagged `pending`/`local`, standing in for a domain
    /// write path.
    pub fn insert_local(&self, kind: EntityKind, mut record: RawRecord) -> AgentResult<()> {
        record.set_sync_state(SyncState::Pending);
        record.set_origin(Origin::Local);
        let id = record.id().unwrap_or_default().to_string();

        let mut state = self.state.write();
        state
            .tables
            .entry(kind.as_str().to_string())
            .or_default()
            .insert(id, record);
        self.persist(&state)
    }

    /// Returns a stored row.
    pub fn record(&self, kind: EntityKind, id: &str) -> Option<RawRecord> {
        self.state
            .read()
            .tables
            .get(kind.as_str())
            .and_then(|table| table.get(id))
            .cloned()
    }
}

impl LocalStore for JsonStore {
    fn first_tenant(&self) -> AgentResult<Option<TenantId>> {
        Ok(first_tenant_from(&Self::typed_tables(&self.state.read())))
    }

    fn pending_records(&self, kind: EntityKind, limit: usize) -> AgentResult<Vec<RawRecord>> {
        Ok(pending_from(&Self::typed_tables(&self.state.read()), kind, limit))
    }

    fn mark_synced(&self, kind: EntityKind, ids: &[String]) -> AgentResult<()> {
        let mut state = self.state.write();
        let mut tables = Self::typed_tables(&state);
        mark_synced_in(&mut tables, kind, ids);
        Self::store_tables(&mut state, tables);
        self.persist(&state)
    }

    fn apply_remote(&self, kind: EntityKind, records: &[RawRecord]) -> AgentResult<()> {
        let mut state = self.state.write();
        let mut tables = Self::typed_tables(&state);
        apply_remote_in(&mut tables, kind, records);
        Self::store_tables(&mut state, tables);
        self.persist(&state)
    }

    fn latest_pull_watermark(&self, tenant: &TenantId) -> AgentResult<Option<DateTime<Utc>>> {
        Ok(watermark_from(&self.state.read().log, tenant))
    }

    fn append_log(&self, entry: SyncLogEntry) -> AgentResult<()> {
        let mut state = self.state.write();
        state.log.push(entry);
        self.persist(&state)
    }
}
