//! The two central operations: apply (push-serving) and collect
//! (pull-serving).

use crate::config::CentralConfig;
use crate::error::{CentralError, CentralResult};
use crate::log::SyncLogStore;
use crate::store::{RecordStore, StagedWrite};
use branchsync_protocol::{
    resolve, EntityKind, MergeOutcome, PullRequest, PullResponse, PushRequest, PushResponse,
    SyncBatch, SyncLogEntry, TenantId,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Full outcome of merging one push batch.
///
/// The wire response carries only `applied` and `conflicts`; `skipped`
/// (unknown kinds and rows without an identifier) is surfaced here and in
/// the logs instead of being silently dropped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeSummary {
    /// Records merged into the store.
    pub applied: u64,
    /// Records rejected because the stored row was strictly newer.
    pub conflicts: u64,
    /// Records outside the allowlist or missing an identifier.
    pub skipped: u64,
}

impl From<MergeSummary> for PushResponse {
    fn from(summary: MergeSummary) -> Self {
        PushResponse {
            applied: summary.applied,
            conflicts: summary.conflicts,
        }
    }
}

/// Handler for the central sync operations.
pub struct SyncHandler {
    config: CentralConfig,
    store: Arc<RecordStore>,
    log: Arc<SyncLogStore>,
}

impl SyncHandler {
    /// Creates a handler over fresh stores.
    pub fn new(config: CentralConfig) -> Self {
        Self::with_stores(config, Arc::new(RecordStore::new()), Arc::new(SyncLogStore::new()))
    }

    /// Creates a handler over existing stores.
    pub fn with_stores(
        config: CentralConfig,
        store: Arc<RecordStore>,
        log: Arc<SyncLogStore>,
    ) -> Self {
        Self { config, store, log }
    }

    /// The record store behind this handler.
    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// The sync log behind this handler.
    pub fn log(&self) -> &Arc<SyncLogStore> {
        &self.log
    }

    /// Serves a push: merges the batch and returns the aggregate counts.
    pub fn handle_push(
        &self,
        tenant: &TenantId,
        branch: Option<&str>,
        request: PushRequest,
    ) -> CentralResult<PushResponse> {
        self.apply(tenant, branch, request).map(PushResponse::from)
    }

    /// Merges a push batch inside one all-or-nothing transaction and
    /// returns the full summary, skips included.
    ///
    /// On success exactly one push log entry is appended; a refused commit
    /// rolls back every record and appends nothing.
    pub fn apply(
        &self,
        tenant: &TenantId,
        branch: Option<&str>,
        request: PushRequest,
    ) -> CentralResult<MergeSummary> {
        if request.record_count() > self.config.max_push_records {
            return Err(CentralError::InvalidRequest(format!(
                "push of {} records exceeds limit {}",
                request.record_count(),
                self.config.max_push_records
            )));
        }

        let mut summary = MergeSummary::default();
        let mut writes: Vec<StagedWrite> = Vec::new();
        // Later records in the same batch must see earlier staged writes,
        // as they would inside a store transaction.
        let mut staged: HashMap<(EntityKind, String), DateTime<Utc>> = HashMap::new();

        for batch in &request.entities {
            let Some(kind) = batch.kind() else {
                warn!(tenant = %tenant, entity = %batch.entity, records = batch.records.len(),
                    "push names entity kind outside the allowlist; skipping batch");
                summary.skipped += batch.records.len() as u64;
                continue;
            };

            for record in &batch.records {
                let Some(id) = record.id() else {
                    warn!(tenant = %tenant, entity = %batch.entity,
                        "pushed record has no identifier; skipping");
                    summary.skipped += 1;
                    continue;
                };

                let incoming_at = record.updated_at().unwrap_or(DateTime::UNIX_EPOCH);
                let existing_at = staged
                    .get(&(kind, id.to_string()))
                    .copied()
                    .or_else(|| {
                        self.store
                            .get(tenant, kind, id)
                            .map(|row| row.updated_at().unwrap_or(DateTime::UNIX_EPOCH))
                    });

                match existing_at {
                    Some(existing_at) if resolve(existing_at, incoming_at) == MergeOutcome::Conflict => {
                        summary.conflicts += 1;
                    }
                    _ => {
                        staged.insert((kind, id.to_string()), incoming_at);
                        writes.push(StagedWrite {
                            tenant: tenant.clone(),
                            kind,
                            id: id.to_string(),
                            record: record.clone(),
                        });
                        summary.applied += 1;
                    }
                }
            }
        }

        self.store.commit(writes).map_err(CentralError::Store)?;

        let entry = if summary.conflicts > 0 {
            SyncLogEntry::push_conflict(
                tenant.clone(),
                request.timestamp,
                request.entities.clone(),
                summary.conflicts,
            )
        } else {
            SyncLogEntry::push_success(tenant.clone(), request.timestamp, request.entities.clone())
        };
        self.log.append(entry);

        debug!(tenant = %tenant, branch = branch.unwrap_or("-"),
            applied = summary.applied, conflicts = summary.conflicts, skipped = summary.skipped,
            "push merged");
        Ok(summary)
    }

    /// Serves a pull: tenant-scoped changes since the given watermark.
    ///
    /// The response timestamp is captured once, before any table is
    /// scanned, so a write landing mid-collect is returned by the next
    /// pull instead of being lost.
    pub fn handle_collect(
        &self,
        tenant: &TenantId,
        request: PullRequest,
    ) -> CentralResult<PullResponse> {
        let as_of = Utc::now();

        let mut entities = Vec::new();
        for kind in EntityKind::ALL {
            let rows = self.store.modified_since(tenant, kind, request.since);
            if !rows.is_empty() {
                entities.push(SyncBatch::new(kind, rows));
            }
        }

        debug!(tenant = %tenant, since = ?request.since, batches = entities.len(), "collect served");
        Ok(PullResponse::new(as_of, entities))
    }
}
