//! The unattended sync loop.

use crate::config::AgentConfig;
use crate::error::{AgentError, AgentResult};
use crate::store::LocalStore;
use crate::transport::CentralTransport;
use branchsync_protocol::{
    EntityKind, PullRequest, PushRequest, SyncBatch, SyncLogEntry, TenantId,
};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU32, Ordering};
use tracing::{debug, info, warn};

/// Outcome of one push phase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushOutcome {
    /// Rows sent to the center.
    pub sent: u64,
    /// Rows the center reported merged.
    pub applied: u64,
    /// Rows the center reported as conflicts.
    pub conflicts: u64,
}

/// Outcome of one pull phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PullOutcome {
    /// Batches applied locally.
    pub batches: u64,
    /// Rows applied locally.
    pub records: u64,
    /// The new watermark, as reported by the center.
    pub watermark: DateTime<Utc>,
}

/// Outcome of one loop iteration. A `None` phase failed and was skipped
/// for this iteration; its work is retried on the next tick.
#[derive(Debug, Clone, Copy, Default)]
pub struct IterationOutcome {
    /// Push phase outcome, if the phase completed.
    pub push: Option<PushOutcome>,
    /// Pull phase outcome, if the phase completed.
    pub pull: Option<PullOutcome>,
}

impl IterationOutcome {
    /// Returns true if both phases failed.
    pub fn all_failed(&self) -> bool {
        self.push.is_none() && self.pull.is_none()
    }
}

/// Running totals for the agent.
#[derive(Debug, Clone, Default)]
pub struct AgentStats {
    /// Loop iterations completed.
    pub iterations: u64,
    /// Rows pushed to the center.
    pub records_pushed: u64,
    /// Rows pulled from the center.
    pub records_pulled: u64,
    /// Conflicts the center reported across all pushes.
    pub conflicts_reported: u64,
    /// Push phases that failed.
    pub push_failures: u64,
    /// Pull phases that failed.
    pub pull_failures: u64,
    /// Most recent phase error.
    pub last_error: Option<String>,
}

/// The edge sync agent: push, then pull, then sleep, forever.
///
/// One agent serves exactly one tenant, resolved once at startup and
/// threaded through every call.
pub struct SyncAgent<T: CentralTransport, S: LocalStore> {
    config: AgentConfig,
    transport: T,
    store: S,
    tenant: TenantId,
    stats: RwLock<AgentStats>,
    consecutive_failures: AtomicU32,
}

impl<T: CentralTransport, S: LocalStore> SyncAgent<T, S> {
    /// Creates an agent scoped to the given tenant.
    pub fn new(config: AgentConfig, transport: T, store: S, tenant: TenantId) -> Self {
        Self {
            config,
            transport,
            store,
            tenant,
            stats: RwLock::new(AgentStats::default()),
            consecutive_failures: AtomicU32::new(0),
        }
    }

    /// Resolves the tenant from the local store, once, at startup.
    pub fn discover_tenant(store: &S) -> AgentResult<TenantId> {
        store.first_tenant()?.ok_or(AgentError::MissingTenant)
    }

    /// The tenant this agent serves.
    pub fn tenant(&self) -> &TenantId {
        &self.tenant
    }

    /// Snapshot of the running totals.
    pub fn stats(&self) -> AgentStats {
        self.stats.read().clone()
    }

    /// The local store behind this agent.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Push phase: batch pending rows per kind and send them to Central
    /// Apply.
    pub fn push_once(&self) -> AgentResult<PushOutcome> {
        let mut batches = Vec::new();
        let mut sent_ids: Vec<(EntityKind, Vec<String>)> = Vec::new();

        for kind in EntityKind::ALL {
            let rows = self.store.pending_records(kind, self.config.push_batch_size)?;
            if rows.is_empty() {
                continue;
            }
            let ids = rows
                .iter()
                .filter_map(|row| row.id().map(str::to_string))
                .collect();
            sent_ids.push((kind, ids));
            batches.push(SyncBatch::new(kind, rows));
        }

        if batches.is_empty() {
            debug!(tenant = %self.tenant, "nothing pending; push skipped");
            return Ok(PushOutcome::default());
        }

        let request = PushRequest::new(Utc::now(), batches);
        let sent = request.record_count() as u64;
        let response = self.transport.push(&request)?;

        // Known limitation, preserved deliberately: the response carries
        // only aggregate counts, so every sent row is marked synced even
        // when the center counted it as a conflict. A rejected row is
        // never retried.
        for (kind, ids) in &sent_ids {
            self.store.mark_synced(*kind, ids)?;
        }

        info!(tenant = %self.tenant, sent, applied = response.applied,
            conflicts = response.conflicts, "push completed");
        Ok(PushOutcome {
            sent,
            applied: response.applied,
            conflicts: response.conflicts,
        })
    }

    /// Pull phase: collect changes since the local watermark, apply them,
    /// and advance the cursor.
    pub fn pull_once(&self) -> AgentResult<PullOutcome> {
        let since = self.store.latest_pull_watermark(&self.tenant)?;
        let response = self.transport.collect(&PullRequest::since(since))?;

        let mut batches = 0u64;
        let mut records = 0u64;
        for batch in &response.entities {
            let Some(kind) = batch.kind() else {
                warn!(tenant = %self.tenant, entity = %batch.entity,
                    "pulled batch names entity kind outside the allowlist; skipping");
                continue;
            };
            self.store.apply_remote(kind, &batch.records)?;
            batches += 1;
            records += batch.records.len() as u64;
        }

        self.store.append_log(SyncLogEntry::pull_success(
            self.tenant.clone(),
            response.timestamp,
            response.entities.clone(),
        ))?;

        info!(tenant = %self.tenant, batches, records,
            watermark = %response.timestamp, "pull completed");
        Ok(PullOutcome {
            batches,
            records,
            watermark: response.timestamp,
        })
    }

    /// One loop iteration: push then pull, each phase fail-safe.
    pub fn run_once(&self) -> IterationOutcome {
        let mut outcome = IterationOutcome::default();

        match self.push_once() {
            Ok(push) => outcome.push = Some(push),
            Err(e) => {
                warn!(tenant = %self.tenant, error = %e, "push phase failed; rows stay pending");
                let mut stats = self.stats.write();
                stats.push_failures += 1;
                stats.last_error = Some(e.to_string());
            }
        }

        match self.pull_once() {
            Ok(pull) => outcome.pull = Some(pull),
            Err(e) => {
                warn!(tenant = %self.tenant, error = %e, "pull phase failed; watermark unchanged");
                let mut stats = self.stats.write();
                stats.pull_failures += 1;
                stats.last_error = Some(e.to_string());
            }
        }

        {
            let mut stats = self.stats.write();
            stats.iterations += 1;
            if let Some(push) = outcome.push {
                stats.records_pushed += push.sent;
                stats.conflicts_reported += push.conflicts;
            }
            if let Some(pull) = outcome.pull {
                stats.records_pulled += pull.records;
            }
        }

        if outcome.all_failed() {
            self.consecutive_failures.fetch_add(1, Ordering::SeqCst);
        } else {
            self.consecutive_failures.store(0, Ordering::SeqCst);
        }

        outcome
    }

    /// Sleep before the next iteration: the configured interval,
    /// stretched by bounded backoff after wholly-failed iterations.
    pub fn next_delay(&self) -> std::time::Duration {
        let failures = self.consecutive_failures.load(Ordering::SeqCst);
        self.config
            .backoff
            .delay_after(self.config.sync_interval, failures)
    }

    /// Runs the loop forever. Termination is external.
    pub fn run(&self) {
        info!(tenant = %self.tenant, interval = ?self.config.sync_interval, "sync agent started");
        loop {
            self.run_once();
            std::thread::sleep(self.next_delay());
        }
    }
}
