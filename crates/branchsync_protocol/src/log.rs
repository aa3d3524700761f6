//! Sync log entries: audit trail and pull cursor in one.
//!
//! Entries are append-only, never mutated or deleted. A tenant's pull
//! cursor is the watermark of its latest `pull`/`success` entry, so a
//! crash-and-restart resumes exactly from the last confirmed point.

use crate::messages::SyncBatch;
use crate::record::TenantId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Direction of the exchange an entry records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncDirection {
    /// Agent pushed local changes to the center.
    Push,
    /// Agent pulled central changes down.
    Pull,
}

/// Outcome status of an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncLogStatus {
    /// Exchange started but not yet confirmed (used by stores that write
    /// the entry before commit).
    Pending,
    /// Exchange completed without conflicts.
    Success,
    /// Exchange failed; the payload was not merged.
    Failed,
    /// Exchange completed but at least one record was rejected as stale.
    Conflict,
}

/// One durable record of a push or pull outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    /// Tenant this exchange was scoped to.
    pub tenant: TenantId,
    /// Push or pull.
    pub direction: SyncDirection,
    /// Outcome.
    pub status: SyncLogStatus,
    /// The "as of" point this entry certifies. For pull entries this is
    /// the cursor the next pull resumes from.
    pub watermark: DateTime<Utc>,
    /// Snapshot of the exchanged payload.
    pub payload: Vec<SyncBatch>,
    /// Human-readable error or conflict summary, if any.
    pub error: Option<String>,
}

impl SyncLogEntry {
    /// Entry for a push that merged cleanly.
    pub fn push_success(tenant: TenantId, watermark: DateTime<Utc>, payload: Vec<SyncBatch>) -> Self {
        Self {
            tenant,
            direction: SyncDirection::Push,
            status: SyncLogStatus::Success,
            watermark,
            payload,
            error: None,
        }
    }

    /// Entry for a push that merged with conflicts.
    pub fn push_conflict(
        tenant: TenantId,
        watermark: DateTime<Utc>,
        payload: Vec<SyncBatch>,
        conflicts: u64,
    ) -> Self {
        Self {
            tenant,
            direction: SyncDirection::Push,
            status: SyncLogStatus::Conflict,
            watermark,
            payload,
            error: Some(format!("{conflicts} record(s) rejected as stale")),
        }
    }

    /// Entry advancing a tenant's pull cursor.
    pub fn pull_success(tenant: TenantId, watermark: DateTime<Utc>, payload: Vec<SyncBatch>) -> Self {
        Self {
            tenant,
            direction: SyncDirection::Pull,
            status: SyncLogStatus::Success,
            watermark,
            payload,
            error: None,
        }
    }

    /// Returns true if this entry advances the tenant's pull cursor.
    pub fn is_confirmed_pull(&self) -> bool {
        self.direction == SyncDirection::Pull && self.status == SyncLogStatus::Success
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::EntityKind;
    use chrono::TimeZone;

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
    }

    #[test]
    fn push_conflict_entry_carries_summary() {
        let entry = SyncLogEntry::push_conflict(
            TenantId::from("acme"),
            at(10),
            vec![SyncBatch::new(EntityKind::Product, vec![])],
            2,
        );
        assert_eq!(entry.status, SyncLogStatus::Conflict);
        assert_eq!(entry.error.as_deref(), Some("2 record(s) rejected as stale"));
        assert!(!entry.is_confirmed_pull());
    }

    #[test]
    fn only_successful_pulls_advance_the_cursor() {
        let pull = SyncLogEntry::pull_success(TenantId::from("acme"), at(11), vec![]);
        assert!(pull.is_confirmed_pull());

        let push = SyncLogEntry::push_success(TenantId::from("acme"), at(11), vec![]);
        assert!(!push.is_confirmed_pull());

        let mut failed = pull.clone();
        failed.status = SyncLogStatus::Failed;
        assert!(!failed.is_confirmed_pull());
    }

    #[test]
    fn entry_serde_roundtrip() {
        let entry = SyncLogEntry::pull_success(TenantId::from("acme"), at(12), vec![]);
        let encoded = serde_json::to_string(&entry).unwrap();
        assert!(encoded.contains(r#""direction":"pull""#));
        assert!(encoded.contains(r#""status":"success""#));
        let decoded: SyncLogEntry = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, entry);
    }
}
