//! Protocol messages for push and pull.
//!
//! Everything here is serde JSON; the wire shapes are fixed:
//!
//! - push request: `{ "timestamp": ..., "entities": [ ... ] }`
//! - push response: `{ "applied": n, "conflicts": n }`
//! - pull response: `{ "timestamp": ..., "entities": [ ... ] }`

use crate::record::RawRecord;
use crate::registry::EntityKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named entity kind plus the raw rows of that kind, exchanged verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncBatch {
    /// Wire name of the entity kind.
    pub entity: String,
    /// Raw rows, in the order the sender read them.
    pub records: Vec<RawRecord>,
}

impl SyncBatch {
    /// Creates a batch for a registered kind.
    pub fn new(kind: EntityKind, records: Vec<RawRecord>) -> Self {
        Self {
            entity: kind.as_str().to_string(),
            records,
        }
    }

    /// Resolves the entity name against the registry.
    ///
    /// `None` means the batch names a kind outside the allowlist and must
    /// be skipped by the receiver.
    pub fn kind(&self) -> Option<EntityKind> {
        EntityKind::parse(&self.entity)
    }
}

/// Push request: agent → center.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushRequest {
    /// When the agent assembled the batch.
    pub timestamp: DateTime<Utc>,
    /// Per-kind batches of pending rows.
    pub entities: Vec<SyncBatch>,
}

impl PushRequest {
    /// Creates a push request stamped with the given time.
    pub fn new(timestamp: DateTime<Utc>, entities: Vec<SyncBatch>) -> Self {
        Self { timestamp, entities }
    }

    /// Total number of records across all batches.
    pub fn record_count(&self) -> usize {
        self.entities.iter().map(|b| b.records.len()).sum()
    }
}

/// Push response: the two aggregate counts, nothing per-record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushResponse {
    /// Records merged into the central store.
    pub applied: u64,
    /// Records rejected because the center held a strictly newer version.
    pub conflicts: u64,
}

/// Pull request: agent → center.
///
/// On the wire this is the optional `since` query parameter of the collect
/// endpoint; absent means pull from the beginning of time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Lower watermark; only rows modified strictly after it are returned.
    pub since: Option<DateTime<Utc>>,
}

impl PullRequest {
    /// Creates a pull request from an optional watermark.
    pub fn since(watermark: Option<DateTime<Utc>>) -> Self {
        Self { since: watermark }
    }
}

/// Pull response: center → agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullResponse {
    /// The "as of" point this response certifies; the agent's next
    /// watermark.
    pub timestamp: DateTime<Utc>,
    /// Per-kind batches of rows modified since the requested watermark.
    pub entities: Vec<SyncBatch>,
}

impl PullResponse {
    /// Creates a pull response.
    pub fn new(timestamp: DateTime<Utc>, entities: Vec<SyncBatch>) -> Self {
        Self { timestamp, entities }
    }

    /// Total number of records across all batches.
    pub fn record_count(&self) -> usize {
        self.entities.iter().map(|b| b.records.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::{json, Value};

    fn record(id: &str) -> RawRecord {
        match json!({ "id": id, "tenant_id": "acme", "updated_at": "2024-01-02T09:00:00Z" }) {
            Value::Object(map) => RawRecord::from_map(map),
            _ => unreachable!(),
        }
    }

    #[test]
    fn batch_kind_lookup() {
        let batch = SyncBatch::new(EntityKind::Sale, vec![record("s-1")]);
        assert_eq!(batch.entity, "sales");
        assert_eq!(batch.kind(), Some(EntityKind::Sale));

        let unknown = SyncBatch {
            entity: "audit_log".into(),
            records: vec![],
        };
        assert_eq!(unknown.kind(), None);
    }

    #[test]
    fn push_request_wire_shape() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let request = PushRequest::new(at, vec![SyncBatch::new(EntityKind::Product, vec![record("p-1")])]);

        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("timestamp").is_some());
        let entities = value.get("entities").and_then(Value::as_array).unwrap();
        assert_eq!(entities[0].get("entity").and_then(Value::as_str), Some("products"));
        assert_eq!(
            entities[0]["records"][0].get("id").and_then(Value::as_str),
            Some("p-1")
        );

        let decoded: PushRequest = serde_json::from_value(value).unwrap();
        assert_eq!(decoded, request);
        assert_eq!(decoded.record_count(), 1);
    }

    #[test]
    fn push_response_wire_shape() {
        let response = PushResponse { applied: 3, conflicts: 1 };
        let encoded = serde_json::to_string(&response).unwrap();
        assert_eq!(encoded, r#"{"applied":3,"conflicts":1}"#);
    }

    #[test]
    fn pull_response_roundtrip() {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 10, 0, 0).unwrap();
        let response = PullResponse::new(
            at,
            vec![
                SyncBatch::new(EntityKind::Product, vec![record("p-1"), record("p-2")]),
                SyncBatch::new(EntityKind::Sale, vec![record("s-1")]),
            ],
        );

        let encoded = serde_json::to_string(&response).unwrap();
        let decoded: PullResponse = serde_json::from_str(&encoded).unwrap();
        assert_eq!(decoded, response);
        assert_eq!(decoded.record_count(), 3);
    }

    #[test]
    fn pull_request_without_watermark() {
        let request = PullRequest::since(None);
        assert_eq!(request.since, None);
    }
}
