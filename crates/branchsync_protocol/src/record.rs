//! Raw replicated rows and their sync bookkeeping fields.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Field names every synchronizable row carries.
pub(crate) mod fields {
    pub const ID: &str = "id";
    pub const TENANT_ID: &str = "tenant_id";
    pub const BRANCH_ID: &str = "branch_id";
    pub const UPDATED_AT: &str = "updated_at";
    pub const SYNC_STATE: &str = "sync_state";
    pub const ORIGIN: &str = "origin";
    pub const SYNC_VERSION: &str = "sync_version";
}

/// The tenant owning a row; the top-level isolation boundary.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Creates a tenant identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TenantId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Replication state of a row.
///
/// Transitions only forward under normal operation: `pending` rows become
/// `synced` once the center confirms a merge. The sync engine is the only
/// writer of this field after the row is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    /// Locally modified, not yet confirmed by the center.
    Pending,
    /// Confirmed merged at the center.
    Synced,
    /// Rejected by the center as stale.
    Conflict,
}

impl SyncState {
    /// Returns the wire name of this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncState::Pending => "pending",
            SyncState::Synced => "synced",
            SyncState::Conflict => "conflict",
        }
    }

    /// Parses a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(SyncState::Pending),
            "synced" => Some(SyncState::Synced),
            "conflict" => Some(SyncState::Conflict),
            _ => None,
        }
    }
}

/// Which side most recently authored a row's current value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Origin {
    /// Authored at this branch.
    Local,
    /// Authored at (or relayed through) the center.
    Central,
}

impl Origin {
    /// Returns the wire name of this origin.
    pub fn as_str(&self) -> &'static str {
        match self {
            Origin::Local => "local",
            Origin::Central => "central",
        }
    }

    /// Parses a wire name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "local" => Some(Origin::Local),
            "central" => Some(Origin::Central),
            _ => None,
        }
    }
}

/// A raw replicated row, exchanged verbatim between agent and center.
///
/// Rows are schemaless JSON objects; the entity-specific columns travel
/// untouched. The accessors below read and write only the bookkeeping
/// fields the sync engine owns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(Map<String, Value>);

impl RawRecord {
    /// Creates an empty row.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Wraps an existing JSON object.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self(map)
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn str_field(&self, name: &str) -> Option<&str> {
        self.0.get(name).and_then(Value::as_str)
    }

    /// Returns the row identifier, if present.
    pub fn id(&self) -> Option<&str> {
        self.str_field(fields::ID)
    }

    /// Returns the owning tenant, if present.
    pub fn tenant_id(&self) -> Option<TenantId> {
        self.str_field(fields::TENANT_ID).map(TenantId::from)
    }

    /// Returns the owning branch, if present.
    pub fn branch_id(&self) -> Option<&str> {
        self.str_field(fields::BRANCH_ID)
    }

    /// Returns the last-modified timestamp, if present and well-formed.
    ///
    /// This is the sole ordering signal used for conflict resolution.
    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.str_field(fields::UPDATED_AT)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|dt| dt.with_timezone(&Utc))
    }

    /// Returns the replication state, if present and well-formed.
    pub fn sync_state(&self) -> Option<SyncState> {
        self.str_field(fields::SYNC_STATE).and_then(SyncState::parse)
    }

    /// Returns the origin, if present and well-formed.
    pub fn origin(&self) -> Option<Origin> {
        self.str_field(fields::ORIGIN).and_then(Origin::parse)
    }

    /// Returns the sync version counter (0 if absent).
    pub fn sync_version(&self) -> u64 {
        self.0
            .get(fields::SYNC_VERSION)
            .and_then(Value::as_u64)
            .unwrap_or(0)
    }

    /// Sets an arbitrary field.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Sets the last-modified timestamp.
    pub fn set_updated_at(&mut self, at: DateTime<Utc>) {
        self.0.insert(
            fields::UPDATED_AT.into(),
            Value::String(at.to_rfc3339_opts(chrono::SecondsFormat::Secs, true)),
        );
    }

    /// Sets the replication state.
    pub fn set_sync_state(&mut self, state: SyncState) {
        self.0
            .insert(fields::SYNC_STATE.into(), Value::String(state.as_str().into()));
    }

    /// Sets the origin.
    pub fn set_origin(&mut self, origin: Origin) {
        self.0
            .insert(fields::ORIGIN.into(), Value::String(origin.as_str().into()));
    }

    /// Increments the sync version counter.
    ///
    /// Only called on confirmed central merge.
    pub fn bump_sync_version(&mut self) {
        let next = self.sync_version() + 1;
        self.0
            .insert(fields::SYNC_VERSION.into(), Value::Number(next.into()));
    }
}

impl Default for RawRecord {
    fn default() -> Self {
        Self::new()
    }
}
