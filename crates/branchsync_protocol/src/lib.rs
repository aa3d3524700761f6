//! # BranchSync Protocol
//!
//! Wire types and shared data model for BranchSync replication.
//!
//! This crate provides:
//! - `RawRecord` and the sync bookkeeping fields carried by every row
//! - The closed entity registry (the replication allowlist)
//! - Push/pull request and response messages (JSON on the wire)
//! - The last-write-wins conflict resolver
//! - `SyncLogEntry`, the audit-trail-plus-cursor record
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod log;
mod messages;
mod record;
mod registry;
mod resolve;

pub use log::{SyncDirection, SyncLogEntry, SyncLogStatus};
pub use messages::{PullRequest, PullResponse, PushRequest, PushResponse, SyncBatch};
pub use record::{Origin, RawRecord, SyncState, TenantId};
pub use registry::{EntityDescriptor, EntityKind};
pub use resolve::{resolve, MergeOutcome};
