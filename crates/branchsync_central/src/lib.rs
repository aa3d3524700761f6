//! # BranchSync Central
//!
//! The center side of BranchSync replication.
//!
//! This crate provides:
//! - `SyncHandler` with the two central operations: apply (push-serving)
//!   and collect (pull-serving)
//! - `RecordStore`, the tenant-scoped authoritative record store with
//!   all-or-nothing batch commits
//! - `SyncLogStore`, the append-only audit log
//!
//! # Architecture
//!
//! Handlers are transport-agnostic: the HTTP framing, routing and request
//! authentication are external collaborators. A real deployment exposes
//! `POST /sync/push` and `GET /sync/collect` endpoints that call
//! `handle_push()` and `handle_collect()` with the authenticated tenant.
//!
//! Many independent agents (one per branch) call in concurrently;
//! correctness relies only on per-record, per-tenant isolation, not global
//! locking.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod error;
mod handler;
mod log;
mod store;

pub use config::CentralConfig;
pub use error::{CentralError, CentralResult};
pub use handler::{MergeSummary, SyncHandler};
pub use log::SyncLogStore;
pub use store::{RecordStore, StagedWrite};
