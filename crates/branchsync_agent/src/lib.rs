//! # BranchSync Agent
//!
//! The edge side of BranchSync replication: an unattended loop that keeps
//! a branch-local store eventually consistent with the center across
//! unreliable connectivity.
//!
//! This crate provides:
//! - `SyncAgent`, the push-then-pull-then-sleep control loop
//! - `LocalStore`, the seam to the branch-local transactional store, with
//!   in-memory and JSON-file implementations
//! - `CentralTransport`, the seam to the central endpoints, with an HTTP
//!   transport abstraction and a mock for tests
//!
//! ## Architecture
//!
//! The agent is strictly single-threaded and cooperative: push and pull
//! never overlap, each phase catches its own failures, and a failing phase
//! neither blocks the other nor crashes the process. Termination is
//! external.
//!
//! ## Key invariants
//!
//! - The sync engine never originates business data; it only mutates the
//!   three bookkeeping fields (`sync_state`, `origin`, `sync_version`)
//! - The center is authoritative during pull: rows are upserted with no
//!   conflict detection
//! - The pull watermark is non-decreasing and survives restarts (it is the
//!   latest confirmed pull entry in the local sync log)

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod agent;
mod config;
mod error;
mod http;
mod store;
mod transport;

pub use agent::{AgentStats, IterationOutcome, PullOutcome, PushOutcome, SyncAgent};
pub use config::{AgentConfig, BackoffConfig};
pub use error::{AgentError, AgentResult};
pub use http::{HttpClient, HttpTransport};
pub use store::{JsonStore, LocalStore, MemoryStore};
pub use transport::{CentralTransport, MockTransport};
