//! End-to-end agent tests against a real central handler, bridged
//! in-process instead of over HTTP.

use branchsync_agent::{
    AgentConfig, AgentError, AgentResult, BackoffConfig, CentralTransport, LocalStore, MemoryStore,
    SyncAgent,
};
use branchsync_central::{CentralConfig, CentralError, SyncHandler};
use branchsync_protocol::{
    EntityKind, Origin, PullRequest, PullResponse, PushRequest, PushResponse, RawRecord, SyncBatch,
    SyncDirection, SyncLogStatus, SyncState, TenantId,
};
use chrono::{DateTime, TimeZone, Utc};
use serde_json::{json, Value};
use std::sync::Arc;

/// Routes agent requests straight into a [`SyncHandler`], the way the
/// HTTP transport would over the wire.
struct HandlerTransport {
    handler: Arc<SyncHandler>,
    tenant: TenantId,
}

impl HandlerTransport {
    fn new(handler: Arc<SyncHandler>, tenant: &str) -> Self {
        Self {
            handler,
            tenant: TenantId::from(tenant),
        }
    }
}

impl CentralTransport for HandlerTransport {
    fn push(&self, request: &PushRequest) -> AgentResult<PushResponse> {
        self.handler
            .handle_push(&self.tenant, None, request.clone())
            .map_err(central_to_agent)
    }

    fn collect(&self, request: &PullRequest) -> AgentResult<PullResponse> {
        self.handler
            .handle_collect(&self.tenant, *request)
            .map_err(central_to_agent)
    }
}

fn central_to_agent(err: CentralError) -> AgentError {
    match err {
        CentralError::InvalidRequest(msg) => AgentError::Protocol(msg),
        CentralError::Store(msg) => AgentError::Server(msg),
    }
}

fn at(hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, hour, 0, 0).unwrap()
}

fn record_for(tenant: &str, id: &str, hour: u32) -> RawRecord {
    match json!({
        "id": id,
        "tenant_id": tenant,
        "updated_at": format!("2024-01-02T{hour:02}:00:00Z"),
    }) {
        Value::Object(map) => RawRecord::from_map(map),
        _ => unreachable!(),
    }
}

fn record(id: &str, hour: u32) -> RawRecord {
    record_for("acme", id, hour)
}

fn agent_for(
    handler: &Arc<SyncHandler>,
    store: MemoryStore,
    tenant: &str,
) -> SyncAgent<HandlerTransport, MemoryStore> {
    SyncAgent::new(
        AgentConfig::new("bridge://").with_backoff(BackoffConfig::none()),
        HandlerTransport::new(Arc::clone(handler), tenant),
        store,
        TenantId::from(tenant),
    )
}

#[test]
fn pending_sale_reaches_the_center_and_is_confirmed_locally() {
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));
    let store = MemoryStore::new();
    store.insert_local(EntityKind::Sale, record("s-1", 9));

    let agent = agent_for(&handler, store, "acme");
    let outcome = agent.push_once().unwrap();

    assert_eq!(outcome.sent, 1);
    assert_eq!(outcome.applied, 1);
    assert_eq!(outcome.conflicts, 0);

    // Central now holds the row and logged exactly one successful push
    let tenant = TenantId::from("acme");
    assert!(handler.store().get(&tenant, EntityKind::Sale, "s-1").is_some());
    let entries = handler.log().entries_for(&tenant);
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].direction, SyncDirection::Push);
    assert_eq!(entries[0].status, SyncLogStatus::Success);

    // Locally the row is confirmed
    let row = agent.store().record(EntityKind::Sale, "s-1").unwrap();
    assert_eq!(row.sync_state(), Some(SyncState::Synced));
    assert_eq!(row.origin(), Some(Origin::Local));
    assert_eq!(row.sync_version(), 1);
}

#[test]
fn second_push_has_nothing_left_to_send() {
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));
    let store = MemoryStore::new();
    store.insert_local(EntityKind::Sale, record("s-1", 9));

    let agent = agent_for(&handler, store, "acme");
    agent.push_once().unwrap();
    let outcome = agent.push_once().unwrap();

    assert_eq!(outcome.sent, 0);
    assert_eq!(handler.store().len(&TenantId::from("acme"), EntityKind::Sale), 1);
    assert_eq!(handler.log().len(), 1);
}

#[test]
fn stale_push_loses_but_is_still_confirmed_locally() {
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));
    let tenant = TenantId::from("acme");

    // The center already holds a 10:00 version of the product
    handler
        .handle_push(
            &tenant,
            None,
            PushRequest::new(
                at(10),
                vec![SyncBatch::new(EntityKind::Product, vec![record("p-1", 10)])],
            ),
        )
        .unwrap();

    // The branch pushes an offline 09:00 edit of the same row
    let store = MemoryStore::new();
    let mut stale = record("p-1", 9);
    stale.set("name", Value::String("offline rename".into()));
    store.insert_local(EntityKind::Product, stale);

    let agent = agent_for(&handler, store, "acme");
    let outcome = agent.push_once().unwrap();

    assert_eq!(outcome.applied, 0);
    assert_eq!(outcome.conflicts, 1);

    // The center kept its newer version
    let stored = handler.store().get(&tenant, EntityKind::Product, "p-1").unwrap();
    assert_eq!(stored.updated_at(), Some(at(10)));

    // The branch row was marked synced regardless of the rejection; the
    // losing edit will not be retried and only a later pull reconciles it
    let row = agent.store().record(EntityKind::Product, "p-1").unwrap();
    assert_eq!(row.sync_state(), Some(SyncState::Synced));

    let entries = handler.log().entries_for(&tenant);
    assert_eq!(entries[1].status, SyncLogStatus::Conflict);
}

#[test]
fn pull_applies_central_changes_and_advances_the_watermark() {
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));
    let tenant = TenantId::from("acme");

    handler
        .handle_push(
            &tenant,
            None,
            PushRequest::new(
                at(10),
                vec![
                    SyncBatch::new(EntityKind::Product, vec![record("p-1", 9), record("p-2", 10)]),
                    SyncBatch::new(EntityKind::Category, vec![record("c-1", 10)]),
                ],
            ),
        )
        .unwrap();

    let agent = agent_for(&handler, MemoryStore::new(), "acme");
    let before = Utc::now();
    let outcome = agent.pull_once().unwrap();

    assert_eq!(outcome.batches, 2);
    assert_eq!(outcome.records, 3);
    assert!(outcome.watermark >= before);

    assert!(agent.store().record(EntityKind::Product, "p-1").is_some());
    assert!(agent.store().record(EntityKind::Product, "p-2").is_some());
    assert!(agent.store().record(EntityKind::Category, "c-1").is_some());
    assert_eq!(
        agent.store().latest_pull_watermark(&tenant).unwrap(),
        Some(outcome.watermark)
    );

    // The next pull starts from the new watermark and finds nothing new
    let next = agent.pull_once().unwrap();
    assert_eq!(next.records, 0);
    assert!(next.watermark >= outcome.watermark);
}

#[test]
fn tenants_never_see_each_other() {
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));

    let acme_store = MemoryStore::new();
    acme_store.insert_local(EntityKind::Product, record_for("acme", "p-1", 9));
    let acme = agent_for(&handler, acme_store, "acme");
    acme.push_once().unwrap();

    let globex = agent_for(&handler, MemoryStore::new(), "globex");
    let outcome = globex.pull_once().unwrap();

    assert_eq!(outcome.records, 0);
    assert!(globex.store().record(EntityKind::Product, "p-1").is_none());
}

#[test]
fn transport_failure_leaves_rows_pending_for_the_next_iteration() {
    struct DownTransport;
    impl CentralTransport for DownTransport {
        fn push(&self, _: &PushRequest) -> AgentResult<PushResponse> {
            Err(AgentError::transport_retryable("connection refused"))
        }
        fn collect(&self, _: &PullRequest) -> AgentResult<PullResponse> {
            Err(AgentError::transport_retryable("connection refused"))
        }
    }

    let store = MemoryStore::new();
    store.insert_local(EntityKind::Sale, record("s-1", 9));
    let offline = SyncAgent::new(
        AgentConfig::new("bridge://").with_backoff(BackoffConfig::none()),
        DownTransport,
        store,
        TenantId::from("acme"),
    );

    let outcome = offline.run_once();
    assert!(outcome.all_failed());
    let row = offline.store().record(EntityKind::Sale, "s-1").unwrap();
    assert_eq!(row.sync_state(), Some(SyncState::Pending));

    // Next iteration, now that the center is reachable, the same row goes out
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));
    let store = MemoryStore::new();
    store.insert_local(EntityKind::Sale, row);
    let agent = agent_for(&handler, store, "acme");
    let outcome = agent.run_once();

    assert_eq!(outcome.push.unwrap().applied, 1);
    assert!(outcome.pull.is_some());
}

#[test]
fn refused_central_commit_keeps_the_branch_pending() {
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));
    handler.store().set_commit_failure(true);

    let store = MemoryStore::new();
    store.insert_local(EntityKind::Sale, record("s-1", 9));
    let agent = agent_for(&handler, store, "acme");

    assert!(agent.push_once().is_err());

    // Nothing landed centrally, nothing was logged, the row stays pending
    assert!(handler.store().is_empty());
    assert!(handler.log().is_empty());
    let row = agent.store().record(EntityKind::Sale, "s-1").unwrap();
    assert_eq!(row.sync_state(), Some(SyncState::Pending));
}

#[test]
fn full_iteration_round_trips_both_directions() {
    let handler = Arc::new(SyncHandler::new(CentralConfig::default()));
    let tenant = TenantId::from("acme");

    // Another branch already sold something
    handler
        .handle_push(
            &tenant,
            None,
            PushRequest::new(at(10), vec![SyncBatch::new(EntityKind::Sale, vec![record("s-9", 10)])]),
        )
        .unwrap();

    let store = MemoryStore::new();
    store.insert_local(EntityKind::Sale, record("s-1", 11));
    let agent = agent_for(&handler, store, "acme");

    let outcome = agent.run_once();
    assert_eq!(outcome.push.unwrap().applied, 1);
    // The pull returns both sales: the other branch's and our own echo
    assert_eq!(outcome.pull.unwrap().records, 2);

    assert!(agent.store().record(EntityKind::Sale, "s-9").is_some());
    let stats = agent.stats();
    assert_eq!(stats.iterations, 1);
    assert_eq!(stats.records_pushed, 1);
    assert_eq!(stats.records_pulled, 2);
}
