//! Transport seam between the agent and the central endpoints.

use crate::error::{AgentError, AgentResult};
use branchsync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use parking_lot::Mutex;

/// Network communication with the central endpoints.
///
/// Implementations include the HTTP transport in [`crate::HttpTransport`],
/// the mock below, and in-process bridges in the integration tests.
pub trait CentralTransport: Send + Sync {
    /// Sends a push batch to Central Apply.
    fn push(&self, request: &PushRequest) -> AgentResult<PushResponse>;

    /// Requests changes since a watermark from Central Collect.
    fn collect(&self, request: &PullRequest) -> AgentResult<PullResponse>;
}

/// A scripted transport for tests.
#[derive(Default)]
pub struct MockTransport {
    push_responses: Mutex<Vec<AgentResult<PushResponse>>>,
    collect_responses: Mutex<Vec<AgentResult<PullResponse>>>,
    pushed: Mutex<Vec<PushRequest>>,
    collected: Mutex<Vec<PullRequest>>,
}

impl MockTransport {
    /// Creates a mock with no scripted responses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues the next push response.
    pub fn queue_push(&self, response: AgentResult<PushResponse>) {
        self.push_responses.lock().push(response);
    }

    /// Queues the next collect response.
    pub fn queue_collect(&self, response: AgentResult<PullResponse>) {
        self.collect_responses.lock().push(response);
    }

    /// Push requests seen so far.
    pub fn pushed(&self) -> Vec<PushRequest> {
        self.pushed.lock().clone()
    }

    /// Collect requests seen so far.
    pub fn collected(&self) -> Vec<PullRequest> {
        self.collected.lock().clone()
    }
}

impl CentralTransport for MockTransport {
    fn push(&self, request: &PushRequest) -> AgentResult<PushResponse> {
        self.pushed.lock().push(request.clone());
        let mut responses = self.push_responses.lock();
        if responses.is_empty() {
            return Err(AgentError::Protocol("no mock push response queued".into()));
        }
        responses.remove(0)
    }

    fn collect(&self, request: &PullRequest) -> AgentResult<PullResponse> {
        self.collected.lock().push(*request);
        let mut responses = self.collect_responses.lock();
        if responses.is_empty() {
            return Err(AgentError::Protocol("no mock collect response queued".into()));
        }
        responses.remove(0)
    }
}
