//! HTTP transport implementation.
//!
//! The actual HTTP client is abstracted via a trait so different
//! libraries can sit underneath (the daemon uses reqwest; tests use a
//! scripted client). Request and response bodies are the JSON wire
//! shapes from `branchsync_protocol`.

use crate::error::{AgentError, AgentResult};
use crate::transport::CentralTransport;
use branchsync_protocol::{PullRequest, PullResponse, PushRequest, PushResponse};
use chrono::SecondsFormat;

/// HTTP client abstraction.
///
/// Implementations own connection pooling, the bearer credential, and the
/// bounded request timeout.
pub trait HttpClient: Send + Sync {
    /// Sends a POST with a JSON body; returns the response body.
    fn post(&self, url: &str, body: String) -> Result<String, String>;

    /// Sends a GET; returns the response body.
    fn get(&self, url: &str) -> Result<String, String>;
}

/// HTTP-based transport to the central endpoints.
///
/// Push: `POST {base}/sync/push`. Pull: `GET {base}/sync/collect?since=...`.
pub struct HttpTransport<C: HttpClient> {
    base_url: String,
    client: C,
}

impl<C: HttpClient> HttpTransport<C> {
    /// Creates a transport against the given base address.
    pub fn new(base_url: impl Into<String>, client: C) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, client }
    }

    /// Returns the base address.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl<C: HttpClient> CentralTransport for HttpTransport<C> {
    fn push(&self, request: &PushRequest) -> AgentResult<PushResponse> {
        let body = serde_json::to_string(request)
            .map_err(|e| AgentError::Protocol(format!("encode push request: {e}")))?;

        let url = format!("{}/sync/push", self.base_url);
        let response = self
            .client
            .post(&url, body)
            .map_err(AgentError::transport_retryable)?;

        serde_json::from_str(&response)
            .map_err(|e| AgentError::Protocol(format!("decode push response: {e}")))
    }

    fn collect(&self, request: &PullRequest) -> AgentResult<PullResponse> {
        let url = match request.since {
            Some(since) => format!(
                "{}/sync/collect?since={}",
                self.base_url,
                since.to_rfc3339_opts(SecondsFormat::Secs, true)
            ),
            None => format!("{}/sync/collect", self.base_url),
        };

        let response = self.client.get(&url).map_err(AgentError::transport_retryable)?;

        serde_json::from_str(&response)
            .map_err(|e| AgentError::Protocol(format!("decode collect response: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct ScriptedClient {
        response: Mutex<Option<Result<String, String>>>,
        urls: Mutex<Vec<String>>,
    }

    impl ScriptedClient {
        fn respond(&self, response: Result<String, String>) {
            *self.response.lock() = Some(response);
        }

        fn urls(&self) -> Vec<String> {
            self.urls.lock().clone()
        }
    }

    impl HttpClient for ScriptedClient {
        fn post(&self, url: &str, _body: String) -> Result<String, String> {
            self.urls.lock().push(url.to_string());
            self.response.lock().clone().unwrap_or(Err("no response".into()))
        }

        fn get(&self, url: &str) -> Result<String, String> {
            self.urls.lock().push(url.to_string());
            self.response.lock().clone().unwrap_or(Err("no response".into()))
        }
    }

    #[test]
    fn push_posts_to_the_push_endpoint() {
        let client = ScriptedClient::default();
        client.respond(Ok(r#"{"applied":2,"conflicts":1}"#.into()));
        let transport = HttpTransport::new("https://center.example.com/", client);

        let response = transport
            .push(&PushRequest::new(Utc::now(), vec![]))
            .unwrap();
        assert_eq!(response, PushResponse { applied: 2, conflicts: 1 });
        assert_eq!(
            transport.client.urls(),
            vec!["https://center.example.com/sync/push"]
        );
    }

    #[test]
    fn collect_encodes_the_watermark_as_a_query_parameter() {
        let client = ScriptedClient::default();
        client.respond(Ok(r#"{"timestamp":"2024-01-02T10:00:00Z","entities":[]}"#.into()));
        let transport = HttpTransport::new("https://center.example.com", client);

        let since = Utc.with_ymd_and_hms(2024, 1, 2, 9, 0, 0).unwrap();
        transport.collect(&PullRequest::since(Some(since))).unwrap();
        assert_eq!(
            transport.client.urls(),
            vec!["https://center.example.com/sync/collect?since=2024-01-02T09:00:00Z"]
        );

        transport.collect(&PullRequest::since(None)).unwrap();
        assert_eq!(
            transport.client.urls()[1],
            "https://center.example.com/sync/collect"
        );
    }

    #[test]
    fn transport_errors_are_retryable() {
        let client = ScriptedClient::default();
        client.respond(Err("connection refused".into()));
        let transport = HttpTransport::new("https://center.example.com", client);

        let err = transport.collect(&PullRequest::since(None)).unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn garbage_responses_are_protocol_errors() {
        let client = ScriptedClient::default();
        client.respond(Ok("<html>gateway error</html>".into()));
        let transport = HttpTransport::new("https://center.example.com", client);

        let err = transport.push(&PushRequest::new(Utc::now(), vec![])).unwrap_err();
        assert!(matches!(err, AgentError::Protocol(_)));
        assert!(!err.is_retryable());
    }
}
