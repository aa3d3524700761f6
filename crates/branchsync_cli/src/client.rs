//! Blocking HTTP client for the daemon.

use branchsync_agent::HttpClient;
use std::time::Duration;

/// [`HttpClient`] backed by a blocking reqwest client.
///
/// Owns the bearer credential and the bounded request timeout; every call
/// either returns a 2xx body or an error string for the transport layer
/// to classify.
pub struct ReqwestClient {
    client: reqwest::blocking::Client,
    auth_token: Option<String>,
}

impl ReqwestClient {
    /// Builds a client with the given timeout and optional credential.
    pub fn new(timeout: Duration, auth_token: Option<String>) -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self { client, auth_token })
    }

    fn authorize(
        &self,
        request: reqwest::blocking::RequestBuilder,
    ) -> reqwest::blocking::RequestBuilder {
        match &self.auth_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn finish(response: reqwest::blocking::Response) -> Result<String, String> {
        let status = response.status();
        if !status.is_success() {
            return Err(format!("server returned {status}"));
        }
        response.text().map_err(|e| format!("read response: {e}"))
    }
}

impl HttpClient for ReqwestClient {
    fn post(&self, url: &str, body: String) -> Result<String, String> {
        let request = self
            .authorize(self.client.post(url))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);
        let response = request.send().map_err(|e| e.to_string())?;
        Self::finish(response)
    }

    fn get(&self, url: &str) -> Result<String, String> {
        let request = self.authorize(self.client.get(url));
        let response = request.send().map_err(|e| e.to_string())?;
        Self::finish(response)
    }
}
