//! Configuration for the edge agent.

use std::time::Duration;

/// Configuration for the sync agent.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Base address of the central endpoints.
    pub server_url: String,
    /// Optional bearer credential for authenticating to the center.
    pub auth_token: Option<String>,
    /// Sleep between loop iterations.
    pub sync_interval: Duration,
    /// Maximum pending rows per entity kind per push.
    pub push_batch_size: usize,
    /// Bound on every remote call.
    pub request_timeout: Duration,
    /// Backoff applied after wholly-failed iterations.
    pub backoff: BackoffConfig,
}

impl AgentConfig {
    /// Creates a configuration with defaults for everything but the
    /// server address.
    pub fn new(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            auth_token: None,
            sync_interval: Duration::from_secs(60),
            push_batch_size: 200,
            request_timeout: Duration::from_secs(30),
            backoff: BackoffConfig::default(),
        }
    }

    /// Sets the bearer credential.
    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    /// Sets the loop interval.
    pub fn with_sync_interval(mut self, interval: Duration) -> Self {
        self.sync_interval = interval;
        self
    }

    /// Sets the per-kind push batch size.
    pub fn with_push_batch_size(mut self, size: usize) -> Self {
        self.push_batch_size = size;
        self
    }

    /// Sets the remote call timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Sets the backoff configuration.
    pub fn with_backoff(mut self, backoff: BackoffConfig) -> Self {
        self.backoff = backoff;
        self
    }
}

/// Bounded multiplicative backoff for consecutive failed iterations.
///
/// The original system slept a fixed interval regardless of outcome; this
/// is a deliberate, documented deviation. An iteration counts as failed
/// only when both phases failed, and any success resets the counter.
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Multiplier applied per consecutive failure.
    pub multiplier: f64,
    /// Upper bound on the stretched sleep.
    pub max_delay: Duration,
}

impl BackoffConfig {
    /// Creates a backoff configuration.
    pub fn new(multiplier: f64, max_delay: Duration) -> Self {
        Self { multiplier, max_delay }
    }

    /// Backoff disabled: the sleep is always the base interval.
    pub fn none() -> Self {
        Self {
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Sleep for the next iteration given the base interval and the
    /// number of consecutive wholly-failed iterations.
    pub fn delay_after(&self, base: Duration, consecutive_failures: u32) -> Duration {
        if consecutive_failures == 0 || self.multiplier <= 1.0 {
            return base;
        }

        let stretched = base.as_secs_f64() * self.multiplier.powi(consecutive_failures as i32);
        let cap = self.max_delay.max(base);
        Duration::from_secs_f64(stretched.min(cap.as_secs_f64()))
    }
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self::new(2.0, Duration::from_secs(600))
    }
}
