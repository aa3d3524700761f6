//! Error types for the edge agent.

use thiserror::Error;

/// Result type for agent operations.
pub type AgentResult<T> = Result<T, AgentError>;

/// Errors that can occur in the edge agent.
#[derive(Error, Debug)]
pub enum AgentError {
    /// Network or transport error reaching the center.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether a later iteration can expect to succeed.
        retryable: bool,
    },

    /// The center answered with something that is not the protocol.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// The center rejected the request.
    #[error("server error: {0}")]
    Server(String),

    /// Branch-local store failure.
    #[error("local store error: {0}")]
    Store(String),

    /// The local store holds no tenant row to scope the agent to.
    #[error("no tenant found in local store")]
    MissingTenant,
}

impl AgentError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if a later iteration can expect to succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            AgentError::Transport { retryable, .. } => *retryable,
            AgentError::Server(_) => true,
            AgentError::Store(_) => true,
            AgentError::Protocol(_) | AgentError::MissingTenant => false,
        }
    }
}
