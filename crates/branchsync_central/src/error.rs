//! Error types for the central endpoints.

use thiserror::Error;

/// Result type for central operations.
pub type CentralResult<T> = Result<T, CentralError>;

/// Errors that can occur in the central endpoints.
#[derive(Error, Debug)]
pub enum CentralError {
    /// The request is malformed or exceeds configured limits.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The store refused to commit; the whole batch was rolled back.
    #[error("store error: {0}")]
    Store(String),
}

impl CentralError {
    /// Returns true if this is a client error (4xx).
    pub fn is_client_error(&self) -> bool {
        matches!(self, CentralError::InvalidRequest(_))
    }
}
