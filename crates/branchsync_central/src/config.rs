//! Central endpoint configuration.

/// Configuration for the central sync handlers.
#[derive(Debug, Clone)]
pub struct CentralConfig {
    /// Maximum number of records accepted in one push batch.
    pub max_push_records: usize,
}

impl CentralConfig {
    /// Creates a configuration with the given push batch limit.
    pub fn new(max_push_records: usize) -> Self {
        Self { max_push_records }
    }

    /// Sets the push batch limit.
    pub fn with_max_push_records(mut self, max: usize) -> Self {
        self.max_push_records = max;
        self
    }
}

impl Default for CentralConfig {
    fn default() -> Self {
        Self::new(1000)
    }
}
