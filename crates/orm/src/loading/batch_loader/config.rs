use crate::error::{ModelError, ModelResult};

/// Configuration for batch loading operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Largest key set sent in one query. `None` sends every key set in a
    /// single query, so a relation always costs exactly one round trip.
    pub max_batch_size: Option<usize>,
    /// Maximum depth of nested includes
    pub max_depth: usize,
    /// Run sibling relations of the same level concurrently
    pub parallel_siblings: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_batch_size: None,
            max_depth: 10,
            parallel_siblings: false,
        }
    }
}

impl BatchConfig {
    pub fn validate(&self) -> ModelResult<()> {
        if self.max_batch_size == Some(0) {
            return Err(ModelError::Configuration(
                "max_batch_size must be greater than zero".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(ModelError::Configuration(
                "max_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
