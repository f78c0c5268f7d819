//! Store configuration.

/// Default maximum number of entities per batch-insert request.
pub const DEFAULT_MAX_BATCH_SIZE: usize = 100;

/// Default minimum backend API version for batch insert.
pub const DEFAULT_MULTI_INSERT_MIN_API_VERSION: u32 = 5;

/// Tunables for a data store instance.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Maximum entities per batch-insert request; larger batches are
    /// chunked and chunks submitted sequentially.
    pub max_batch_size: usize,
    /// Enables delta-set fetches on pull.
    pub delta_set: bool,
    /// Minimum backend API version required for batch insert.
    pub multi_insert_min_api_version: u32,
}

impl StoreConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self {
            max_batch_size: DEFAULT_MAX_BATCH_SIZE,
            delta_set: false,
            multi_insert_min_api_version: DEFAULT_MULTI_INSERT_MIN_API_VERSION,
        }
    }

    /// Sets the batch chunking threshold.
    #[must_use]
    pub fn with_max_batch_size(mut self, size: usize) -> Self {
        self.max_batch_size = size;
        self
    }

    /// Enables or disables delta-set fetches.
    #[must_use]
    pub fn with_delta_set(mut self, enabled: bool) -> Self {
        self.delta_set = enabled;
        self
    }

    /// Overrides the minimum API version required for batch insert.
    #[must_use]
    pub fn with_multi_insert_min_api_version(mut self, version: u32) -> Self {
        self.multi_insert_min_api_version = version;
        self
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_builder() {
        let config = StoreConfig::new()
            .with_max_batch_size(10)
            .with_delta_set(true)
            .with_multi_insert_min_api_version(6);

        assert_eq!(config.max_batch_size, 10);
        assert!(config.delta_set);
        assert_eq!(config.multi_insert_min_api_version, 6);
    }

    #[test]
    fn defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.max_batch_size, DEFAULT_MAX_BATCH_SIZE);
        assert!(!config.delta_set);
    }
}
