//! Retrieval service configuration.

use thiserror::Error;

/// Default number of parallel retrieval workers.
///
/// Four workers keeps a typical imagery source saturated without tripping
/// per-client connection limits; callers with faster upstreams can resize
/// the pool at runtime.
pub const DEFAULT_POOL_SIZE: usize = 4;

/// Errors from retrieval service configuration.
#[derive(Debug, Error)]
pub enum RetrievalConfigError {
    /// Invalid configuration value.
    #[error("invalid retrieval configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for a [`RetrievalService`](super::RetrievalService).
#[derive(Debug, Clone)]
pub struct RetrievalConfig {
    /// Number of parallel workers (default: 4).
    pub pool_size: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            pool_size: DEFAULT_POOL_SIZE,
        }
    }
}

impl RetrievalConfig {
    /// Set the worker pool size.
    pub fn with_pool_size(mut self, pool_size: usize) -> Self {
        self.pool_size = pool_size;
        self
    }

    pub(crate) fn validate(&self) -> Result<(), RetrievalConfigError> {
        if self.pool_size == 0 {
            return Err(RetrievalConfigError::InvalidConfig(
                "pool size must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = RetrievalConfig::default();
        assert_eq!(config.pool_size, DEFAULT_POOL_SIZE);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_with_pool_size() {
        let config = RetrievalConfig::default().with_pool_size(16);
        assert_eq!(config.pool_size, 16);
    }

    #[test]
    fn test_zero_pool_size_rejected() {
        let config = RetrievalConfig::default().with_pool_size(0);
        assert!(matches!(
            config.validate(),
            Err(RetrievalConfigError::InvalidConfig(_))
        ));
    }
}
