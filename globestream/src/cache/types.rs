//! Shared cache types and errors.

use std::any::Any;
use std::sync::Arc;
use thiserror::Error;

/// Default memory cache capacity: 256 MB.
pub const DEFAULT_MEMORY_CACHE_CAPACITY: usize = 256 * 1024 * 1024;

/// A decoded object held by a [`MemoryCache`].
///
/// The cache assigns no meaning to the payload; callers downcast to the
/// concrete decoded type (texture, elevation grid, parsed document) on
/// retrieval. Cloning is an `Arc` bump, so a hit never copies the object.
///
/// [`MemoryCache`]: super::MemoryCache
pub type CacheObject = Arc<dyn Any + Send + Sync>;

/// Errors that can occur during cache operations.
#[derive(Debug, Error)]
pub enum CacheError {
    /// An entry's declared size exceeds the cache's total capacity.
    ///
    /// Such an entry is rejected outright rather than evicting every
    /// other entry in a futile attempt to fit it.
    #[error("object of {size} bytes exceeds total cache capacity of {capacity} bytes")]
    ObjectTooLarge { size: usize, capacity: usize },

    /// Invalid configuration value.
    #[error("invalid cache configuration: {0}")]
    InvalidConfig(String),

    /// A cache with this name is already registered in the set.
    #[error("cache '{0}' is already registered")]
    AlreadyRegistered(String),
}

/// Configuration for a [`MemoryCache`].
///
/// [`MemoryCache`]: super::MemoryCache
#[derive(Debug, Clone)]
pub struct MemoryCacheConfig {
    /// Maximum total of declared entry sizes in bytes.
    pub capacity: usize,
}

impl Default for MemoryCacheConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_MEMORY_CACHE_CAPACITY,
        }
    }
}

impl MemoryCacheConfig {
    /// Create a configuration with the given capacity in bytes.
    pub fn new(capacity: usize) -> Self {
        Self { capacity }
    }

    /// Set the capacity in bytes.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }
}
