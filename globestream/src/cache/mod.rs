//! In-memory object caching.
//!
//! The memory tier of the pipeline: decoded objects live in bounded
//! [`MemoryCache`] instances, one per resource class, registered in a
//! [`MemoryCacheSet`]. The persistent byte tier lives in
//! [`crate::store`].
//!
//! # Components
//!
//! - [`MemoryCache`] - byte-accounted LRU store for decoded objects
//! - [`MemoryCacheSet`] - named registry of caches with set-wide statistics
//! - [`CacheStats`] / [`CacheSnapshot`] - observability counters
//!
//! # Example
//!
//! ```
//! use globestream::cache::{MemoryCache, MemoryCacheSet};
//! use std::sync::Arc;
//!
//! let caches = MemoryCacheSet::new();
//! caches
//!     .add_cache("textures", Arc::new(MemoryCache::new("textures", 64 * 1024).unwrap()))
//!     .unwrap();
//!
//! let textures = caches.get_cache("textures").unwrap();
//! textures.put("tile/9/14/7", Arc::new(vec![0u8; 512]), 512).unwrap();
//! assert_eq!(textures.entry_count(), 1);
//! ```

mod memory;
mod registry;
mod stats;
mod types;

pub use memory::MemoryCache;
pub use registry::MemoryCacheSet;
pub use stats::{CacheSnapshot, CacheStats};
pub use types::{CacheError, CacheObject, MemoryCacheConfig, DEFAULT_MEMORY_CACHE_CAPACITY};
