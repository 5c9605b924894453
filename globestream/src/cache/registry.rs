//! Named registry of independent memory caches.
//!
//! A virtual globe typically partitions its decoded objects by resource
//! class (imagery textures separate from elevation grids, say) so that a
//! burst in one class cannot evict another class wholesale.
//! [`MemoryCacheSet`] is that registry: a concurrent map
//! from name to [`MemoryCache`], plus set-wide statistics collection. It is
//! not itself a cache.

use crate::cache::memory::MemoryCache;
use crate::cache::stats::{CacheSnapshot, CacheStats};
use crate::cache::types::CacheError;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::debug;

/// Registry of named [`MemoryCache`] instances.
///
/// All operations are safe under concurrent access; registration and lookup
/// go through a concurrent map, so collaborators on different threads can
/// lazily register their caches without external locking.
#[derive(Debug, Default)]
pub struct MemoryCacheSet {
    caches: DashMap<String, Arc<MemoryCache>>,
}

impl MemoryCacheSet {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a cache under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::AlreadyRegistered`] if the name is taken; the
    /// existing cache is left in place.
    pub fn add_cache(
        &self,
        name: impl Into<String>,
        cache: Arc<MemoryCache>,
    ) -> Result<(), CacheError> {
        let name = name.into();
        match self.caches.entry(name.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(CacheError::AlreadyRegistered(name))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                debug!(cache = %name, "Registered memory cache");
                slot.insert(cache);
                Ok(())
            }
        }
    }

    /// Look up a cache by name.
    pub fn get_cache(&self, name: &str) -> Option<Arc<MemoryCache>> {
        self.caches.get(name).map(|entry| entry.value().clone())
    }

    /// Whether a cache is registered under `name`.
    pub fn contains_cache(&self, name: &str) -> bool {
        self.caches.contains_key(name)
    }

    /// Return the registered cache for `name`, creating it with `init` if
    /// absent. Concurrent callers observe the same instance.
    pub fn get_or_insert_with(
        &self,
        name: impl Into<String>,
        init: impl FnOnce() -> Arc<MemoryCache>,
    ) -> Arc<MemoryCache> {
        self.caches.entry(name.into()).or_insert_with(init).clone()
    }

    /// Remove and return the cache registered under `name`.
    pub fn remove_cache(&self, name: &str) -> Option<Arc<MemoryCache>> {
        self.caches.remove(name).map(|(_, cache)| cache)
    }

    /// Every registered cache, for statistics collection.
    pub fn all_caches(&self) -> Vec<Arc<MemoryCache>> {
        self.caches
            .iter()
            .map(|entry| entry.value().clone())
            .collect()
    }

    /// Number of registered caches.
    pub fn len(&self) -> usize {
        self.caches.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.caches.is_empty()
    }

    /// Empty every registered cache. Used on low-memory signals.
    pub fn clear_all(&self) {
        for entry in self.caches.iter() {
            entry.value().clear();
        }
    }

    /// Counters summed across every registered cache.
    pub fn aggregate_stats(&self) -> CacheStats {
        let mut total = CacheStats::new();
        for entry in self.caches.iter() {
            total.merge(&entry.value().stats());
        }
        total
    }

    /// Per-cache snapshots, sorted by name for stable reporting.
    pub fn snapshots(&self) -> Vec<CacheSnapshot> {
        let mut snapshots: Vec<CacheSnapshot> = self
            .caches
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.name.cmp(&b.name));
        snapshots
    }
}
