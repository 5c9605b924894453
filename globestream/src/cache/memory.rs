//! In-memory LRU cache for decoded objects.
//!
//! [`MemoryCache`] holds already-decoded objects (textures, elevation grids,
//! parsed documents) keyed by resource key, with capacity accounted in bytes
//! against the size each caller declares at insertion. When an insertion
//! would exceed capacity, least-recently-used entries are evicted until the
//! new entry fits.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │                MemoryCache                 │
//! │  ┌──────────────────────────────────────┐  │
//! │  │ Mutex<Inner>                         │  │
//! │  │   entries: key → (object, size, …)   │  │
//! │  │   used ≤ capacity                    │  │
//! │  └──────────────────────────────────────┘  │
//! │  get: touch + Arc clone     put: evict→fit │
//! └────────────────────────────────────────────┘
//! ```
//!
//! Entry recency is tracked with a logical clock (a counter bumped on every
//! touch) rather than wall-clock time, so LRU order is total and never
//! depends on timer resolution.
//!
//! # Example
//!
//! ```
//! use globestream::cache::MemoryCache;
//! use std::sync::Arc;
//!
//! let cache = MemoryCache::new("textures", 1024).unwrap();
//! cache.put("tile/3/4/2", Arc::new(vec![0u8; 64]), 64).unwrap();
//!
//! let object = cache.get("tile/3/4/2").unwrap();
//! let bytes = object.downcast::<Vec<u8>>().unwrap();
//! assert_eq!(bytes.len(), 64);
//! ```

use crate::cache::stats::{CacheSnapshot, CacheStats};
use crate::cache::types::{CacheError, CacheObject, MemoryCacheConfig};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

/// A single cached entry.
struct CacheEntry {
    /// The decoded object.
    object: CacheObject,
    /// Declared size in bytes, counted against capacity.
    size: usize,
    /// Logical timestamp of the last access.
    last_access: u64,
}

/// Map, usage counter and clock, guarded together so eviction is atomic
/// with respect to concurrent lookups.
struct Inner {
    entries: HashMap<String, CacheEntry>,
    used: usize,
    capacity: usize,
    clock: u64,
}

impl Inner {
    fn tick(&mut self) -> u64 {
        self.clock += 1;
        self.clock
    }

    /// Evict least-recently-used entries until `required` additional bytes
    /// fit. Returns the number of entries evicted.
    fn evict_until_fits(&mut self, required: usize) -> u64 {
        if self.used + required <= self.capacity {
            return 0;
        }

        let mut by_age: Vec<(String, u64)> = self
            .entries
            .iter()
            .map(|(key, entry)| (key.clone(), entry.last_access))
            .collect();
        by_age.sort_by_key(|(_, stamp)| *stamp);

        let mut evicted = 0;
        for (key, _) in by_age {
            if self.used + required <= self.capacity {
                break;
            }
            if let Some(entry) = self.entries.remove(&key) {
                self.used -= entry.size;
                evicted += 1;
            }
        }
        evicted
    }
}

/// Bounded in-memory key→object store with LRU eviction.
///
/// All operations are safe under concurrent access from completion
/// callbacks and caller threads. The object payload is opaque; see
/// [`CacheObject`].
pub struct MemoryCache {
    name: String,
    inner: Mutex<Inner>,
    stats: Mutex<CacheStats>,
}

impl MemoryCache {
    /// Create a cache with the given name and capacity in bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if `capacity` is zero.
    pub fn new(name: impl Into<String>, capacity: usize) -> Result<Self, CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        Ok(Self {
            name: name.into(),
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                used: 0,
                capacity,
                clock: 0,
            }),
            stats: Mutex::new(CacheStats::new()),
        })
    }

    /// Create a cache from a [`MemoryCacheConfig`].
    pub fn with_config(
        name: impl Into<String>,
        config: &MemoryCacheConfig,
    ) -> Result<Self, CacheError> {
        Self::new(name, config.capacity)
    }

    /// The registry name of this cache.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Insert an object under `key`, declaring its size in bytes.
    ///
    /// Replaces any existing entry for the same key (the old size is
    /// released first). Evicts least-recently-used entries until the new
    /// entry fits.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::ObjectTooLarge`] if `size` exceeds the total
    /// capacity; the cache is left unchanged.
    pub fn put(
        &self,
        key: impl Into<String>,
        object: CacheObject,
        size: usize,
    ) -> Result<(), CacheError> {
        let key = key.into();
        let evicted = {
            let mut inner = self.lock_inner();

            if size > inner.capacity {
                return Err(CacheError::ObjectTooLarge {
                    size,
                    capacity: inner.capacity,
                });
            }

            if let Some(old) = inner.entries.remove(&key) {
                inner.used -= old.size;
            }

            let evicted = inner.evict_until_fits(size);
            let stamp = inner.tick();
            inner.entries.insert(
                key.clone(),
                CacheEntry {
                    object,
                    size,
                    last_access: stamp,
                },
            );
            inner.used += size;
            evicted
        };

        if evicted > 0 {
            debug!(cache = %self.name, key = %key, evicted, "Evicted LRU entries to fit new object");
        }

        let mut stats = self.lock_stats();
        stats.record_put();
        stats.record_evictions(evicted);
        Ok(())
    }

    /// Look up an object, marking it most recently used.
    pub fn get(&self, key: &str) -> Option<CacheObject> {
        let found = {
            let mut inner = self.lock_inner();
            let stamp = inner.tick();
            inner.entries.get_mut(key).map(|entry| {
                entry.last_access = stamp;
                entry.object.clone()
            })
        };

        let mut stats = self.lock_stats();
        if found.is_some() {
            stats.record_hit();
        } else {
            stats.record_miss();
        }
        found
    }

    /// Whether `key` currently has a live entry. Does not touch recency.
    pub fn contains(&self, key: &str) -> bool {
        self.lock_inner().entries.contains_key(key)
    }

    /// Remove the entry for `key`, releasing its declared size.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, key: &str) -> bool {
        let mut inner = self.lock_inner();
        match inner.entries.remove(key) {
            Some(entry) => {
                inner.used -= entry.size;
                true
            }
            None => false,
        }
    }

    /// Total capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.lock_inner().capacity
    }

    /// Resize the cache, evicting LRU entries if the new capacity is below
    /// current usage.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::InvalidConfig`] if `capacity` is zero.
    pub fn set_capacity(&self, capacity: usize) -> Result<(), CacheError> {
        if capacity == 0 {
            return Err(CacheError::InvalidConfig(
                "capacity must be greater than zero".to_string(),
            ));
        }
        let evicted = {
            let mut inner = self.lock_inner();
            inner.capacity = capacity;
            inner.evict_until_fits(0)
        };
        if evicted > 0 {
            debug!(cache = %self.name, capacity, evicted, "Evicted entries after capacity shrink");
        }
        self.lock_stats().record_evictions(evicted);
        Ok(())
    }

    /// Sum of declared entry sizes currently held. Never exceeds
    /// [`capacity`](Self::capacity).
    pub fn used_capacity(&self) -> usize {
        self.lock_inner().used
    }

    /// Number of live entries.
    pub fn entry_count(&self) -> usize {
        self.lock_inner().entries.len()
    }

    /// Remove every entry. Usage drops to zero; statistics are preserved.
    pub fn clear(&self) {
        let mut inner = self.lock_inner();
        inner.entries.clear();
        inner.used = 0;
    }

    /// Cumulative usage counters.
    pub fn stats(&self) -> CacheStats {
        self.lock_stats().clone()
    }

    /// Point-in-time snapshot for statistics collection.
    pub fn snapshot(&self) -> CacheSnapshot {
        let (entry_count, used, capacity) = {
            let inner = self.lock_inner();
            (inner.entries.len(), inner.used, inner.capacity)
        };
        CacheSnapshot {
            name: self.name.clone(),
            entry_count,
            used_capacity: used,
            capacity,
            stats: self.stats(),
        }
    }

    /// The cache state is a plain map; if a thread panicked mid-operation
    /// the data is still consistent, so poisoning is not propagated.
    fn lock_inner(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_stats(&self) -> MutexGuard<'_, CacheStats> {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for MemoryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock_inner();
        f.debug_struct("MemoryCache")
            .field("name", &self.name)
            .field("entries", &inner.entries.len())
            .field("used", &inner.used)
            .field("capacity", &inner.capacity)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn object(len: usize) -> CacheObject {
        Arc::new(vec![0u8; len])
    }

    #[test]
    fn test_new_rejects_zero_capacity() {
        let result = MemoryCache::new("bad", 0);
        assert!(matches!(result, Err(CacheError::InvalidConfig(_))));
    }

    #[test]
    fn test_put_and_get_roundtrip() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        cache
            .put("tile/1", Arc::new("terrain".to_string()), 100)
            .unwrap();

        let found = cache.get("tile/1").expect("entry should be present");
        let text = found.downcast::<String>().expect("stored a String");
        assert_eq!(*text, "terrain");
    }

    #[test]
    fn test_get_missing_returns_none() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        assert!(cache.get("absent").is_none());
        assert_eq!(cache.stats().misses, 1);
    }

    #[test]
    fn test_usage_accounting() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        cache.put("a", object(100), 100).unwrap();
        cache.put("b", object(200), 200).unwrap();

        assert_eq!(cache.used_capacity(), 300);
        assert_eq!(cache.entry_count(), 2);
        assert_eq!(cache.capacity(), 1024);
    }

    #[test]
    fn test_replace_same_key_releases_old_size() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        cache.put("a", object(400), 400).unwrap();
        cache.put("a", object(100), 100).unwrap();

        assert_eq!(cache.used_capacity(), 100);
        assert_eq!(cache.entry_count(), 1);
    }

    #[test]
    fn test_lru_eviction_prefers_cold_entries() {
        let cache = MemoryCache::new("test", 100).unwrap();
        cache.put("a", object(40), 40).unwrap();
        cache.put("b", object(40), 40).unwrap();

        // Touch "a" so "b" becomes the LRU entry.
        assert!(cache.get("a").is_some());

        cache.put("c", object(40), 40).unwrap();

        assert!(cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("c"));
        assert_eq!(cache.used_capacity(), 80);
    }

    #[test]
    fn test_eviction_removes_multiple_until_fit() {
        let cache = MemoryCache::new("test", 100).unwrap();
        cache.put("a", object(40), 40).unwrap();
        cache.put("b", object(40), 40).unwrap();
        cache.put("big", object(90), 90).unwrap();

        assert!(!cache.contains("a"));
        assert!(!cache.contains("b"));
        assert!(cache.contains("big"));
        assert_eq!(cache.stats().evictions, 2);
    }

    #[test]
    fn test_oversized_entry_rejected() {
        let cache = MemoryCache::new("test", 100).unwrap();
        cache.put("a", object(60), 60).unwrap();

        let result = cache.put("huge", object(200), 200);

        assert!(matches!(
            result,
            Err(CacheError::ObjectTooLarge {
                size: 200,
                capacity: 100
            })
        ));
        // Rejection must not disturb existing entries.
        assert!(cache.contains("a"));
        assert_eq!(cache.used_capacity(), 60);
    }

    #[test]
    fn test_used_capacity_never_exceeds_capacity() {
        let cache = MemoryCache::new("test", 256).unwrap();
        for i in 0..50 {
            cache.put(format!("key/{i}"), object(32), 32).unwrap();
            assert!(cache.used_capacity() <= cache.capacity());
        }
    }

    #[test]
    fn test_remove_releases_size() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        cache.put("a", object(100), 100).unwrap();

        assert!(cache.remove("a"));
        assert!(!cache.remove("a"));
        assert_eq!(cache.used_capacity(), 0);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_set_capacity_rejects_zero() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        assert!(matches!(
            cache.set_capacity(0),
            Err(CacheError::InvalidConfig(_))
        ));
        assert_eq!(cache.capacity(), 1024);
    }

    #[test]
    fn test_set_capacity_shrink_evicts_down() {
        let cache = MemoryCache::new("test", 300).unwrap();
        cache.put("a", object(100), 100).unwrap();
        cache.put("b", object(100), 100).unwrap();
        cache.put("c", object(100), 100).unwrap();

        // Touch "a" so the shrink drops "b" and "c".
        assert!(cache.get("a").is_some());
        cache.set_capacity(150).unwrap();

        assert!(cache.contains("a"));
        assert_eq!(cache.entry_count(), 1);
        assert!(cache.used_capacity() <= 150);
    }

    #[test]
    fn test_clear_empties_cache() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        cache.put("a", object(100), 100).unwrap();
        cache.put("b", object(100), 100).unwrap();

        cache.clear();

        assert_eq!(cache.entry_count(), 0);
        assert_eq!(cache.used_capacity(), 0);
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn test_stats_counters() {
        let cache = MemoryCache::new("test", 1024).unwrap();
        cache.put("a", object(10), 10).unwrap();
        cache.get("a");
        cache.get("a");
        cache.get("missing");

        let stats = cache.stats();
        assert_eq!(stats.puts, 1);
        assert_eq!(stats.hits, 2);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.hit_rate(), 2.0 / 3.0);
    }

    #[test]
    fn test_snapshot_reflects_state() {
        let cache = MemoryCache::new("elevation", 500).unwrap();
        cache.put("grid/1", object(120), 120).unwrap();

        let snapshot = cache.snapshot();

        assert_eq!(snapshot.name, "elevation");
        assert_eq!(snapshot.entry_count, 1);
        assert_eq!(snapshot.used_capacity, 120);
        assert_eq!(snapshot.capacity, 500);
        assert_eq!(snapshot.stats.puts, 1);
    }

    #[test]
    fn test_concurrent_access_keeps_invariant() {
        let cache = Arc::new(MemoryCache::new("test", 1000).unwrap());
        let mut handles = Vec::new();

        for t in 0..4 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..100 {
                    let key = format!("t{t}/k{i}");
                    cache.put(&key, Arc::new(i), 50).unwrap();
                    cache.get(&key);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.used_capacity() <= cache.capacity());
        assert!(cache.entry_count() <= 20);
    }
}
