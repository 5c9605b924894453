//! Cache statistics tracking and reporting.

/// Usage counters for a single memory cache.
///
/// Counters are cumulative since the cache was created. They exist for
/// observability only; no eviction or capacity decision depends on them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub puts: u64,
    pub evictions: u64,
}

impl CacheStats {
    /// Create a zeroed statistics tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }

    /// Record a lookup that found a live entry.
    pub fn record_hit(&mut self) {
        self.hits += 1;
    }

    /// Record a lookup that found nothing.
    pub fn record_miss(&mut self) {
        self.misses += 1;
    }

    /// Record a successful insertion.
    pub fn record_put(&mut self) {
        self.puts += 1;
    }

    /// Record evicted entries.
    pub fn record_evictions(&mut self, count: u64) {
        self.evictions += count;
    }

    /// Merge another counter set into this one.
    ///
    /// Used when aggregating statistics across a cache set.
    pub fn merge(&mut self, other: &CacheStats) {
        self.hits += other.hits;
        self.misses += other.misses;
        self.puts += other.puts;
        self.evictions += other.evictions;
    }
}

/// Point-in-time view of one cache inside a [`MemoryCacheSet`].
///
/// [`MemoryCacheSet`]: super::MemoryCacheSet
#[derive(Debug, Clone)]
pub struct CacheSnapshot {
    /// Registry name of the cache.
    pub name: String,
    /// Number of live entries.
    pub entry_count: usize,
    /// Sum of declared entry sizes in bytes.
    pub used_capacity: usize,
    /// Configured capacity in bytes.
    pub capacity: usize,
    /// Cumulative counters.
    pub stats: CacheStats,
}

impl CacheSnapshot {
    /// Format the snapshot as a single human-readable line.
    pub fn format(&self) -> String {
        format!(
            "{}: {} entries, {}/{} bytes, hits: {} ({:.1}%), evictions: {}",
            self.name,
            self.entry_count,
            self.used_capacity,
            self.capacity,
            self.stats.hits,
            self.stats.hit_rate() * 100.0,
            self.stats.evictions,
        )
    }
}
