//! Settings structs for all configuration sections.
//!
//! Each struct represents one `[section]` of the INI config file.
//! These are pure data types with no parsing or serialization logic;
//! conversion into component configs lives here so callers go from a
//! loaded file to running components without touching raw values.

use crate::absent::AbsentListConfig;
use crate::cache::MemoryCacheConfig;
use crate::retrieval::RetrievalConfig;
use crate::store::FileStoreConfig;
use std::path::PathBuf;
use std::time::Duration;

/// Complete application configuration loaded from config.ini.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    /// Retrieval pool settings
    pub retrieval: RetrievalSettings,
    /// Memory cache settings
    pub cache: CacheSettings,
    /// File store settings
    pub store: StoreSettings,
    /// Absent-resource backoff settings
    pub absent: AbsentSettings,
    /// Logging settings
    pub logging: LoggingSettings,
}

/// Retrieval pool configuration.
#[derive(Debug, Clone)]
pub struct RetrievalSettings {
    /// Number of parallel retrieval workers.
    pub pool_size: usize,
}

/// Memory cache configuration.
#[derive(Debug, Clone)]
pub struct CacheSettings {
    /// Memory cache capacity in bytes.
    pub memory_size: usize,
}

/// File store configuration.
#[derive(Debug, Clone)]
pub struct StoreSettings {
    /// Writable store root.
    pub directory: PathBuf,
    /// Read-only roots searched after the writable root (bundled data).
    pub read_only_roots: Vec<PathBuf>,
}

/// Absent-resource backoff configuration.
#[derive(Debug, Clone)]
pub struct AbsentSettings {
    /// Maximum number of tracked keys.
    pub capacity: usize,
    /// Failures before the full backoff applies.
    pub max_tries: u32,
    /// Early re-probe window in seconds while below `max_tries`.
    pub check_interval_secs: u64,
    /// Full backoff window in seconds at or above `max_tries`.
    pub try_again_interval_secs: u64,
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingSettings {
    /// Log file path
    pub file: PathBuf,
}

impl ConfigFile {
    /// Retrieval service configuration from the `[retrieval]` section.
    pub fn retrieval_config(&self) -> RetrievalConfig {
        RetrievalConfig::default().with_pool_size(self.retrieval.pool_size)
    }

    /// Memory cache configuration from the `[cache]` section.
    pub fn memory_cache_config(&self) -> MemoryCacheConfig {
        MemoryCacheConfig::new(self.cache.memory_size)
    }

    /// File store configuration from the `[store]` section.
    pub fn file_store_config(&self) -> FileStoreConfig {
        let mut config = FileStoreConfig::default().with_cache_root(self.store.directory.clone());
        for root in &self.store.read_only_roots {
            config = config.with_read_only_root(root.clone());
        }
        config
    }

    /// Absent-list configuration from the `[absent]` section.
    pub fn absent_list_config(&self) -> AbsentListConfig {
        AbsentListConfig::default()
            .with_capacity(self.absent.capacity)
            .with_max_tries(self.absent.max_tries)
            .with_check_interval(Duration::from_secs(self.absent.check_interval_secs))
            .with_try_again_interval(Duration::from_secs(self.absent.try_again_interval_secs))
    }
}
