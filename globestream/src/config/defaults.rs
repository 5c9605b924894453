//! Default configuration values.
//!
//! Components export their own `DEFAULT_*` constants next to the code
//! they govern; this module maps them onto config file sections so a
//! freshly written config.ini and a missing one behave identically.

use super::file::config_directory;
use super::settings::{
    AbsentSettings, CacheSettings, ConfigFile, LoggingSettings, RetrievalSettings, StoreSettings,
};
use crate::absent::{
    DEFAULT_ABSENT_LIST_CAPACITY, DEFAULT_CHECK_INTERVAL, DEFAULT_MAX_TRIES,
    DEFAULT_TRY_AGAIN_INTERVAL,
};
use crate::cache::DEFAULT_MEMORY_CACHE_CAPACITY;
use crate::retrieval::DEFAULT_POOL_SIZE;
use crate::store::default_cache_root;

// =============================================================================
// Logging defaults
// =============================================================================

/// Default log file name inside the config directory.
pub const DEFAULT_LOG_FILE_NAME: &str = "globestream.log";

// =============================================================================
// ConfigFile::default()
// =============================================================================

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            retrieval: RetrievalSettings {
                pool_size: DEFAULT_POOL_SIZE,
            },
            cache: CacheSettings {
                memory_size: DEFAULT_MEMORY_CACHE_CAPACITY,
            },
            store: StoreSettings {
                directory: default_cache_root(),
                read_only_roots: Vec::new(),
            },
            absent: AbsentSettings {
                capacity: DEFAULT_ABSENT_LIST_CAPACITY,
                max_tries: DEFAULT_MAX_TRIES,
                check_interval_secs: DEFAULT_CHECK_INTERVAL.as_secs(),
                try_again_interval_secs: DEFAULT_TRY_AGAIN_INTERVAL.as_secs(),
            },
            logging: LoggingSettings {
                file: config_directory().join(DEFAULT_LOG_FILE_NAME),
            },
        }
    }
}
