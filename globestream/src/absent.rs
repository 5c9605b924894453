//! Absent-resource tracking with retry backoff.
//!
//! When a fetch fails, the caller marks the resource absent; before
//! resubmitting it asks whether the resource is still considered absent.
//! Tracking is bounded: a fixed number of keys is held in first-insertion
//! order, and inserting beyond capacity evicts the oldest tracked key
//! regardless of how recently it failed.
//!
//! # Backoff windows
//!
//! ```text
//! failures < max_tries   absent inside [last_failure, last_failure + check_interval)
//! failures ≥ max_tries   absent inside [last_failure, last_failure + try_again_interval)
//! ```
//!
//! The shorter check interval is an early re-probe window: while a resource
//! has failed only a few times, callers may retry soon, keeping perceived
//! latency low for intermittently flaky sources. Once the failure count
//! reaches `max_tries`, the full try-again backoff applies.
//!
//! There is no operation that clears a key on success; callers simply stop
//! marking it, and the entry ages out or is evicted by capacity pressure.
//!
//! # Thread Safety
//!
//! Interior mutability via `Mutex`; a mark is visible to `is_resource_absent`
//! from any thread as soon as the marking call returns.

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, trace};

/// Default maximum number of tracked keys.
pub const DEFAULT_ABSENT_LIST_CAPACITY: usize = 2048;

/// Default failure-count threshold for the full backoff.
pub const DEFAULT_MAX_TRIES: u32 = 3;

/// Default early re-probe window below the failure threshold.
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_secs(10);

/// Default full backoff window at or above the failure threshold.
pub const DEFAULT_TRY_AGAIN_INTERVAL: Duration = Duration::from_secs(60);

/// Errors from absent-list configuration.
#[derive(Debug, Error)]
pub enum AbsentListError {
    /// Invalid configuration value.
    #[error("invalid absent-list configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for an [`AbsentResourceList`].
#[derive(Debug, Clone)]
pub struct AbsentListConfig {
    /// Maximum number of tracked keys (default: 2048).
    pub capacity: usize,
    /// Failure count at which the full backoff applies (default: 3).
    pub max_tries: u32,
    /// Early re-probe window while below `max_tries` (default: 10s).
    pub check_interval: Duration,
    /// Full backoff window at or above `max_tries` (default: 60s).
    pub try_again_interval: Duration,
}

impl Default for AbsentListConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_ABSENT_LIST_CAPACITY,
            max_tries: DEFAULT_MAX_TRIES,
            check_interval: DEFAULT_CHECK_INTERVAL,
            try_again_interval: DEFAULT_TRY_AGAIN_INTERVAL,
        }
    }
}

impl AbsentListConfig {
    /// Set the maximum number of tracked keys.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity;
        self
    }

    /// Set the failure-count threshold.
    pub fn with_max_tries(mut self, max_tries: u32) -> Self {
        self.max_tries = max_tries;
        self
    }

    /// Set the early re-probe window.
    pub fn with_check_interval(mut self, interval: Duration) -> Self {
        self.check_interval = interval;
        self
    }

    /// Set the full backoff window.
    pub fn with_try_again_interval(mut self, interval: Duration) -> Self {
        self.try_again_interval = interval;
        self
    }

    fn validate(&self) -> Result<(), AbsentListError> {
        if self.capacity == 0 {
            return Err(AbsentListError::InvalidConfig(
                "capacity must be at least one".to_string(),
            ));
        }
        if self.max_tries == 0 {
            return Err(AbsentListError::InvalidConfig(
                "max tries must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// One tracked key.
#[derive(Debug)]
struct AbsentEntry {
    failures: u32,
    last_failure: Instant,
}

/// Map and insertion order, guarded together. `order` holds exactly the
/// map's keys; capacity eviction is the only removal, so the two never
/// drift apart.
#[derive(Debug)]
struct Inner {
    entries: HashMap<String, AbsentEntry>,
    order: VecDeque<String>,
    max_tries: u32,
}

/// Bounded tracker for resources whose recent fetches failed.
///
/// # Example
///
/// ```
/// use globestream::absent::{AbsentListConfig, AbsentResourceList};
///
/// let absent = AbsentResourceList::default();
/// absent.mark_resource_absent("imagery/9/14/7.jpg");
///
/// // Within the backoff window the caller should not resubmit.
/// assert!(absent.is_resource_absent("imagery/9/14/7.jpg"));
/// assert!(!absent.is_resource_absent("elevation/2/1/0.bil"));
/// # let _ = AbsentListConfig::default();
/// ```
#[derive(Debug)]
pub struct AbsentResourceList {
    config: AbsentListConfig,
    inner: Mutex<Inner>,
}

impl Default for AbsentResourceList {
    fn default() -> Self {
        let config = AbsentListConfig::default();
        let max_tries = config.max_tries;
        Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                max_tries,
            }),
        }
    }
}

impl AbsentResourceList {
    /// Create a list from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`AbsentListError::InvalidConfig`] if the capacity or
    /// failure threshold is zero.
    pub fn new(config: AbsentListConfig) -> Result<Self, AbsentListError> {
        config.validate()?;
        let max_tries = config.max_tries;
        Ok(Self {
            config,
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                max_tries,
            }),
        })
    }

    /// Record a failed fetch for `key`.
    ///
    /// Increments the failure count of a tracked key, or inserts a new
    /// entry. If the list is at capacity and `key` is new, the oldest
    /// tracked key (by first insertion, not by failure recency) is evicted
    /// to make room.
    pub fn mark_resource_absent(&self, key: &str) {
        let mut inner = self.lock();
        let now = Instant::now();

        if let Some(entry) = inner.entries.get_mut(key) {
            entry.failures = entry.failures.saturating_add(1);
            entry.last_failure = now;
            trace!(key, failures = entry.failures, "Marked resource absent");
            return;
        }

        if inner.entries.len() >= self.config.capacity {
            if let Some(oldest) = inner.order.pop_front() {
                inner.entries.remove(&oldest);
                debug!(evicted = %oldest, "Absent list at capacity, evicted oldest key");
            }
        }

        inner.order.push_back(key.to_string());
        inner.entries.insert(
            key.to_string(),
            AbsentEntry {
                failures: 1,
                last_failure: now,
            },
        );
        trace!(key, failures = 1, "Marked resource absent");
    }

    /// Whether `key` is currently considered absent.
    ///
    /// Below the failure threshold, a key is absent only inside the short
    /// check interval after its last failure; at or above the threshold,
    /// inside the full try-again interval. Untracked keys are never absent.
    pub fn is_resource_absent(&self, key: &str) -> bool {
        let inner = self.lock();
        let Some(entry) = inner.entries.get(key) else {
            return false;
        };
        let elapsed = entry.last_failure.elapsed();
        if entry.failures >= inner.max_tries {
            elapsed < self.config.try_again_interval
        } else {
            elapsed < self.config.check_interval
        }
    }

    /// Change the failure-count threshold.
    ///
    /// Takes effect for the next query; tracked keys are re-evaluated
    /// against the new threshold without needing to fail again.
    ///
    /// # Errors
    ///
    /// Returns [`AbsentListError::InvalidConfig`] for a zero threshold.
    pub fn set_max_tries(&self, max_tries: u32) -> Result<(), AbsentListError> {
        if max_tries == 0 {
            return Err(AbsentListError::InvalidConfig(
                "max tries must be at least one".to_string(),
            ));
        }
        let mut inner = self.lock();
        inner.max_tries = max_tries;
        debug!(max_tries, "Absent list failure threshold changed");
        Ok(())
    }

    /// The current failure-count threshold.
    pub fn max_tries(&self) -> u32 {
        self.lock().max_tries
    }

    /// Maximum number of tracked keys.
    pub fn capacity(&self) -> usize {
        self.config.capacity
    }

    /// Number of currently tracked keys.
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    /// Whether no keys are tracked.
    pub fn is_empty(&self) -> bool {
        self.lock().entries.is_empty()
    }

    /// Tracked state is a plain map; poisoning is not propagated.
    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
