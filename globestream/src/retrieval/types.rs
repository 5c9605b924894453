//! Core retrieval types: identity, priority, and errors.

use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Priority
// =============================================================================

/// Scheduling priority for a retrieval.
///
/// Higher values are serviced first; submissions with equal priority run in
/// FIFO order. The named constants cover the common tiers, and arbitrary
/// values can be constructed for finer control between them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Priority(u32);

impl Priority {
    /// Background maintenance work (cache sweeps, revalidation).
    pub const HOUSEKEEPING: Priority = Priority(10);

    /// Speculative fetches ahead of demand.
    pub const PREFETCH: Priority = Priority(50);

    /// Work a caller is actively waiting on.
    pub const ON_DEMAND: Priority = Priority(100);

    /// Create a priority with an explicit level.
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    /// The numeric level.
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl Default for Priority {
    fn default() -> Self {
        Self::PREFETCH
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match *self {
            Self::ON_DEMAND => write!(f, "on-demand"),
            Self::PREFETCH => write!(f, "prefetch"),
            Self::HOUSEKEEPING => write!(f, "housekeeping"),
            Self(value) => write!(f, "{value}"),
        }
    }
}

// =============================================================================
// Retrieval Key
// =============================================================================

/// Identity of one retrieval: the resource key plus the resolved target.
///
/// Two submissions with the same `RetrievalKey` are duplicates; the service
/// coalesces them onto a single fetch. The target is part of the identity so
/// that the same resource key fetched from two sources (e.g. a mirror
/// failover) is not wrongly deduplicated.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RetrievalKey {
    key: String,
    target: String,
}

impl RetrievalKey {
    /// Build a key from a resource key and its resolved target.
    pub fn new(key: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            target: target.into(),
        }
    }

    /// The opaque resource key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// The resolved target (URL, path) the bytes come from.
    pub fn target(&self) -> &str {
        &self.target
    }
}

impl std::fmt::Display for RetrievalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} @ {}", self.key, self.target)
    }
}

// =============================================================================
// Errors
// =============================================================================

/// A failed retrieval.
///
/// Cloneable because a coalesced retrieval reports one failure to every
/// holder of the shared future. I/O detail is carried as rendered text for
/// the same reason (`std::io::Error` is not `Clone`).
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum RetrievalError {
    /// The transfer did not complete within the retriever's time budget.
    #[error("retrieval timed out after {0:?}")]
    Timeout(Duration),

    /// The target reports the resource does not exist (HTTP 404, missing
    /// file). The usual trigger for
    /// [`mark_resource_absent`](crate::absent::AbsentResourceList::mark_resource_absent).
    #[error("{target} has no such resource")]
    NotFound { target: String },

    /// The target answered with a non-success status.
    #[error("{target} returned status {status}")]
    Status { status: u16, target: String },

    /// The transfer started but failed partway.
    #[error("transfer failed: {0}")]
    Transfer(String),

    /// Local I/O failure (file open, read, write).
    #[error("i/o error: {0}")]
    Io(String),

    /// The retriever or post-processor panicked; caught at the task
    /// boundary so the worker pool keeps running.
    #[error("retrieval task panicked")]
    Panicked,
}

/// Rejected submission.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum SubmitError {
    /// The service is shutting down or has shut down.
    #[error("retrieval service is not accepting submissions")]
    Unavailable,

    /// The retriever's resource key is empty.
    #[error("retrieval key is empty")]
    EmptyKey,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering() {
        assert!(Priority::ON_DEMAND > Priority::PREFETCH);
        assert!(Priority::PREFETCH > Priority::HOUSEKEEPING);
        assert!(Priority::new(51) > Priority::PREFETCH);
    }

    #[test]
    fn test_priority_default() {
        assert_eq!(Priority::default(), Priority::PREFETCH);
    }

    #[test]
    fn test_priority_display() {
        assert_eq!(format!("{}", Priority::ON_DEMAND), "on-demand");
        assert_eq!(format!("{}", Priority::new(42)), "42");
    }

    #[test]
    fn test_retrieval_key_identity() {
        let a = RetrievalKey::new("tile/9/14/7", "https://a.example/9/14/7.jpg");
        let b = RetrievalKey::new("tile/9/14/7", "https://a.example/9/14/7.jpg");
        let mirror = RetrievalKey::new("tile/9/14/7", "https://b.example/9/14/7.jpg");

        assert_eq!(a, b);
        assert_ne!(a, mirror, "a different target is a different retrieval");
    }

    #[test]
    fn test_retrieval_key_display() {
        let key = RetrievalKey::new("tile/1", "file:///data/tile1");
        assert_eq!(format!("{key}"), "tile/1 @ file:///data/tile1");
    }

    #[test]
    fn test_error_display() {
        let err = RetrievalError::Status {
            status: 404,
            target: "https://example.com/t.jpg".to_string(),
        };
        assert_eq!(format!("{err}"), "https://example.com/t.jpg returned status 404");

        let err = RetrievalError::Timeout(Duration::from_secs(30));
        assert!(format!("{err}").contains("timed out"));
    }

    #[test]
    fn test_submit_error_display() {
        assert_eq!(
            format!("{}", SubmitError::Unavailable),
            "retrieval service is not accepting submissions"
        );
        assert_eq!(format!("{}", SubmitError::EmptyKey), "retrieval key is empty");
    }
}
