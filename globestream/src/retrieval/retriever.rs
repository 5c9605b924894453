//! Retriever and post-processor contracts.
//!
//! A [`Retriever`] describes one fetch: where the bytes come from, how long
//! to wait for them, and (optionally) what happens to them afterwards. The
//! service stays protocol-agnostic; retrievers interpret HTTP statuses, file
//! paths, or whatever else their target needs, and hand back plain bytes.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                    RetrievalService                      │
//! │                                                          │
//! │  worker ──▶ Retriever::fetch(ctx) ──▶ bytes or error     │
//! │                        │                                 │
//! │                        ▼                                 │
//! │         RetrievalPostProcessor::process(key, result)     │
//! │               (decode, store, mark absent)               │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! The post-processor runs exactly once per completed fetch, on success or
//! failure; a retrieval cancelled before completion skips it.

use super::types::{RetrievalError, RetrievalKey};
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Default connect timeout for retrievers that do not override it.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(8);

/// Default read timeout for retrievers that do not override it.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Cancellation context handed to a running fetch.
///
/// Long transfers should check [`is_cancelled`](Self::is_cancelled) between
/// chunks, or select against [`cancelled`](Self::cancelled), so a cancelled
/// retrieval stops moving bytes promptly. The service also races the fetch
/// against the same token, so a fetch that never checks is still interrupted
/// at its next await point.
#[derive(Clone, Debug)]
pub struct RetrievalContext {
    cancel: CancellationToken,
}

impl RetrievalContext {
    pub(crate) fn new(cancel: CancellationToken) -> Self {
        Self { cancel }
    }

    /// Whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves when cancellation is requested.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await;
    }
}

/// One fetchable unit of work.
///
/// Implementations are shared across the submitting caller and the worker
/// pool, so they must be `Send + Sync`; per-fetch mutable state belongs in
/// the future returned by [`fetch`](Self::fetch), not in the retriever.
///
/// # Example
///
/// ```ignore
/// use globestream::retrieval::{Priority, RetrievalService};
///
/// let mut future = service.run_retriever(retriever, Priority::ON_DEMAND)?;
/// let outcome = future.wait().await;
/// println!("done: {outcome:?}");
/// ```
pub trait Retriever: Send + Sync {
    /// Stable resource key; uniquely names the logical resource.
    fn key(&self) -> &str;

    /// Resolved target the bytes come from (URL, file path).
    ///
    /// Together with [`key`](Self::key) this forms the dedup identity: two
    /// submissions with the same key and target coalesce onto one fetch.
    fn target(&self) -> &str;

    /// Time budget for establishing the connection.
    fn connect_timeout(&self) -> Duration {
        DEFAULT_CONNECT_TIMEOUT
    }

    /// Time budget for the transfer itself.
    fn read_timeout(&self) -> Duration {
        DEFAULT_READ_TIMEOUT
    }

    /// Post-processor to run on this retrieval's outcome, if any.
    fn post_processor(&self) -> Option<Arc<dyn RetrievalPostProcessor>> {
        None
    }

    /// Perform the fetch.
    ///
    /// Timeouts are the retriever's own responsibility; an elapsed budget is
    /// surfaced as [`RetrievalError::Timeout`]. Panics are caught at the
    /// task boundary and reported as a failure, so an implementation bug
    /// cannot take down a worker.
    fn fetch<'a>(
        &'a self,
        ctx: &'a RetrievalContext,
    ) -> Pin<Box<dyn Future<Output = Result<Bytes, RetrievalError>> + Send + 'a>>;
}

/// Completion hook for a retrieval.
///
/// Receives the fetch result (success with payload, or failure) and returns
/// the payload the shared future should carry. Typical implementations
/// decode or validate the bytes, persist them to a
/// [`FileStore`](crate::store::FileStore), or record failures in an
/// [`AbsentResourceList`](crate::absent::AbsentResourceList).
///
/// Returning `Ok(None)` marks the retrieval complete with no payload, for
/// processors that fully consume the bytes (e.g. write-through to disk).
pub trait RetrievalPostProcessor: Send + Sync {
    fn process<'a>(
        &'a self,
        key: &'a RetrievalKey,
        result: Result<Bytes, RetrievalError>,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Bytes>, RetrievalError>> + Send + 'a>>;
}
