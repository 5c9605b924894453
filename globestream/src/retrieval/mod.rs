//! Concurrent Retrieval Service
//!
//! This module provides a priority-scheduled, deduplicating worker pool for
//! fetching resources (imagery tiles, elevation chunks, metadata) from
//! remote or local sources.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     RetrievalService                         │
//! │  Submit retrievers, get futures; dedup at submission         │
//! ├─────────────────────────────────────────────────────────────┤
//! │                        Scheduler                             │
//! │  Main event loop: priority dispatch, completion handling     │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌──────────────┐  ┌──────────────┐  ┌───────────────────┐  │
//! │  │ Priority     │  │ In-flight    │  │ Worker            │  │
//! │  │ Queue        │  │ Registry     │  │ Pool              │  │
//! │  └──────────────┘  └──────────────┘  └───────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Core Concepts
//!
//! - **Retriever**: describes one fetch (key, target, timeouts, optional
//!   post-processor). The service never interprets protocols itself.
//!
//! - **Priority**: retrievals are scheduled highest level first
//!   (ON_DEMAND > PREFETCH > HOUSEKEEPING), FIFO within the same level.
//!
//! - **Deduplication**: a submission whose (key, target) identity is already
//!   queued or running coalesces onto the in-flight fetch and shares its
//!   [`RetrievalFuture`]; equivalent work is never executed twice
//!   concurrently.
//!
//! - **Worker pool**: a bounded, runtime-resizable number of concurrent
//!   fetches; the bound caps open connections and disk pressure.
//!
//! # Example
//!
//! ```ignore
//! use globestream::retrieval::{Priority, RetrievalConfig, RetrievalService};
//!
//! let service = RetrievalService::new(RetrievalConfig::default())?;
//!
//! let mut future = service.run_retriever(retriever, Priority::ON_DEMAND)?;
//! match future.wait().await {
//!     RetrievalOutcome::Complete(Some(bytes)) => decode(bytes),
//!     RetrievalOutcome::Complete(None) => {} // consumed by post-processor
//!     RetrievalOutcome::Failed(err) => absent.mark_resource_absent(key),
//!     RetrievalOutcome::Cancelled => {}
//! }
//!
//! service.shutdown(false);
//! service.join().await;
//! ```
//!
//! # Failure Model
//!
//! The service never retries: a failed fetch settles the future as failed
//! and the caller decides, typically via
//! [`AbsentResourceList`](crate::absent::AbsentResourceList) backoff,
//! whether and when to resubmit. Panics in retrievers or post-processors
//! are contained at the worker boundary.

mod config;
mod future;
mod queue;
mod retriever;
mod scheduler;
mod service;
mod types;

pub use config::{RetrievalConfig, RetrievalConfigError, DEFAULT_POOL_SIZE};
pub use future::{RetrievalFuture, RetrievalOutcome, RetrievalState};
pub use retriever::{
    RetrievalContext, RetrievalPostProcessor, Retriever, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_READ_TIMEOUT,
};
pub use service::RetrievalService;
pub use types::{Priority, RetrievalError, RetrievalKey, SubmitError};
