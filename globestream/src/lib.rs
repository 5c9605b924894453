//! Globestream - concurrent retrieval and caching for virtual globe data
//!
//! This library provides the resource pipeline of a virtual-globe client:
//! prioritized concurrent retrieval with request deduplication and
//! cancellation, an in-memory LRU cache layer, a layered on-disk store,
//! and a backoff list for resources the sources do not have.
//!
//! # High-Level API
//!
//! Most callers construct a [`retrieval::RetrievalService`] and submit
//! [`retrieval::Retriever`] implementations to it:
//!
//! ```ignore
//! use globestream::retrieval::{Priority, RetrievalConfig, RetrievalService};
//! use globestream::retrievers::{default_http_client, HttpRetriever};
//!
//! let service = RetrievalService::new(RetrievalConfig::default())?;
//! let client = default_http_client(DEFAULT_CONNECT_TIMEOUT)?;
//!
//! let retriever = Arc::new(HttpRetriever::new(client, "tiles/12/654/1583", url));
//! let mut pending = service.run_retriever(retriever, Priority::ON_DEMAND)?;
//! let outcome = pending.wait().await;
//! ```

pub mod absent;
pub mod cache;
pub mod config;
pub mod logging;
pub mod panic;
pub mod retrieval;
pub mod retrievers;
pub mod store;

/// Version of the Globestream library and CLI.
///
/// This is synchronized across all components in the workspace.
/// The version is defined in `Cargo.toml` and injected at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
