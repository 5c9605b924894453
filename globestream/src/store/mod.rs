//! Persistent file-backed byte store.
//!
//! The durable tier of the pipeline: opaque byte buffers keyed by
//! hierarchical relative paths, layered over one or more root directories
//! and surviving process restarts. Decoded objects belong in
//! [`crate::cache`]; this tier holds the raw fetched bytes.
//!
//! # Architecture
//!
//! ```text
//! read(key) ──▶ root[0] (writable cache) ──▶ root[1] (read-only) ──▶ …
//!                  ▲
//! write(key) ──────┘  temp file + atomic rename
//! ```
//!
//! Writes always land in the first writable root and follow a
//! write-to-temp-then-rename discipline: a reader on any thread observes
//! either the complete entry or no entry, never a truncated one.
//!
//! # Example
//!
//! ```
//! use globestream::store::{FileStore, StoreRoot};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let store = FileStore::single(dir.path()).unwrap();
//!
//! store.write("imagery/14/5893/12004.jpg", b"jpeg bytes").unwrap();
//! assert!(store.exists("imagery/14/5893/12004.jpg"));
//! ```

mod file_store;
mod filter;
mod types;

pub use file_store::{FileStore, StoreWriter};
pub use filter::{AcceptAll, FileStoreFilter, SuffixFilter};
pub use types::{default_cache_root, FileStoreConfig, StoreError, StoreRoot};
