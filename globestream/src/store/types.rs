//! Shared file-store types and errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during file-store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying filesystem error.
    #[error("store i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The key does not name a plain relative path inside the store.
    #[error("invalid store key '{0}': absolute and parent-traversing paths are not allowed")]
    InvalidKey(String),

    /// The store was configured without any root directory.
    #[error("a file store requires at least one root")]
    NoRoots,

    /// A write was requested but every configured root is read-only.
    #[error("no writable root configured")]
    NoWritableRoot,
}

/// One root directory of a layered [`FileStore`].
///
/// Roots are consulted in configuration order for reads; the first
/// writable root is the write location.
///
/// [`FileStore`]: super::FileStore
#[derive(Debug, Clone)]
pub struct StoreRoot {
    path: PathBuf,
    writable: bool,
}

impl StoreRoot {
    /// A root that accepts writes (a local cache directory).
    pub fn writable(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writable: true,
        }
    }

    /// A root that is only read (bundled or mounted datasets).
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            writable: false,
        }
    }

    /// Directory this root maps to.
    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Whether entries may be created or removed under this root.
    pub fn is_writable(&self) -> bool {
        self.writable
    }
}

/// Configuration for a [`FileStore`].
///
/// [`FileStore`]: super::FileStore
#[derive(Debug, Clone)]
pub struct FileStoreConfig {
    /// Writable cache root; created on first use.
    pub cache_root: PathBuf,
    /// Read-only roots consulted after the cache root, in order.
    pub read_only_roots: Vec<PathBuf>,
}

impl Default for FileStoreConfig {
    fn default() -> Self {
        Self {
            cache_root: default_cache_root(),
            read_only_roots: Vec::new(),
        }
    }
}

impl FileStoreConfig {
    /// Set the writable cache root.
    pub fn with_cache_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.cache_root = path.into();
        self
    }

    /// Append a read-only root.
    pub fn with_read_only_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.read_only_roots.push(path.into());
        self
    }
}

/// Platform cache directory for store data, e.g. `~/.cache/globestream/store`
/// on Linux.
pub fn default_cache_root() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from(".cache"))
        .join("globestream")
        .join("store")
}
