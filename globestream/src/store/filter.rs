//! Name filters for store enumeration.

use super::FileStore;

/// Predicate applied to candidate entry names during
/// [`FileStore::list_file_names`].
///
/// The filter receives the store itself so it can consult other entries
/// (e.g. skip a tile whose sibling metadata document is missing), and the
/// candidate name relative to the store root.
pub trait FileStoreFilter {
    /// Whether `name` should appear in the enumeration.
    fn accept(&self, store: &FileStore, name: &str) -> bool;
}

impl<F> FileStoreFilter for F
where
    F: Fn(&FileStore, &str) -> bool,
{
    fn accept(&self, store: &FileStore, name: &str) -> bool {
        self(store, name)
    }
}

/// Accepts every entry.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl FileStoreFilter for AcceptAll {
    fn accept(&self, _store: &FileStore, _name: &str) -> bool {
        true
    }
}

/// Accepts entries whose name ends with a fixed suffix, e.g. `".png"`.
#[derive(Debug, Clone)]
pub struct SuffixFilter {
    suffix: String,
}

impl SuffixFilter {
    pub fn new(suffix: impl Into<String>) -> Self {
        Self {
            suffix: suffix.into(),
        }
    }
}

impl FileStoreFilter for SuffixFilter {
    fn accept(&self, _store: &FileStore, name: &str) -> bool {
        name.ends_with(&self.suffix)
    }
}
