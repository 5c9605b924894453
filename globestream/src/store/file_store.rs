//! Layered persistent byte store.

use crate::store::filter::FileStoreFilter;
use crate::store::types::{FileStoreConfig, StoreError, StoreRoot};
use bytes::Bytes;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, trace};

/// Persistent byte-buffer store over a layered set of root directories.
///
/// Roots are consulted in order for reads; the first writable root is the
/// write location. A typical layering is a writable cache directory in
/// front of one or more read-only bundled-data directories, so locally
/// fetched entries shadow shipped ones.
///
/// Keys are relative paths (`"imagery/14/5893/12004.jpg"`). The store
/// assigns no meaning to path segments; it only guarantees that a written
/// entry becomes visible atomically under its final name.
pub struct FileStore {
    roots: Vec<StoreRoot>,
}

impl FileStore {
    /// Open a store over the given roots, creating writable root
    /// directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NoRoots`] for an empty root list, or an I/O
    /// error if a writable root cannot be created.
    pub fn new(roots: Vec<StoreRoot>) -> Result<Self, StoreError> {
        if roots.is_empty() {
            return Err(StoreError::NoRoots);
        }
        for root in roots.iter().filter(|r| r.is_writable()) {
            fs::create_dir_all(root.path())?;
        }
        debug!(roots = roots.len(), "File store opened");
        Ok(Self { roots })
    }

    /// Open a store with a single writable root.
    pub fn single(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        Self::new(vec![StoreRoot::writable(root)])
    }

    /// Open a store from configuration: the cache root first (writable),
    /// then any read-only roots in order.
    pub fn from_config(config: &FileStoreConfig) -> Result<Self, StoreError> {
        let mut roots = vec![StoreRoot::writable(config.cache_root.clone())];
        for path in &config.read_only_roots {
            roots.push(StoreRoot::read_only(path.clone()));
        }
        Self::new(roots)
    }

    /// The configured roots, in lookup order.
    pub fn roots(&self) -> &[StoreRoot] {
        &self.roots
    }

    /// Resolve the path a new entry for `key` would be written to, under
    /// the first writable root. Does not create anything.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidKey`] for malformed keys,
    /// [`StoreError::NoWritableRoot`] if every root is read-only.
    pub fn new_file_location(&self, key: &str) -> Result<PathBuf, StoreError> {
        let rel = key_to_rel_path(key)?;
        let root = self
            .roots
            .iter()
            .find(|r| r.is_writable())
            .ok_or(StoreError::NoWritableRoot)?;
        Ok(root.path().join(rel))
    }

    /// Find the path of an existing entry, searching roots in order.
    pub fn locate(&self, key: &str) -> Result<Option<PathBuf>, StoreError> {
        let rel = key_to_rel_path(key)?;
        for root in &self.roots {
            let candidate = root.path().join(&rel);
            if candidate.is_file() {
                return Ok(Some(candidate));
            }
        }
        Ok(None)
    }

    /// Whether an entry exists under `key` in any root.
    ///
    /// Malformed keys report `false`; they cannot name an entry.
    pub fn exists(&self, key: &str) -> bool {
        matches!(self.locate(key), Ok(Some(_)))
    }

    /// Read the full buffer stored under `key`.
    ///
    /// Returns `Ok(None)` if no root holds the entry.
    pub fn read(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        match self.locate(key)? {
            Some(path) => match fs::read(&path) {
                Ok(data) => Ok(Some(Bytes::from(data))),
                // The entry was removed between locate and read.
                Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(err) => Err(err.into()),
            },
            None => Ok(None),
        }
    }

    /// Atomically store a full buffer under `key` in the writable root.
    ///
    /// The buffer is written to a temporary file in the destination
    /// directory and renamed into place, so a concurrent reader either
    /// sees the complete entry or none at all. Returns the final path.
    pub fn write(&self, key: &str, data: &[u8]) -> Result<PathBuf, StoreError> {
        let mut writer = self.writer(key)?;
        writer.write_all(data)?;
        let path = writer.commit()?;
        trace!(key, bytes = data.len(), "Stored buffer");
        Ok(path)
    }

    /// Open a streaming writer for `key`.
    ///
    /// Bytes go to a temporary file next to the destination;
    /// [`StoreWriter::commit`] renames it into place. Dropping the writer
    /// without committing discards the temporary file, leaving nothing
    /// visible under the final name.
    pub fn writer(&self, key: &str) -> Result<StoreWriter, StoreError> {
        let dest = self.new_file_location(key)?;
        let parent = dest
            .parent()
            .ok_or_else(|| StoreError::InvalidKey(key.to_string()))?;
        fs::create_dir_all(parent)?;
        let temp = NamedTempFile::new_in(parent)?;
        Ok(StoreWriter { temp, dest })
    }

    /// Remove the entry under `key` from every writable root.
    ///
    /// Returns `true` if at least one copy was deleted. Copies in
    /// read-only roots are untouched and will shadow back in.
    pub fn remove_file(&self, key: &str) -> Result<bool, StoreError> {
        let rel = key_to_rel_path(key)?;
        let mut removed = false;
        for root in self.roots.iter().filter(|r| r.is_writable()) {
            let candidate = root.path().join(&rel);
            match fs::remove_file(&candidate) {
                Ok(()) => {
                    trace!(key, path = %candidate.display(), "Removed store entry");
                    removed = true;
                }
                Err(err) if err.kind() == io::ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok(removed)
    }

    /// Enumerate entry names under `subpath` (empty string for the whole
    /// store) across every root, deduplicated and sorted, keeping those
    /// the filter accepts.
    ///
    /// Names are store keys: relative paths with `/` separators.
    pub fn list_file_names(
        &self,
        subpath: &str,
        filter: &dyn FileStoreFilter,
    ) -> Result<Vec<String>, StoreError> {
        let rel = if subpath.is_empty() {
            PathBuf::new()
        } else {
            key_to_rel_path(subpath)?
        };

        let mut names = BTreeSet::new();
        for root in &self.roots {
            let base = root.path().join(&rel);
            if base.is_dir() {
                collect_names(root.path(), &base, &mut names)?;
            }
        }

        Ok(names
            .into_iter()
            .filter(|name| filter.accept(self, name))
            .collect())
    }
}

impl std::fmt::Debug for FileStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileStore").field("roots", &self.roots).finish()
    }
}

/// Streaming handle for one store entry.
///
/// Created by [`FileStore::writer`]. Implements [`io::Write`]; call
/// [`commit`](Self::commit) to make the entry visible. Dropped without
/// commit, the temporary file is deleted and the final name never appears.
pub struct StoreWriter {
    temp: NamedTempFile,
    dest: PathBuf,
}

impl StoreWriter {
    /// The final path this entry will occupy once committed.
    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// Flush and atomically rename the temporary file into place.
    ///
    /// Returns the final path. After this returns, `exists`/`read` from
    /// any thread observe the complete entry.
    pub fn commit(mut self) -> Result<PathBuf, StoreError> {
        self.temp.flush()?;
        persist_temp(self.temp, &self.dest)?;
        Ok(self.dest)
    }
}

impl io::Write for StoreWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.temp.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.temp.flush()
    }
}

impl std::fmt::Debug for StoreWriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreWriter").field("dest", &self.dest).finish()
    }
}

/// Rename a temporary file onto its destination, retrying once if the
/// destination directory was swept away in between.
fn persist_temp(temp: NamedTempFile, dest: &Path) -> Result<(), StoreError> {
    match temp.persist(dest) {
        Ok(_) => Ok(()),
        Err(err) => {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            err.file
                .persist(dest)
                .map_err(|persist_err| StoreError::Io(persist_err.error))?;
            Ok(())
        }
    }
}

/// Validate and normalize a store key into a relative path.
///
/// Only plain relative paths are accepted; absolute paths and `..`/`.`
/// components are rejected so a key can never escape its root.
fn key_to_rel_path(key: &str) -> Result<PathBuf, StoreError> {
    if key.is_empty() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    let path = Path::new(key);
    if path.is_absolute() {
        return Err(StoreError::InvalidKey(key.to_string()));
    }
    let mut rel = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => rel.push(part),
            _ => return Err(StoreError::InvalidKey(key.to_string())),
        }
    }
    Ok(rel)
}

/// Recursively collect entry names under `dir`, relative to `root`.
fn collect_names(
    root: &Path,
    dir: &Path,
    names: &mut BTreeSet<String>,
) -> Result<(), StoreError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if path.is_dir() {
            collect_names(root, &path, names)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            names.insert(rel_to_name(rel));
        }
    }
    Ok(())
}

fn rel_to_name(rel: &Path) -> String {
    rel.iter()
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
