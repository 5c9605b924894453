//! INI serialization logic for converting `ConfigFile` → INI string.
//!
//! This module contains the `to_config_string()` function that produces
//! the commented INI representation written to `config.ini`.

use std::path::Path;

use super::settings::ConfigFile;
use super::size::format_size;

/// Convert a `ConfigFile` to a commented INI string for saving.
pub(super) fn to_config_string(config: &ConfigFile) -> String {
    let read_only_roots = config
        .store
        .read_only_roots
        .iter()
        .map(|p| path_to_string(p))
        .collect::<Vec<_>>()
        .join(":");

    format!(
        r#"[retrieval]
; Number of parallel retrieval workers (default: 4)
; Each worker runs one retriever at a time; raise this to overlap more
; network transfers, subject to what the imagery source tolerates.
pool_size = {}

[cache]
; Memory cache capacity (default: 256MB)
; Supports: KB, MB, GB suffixes (e.g., 500MB, 2GB)
memory_size = {}

[store]
; Writable store root for retrieved resources.
; If empty, defaults to ~/.cache/globestream/store (Linux) or the
; platform cache directory.
directory = {}
; Read-only roots searched after the writable root, separated by ':'
; Useful for bundled base-layer datasets on read-only media.
read_only_roots = {}

[absent]
; Maximum number of keys tracked as absent (default: 2048)
; The oldest tracked key is dropped once the list is full.
capacity = {}
; Failures before the full backoff interval applies (default: 3)
max_tries = {}
; Seconds before re-probing a key that has failed fewer than max_tries
; times (default: 10)
check_interval_secs = {}
; Seconds before re-probing a key that has reached max_tries (default: 60)
try_again_interval_secs = {}

[logging]
; Log file path (default: ~/.globestream/globestream.log)
file = {}
"#,
        config.retrieval.pool_size,
        format_size(config.cache.memory_size),
        path_to_string(&config.store.directory),
        read_only_roots,
        config.absent.capacity,
        config.absent.max_tries,
        config.absent.check_interval_secs,
        config.absent.try_again_interval_secs,
        path_to_string(&config.logging.file),
    )
}

/// Convert path to string, collapsing home dir to ~.
fn path_to_string(path: &Path) -> String {
    if let Some(home) = dirs::home_dir() {
        if let Ok(stripped) = path.strip_prefix(&home) {
            return format!("~/{}", stripped.display());
        }
    }
    path.display().to_string()
}

#[cfg(test)]
mod tests {
    use super::super::settings::ConfigFile;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let mut config = ConfigFile::default();
        config.retrieval.pool_size = 8;
        config.cache.memory_size = 4 * 1024 * 1024 * 1024; // 4GB
        config.store.directory = PathBuf::from("/var/cache/globestream");
        config.store.read_only_roots = vec![PathBuf::from("/opt/base-layer")];
        config.absent.max_tries = 5;

        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();

        assert_eq!(loaded.retrieval.pool_size, 8);
        assert_eq!(loaded.cache.memory_size, 4 * 1024 * 1024 * 1024);
        assert_eq!(
            loaded.store.directory,
            PathBuf::from("/var/cache/globestream")
        );
        assert_eq!(
            loaded.store.read_only_roots,
            vec![PathBuf::from("/opt/base-layer")]
        );
        assert_eq!(loaded.absent.max_tries, 5);
    }

    #[test]
    fn test_default_roundtrip() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.ini");

        let config = ConfigFile::default();
        config.save_to(&config_path).unwrap();

        let loaded = ConfigFile::load_from(&config_path).unwrap();
        assert_eq!(loaded.retrieval.pool_size, config.retrieval.pool_size);
        assert_eq!(loaded.cache.memory_size, config.cache.memory_size);
        assert_eq!(loaded.store.directory, config.store.directory);
        assert!(loaded.store.read_only_roots.is_empty());
        assert_eq!(loaded.logging.file, config.logging.file);
    }
}
