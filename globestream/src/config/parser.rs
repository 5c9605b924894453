//! INI parsing logic for converting `Ini` → `ConfigFile`.
//!
//! This module contains the `parse_ini()` function and its helpers.
//! It is the single place where INI key names are mapped to struct fields.

use ini::Ini;
use std::path::PathBuf;

use super::file::ConfigFileError;
use super::settings::ConfigFile;
use super::size::parse_size;

/// Parse an `Ini` object into a `ConfigFile`.
///
/// Starts from `ConfigFile::default()` and overlays any values found in the INI.
pub(super) fn parse_ini(ini: &Ini) -> Result<ConfigFile, ConfigFileError> {
    let mut config = ConfigFile::default();

    // [retrieval] section
    if let Some(section) = ini.section(Some("retrieval")) {
        if let Some(v) = section.get("pool_size") {
            let parsed: usize = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "retrieval".to_string(),
                key: "pool_size".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
            if parsed == 0 {
                return Err(ConfigFileError::InvalidValue {
                    section: "retrieval".to_string(),
                    key: "pool_size".to_string(),
                    value: v.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            config.retrieval.pool_size = parsed;
        }
    }

    // [cache] section
    if let Some(section) = ini.section(Some("cache")) {
        if let Some(v) = section.get("memory_size") {
            config.cache.memory_size =
                parse_size(v).map_err(|_| ConfigFileError::InvalidValue {
                    section: "cache".to_string(),
                    key: "memory_size".to_string(),
                    value: v.to_string(),
                    reason: "expected format like '2GB', '500MB', or '1024KB'".to_string(),
                })?;
        }
    }

    // [store] section
    if let Some(section) = ini.section(Some("store")) {
        if let Some(v) = section.get("directory") {
            let v = v.trim();
            if !v.is_empty() {
                config.store.directory = expand_tilde(v);
            }
        }
        if let Some(v) = section.get("read_only_roots") {
            config.store.read_only_roots = v
                .split(':')
                .map(str::trim)
                .filter(|part| !part.is_empty())
                .map(expand_tilde)
                .collect();
        }
    }

    // [absent] section
    if let Some(section) = ini.section(Some("absent")) {
        if let Some(v) = section.get("capacity") {
            let parsed: usize = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "absent".to_string(),
                key: "capacity".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
            if parsed == 0 {
                return Err(ConfigFileError::InvalidValue {
                    section: "absent".to_string(),
                    key: "capacity".to_string(),
                    value: v.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            config.absent.capacity = parsed;
        }
        if let Some(v) = section.get("max_tries") {
            let parsed: u32 = v.parse().map_err(|_| ConfigFileError::InvalidValue {
                section: "absent".to_string(),
                key: "max_tries".to_string(),
                value: v.to_string(),
                reason: "must be a positive integer".to_string(),
            })?;
            if parsed == 0 {
                return Err(ConfigFileError::InvalidValue {
                    section: "absent".to_string(),
                    key: "max_tries".to_string(),
                    value: v.to_string(),
                    reason: "must be at least 1".to_string(),
                });
            }
            config.absent.max_tries = parsed;
        }
        if let Some(v) = section.get("check_interval_secs") {
            config.absent.check_interval_secs =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "absent".to_string(),
                    key: "check_interval_secs".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer (seconds)".to_string(),
                })?;
        }
        if let Some(v) = section.get("try_again_interval_secs") {
            config.absent.try_again_interval_secs =
                v.parse().map_err(|_| ConfigFileError::InvalidValue {
                    section: "absent".to_string(),
                    key: "try_again_interval_secs".to_string(),
                    value: v.to_string(),
                    reason: "must be a positive integer (seconds)".to_string(),
                })?;
        }
    }

    // [logging] section
    if let Some(section) = ini.section(Some("logging")) {
        if let Some(v) = section.get("file") {
            let v = v.trim();
            if !v.is_empty() {
                config.logging.file = expand_tilde(v);
            }
        }
    }

    Ok(config)
}

/// Expand ~ to home directory in paths.
pub(super) fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}
