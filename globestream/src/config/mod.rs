//! User configuration loaded from ~/.globestream/config.ini.
//!
//! The file is plain INI with one section per subsystem. Any missing
//! file, section, or key falls back to its default, so a fresh install
//! runs without any setup.
//!
//! Module layout:
//! - `settings` structs are pure data, one per INI section
//! - `defaults` maps component `DEFAULT_*` constants onto those structs
//! - `parser` overlays INI values onto `ConfigFile::default()`
//! - `writer` renders the commented INI written back to disk
//! - `file` owns the on-disk lifecycle (load/save/ensure_exists)
//!
//! # Example
//!
//! ```no_run
//! use globestream::config::ConfigFile;
//!
//! let config = ConfigFile::load()?;
//! let retrieval = config.retrieval_config();
//! # Ok::<(), globestream::config::ConfigFileError>(())
//! ```

mod defaults;
mod file;
mod parser;
mod settings;
mod size;
mod writer;

pub use defaults::DEFAULT_LOG_FILE_NAME;
pub use file::{config_directory, config_file_path, ConfigFileError};
pub use settings::{
    AbsentSettings, CacheSettings, ConfigFile, LoggingSettings, RetrievalSettings, StoreSettings,
};
pub use size::{format_size, parse_size, SizeParseError};
