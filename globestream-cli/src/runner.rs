//! CLI runner for common setup and operations.
//!
//! Encapsulates config loading, logging initialization, and service
//! creation to reduce duplication across command handlers.

use std::path::Path;

use tracing::info;

use globestream::config::{ConfigFile, DEFAULT_LOG_FILE_NAME};
use globestream::logging::{init_logging, LoggingGuard};
use globestream::retrieval::RetrievalService;

use crate::error::CliError;

/// Runner that manages CLI lifecycle and common operations.
pub struct CliRunner {
    /// Logging guard - keeps logging active while runner exists
    #[allow(dead_code)]
    logging_guard: LoggingGuard,
    /// Loaded configuration file
    config: ConfigFile,
}

impl CliRunner {
    /// Create a new CLI runner, loading config and initializing logging.
    pub fn new() -> Result<Self, CliError> {
        // Load config file (or use defaults if not present)
        let config = ConfigFile::load()?;

        // Split the configured log path into directory and file name
        let log_path = &config.logging.file;
        let log_dir = log_path.parent().unwrap_or(Path::new("."));
        let log_file = log_path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| DEFAULT_LOG_FILE_NAME.to_string());

        let logging_guard =
            init_logging(log_dir, &log_file).map_err(|e| CliError::LoggingInit(e.to_string()))?;

        Ok(Self {
            logging_guard,
            config,
        })
    }

    /// Get the loaded configuration.
    pub fn config(&self) -> &ConfigFile {
        &self.config
    }

    /// Log startup information for a command.
    pub fn log_startup(&self, command: &str) {
        info!("Globestream v{}", globestream::VERSION);
        info!("Globestream CLI: {} command", command);
    }

    /// Start a retrieval service sized from the loaded configuration.
    ///
    /// Must be called inside a Tokio runtime; the service spawns its
    /// scheduler on construction.
    pub fn start_service(&self) -> Result<RetrievalService, CliError> {
        RetrievalService::new(self.config.retrieval_config())
            .map_err(CliError::ServiceStart)
            .inspect(|_| info!("Retrieval service started"))
    }
}
