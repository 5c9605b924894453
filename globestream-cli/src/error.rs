//! CLI error handling with user-friendly messages.
//!
//! Centralizes error handling for the CLI, providing consistent formatting
//! and appropriate exit codes.

use std::fmt;
use std::process;

use globestream::config::{config_file_path, ConfigFileError};
use globestream::retrieval::{RetrievalConfigError, RetrievalError, SubmitError};
use globestream::store::StoreError;

/// CLI-specific errors with user-friendly messages.
#[derive(Debug)]
pub enum CliError {
    /// Failed to initialize logging
    LoggingInit(String),
    /// Configuration error
    Config(String),
    /// Invalid command-line argument
    InvalidArgument(String),
    /// Failed to start the retrieval service
    ServiceStart(RetrievalConfigError),
    /// Submission rejected by the retrieval service
    Submit(SubmitError),
    /// Retrieval failed
    Retrieval(RetrievalError),
    /// Retrieval was cancelled before completing
    Cancelled,
    /// File store error
    Store(StoreError),
    /// Failed to start the async runtime
    Runtime(std::io::Error),
}

impl CliError {
    /// Exit the process with an appropriate error message and code.
    pub fn exit(&self) -> ! {
        eprintln!("Error: {}", self);

        // Print additional help for specific errors
        match self {
            CliError::Config(_) => {
                eprintln!();
                eprintln!("Check the configuration file:");
                eprintln!("  {}", config_file_path().display());
            }
            CliError::Retrieval(RetrievalError::NotFound { .. }) => {
                eprintln!();
                eprintln!("The target has no resource at that location. Check the URL;");
                eprintln!("imagery servers also answer 404 for tiles outside their coverage.");
            }
            CliError::Store(StoreError::NoWritableRoot) => {
                eprintln!();
                eprintln!("Every configured store root is read-only. Set store.directory");
                eprintln!("in the config file to a writable location.");
            }
            _ => {}
        }

        process::exit(1)
    }
}

impl fmt::Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::LoggingInit(msg) => write!(f, "Failed to initialize logging: {}", msg),
            CliError::Config(msg) => write!(f, "Configuration error: {}", msg),
            CliError::InvalidArgument(msg) => write!(f, "Invalid argument: {}", msg),
            CliError::ServiceStart(e) => write!(f, "Failed to start retrieval service: {}", e),
            CliError::Submit(e) => write!(f, "Submission rejected: {}", e),
            CliError::Retrieval(e) => write!(f, "Retrieval failed: {}", e),
            CliError::Cancelled => write!(f, "Retrieval was cancelled before it completed"),
            CliError::Store(e) => write!(f, "Store error: {}", e),
            CliError::Runtime(e) => write!(f, "Failed to start async runtime: {}", e),
        }
    }
}

impl std::error::Error for CliError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            CliError::ServiceStart(e) => Some(e),
            CliError::Submit(e) => Some(e),
            CliError::Retrieval(e) => Some(e),
            CliError::Store(e) => Some(e),
            CliError::Runtime(e) => Some(e),
            _ => None,
        }
    }
}

impl From<ConfigFileError> for CliError {
    fn from(e: ConfigFileError) -> Self {
        CliError::Config(e.to_string())
    }
}

impl From<SubmitError> for CliError {
    fn from(e: SubmitError) -> Self {
        CliError::Submit(e)
    }
}

impl From<RetrievalError> for CliError {
    fn from(e: RetrievalError) -> Self {
        CliError::Retrieval(e)
    }
}

impl From<StoreError> for CliError {
    fn from(e: StoreError) -> Self {
        CliError::Store(e)
    }
}
