//! Logging infrastructure for Globestream.
//!
//! Provides structured logging with file output and console output:
//! - Writes to `<log_dir>/<log_file>` (cleared on session start)
//! - Also prints to stdout for CLI tailing
//! - Multi-line pretty format for readability
//! - Configurable via RUST_LOG environment variable

use std::fs;
use std::io;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// Guard that must be kept alive for the duration of logging.
///
/// Dropping this guard will flush and close the log file writer.
pub struct LoggingGuard {
    _file_guard: WorkerGuard,
}

/// Initialize logging system.
///
/// Creates the log directory if needed, clears the previous log file,
/// and sets up dual output to both file and stdout.
///
/// # Arguments
///
/// * `log_dir` - Directory for log files
/// * `log_file` - Log filename (e.g., "globestream.log")
///
/// # Returns
///
/// LoggingGuard that must be kept alive for logging to work
///
/// # Errors
///
/// Returns error if log directory cannot be created or log file cannot be cleared
pub fn init_logging(log_dir: &Path, log_file: &str) -> Result<LoggingGuard, io::Error> {
    // Create logs directory if it doesn't exist
    fs::create_dir_all(log_dir)?;

    // Clear previous log file by writing empty content
    // This handles both existing and non-existing files
    let log_path = log_dir.join(log_file);
    fs::write(&log_path, "")?;

    // Create file appender with non-blocking writer
    let file_appender = tracing_appender::rolling::never(log_dir, log_file);
    let (non_blocking_file, file_guard) = tracing_appender::non_blocking(file_appender);

    // Create file layer with pretty multi-line format
    let file_layer = tracing_subscriber::fmt::layer()
        .with_writer(non_blocking_file)
        .with_ansi(false) // No ANSI colors in file
        .with_span_events(FmtSpan::CLOSE)
        .pretty();

    // Create stdout layer with pretty multi-line format
    let stdout_layer = tracing_subscriber::fmt::layer()
        .with_writer(io::stdout)
        .with_ansi(true) // ANSI colors for terminal
        .with_span_events(FmtSpan::CLOSE)
        .pretty();

    // Create env filter (defaults to INFO if RUST_LOG not set)
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Initialize global subscriber with both layers
    tracing_subscriber::registry()
        .with(env_filter)
        .with(file_layer)
        .with(stdout_layer)
        .init();

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_creates_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_dir = temp_dir.path().join("logs");

        assert!(!log_dir.exists(), "Test directory should not exist yet");

        // Can't test init_logging because of the global subscriber, but we
        // can test the file operations it performs.
        fs::create_dir_all(&log_dir).unwrap();
        let log_path = log_dir.join("test.log");
        fs::write(&log_path, "").unwrap();

        assert!(log_dir.exists(), "Log directory should be created");
        assert!(log_path.exists(), "Log file should be created");
        assert_eq!(
            fs::read_to_string(&log_path).unwrap(),
            "",
            "Log file should be empty"
        );
    }

    #[test]
    fn test_clears_existing_file() {
        let temp_dir = TempDir::new().unwrap();
        let log_file = temp_dir.path().join("test.log");

        fs::write(&log_file, "old log data").unwrap();
        assert_eq!(fs::read_to_string(&log_file).unwrap(), "old log data");

        // Clear the file by writing empty content
        fs::write(&log_file, "").unwrap();

        let contents = fs::read_to_string(&log_file).unwrap();
        assert_eq!(contents, "", "File should be cleared");
    }

    #[test]
    fn test_guard_structure() {
        // Verifies the guard can be constructed around a writer and dropped.
        use tracing_appender::non_blocking::NonBlocking;

        let (non_blocking, guard) = NonBlocking::new(std::io::sink());
        drop(non_blocking);

        let _logging_guard = LoggingGuard { _file_guard: guard };
    }

    // Note: Testing actual log output requires integration tests because tracing
    // uses a global subscriber that can only be set once per process.
}
