//! Configuration inspection CLI commands.
//!
//! Provides `config show` and `config path` commands for viewing the
//! effective configuration from the command line.

use clap::Subcommand;
use globestream::config::{config_file_path, format_size, ConfigFile};

use crate::error::CliError;

/// Config subcommands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Show the configuration file path
    Path,
}

/// Run a config subcommand.
pub fn run(command: ConfigCommands) -> Result<(), CliError> {
    match command {
        ConfigCommands::Show => run_show(),
        ConfigCommands::Path => run_path(),
    }
}

/// Show the effective configuration, defaults filled in.
fn run_show() -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();

    let path = config_file_path();
    if path.exists() {
        println!("Configuration from {}", path.display());
    } else {
        println!("No configuration file found; showing defaults");
    }
    println!();

    println!("[retrieval]");
    println!("  pool_size = {}", config.retrieval.pool_size);
    println!();

    println!("[cache]");
    println!("  memory_size = {}", format_size(config.cache.memory_size));
    println!();

    println!("[store]");
    println!("  directory = {}", config.store.directory.display());
    if config.store.read_only_roots.is_empty() {
        println!("  read_only_roots = (not set)");
    } else {
        let roots: Vec<String> = config
            .store
            .read_only_roots
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        println!("  read_only_roots = {}", roots.join(":"));
    }
    println!();

    println!("[absent]");
    println!("  capacity = {}", config.absent.capacity);
    println!("  max_tries = {}", config.absent.max_tries);
    println!("  check_interval_secs = {}", config.absent.check_interval_secs);
    println!(
        "  try_again_interval_secs = {}",
        config.absent.try_again_interval_secs
    );
    println!();

    println!("[logging]");
    println!("  file = {}", config.logging.file.display());

    Ok(())
}

/// Show the configuration file path.
fn run_path() -> Result<(), CliError> {
    println!("{}", config_file_path().display());
    Ok(())
}
