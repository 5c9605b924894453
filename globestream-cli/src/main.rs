//! Globestream command-line interface.
//!
//! Thin front end over the globestream library: argument parsing and
//! dispatch live here, the retrieval pipeline itself in the library crate.

mod commands;
mod error;
mod runner;

use clap::{Parser, Subcommand};

use commands::config::ConfigCommands;
use commands::fetch::FetchArgs;
use commands::store::StoreAction;

#[derive(Debug, Parser)]
#[command(name = "globestream", version = globestream::VERSION)]
#[command(about = "Retrieve, cache, and store streamed globe data")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level commands.
#[derive(Debug, Subcommand)]
enum Commands {
    /// Retrieve a resource over HTTP into the file store
    Fetch(FetchArgs),

    /// Inspect and maintain the file store
    Store {
        #[command(subcommand)]
        action: StoreAction,
    },

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

fn main() {
    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Fetch(args) => commands::fetch::run(args),
        Commands::Store { action } => commands::store::run(action),
        Commands::Config { command } => commands::config::run(command),
    };

    if let Err(err) = result {
        err.exit();
    }
}
