//! Store maintenance commands - list and remove file store entries.

use clap::Subcommand;
use globestream::config::ConfigFile;
use globestream::store::{AcceptAll, FileStore};

use crate::error::CliError;

/// Store subcommands.
#[derive(Debug, Subcommand)]
pub enum StoreAction {
    /// List entries in the file store
    Ls {
        /// Restrict the listing to keys under this prefix
        #[arg(default_value = "")]
        prefix: String,
    },

    /// Remove an entry from the file store
    Rm {
        /// Store key to remove
        key: String,
    },
}

/// Run a store subcommand.
pub fn run(action: StoreAction) -> Result<(), CliError> {
    let config = ConfigFile::load().unwrap_or_default();
    let store = FileStore::from_config(&config.file_store_config())?;

    match action {
        StoreAction::Ls { prefix } => run_ls(&store, &prefix),
        StoreAction::Rm { key } => run_rm(&store, &key),
    }
}

/// List store entries, full keys, sorted.
fn run_ls(store: &FileStore, prefix: &str) -> Result<(), CliError> {
    let names = store.list_file_names(prefix, &AcceptAll)?;

    if names.is_empty() {
        println!("(empty)");
        return Ok(());
    }

    for name in &names {
        println!("{}", name);
    }
    println!();
    println!(
        "{} entr{}",
        names.len(),
        if names.len() == 1 { "y" } else { "ies" }
    );

    Ok(())
}

/// Remove one store entry.
fn run_rm(store: &FileStore, key: &str) -> Result<(), CliError> {
    if store.remove_file(key)? {
        println!("Removed {}", key);
    } else {
        println!("No entry under {}", key);
    }
    Ok(())
}
