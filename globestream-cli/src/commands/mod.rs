//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`config`] - Configuration inspection (show, path)
//! - [`fetch`] - Single resource retrieval into the store
//! - [`store`] - File store maintenance (ls, rm)

pub mod config;
pub mod fetch;
pub mod store;
