//! The `pexconf` command-line client.
//!
//! Resolves conferencing nodes, checks their status and joins conferences,
//! printing events as they arrive.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod secret;

pub use cli::Cli;
pub use error::{CliError, CliResult};
