//! Command-line interface definition.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pexconf - join conferences from the terminal
#[derive(Debug, Parser)]
#[command(name = "pexconf")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(long, short, env = "PEXCONF_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, short = 'v')]
    pub debug: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Print the conferencing nodes serving an address, in connection order
    Resolve {
        /// Conference address (alias@host); defaults to the configured one
        address: Option<String>,
    },

    /// Check whether the nodes serving an address accept calls
    Status {
        /// Conference address (alias@host); defaults to the configured one
        address: Option<String>,
    },

    /// Join a conference and print its events until Ctrl-C
    Join {
        /// Conference address (alias@host); defaults to the configured one
        address: Option<String>,

        /// Display name shown to other participants
        #[arg(long, short, env = "PEXCONF_DISPLAY_NAME")]
        name: Option<String>,

        /// Conference PIN (supports `env::` and `pass::` references)
        #[arg(long, env = "PEXCONF_PIN")]
        pin: Option<String>,

        /// Conference extension, for virtual receptions
        #[arg(long)]
        extension: Option<String>,
    },

    /// Configuration commands
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Dump current configuration
    Dump,

    /// Show configuration file path
    Path,
}
