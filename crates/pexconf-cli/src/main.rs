//! pexconf CLI entry point.

use std::process::ExitCode;

use clap::Parser;
use pexconf_client::{HttpClient, NodeClient, NodeResolver};
use pexconf_core::{TracingConfig, init_tracing};

use pexconf_cli::cli::{Cli, Command, ConfigAction};
use pexconf_cli::commands::{self, join::JoinOptions};
use pexconf_cli::config::CliConfig;
use pexconf_cli::error::CliResult;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        config.logging.tracing_config().unwrap_or_else(|e| {
            eprintln!("warning: {e}");
            TracingConfig::default()
        })
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: logging disabled: {e}");
    }

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn load_config(cli: &Cli) -> CliResult<CliConfig> {
    match cli.config {
        Some(ref path) => CliConfig::load_from(path),
        None => CliConfig::load(),
    }
}

async fn run(cli: Cli, config: CliConfig) -> CliResult<()> {
    let http = HttpClient::new(config.network.http_config())?;
    let resolver = NodeResolver::system();

    match cli.command {
        Command::Resolve { address } => {
            let address = commands::conference_address(address.as_deref(), &config)?;
            commands::resolve::run(&address, &resolver).await
        }
        Command::Status { address } => {
            let address = commands::conference_address(address.as_deref(), &config)?;
            commands::status::run(&address, &resolver, &NodeClient::new(http)).await
        }
        Command::Join {
            address,
            name,
            pin,
            extension,
        } => {
            let address = commands::conference_address(address.as_deref(), &config)?;
            let options = JoinOptions {
                name,
                pin,
                extension,
            };
            commands::join::run(address, options, &config, http, resolver).await
        }
        Command::Config { action } => match action {
            ConfigAction::Dump => commands::config::dump(&config),
            ConfigAction::Path => commands::config::path(),
        },
    }
}
