//! Configuration commands.

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// Dumps the effective configuration to stdout.
pub fn dump(config: &CliConfig) -> CliResult<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| CliError::Config(format!("failed to serialize config: {e}")))?;
    println!("# config.toml ({})", CliConfig::default_path().display());
    println!("{text}");
    Ok(())
}

/// Shows the configuration file path.
pub fn path() -> CliResult<()> {
    println!("config: {}", CliConfig::default_path().display());
    Ok(())
}
