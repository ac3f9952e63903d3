//! Subcommand implementations.

pub mod config;
pub mod join;
pub mod resolve;
pub mod status;

use pexconf_core::ConferenceAddress;

use crate::config::CliConfig;
use crate::error::{CliError, CliResult};

/// The address from the command line, or the configured one.
pub fn conference_address(arg: Option<&str>, config: &CliConfig) -> CliResult<ConferenceAddress> {
    let raw = arg
        .or(config.conference.address.as_deref())
        .ok_or(CliError::MissingAddress)?;
    Ok(ConferenceAddress::parse(raw)?)
}
