//! CLI error types.

use pexconf_client::{HttpError, NodeError};
use pexconf_core::AddressError;
use pexconf_session::SessionError;
use thiserror::Error;

use crate::secret::SecretError;

/// Result type for CLI commands.
pub type CliResult<T> = Result<T, CliError>;

/// Errors reported by the `pexconf` binary.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("configuration error: {0}")]
    Config(String),

    /// Neither the command line nor the config file names a conference.
    #[error("no conference address; pass one or set `address` under [conference]")]
    MissingAddress,

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
