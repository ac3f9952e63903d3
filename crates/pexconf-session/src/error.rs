//! Session error types.

use pexconf_client::{HttpError, NodeError, TokenError};
use pexconf_core::AddressError;
use thiserror::Error;

/// Result type for session operations.
pub type SessionResult<T> = Result<T, SessionError>;

/// Why the event stream closed for good.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StreamError {
    /// The node rejected the stream with 401 or 403.
    #[error("event stream rejected with status {0}")]
    Unauthorized(u16),

    /// No valid token was available to reconnect with.
    #[error("no token for the event stream: {0}")]
    Token(TokenError),

    /// The stream was closed by its owner.
    #[error("event stream closed")]
    Closed,
}

/// Errors surfaced to the host application.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Stream(#[from] StreamError),

    #[error("not joined to a conference")]
    NotJoined,

    #[error("already joined to a conference")]
    AlreadyJoined,

    #[error("already registered")]
    AlreadyRegistered,

    /// The node ended the session.
    #[error("disconnected by the conference: {0}")]
    Disconnected(String),

    #[error("aspect ratio {0} must be in (0, 2]")]
    InvalidAspectRatio(f32),

    #[error("invalid DTMF digits {0:?}")]
    InvalidDtmf(String),
}

impl SessionError {
    /// Returns true if the user must supply a PIN, extension or SSO step.
    pub fn is_challenge(&self) -> bool {
        matches!(self, Self::Token(e) if e.is_challenge())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wraps_component_errors() {
        let error: SessionError = TokenError::PinRequired { guest_pin: false }.into();
        assert!(error.is_challenge());
        assert_eq!(error.to_string(), "PIN required");

        let error: SessionError = StreamError::Unauthorized(403).into();
        assert!(!error.is_challenge());
        assert_eq!(error.to_string(), "event stream rejected with status 403");
    }
}
