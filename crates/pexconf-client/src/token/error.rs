//! Token negotiation failures.

use pexconf_protocol::IdentityProvider;
use thiserror::Error;

use crate::error::HttpError;

/// A specialized Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Why a token could not be obtained, refreshed or used.
///
/// Challenge variants tell the host application what to ask the user for
/// before requesting again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("authentication failed")]
    AuthenticationFailed,

    /// A PIN is needed. `guest_pin` is true when guests need one too.
    #[error("PIN required")]
    PinRequired { guest_pin: bool },

    #[error("invalid PIN")]
    InvalidPin,

    #[error("conference not found")]
    ConferenceNotFound,

    /// The conference expects an extension of the given kind.
    #[error("conference extension required ({0})")]
    ConferenceExtensionRequired(String),

    #[error("single sign-on identity provider required")]
    SsoIdentityProviderRequired(Vec<IdentityProvider>),

    #[error("single sign-on required at {url}")]
    SsoIdentityProviderRedirect { idp: IdentityProvider, url: String },

    #[error("failed to decode token response: {0}")]
    TokenDecodingFailed(String),

    /// Transport or unexpected status failure.
    #[error("connection failed: {message}")]
    ConnectionFailed {
        status: Option<u16>,
        message: String,
    },

    #[error("token expired")]
    Expired,

    #[error("token request timed out")]
    Timeout,

    #[error("token refresh cancelled")]
    Cancelled,
}

impl TokenError {
    /// Returns true if the user must supply something before retrying.
    pub fn is_challenge(&self) -> bool {
        matches!(
            self,
            Self::PinRequired { .. }
                | Self::InvalidPin
                | Self::ConferenceExtensionRequired(_)
                | Self::SsoIdentityProviderRequired(_)
                | Self::SsoIdentityProviderRedirect { .. }
        )
    }

    /// Creates a connection failure from a status code.
    pub fn status(code: u16) -> Self {
        Self::ConnectionFailed {
            status: Some(code),
            message: format!("unexpected status {code}"),
        }
    }
}

impl From<HttpError> for TokenError {
    fn from(e: HttpError) -> Self {
        match e {
            HttpError::Unauthorized | HttpError::Forbidden => Self::AuthenticationFailed,
            HttpError::ResourceNotFound(_) => Self::ConferenceNotFound,
            HttpError::ChallengeDecodeFailed(message) | HttpError::DecodingFailed(message) => {
                Self::TokenDecodingFailed(message)
            }
            HttpError::Timeout => Self::Timeout,
            HttpError::UnacceptableStatusCode(code) => Self::status(code),
            other => Self::ConnectionFailed {
                status: other.status_code(),
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_http_errors() {
        assert_eq!(
            TokenError::from(HttpError::Unauthorized),
            TokenError::AuthenticationFailed
        );
        assert_eq!(
            TokenError::from(HttpError::ResourceNotFound("conference".into())),
            TokenError::ConferenceNotFound
        );
        assert!(matches!(
            TokenError::from(HttpError::ChallengeDecodeFailed("eof".into())),
            TokenError::TokenDecodingFailed(_)
        ));
        assert_eq!(
            TokenError::from(HttpError::UnacceptableStatusCode(502)),
            TokenError::status(502)
        );
        assert!(matches!(
            TokenError::from(HttpError::transport("reset")),
            TokenError::ConnectionFailed { status: None, .. }
        ));
    }

    #[test]
    fn challenges() {
        assert!(TokenError::PinRequired { guest_pin: true }.is_challenge());
        assert!(TokenError::ConferenceExtensionRequired("standard".into()).is_challenge());
        assert!(!TokenError::AuthenticationFailed.is_challenge());
        assert!(!TokenError::Cancelled.is_challenge());
    }
}
