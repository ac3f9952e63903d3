//! Error types for conference API calls.
//!
//! [`HttpError`] classifies transport and status-code failures of a single
//! request. [`NodeError`] covers node discovery. Token negotiation failures
//! live in [`crate::token::TokenError`].

use std::fmt;

use thiserror::Error;

/// A specialized Result type for HTTP operations.
pub type HttpResult<T> = Result<T, HttpError>;

/// A specialized Result type for node discovery.
pub type NodeResult<T> = Result<T, NodeError>;

/// Failure of a single request against a node.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HttpError {
    /// 401 from the node.
    #[error("unauthorized")]
    Unauthorized,

    /// 403 on an endpoint that carries no challenge body.
    #[error("forbidden")]
    Forbidden,

    /// 403 whose challenge body could not be decoded.
    #[error("failed to decode 403 challenge body: {0}")]
    ChallengeDecodeFailed(String),

    /// 404 from the node.
    #[error("{0} not found")]
    ResourceNotFound(String),

    /// Any status code without a dedicated meaning.
    #[error("unacceptable status code {0}")]
    UnacceptableStatusCode(u16),

    /// The response could not be read as HTTP.
    #[error("invalid HTTP response: {0}")]
    InvalidHttpResponse(String),

    /// A successful response whose body did not match the expected type.
    #[error("failed to decode response: {0}")]
    DecodingFailed(String),

    /// The request did not complete in time.
    #[error("request timed out")]
    Timeout,

    /// Connection level failure (DNS, TCP, TLS).
    #[error("transport error: {0}")]
    Transport(String),

    /// The request was rejected locally before being sent.
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl HttpError {
    /// Creates a decoding error from any displayable cause.
    pub fn decoding(cause: impl fmt::Display) -> Self {
        Self::DecodingFailed(cause.to_string())
    }

    /// Creates a transport error from any displayable cause.
    pub fn transport(cause: impl fmt::Display) -> Self {
        Self::Transport(cause.to_string())
    }

    /// The HTTP status code behind this error, if there was a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Unauthorized => Some(401),
            Self::Forbidden | Self::ChallengeDecodeFailed(_) => Some(403),
            Self::ResourceNotFound(_) => Some(404),
            Self::UnacceptableStatusCode(code) => Some(*code),
            _ => None,
        }
    }

    /// Returns true for authentication failures (401/403).
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized | Self::Forbidden | Self::ChallengeDecodeFailed(_)
        )
    }

    /// Returns true if repeating an idempotent request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout | Self::Transport(_) | Self::InvalidHttpResponse(_) => true,
            Self::UnacceptableStatusCode(code) => *code >= 500,
            _ => false,
        }
    }
}

impl From<reqwest::Error> for HttpError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_connect() {
            Self::Transport(format!("connection failed: {}", e))
        } else if e.is_body() || e.is_decode() {
            Self::InvalidHttpResponse(e.to_string())
        } else if e.is_builder() {
            Self::InvalidRequest(e.to_string())
        } else {
            Self::Transport(format!("request failed: {}", e))
        }
    }
}

/// Failure to turn a host into node endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NodeError {
    /// Neither SRV nor A lookups produced an endpoint.
    #[error("no conferencing node found for {0}")]
    NodeNotFound(String),

    /// SRV RDATA shorter than its fixed fields or with broken labels.
    #[error("invalid SRV record: {0}")]
    InvalidSrvRecord(String),

    /// A RDATA that is not exactly 4 bytes.
    #[error("invalid A record: expected 4 bytes, got {0}")]
    InvalidARecord(usize),

    /// The DNS lookup itself failed.
    #[error("DNS lookup failed: {0}")]
    Lookup(String),

    /// A resolved target did not form a valid URL.
    #[error("invalid node address {0:?}")]
    InvalidAddress(String),

    /// Node status request failed.
    #[error(transparent)]
    Http(#[from] HttpError),
}

impl NodeError {
    /// Creates a lookup error.
    pub fn lookup(message: impl Into<String>) -> Self {
        Self::Lookup(message.into())
    }
}
