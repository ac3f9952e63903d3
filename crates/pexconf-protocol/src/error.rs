//! Protocol error types.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while decoding conference API payloads.
#[derive(Debug, Error)]
pub enum ProtocolError {
    /// A single event-stream line exceeded the allowed length.
    #[error("event stream line too long: {size} bytes (max: {max})")]
    LineTooLong { size: usize, max: usize },

    /// JSON payload did not match the expected shape.
    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    /// An event that requires a payload arrived without one.
    #[error("event {event} has no data")]
    MissingData { event: String },
}

impl ProtocolError {
    /// Creates a missing data error.
    pub fn missing_data(event: impl Into<String>) -> Self {
        Self::MissingData {
            event: event.into(),
        }
    }
}
