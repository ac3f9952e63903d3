//! Response envelope used by every conference API call.
//!
//! ```json
//! {"status": "success", "result": ...}
//! ```

use serde::{Deserialize, Serialize};

/// The uniform `{status, result}` wrapper around API responses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Status string, `"success"` for successful calls.
    pub status: String,
    /// The call-specific payload.
    pub result: T,
}

impl<T> Envelope<T> {
    /// Creates a successful envelope.
    pub fn success(result: T) -> Self {
        Self {
            status: "success".to_string(),
            result,
        }
    }

    /// Returns true if the node reported success.
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Unwraps the payload.
    pub fn into_result(self) -> T {
        self.result
    }
}

/// Body of a `message` call (chat).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageFields {
    /// MIME type of the payload.
    #[serde(rename = "type")]
    pub kind: String,
    pub payload: String,
}

impl MessageFields {
    /// A plain-text chat message.
    pub fn text(payload: impl Into<String>) -> Self {
        Self {
            kind: "text/plain".to_string(),
            payload: payload.into(),
        }
    }
}

/// Body of a `dtmf` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DtmfFields {
    pub digits: String,
}

/// Body of a `preferred_aspect_ratio` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AspectRatioFields {
    pub aspect_ratio: f32,
}
