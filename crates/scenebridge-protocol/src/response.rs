//! Response envelope.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply to one command.
///
/// Serialises as `{"status":"success","result":..}` or
/// `{"status":"error","message":".."}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum CommandResponse {
    /// The command produced a result.
    Success {
        /// Value returned by the action.
        #[serde(default)]
        result: Value,
    },
    /// The command failed.
    Error {
        /// Human-readable failure description.
        message: String,
    },
}

impl CommandResponse {
    /// Creates a success response.
    #[must_use]
    pub fn success(result: Value) -> Self {
        Self::Success { result }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            message: message.into(),
        }
    }

    /// Whether this is a success response.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Result value of a success response.
    #[must_use]
    pub fn result(&self) -> Option<&Value> {
        match self {
            Self::Success { result } => Some(result),
            Self::Error { .. } => None,
        }
    }

    /// Message of an error response.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Error { message } => Some(message),
        }
    }

    /// Serialises the response as JSON bytes.
    ///
    /// Falls back to a fixed error document if the result holds values JSON
    /// cannot represent, so a response can always be written.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        serde_json::to_vec(self).unwrap_or_else(|error| {
            let fallback = Self::error(format!("failed to serialise response: {error}"));
            serde_json::to_vec(&fallback)
                .unwrap_or_else(|_| br#"{"status":"error","message":"unserialisable response"}"#.to_vec())
        })
    }
}
