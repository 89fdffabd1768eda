// Error handling for the media bridge

use std::fmt;

/// Bridge error types
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The media source could not be turned into a URI
    InvalidSource(String),

    /// The native player rejected a command
    Backend(String),

    /// Event name or wire identifier is not part of the event table
    UnknownEvent(String),

    /// Event payload is not a JSON object
    InvalidPayload(String),

    /// No session registered under the given id (FFI only)
    InvalidSession(i64),

    /// Generic error
    Other(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            BridgeError::InvalidSource(msg) => write!(f, "Invalid source: {}", msg),
            BridgeError::Backend(msg) => write!(f, "Native player error: {}", msg),
            BridgeError::UnknownEvent(name) => write!(f, "Unknown event: {}", name),
            BridgeError::InvalidPayload(msg) => write!(f, "Invalid payload: {}", msg),
            BridgeError::InvalidSession(id) => write!(f, "Invalid session ID: {}", id),
            BridgeError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Result type alias for bridge operations
pub type Result<T> = std::result::Result<T, BridgeError>;

impl From<serde_json::Error> for BridgeError {
    fn from(err: serde_json::Error) -> Self {
        BridgeError::InvalidPayload(err.to_string())
    }
}

impl From<std::str::Utf8Error> for BridgeError {
    fn from(err: std::str::Utf8Error) -> Self {
        BridgeError::Other(format!("invalid UTF-8: {}", err))
    }
}
