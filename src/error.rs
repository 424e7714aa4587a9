//! Session error types

use std::fmt;

/// Errors that can occur during session operations
#[derive(Debug)]
pub enum SessionError {
    /// Invalid middleware configuration, raised at setup before any request
    Config(String),
    /// Error from the session store
    StoreError(String),
    /// Error during serialization/deserialization
    SerializationError(String),
    /// Invalid cookie signature
    InvalidSignature,
    /// Session not found in the store
    ///
    /// A store `get` failing with this is treated by the coordinator as a
    /// clean miss, not a failure.
    NotFound,
    /// `Session::reload` could not find the current id in the store
    ReloadFailed,
    /// Optional store capability not implemented by this backend
    Unsupported(&'static str),
}

impl SessionError {
    /// Whether this error means "no such record" rather than a real failure
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::NotFound)
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::Config(msg) => write!(f, "Invalid session configuration: {}", msg),
            SessionError::StoreError(msg) => write!(f, "Session store error: {}", msg),
            SessionError::SerializationError(msg) => write!(f, "Serialization error: {}", msg),
            SessionError::InvalidSignature => write!(f, "Invalid cookie signature"),
            SessionError::NotFound => write!(f, "Session not found"),
            SessionError::ReloadFailed => write!(f, "failed to load session"),
            SessionError::Unsupported(op) => write!(f, "Store operation not supported: {}", op),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<serde_json::Error> for SessionError {
    fn from(err: serde_json::Error) -> Self {
        SessionError::SerializationError(err.to_string())
    }
}
