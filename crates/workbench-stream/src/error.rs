//! Error types for remote event streams.

use thiserror::Error;

/// Error type for stream collaborators and the coordinator.
#[derive(Debug, Error)]
pub enum StreamError {
    /// The request never reached the service or the connection dropped.
    #[error("Connection error: {0}")]
    Connection(String),

    /// The service answered with an error status.
    #[error("Remote error ({status}): {message}")]
    Remote { status: u16, message: String },

    /// The event stream broke mid-flight.
    #[error("Stream error: {0}")]
    Stream(String),

    /// A frame of a known type could not be decoded.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The stream ended without a completion event.
    #[error("Stream ended before the operation completed")]
    Incomplete,

    /// The collaborator does not support this operation.
    #[error("Not supported: {0}")]
    Unsupported(String),
}

impl StreamError {
    pub fn remote(status: u16, message: impl Into<String>) -> Self {
        Self::Remote {
            status,
            message: message.into(),
        }
    }

    /// Check if the service reported the target as missing.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StreamError::Remote { status: 404, .. })
    }
}

/// Result type for stream operations.
pub type Result<T> = std::result::Result<T, StreamError>;
