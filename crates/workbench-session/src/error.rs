//! Error types for session persistence.

/// Error type for session persistence operations.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Reading or writing the backing store failed.
    #[error("Storage error at {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// A stored value could not be encoded or decoded.
    #[error("Serialization error for '{key}': {source}")]
    Serde {
        key: String,
        source: serde_json::Error,
    },

    /// A stored snapshot carries a schema version this build cannot read.
    #[error("Unsupported snapshot version {version} for '{key}'")]
    UnsupportedVersion { key: String, version: u64 },
}

/// Result type for session persistence operations.
pub type Result<T> = std::result::Result<T, SessionError>;
