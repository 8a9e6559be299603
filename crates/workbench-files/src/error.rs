//! Error types for file session operations.

use thiserror::Error;

/// Error type for file loads, saves and tab lookups.
#[derive(Debug, Error)]
pub enum FileError {
    /// Fetching file content failed. Retryable by re-selecting the tab.
    #[error("Failed to load {path}: {message}")]
    Load { path: String, message: String },

    /// The version token sent with a save no longer matches the server.
    #[error("Save conflict for {path}: the file changed on the server")]
    Conflict { path: String },

    /// Saving failed for any other reason. Local edits are kept.
    #[error("Failed to save {path}: {message}")]
    Save { path: String, message: String },

    /// No open tab has this id.
    #[error("Tab not open: {0}")]
    TabNotFound(String),

    /// The tab has not finished loading.
    #[error("Tab is not ready: {0}")]
    NotReady(String),

    /// A save for this tab is already in flight.
    #[error("Tab is already saving: {0}")]
    AlreadySaving(String),
}

impl FileError {
    pub fn load(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn save(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Save {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn conflict(path: impl Into<String>) -> Self {
        Self::Conflict { path: path.into() }
    }

    /// Check if this is a version-token conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(self, FileError::Conflict { .. })
    }

    /// The human-readable reason without the path prefix.
    pub fn reason(&self) -> String {
        match self {
            FileError::Load { message, .. } | FileError::Save { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Result type for file session operations.
pub type Result<T> = std::result::Result<T, FileError>;
