//! The file content collaborator boundary.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::tab::FileMetadata;

/// A file as fetched from the server.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadedFile {
    pub content: String,
    pub etag: Option<String>,
    pub metadata: FileMetadata,
}

impl LoadedFile {
    pub fn new(content: impl Into<String>, etag: Option<String>) -> Self {
        Self {
            content: content.into(),
            etag,
            metadata: FileMetadata::default(),
        }
    }

    pub fn with_metadata(mut self, metadata: FileMetadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A conditional write. `etag` is the precondition; `None` means
/// unconditional (only used for files that do not exist yet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SaveRequest {
    pub path: String,
    pub content: String,
    pub etag: Option<String>,
    pub create: bool,
    pub parents: bool,
}

impl SaveRequest {
    /// Overwrite an existing file at the given version.
    pub fn update(path: impl Into<String>, content: impl Into<String>, etag: Option<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            etag,
            create: false,
            parents: false,
        }
    }

    /// Create a new file, making parent directories as needed.
    pub fn create(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            etag: None,
            create: true,
            parents: true,
        }
    }
}

/// What the server reports after a successful write.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveReceipt {
    pub etag: Option<String>,
    pub size: Option<u64>,
    pub mtime: Option<DateTime<Utc>>,
}

/// Loads and saves file content against the remote workspace.
///
/// `save_file` must fail with [`crate::FileError::Conflict`] when the
/// request's etag does not match the server's current version.
#[async_trait]
pub trait FileContent: Send + Sync {
    async fn load_file(&self, path: &str) -> Result<LoadedFile>;

    async fn save_file(&self, request: SaveRequest) -> Result<SaveReceipt>;
}

pub type SharedFileContent = Arc<dyn FileContent>;
