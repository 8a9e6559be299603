//! In-memory file server for tests.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::content::{FileContent, LoadedFile, SaveReceipt, SaveRequest};
use crate::error::{FileError, Result};
use crate::tab::FileMetadata;

#[derive(Default)]
struct MockState {
    /// path -> (content, version)
    files: HashMap<String, (String, u64)>,
    load_failures: HashMap<String, String>,
    next_save_failure: Option<String>,
    latency: Option<Duration>,
    loads: usize,
    saves: usize,
}

/// A [`FileContent`] backed by a map, with versioned etags (`v1`, `v2`, ...)
/// and injectable failures.
#[derive(Clone, Default)]
pub struct MockFiles {
    state: Arc<Mutex<MockState>>,
}

impl MockFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file at version 1.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.insert(path, content);
        self
    }

    /// Delay every load and save.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.state.lock().latency = Some(latency);
        self
    }

    pub fn insert(&self, path: &str, content: &str) {
        self.state
            .lock()
            .files
            .insert(path.to_string(), (content.to_string(), 1));
    }

    /// Change a file behind the client's back, bumping its version.
    pub fn server_edit(&self, path: &str, content: &str) {
        let mut state = self.state.lock();
        let entry = state
            .files
            .entry(path.to_string())
            .or_insert_with(|| (String::new(), 0));
        entry.0 = content.to_string();
        entry.1 += 1;
    }

    /// Make loads of `path` fail until [`Self::clear_load_failure`].
    pub fn fail_load(&self, path: &str, message: &str) {
        self.state
            .lock()
            .load_failures
            .insert(path.to_string(), message.to_string());
    }

    pub fn clear_load_failure(&self, path: &str) {
        self.state.lock().load_failures.remove(path);
    }

    /// Make the next save fail with a generic error.
    pub fn fail_next_save(&self, message: &str) {
        self.state.lock().next_save_failure = Some(message.to_string());
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.state.lock().files.get(path).map(|(c, _)| c.clone())
    }

    pub fn etag(&self, path: &str) -> Option<String> {
        self.state.lock().files.get(path).map(|(_, v)| etag(*v))
    }

    pub fn load_count(&self) -> usize {
        self.state.lock().loads
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().saves
    }

    async fn delay(&self) {
        let latency = self.state.lock().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

fn etag(version: u64) -> String {
    format!("v{version}")
}

#[async_trait]
impl FileContent for MockFiles {
    async fn load_file(&self, path: &str) -> Result<LoadedFile> {
        self.delay().await;
        let mut state = self.state.lock();
        state.loads += 1;
        if let Some(message) = state.load_failures.get(path) {
            return Err(FileError::load(path, message.clone()));
        }
        let (content, version) = state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| FileError::load(path, "not found"))?;
        let metadata = FileMetadata {
            size: Some(content.len() as u64),
            content_type: Some("text/plain".to_string()),
            ..Default::default()
        };
        Ok(LoadedFile::new(content, Some(etag(version))).with_metadata(metadata))
    }

    async fn save_file(&self, request: SaveRequest) -> Result<SaveReceipt> {
        self.delay().await;
        let mut state = self.state.lock();
        state.saves += 1;
        if let Some(message) = state.next_save_failure.take() {
            return Err(FileError::save(&request.path, message));
        }

        let version = match state.files.get(&request.path) {
            Some((_, current)) => {
                if let Some(expected) = &request.etag
                    && *expected != etag(*current)
                {
                    return Err(FileError::conflict(&request.path));
                }
                current + 1
            }
            None if request.create => 1,
            None => return Err(FileError::save(&request.path, "not found")),
        };

        let size = request.content.len() as u64;
        state.files.insert(request.path, (request.content, version));
        Ok(SaveReceipt {
            etag: Some(etag(version)),
            size: Some(size),
            mtime: Some(Utc::now()),
        })
    }
}
