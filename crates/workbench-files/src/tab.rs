//! The open-buffer record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::content::LoadedFile;

/// Load lifecycle of a tab.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TabStatus {
    Loading,
    Ready,
    Error,
}

/// Remote file metadata as last reported by the server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileMetadata {
    pub size: Option<u64>,
    pub modified_at: Option<DateTime<Utc>>,
    pub content_type: Option<String>,
    /// Mirror of the tab's etag.
    pub etag: Option<String>,
}

/// One open, editable file buffer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileTab {
    /// Stable path-like key.
    pub id: String,
    pub name: String,
    /// Syntax mode hint.
    pub language: String,
    pub content: String,
    /// Last known-saved text.
    pub initial_content: String,
    pub status: TabStatus,
    /// Reason for the last load failure.
    pub load_error: Option<String>,
    pub etag: Option<String>,
    pub metadata: FileMetadata,
    pub pinned: bool,
    pub saving: bool,
    pub save_error: Option<String>,
    pub last_saved_at: Option<DateTime<Utc>>,
    /// Which load attempt this tab is waiting for.
    #[serde(skip)]
    pub(crate) generation: u64,
}

impl FileTab {
    pub(crate) fn loading(id: &str, generation: u64) -> Self {
        Self {
            id: id.to_string(),
            name: file_name(id).to_string(),
            language: language_for(id).to_string(),
            content: String::new(),
            initial_content: String::new(),
            status: TabStatus::Loading,
            load_error: None,
            etag: None,
            metadata: FileMetadata::default(),
            pinned: false,
            saving: false,
            save_error: None,
            last_saved_at: None,
            generation,
        }
    }

    /// Whether the buffer differs from its last saved text.
    pub fn is_dirty(&self) -> bool {
        self.status == TabStatus::Ready && self.content != self.initial_content
    }

    pub fn is_loading(&self) -> bool {
        self.status == TabStatus::Loading
    }

    /// Adopt a server version wholesale.
    pub(crate) fn apply_loaded(&mut self, file: LoadedFile) {
        self.content = file.content.clone();
        self.initial_content = file.content;
        self.etag = file.etag.clone();
        self.metadata = FileMetadata {
            etag: file.etag,
            ..file.metadata
        };
        self.status = TabStatus::Ready;
        self.load_error = None;
    }
}

/// The last path segment.
fn file_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// Syntax mode hint for a path, from its extension.
pub fn language_for(path: &str) -> &'static str {
    let name = file_name(path);
    let ext = match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => ext.to_ascii_lowercase(),
        _ => return "plaintext",
    };
    match ext.as_str() {
        "json" => "json",
        "py" => "python",
        "yaml" | "yml" => "yaml",
        "toml" => "toml",
        "md" | "markdown" => "markdown",
        "sql" => "sql",
        "js" | "mjs" => "javascript",
        "ts" => "typescript",
        "rs" => "rust",
        "sh" | "bash" => "shell",
        "csv" => "csv",
        "xml" => "xml",
        "html" | "htm" => "html",
        _ => "plaintext",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_language_hints() {
        assert_eq!(language_for("manifest.json"), "json");
        assert_eq!(language_for("src/data.py"), "python");
        assert_eq!(language_for("conf/pipeline.YML"), "yaml");
        assert_eq!(language_for("Makefile"), "plaintext");
        assert_eq!(language_for(".env"), "plaintext");
    }

    #[test]
    fn test_new_tab_is_loading_and_clean() {
        let tab = FileTab::loading("src/data.py", 1);
        assert_eq!(tab.name, "data.py");
        assert_eq!(tab.language, "python");
        assert!(tab.is_loading());
        assert!(!tab.is_dirty());
    }

    #[test]
    fn test_dirty_requires_ready() {
        let mut tab = FileTab::loading("a.txt", 1);
        tab.content = "edited".to_string();
        assert!(!tab.is_dirty());

        tab.status = TabStatus::Ready;
        assert!(tab.is_dirty());

        tab.initial_content = "edited".to_string();
        assert!(!tab.is_dirty());
    }
}
