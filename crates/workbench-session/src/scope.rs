//! Scoped, typed access to session snapshots.

use std::fmt;
use std::marker::PhantomData;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::backend::SharedBackend;
use crate::error::{Result, SessionError};
use crate::snapshot::{ConsoleSnapshot, TabSessionSnapshot};

/// Key prefix shared by every workbench snapshot.
const KEY_PREFIX: &str = "workbench";

/// Identity of one editing session: a workspace plus the document being
/// configured inside it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionScope {
    workspace: String,
    document: String,
}

impl SessionScope {
    /// Create a scope for `document` inside `workspace`.
    pub fn new(workspace: impl Into<String>, document: impl Into<String>) -> Self {
        Self {
            workspace: workspace.into(),
            document: document.into(),
        }
    }

    /// The workspace identity.
    pub fn workspace(&self) -> &str {
        &self.workspace
    }

    /// The document identity.
    pub fn document(&self) -> &str {
        &self.document
    }

    /// Storage key for a named slot within this scope.
    pub fn key(&self, slot: &str) -> String {
        format!("{KEY_PREFIX}:{}:{}:{slot}", self.workspace, self.document)
    }

    /// Handle for an arbitrary typed slot.
    pub fn slot<T>(&self, backend: SharedBackend, slot: &str) -> Scoped<T> {
        Scoped::new(backend, self.key(slot))
    }

    /// Handle for the tab-session snapshot.
    pub fn tabs(&self, backend: SharedBackend) -> Scoped<TabSessionSnapshot> {
        self.slot(backend, "tabs")
    }

    /// Handle for the console-panel snapshot.
    pub fn console(&self, backend: SharedBackend) -> ConsoleHandle {
        ConsoleHandle {
            inner: self.slot(backend, "console"),
        }
    }
}

impl fmt::Display for SessionScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.workspace, self.document)
    }
}

/// A typed handle onto one key of a [`crate::PersistenceBackend`].
pub struct Scoped<T> {
    backend: SharedBackend,
    key: String,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Scoped<T> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            key: self.key.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Scoped<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scoped").field("key", &self.key).finish()
    }
}

impl<T> Scoped<T> {
    /// Create a handle for `key`.
    pub fn new(backend: SharedBackend, key: impl Into<String>) -> Self {
        Self {
            backend,
            key: key.into(),
            _marker: PhantomData,
        }
    }

    /// The storage key this handle reads and writes.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the stored value without decoding it.
    pub fn get_raw(&self) -> Result<Option<Value>> {
        self.backend.get(&self.key)
    }

    /// Remove the stored value.
    pub fn clear(&self) -> Result<()> {
        self.backend.clear(&self.key)
    }
}

impl<T: Serialize + DeserializeOwned> Scoped<T> {
    /// Read and decode the stored value.
    pub fn get(&self) -> Result<Option<T>> {
        match self.get_raw()? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| self.serde_error(source)),
            None => Ok(None),
        }
    }

    /// Encode and store `value`.
    pub fn set(&self, value: &T) -> Result<()> {
        let encoded = serde_json::to_value(value).map_err(|source| self.serde_error(source))?;
        self.backend.set(&self.key, encoded)
    }

    fn serde_error(&self, source: serde_json::Error) -> SessionError {
        SessionError::Serde {
            key: self.key.clone(),
            source,
        }
    }
}

/// Handle for the console snapshot. Reads go through
/// [`ConsoleSnapshot::from_stored`], so older shapes are always migrated.
#[derive(Debug, Clone)]
pub struct ConsoleHandle {
    inner: Scoped<ConsoleSnapshot>,
}

impl ConsoleHandle {
    pub fn key(&self) -> &str {
        self.inner.key()
    }

    pub fn get_raw(&self) -> Result<Option<Value>> {
        self.inner.get_raw()
    }

    /// Read the stored snapshot, converting a pixel height against
    /// `container_px` when the stored value predates fractions.
    pub fn get(&self, container_px: f64) -> Result<Option<ConsoleSnapshot>> {
        self.get_raw()?
            .map(|value| ConsoleSnapshot::from_stored(self.key(), value, container_px))
            .transpose()
    }

    pub fn set(&self, snapshot: &ConsoleSnapshot) -> Result<()> {
        self.inner.set(snapshot)
    }

    pub fn clear(&self) -> Result<()> {
        self.inner.clear()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::backend::MemoryBackend;
    use crate::snapshot::PersistedTab;

    #[test]
    fn test_keys_are_scoped_per_document() {
        let a = SessionScope::new("acme", "one.yaml");
        let b = SessionScope::new("acme", "two.yaml");
        assert_eq!(a.key("tabs"), "workbench:acme:one.yaml:tabs");
        assert_ne!(a.key("tabs"), b.key("tabs"));
        assert_eq!(a.to_string(), "acme/one.yaml");
    }

    #[test]
    fn test_scoped_get_set_clear() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let scope = SessionScope::new("acme", "pipeline.yaml");
        let tabs = scope.tabs(backend.clone());

        assert!(tabs.get().unwrap().is_none());

        let snapshot = TabSessionSnapshot {
            open_tabs: vec![PersistedTab::new("manifest.json", true)],
            active_tab_id: Some("manifest.json".to_string()),
            mru: vec!["manifest.json".to_string()],
        };
        tabs.set(&snapshot).unwrap();
        assert_eq!(tabs.get().unwrap(), Some(snapshot));

        // Another document in the same workspace sees nothing.
        let other = SessionScope::new("acme", "other.yaml").tabs(backend);
        assert!(other.get().unwrap().is_none());

        tabs.clear().unwrap();
        assert!(tabs.get().unwrap().is_none());
    }

    #[test]
    fn test_console_handle_migrates_pixel_height() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let console = SessionScope::new("acme", "pipeline.yaml").console(backend.clone());
        backend
            .set(console.key(), serde_json::json!({"height": 200.0, "state": "collapsed"}))
            .unwrap();

        let snapshot = console.get(800.0).unwrap().unwrap();
        assert_eq!(snapshot.version, crate::CONSOLE_SNAPSHOT_VERSION);
        assert!((snapshot.fraction - 0.25).abs() < f64::EPSILON);
        assert_eq!(snapshot.state, crate::ConsoleState::Collapsed);

        console.clear().unwrap();
        assert!(console.get(800.0).unwrap().is_none());
    }

    #[test]
    fn test_scoped_decode_error_names_key() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let handle: Scoped<TabSessionSnapshot> = Scoped::new(backend.clone(), "k");
        backend.set("k", serde_json::json!("not a snapshot")).unwrap();

        match handle.get() {
            Err(SessionError::Serde { key, .. }) => assert_eq!(key, "k"),
            other => panic!("expected serde error, got {:?}", other),
        }
    }
}
