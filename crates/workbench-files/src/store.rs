//! Async shell around [`FileSessionState`].
//!
//! The store runs loads on the tokio runtime, implements the compare-and-swap
//! save protocol, and writes the tab layout to session persistence after
//! every change that affects it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use workbench_session::{Scoped, TabSessionSnapshot};

use crate::content::{LoadedFile, SaveReceipt, SaveRequest, SharedFileContent};
use crate::error::{FileError, Result};
use crate::state::{FileSessionState, LoadTicket, Outcome, RecentDirection, TabAction, TabZone};
use crate::tab::{FileTab, TabStatus};
use crate::tree::FileTree;

/// How a single save ended, when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// The server accepted the write.
    Saved,
    /// Nothing to save; no request was made.
    Unchanged,
    /// The server had a newer version. The tab now holds that version and
    /// the user should review it before saving again.
    Reloaded,
}

/// Accounting for a sequential multi-tab save.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SaveAllReport {
    pub saved: Vec<String>,
    pub unchanged: Vec<String>,
    pub reloaded: Vec<String>,
    /// `(tab id, reason)` pairs.
    pub failed: Vec<(String, String)>,
}

impl SaveAllReport {
    /// True when every tab was either saved or had nothing to save.
    pub fn is_clean(&self) -> bool {
        self.reloaded.is_empty() && self.failed.is_empty()
    }
}

struct StoreInner {
    state: Mutex<FileSessionState>,
    files: SharedFileContent,
    persistence: Option<Scoped<TabSessionSnapshot>>,
    /// Bumped under the state lock for every layout change.
    revision: AtomicU64,
    persisted: Mutex<Persisted>,
    loads: Mutex<Vec<JoinHandle<()>>>,
}

/// The newest layout handed to the backend.
#[derive(Default)]
struct Persisted {
    revision: u64,
    snapshot: Option<TabSessionSnapshot>,
}

/// Owns the open tabs of one editing session.
///
/// Cheap to clone; clones share the same session.
#[derive(Clone)]
pub struct FileSessionStore {
    inner: Arc<StoreInner>,
}

impl FileSessionStore {
    /// Create a store without persistence.
    pub fn new(files: SharedFileContent) -> Self {
        Self::from_parts(files, None)
    }

    /// Create a store that persists its tab layout into `tabs`.
    pub fn with_persistence(files: SharedFileContent, tabs: Scoped<TabSessionSnapshot>) -> Self {
        Self::from_parts(files, Some(tabs))
    }

    fn from_parts(files: SharedFileContent, persistence: Option<Scoped<TabSessionSnapshot>>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                state: Mutex::new(FileSessionState::new()),
                files,
                persistence,
                revision: AtomicU64::new(0),
                persisted: Mutex::new(Persisted::default()),
                loads: Mutex::new(Vec::new()),
            }),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Tab operations
    // ─────────────────────────────────────────────────────────────────────────

    /// Open `id` (or re-activate it if already open).
    pub fn open_file(&self, id: &str) -> bool {
        self.dispatch(TabAction::Open(id.to_string()))
    }

    /// Activate a tab, retrying its load if it previously failed.
    pub fn select_tab(&self, id: &str) -> bool {
        self.dispatch(TabAction::Select(id.to_string()))
    }

    pub fn close_tab(&self, id: &str) -> bool {
        self.dispatch(TabAction::Close(id.to_string()))
    }

    pub fn close_other_tabs(&self, id: &str) -> bool {
        self.dispatch(TabAction::CloseOthers(id.to_string()))
    }

    pub fn close_tabs_to_right(&self, id: &str) -> bool {
        self.dispatch(TabAction::CloseToRight(id.to_string()))
    }

    pub fn close_all_tabs(&self) -> bool {
        self.dispatch(TabAction::CloseAll)
    }

    pub fn move_tab(&self, id: &str, target_index: usize, zone: Option<TabZone>) -> bool {
        self.dispatch(TabAction::Move {
            id: id.to_string(),
            target_index,
            zone,
        })
    }

    pub fn pin_tab(&self, id: &str) -> bool {
        self.dispatch(TabAction::Pin(id.to_string()))
    }

    pub fn unpin_tab(&self, id: &str) -> bool {
        self.dispatch(TabAction::Unpin(id.to_string()))
    }

    /// Replace a tab's text locally. Never touches the network.
    pub fn update_content(&self, id: &str, content: impl Into<String>) -> bool {
        self.dispatch(TabAction::UpdateContent {
            id: id.to_string(),
            content: content.into(),
        })
    }

    pub fn select_recent_tab(&self, direction: RecentDirection) -> bool {
        self.dispatch(TabAction::SelectRecent(direction))
    }

    /// Rehydrate the persisted layout, dropping tabs that are not in `tree`.
    ///
    /// Returns the number of restored tabs. A missing or unreadable snapshot
    /// restores nothing.
    pub fn restore(&self, tree: &FileTree) -> usize {
        let Some(persistence) = &self.inner.persistence else {
            return 0;
        };
        let mut snapshot = match persistence.get() {
            Ok(Some(snapshot)) => snapshot,
            Ok(None) => return 0,
            Err(e) => {
                warn!(key = %persistence.key(), error = %e, "Ignoring unreadable tab session");
                return 0;
            }
        };

        let dropped = snapshot.retain_known(|id| tree.contains(id));
        if dropped > 0 {
            debug!(dropped, "Dropped persisted tabs missing from the file tree");
        }
        let restored = snapshot.open_tabs.len();
        self.dispatch(TabAction::Restore(snapshot));
        info!(restored, "Restored tab session");
        restored
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Save protocol
    // ─────────────────────────────────────────────────────────────────────────

    pub fn begin_saving_tab(&self, id: &str) -> bool {
        self.dispatch(TabAction::BeginSaving(id.to_string()))
    }

    pub fn complete_saving_tab(&self, id: &str, saved_content: String, receipt: SaveReceipt) -> bool {
        self.dispatch(TabAction::CompleteSaving {
            id: id.to_string(),
            saved_content,
            receipt,
        })
    }

    pub fn fail_saving_tab(&self, id: &str, message: impl Into<String>) -> bool {
        self.dispatch(TabAction::FailSaving {
            id: id.to_string(),
            message: message.into(),
        })
    }

    pub fn replace_tab_content(&self, id: &str, file: LoadedFile) -> bool {
        self.dispatch(TabAction::ReplaceContent {
            id: id.to_string(),
            file,
        })
    }

    /// Save one tab, conditional on its etag.
    ///
    /// A clean tab is not sent. On a conflict the server version is loaded
    /// into the tab and [`SaveOutcome::Reloaded`] is returned; any other
    /// failure keeps the local edits and records `save_error`.
    pub async fn save_tab(&self, id: &str) -> Result<SaveOutcome> {
        let prepared = self.with_state(|state| {
            let result = match state.tab(id) {
                None => Err(FileError::TabNotFound(id.to_string())),
                Some(tab) if tab.status != TabStatus::Ready => {
                    Err(FileError::NotReady(id.to_string()))
                }
                Some(tab) if tab.saving => Err(FileError::AlreadySaving(id.to_string())),
                Some(tab) if !tab.is_dirty() => Ok(None),
                Some(tab) => Ok(Some((tab.content.clone(), tab.etag.clone()))),
            };
            let outcome = match &result {
                Ok(Some(_)) => state.reduce(TabAction::BeginSaving(id.to_string())),
                _ => Outcome::default(),
            };
            (result, outcome)
        })
        .0?;

        let Some((content, etag)) = prepared else {
            debug!(tab_id = %id, "Tab is clean, skipping save");
            return Ok(SaveOutcome::Unchanged);
        };

        let request = SaveRequest::update(id, content.clone(), etag);
        match self.inner.files.save_file(request).await {
            Ok(receipt) => {
                debug!(tab_id = %id, etag = ?receipt.etag, "Saved tab");
                self.complete_saving_tab(id, content, receipt);
                Ok(SaveOutcome::Saved)
            }
            Err(e) if e.is_conflict() => {
                warn!(tab_id = %id, "Save conflict, reloading server version");
                match self.inner.files.load_file(id).await {
                    Ok(file) => {
                        self.replace_tab_content(id, file);
                        Ok(SaveOutcome::Reloaded)
                    }
                    Err(load_err) => {
                        warn!(tab_id = %id, error = %load_err, "Reload after conflict failed");
                        self.fail_saving_tab(
                            id,
                            format!(
                                "The file changed on the server and could not be reloaded: {}",
                                load_err.reason()
                            ),
                        );
                        Err(e)
                    }
                }
            }
            Err(e) => {
                warn!(tab_id = %id, error = %e, "Save failed");
                self.fail_saving_tab(id, e.reason());
                Err(e)
            }
        }
    }

    /// Save every dirty tab, one after another, in visual order.
    pub async fn save_all(&self) -> SaveAllReport {
        let ids = self.inner.state.lock().dirty_tab_ids();
        self.save_tabs(ids).await
    }

    /// Save the given tabs sequentially, in the given order.
    pub async fn save_tabs<I, S>(&self, ids: I) -> SaveAllReport
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut report = SaveAllReport::default();
        for id in ids {
            let id = id.into();
            match self.save_tab(&id).await {
                Ok(SaveOutcome::Saved) => report.saved.push(id),
                Ok(SaveOutcome::Unchanged) => report.unchanged.push(id),
                Ok(SaveOutcome::Reloaded) => report.reloaded.push(id),
                Err(e) => report.failed.push((id, e.to_string())),
            }
        }
        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Open tabs in visual order.
    pub fn tabs(&self) -> Vec<FileTab> {
        self.inner.state.lock().tabs().to_vec()
    }

    pub fn tab(&self, id: &str) -> Option<FileTab> {
        self.inner.state.lock().tab(id).cloned()
    }

    pub fn active_tab_id(&self) -> Option<String> {
        self.inner.state.lock().active_tab_id().map(str::to_string)
    }

    pub fn mru(&self) -> Vec<String> {
        self.inner.state.lock().mru().to_vec()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.state.lock().is_dirty()
    }

    /// Whether any tab is still waiting for its content.
    pub fn is_loading(&self) -> bool {
        self.inner.state.lock().is_loading()
    }

    pub fn snapshot(&self) -> TabSessionSnapshot {
        self.inner.state.lock().snapshot()
    }

    /// Wait until every load started so far has finished.
    pub async fn wait_for_loads(&self) {
        loop {
            let handles = std::mem::take(&mut *self.inner.loads.lock());
            if handles.is_empty() {
                return;
            }
            for handle in handles {
                if let Err(e) = handle.await {
                    warn!(error = %e, "File load task failed");
                }
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    fn dispatch(&self, action: TabAction) -> bool {
        self.with_state(|state| ((), state.reduce(action))).1
    }

    /// Run `f` under the state lock, then persist if the layout changed and
    /// start any loads it asked for. Returns `f`'s value and whether the
    /// state changed.
    ///
    /// The snapshot is taken under the lock but written after it is
    /// released, so a slow backend never blocks other tab operations.
    fn with_state<R>(&self, f: impl FnOnce(&mut FileSessionState) -> (R, Outcome)) -> (R, bool) {
        let (value, outcome, pending) = {
            let mut state = self.inner.state.lock();
            let (value, outcome) = f(&mut state);
            let pending = (outcome.changed && self.inner.persistence.is_some()).then(|| {
                let revision = self.inner.revision.fetch_add(1, Ordering::Relaxed) + 1;
                (revision, state.snapshot())
            });
            (value, outcome, pending)
        };
        if let Some((revision, snapshot)) = pending {
            self.persist(revision, snapshot);
        }
        for ticket in outcome.loads {
            self.spawn_load(ticket);
        }
        (value, outcome.changed)
    }

    /// Write `snapshot` unless a newer revision already reached the backend.
    fn persist(&self, revision: u64, snapshot: TabSessionSnapshot) {
        let Some(persistence) = &self.inner.persistence else {
            return;
        };
        let mut persisted = self.inner.persisted.lock();
        if revision <= persisted.revision {
            debug!(revision, "Skipping superseded tab session");
            return;
        }
        persisted.revision = revision;
        if persisted.snapshot.as_ref() == Some(&snapshot) {
            return;
        }
        match persistence.set(&snapshot) {
            Ok(()) => persisted.snapshot = Some(snapshot),
            Err(e) => warn!(key = %persistence.key(), error = %e, "Failed to persist tab session"),
        }
    }

    fn spawn_load(&self, ticket: LoadTicket) {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!(tab_id = %ticket.id, "No async runtime, file load not started");
            return;
        };
        let store = self.clone();
        let handle = runtime.spawn(async move {
            let LoadTicket { id, generation } = ticket;
            debug!(tab_id = %id, generation, "Loading file");
            let action = match store.inner.files.load_file(&id).await {
                Ok(file) => TabAction::LoadSucceeded {
                    id,
                    generation,
                    file,
                },
                Err(e) => {
                    warn!(tab_id = %id, error = %e, "File load failed");
                    TabAction::LoadFailed {
                        id,
                        generation,
                        message: e.reason(),
                    }
                }
            };
            store.dispatch(action);
        });
        let mut loads = self.inner.loads.lock();
        loads.retain(|h| !h.is_finished());
        loads.push(handle);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockFiles;
    use std::sync::OnceLock;

    use workbench_session::{
        MemoryBackend, PersistenceBackend, Result as SessionResult, SessionScope, SharedBackend,
    };

    fn store_with(files: &MockFiles) -> FileSessionStore {
        FileSessionStore::new(Arc::new(files.clone()))
    }

    async fn open_loaded(store: &FileSessionStore, id: &str) {
        store.open_file(id);
        store.wait_for_loads().await;
    }

    #[tokio::test]
    async fn test_open_loads_content() {
        let files = MockFiles::new().with_file("manifest.json", "{}");
        let store = store_with(&files);

        store.open_file("manifest.json");
        assert!(store.is_loading());
        store.wait_for_loads().await;

        let tab = store.tab("manifest.json").unwrap();
        assert_eq!(tab.status, TabStatus::Ready);
        assert_eq!(tab.content, "{}");
        assert_eq!(tab.etag.as_deref(), Some("v1"));
        assert_eq!(tab.metadata.etag.as_deref(), Some("v1"));
        assert!(!store.is_loading());
    }

    #[tokio::test]
    async fn test_open_two_files_sets_mru() {
        let files = MockFiles::new()
            .with_file("manifest.json", "{}")
            .with_file("src/data.py", "x = 1");
        let store = store_with(&files);

        store.open_file("manifest.json");
        store.open_file("src/data.py");
        store.wait_for_loads().await;

        assert_eq!(store.active_tab_id().as_deref(), Some("src/data.py"));
        assert_eq!(store.mru(), ["src/data.py", "manifest.json"]);
        assert_eq!(files.load_count(), 2);
    }

    #[tokio::test]
    async fn test_reopen_does_not_reload() {
        let files = MockFiles::new().with_file("a.txt", "A");
        let store = store_with(&files);
        open_loaded(&store, "a.txt").await;
        open_loaded(&store, "a.txt").await;
        assert_eq!(files.load_count(), 1);
    }

    #[tokio::test]
    async fn test_load_failure_then_retry_on_select() {
        let files = MockFiles::new().with_file("a.txt", "A");
        files.fail_load("a.txt", "connection reset");
        let store = store_with(&files);

        open_loaded(&store, "a.txt").await;
        let tab = store.tab("a.txt").unwrap();
        assert_eq!(tab.status, TabStatus::Error);
        assert_eq!(tab.load_error.as_deref(), Some("connection reset"));

        files.clear_load_failure("a.txt");
        store.select_tab("a.txt");
        store.wait_for_loads().await;
        assert_eq!(store.tab("a.txt").unwrap().status, TabStatus::Ready);
        assert_eq!(store.tab("a.txt").unwrap().content, "A");
    }

    #[tokio::test]
    async fn test_save_clean_tab_makes_no_request() {
        let files = MockFiles::new().with_file("a.txt", "A");
        let store = store_with(&files);
        open_loaded(&store, "a.txt").await;

        let outcome = store.save_tab("a.txt").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Unchanged);
        assert_eq!(files.save_count(), 0);
    }

    #[tokio::test]
    async fn test_save_dirty_tab() {
        let files = MockFiles::new().with_file("a.txt", "A");
        let store = store_with(&files);
        open_loaded(&store, "a.txt").await;

        store.update_content("a.txt", "B");
        assert!(store.is_dirty());

        let outcome = store.save_tab("a.txt").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Saved);
        assert_eq!(files.content("a.txt").as_deref(), Some("B"));

        let tab = store.tab("a.txt").unwrap();
        assert!(!tab.is_dirty());
        assert!(!tab.saving);
        assert_eq!(tab.etag.as_deref(), Some("v2"));
        assert!(tab.last_saved_at.is_some());
        assert!(!store.is_dirty());
    }

    #[tokio::test]
    async fn test_conflict_reloads_server_version() {
        let files = MockFiles::new().with_file("a.txt", "original");
        let store = store_with(&files);
        open_loaded(&store, "a.txt").await;

        store.update_content("a.txt", "mine");
        files.server_edit("a.txt", "theirs");

        let outcome = store.save_tab("a.txt").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Reloaded);

        let tab = store.tab("a.txt").unwrap();
        assert_eq!(tab.content, "theirs");
        assert_eq!(tab.initial_content, "theirs");
        assert_eq!(tab.etag.as_deref(), Some("v2"));
        assert_eq!(tab.save_error, None);
        assert!(!tab.saving);
        assert_eq!(files.content("a.txt").as_deref(), Some("theirs"));
    }

    #[tokio::test]
    async fn test_generic_failure_keeps_edits() {
        let files = MockFiles::new().with_file("a.txt", "A");
        let store = store_with(&files);
        open_loaded(&store, "a.txt").await;

        store.update_content("a.txt", "B");
        files.fail_next_save("disk full");

        let err = store.save_tab("a.txt").await.unwrap_err();
        assert!(!err.is_conflict());

        let tab = store.tab("a.txt").unwrap();
        assert_eq!(tab.content, "B");
        assert!(tab.is_dirty());
        assert!(!tab.saving);
        assert_eq!(tab.save_error.as_deref(), Some("disk full"));
    }

    #[tokio::test]
    async fn test_save_unknown_or_loading_tab() {
        let files = MockFiles::new()
            .with_file("a.txt", "A")
            .with_latency(std::time::Duration::from_millis(20));
        let store = store_with(&files);

        let err = store.save_tab("missing").await.unwrap_err();
        assert!(matches!(err, FileError::TabNotFound(_)));

        store.open_file("a.txt");
        let err = store.save_tab("a.txt").await.unwrap_err();
        assert!(matches!(err, FileError::NotReady(_)));
        store.wait_for_loads().await;
    }

    #[tokio::test]
    async fn test_save_all_is_sequential_and_accounts_each_tab() {
        let files = MockFiles::new()
            .with_file("a.txt", "A")
            .with_file("b.txt", "B")
            .with_file("c.txt", "C");
        let store = store_with(&files);
        for id in ["a.txt", "b.txt", "c.txt"] {
            store.open_file(id);
        }
        store.wait_for_loads().await;

        store.update_content("a.txt", "A2");
        store.update_content("b.txt", "B2");
        store.update_content("c.txt", "C2");
        files.server_edit("b.txt", "B-remote");

        let report = store.save_all().await;
        assert_eq!(report.saved, ["a.txt", "c.txt"]);
        assert_eq!(report.reloaded, ["b.txt"]);
        assert!(report.failed.is_empty());
        assert!(!report.is_clean());
        assert!(!store.is_dirty());
        assert_eq!(store.tab("b.txt").unwrap().content, "B-remote");
    }

    #[tokio::test]
    async fn test_layout_round_trips_through_persistence() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let scope = SessionScope::new("ws", "doc");
        let files = MockFiles::new()
            .with_file("manifest.json", "{}")
            .with_file("src/data.py", "")
            .with_file("README.md", "");

        let store = FileSessionStore::with_persistence(
            Arc::new(files.clone()),
            scope.tabs(backend.clone()),
        );
        for id in ["manifest.json", "src/data.py", "README.md"] {
            store.open_file(id);
        }
        store.pin_tab("README.md");
        store.select_tab("manifest.json");
        store.wait_for_loads().await;
        let before = store.snapshot();

        let rehydrated =
            FileSessionStore::with_persistence(Arc::new(files.clone()), scope.tabs(backend));
        let tree = FileTree::from_paths(["manifest.json", "src/data.py", "README.md"]);
        assert_eq!(rehydrated.restore(&tree), 3);
        rehydrated.wait_for_loads().await;

        assert_eq!(rehydrated.snapshot(), before);
        assert!(rehydrated.tab("README.md").unwrap().pinned);
        assert_eq!(rehydrated.tab("manifest.json").unwrap().content, "{}");
    }

    #[tokio::test]
    async fn test_restore_drops_files_missing_from_tree() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let scope = SessionScope::new("ws", "doc");
        let files = MockFiles::new()
            .with_file("a.txt", "")
            .with_file("b.txt", "");

        let store =
            FileSessionStore::with_persistence(Arc::new(files.clone()), scope.tabs(backend.clone()));
        store.open_file("a.txt");
        store.open_file("b.txt");
        store.wait_for_loads().await;

        let rehydrated =
            FileSessionStore::with_persistence(Arc::new(files), scope.tabs(backend.clone()));
        assert_eq!(rehydrated.restore(&FileTree::from_paths(["a.txt"])), 1);
        assert_eq!(rehydrated.active_tab_id().as_deref(), Some("a.txt"));
        assert_eq!(rehydrated.mru(), ["a.txt"]);

        let stored = scope.tabs(backend).get().unwrap().unwrap();
        assert_eq!(stored.open_tabs.len(), 1);
        rehydrated.wait_for_loads().await;
    }

    #[tokio::test]
    async fn test_close_only_tab_persists_empty_session() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let scope = SessionScope::new("ws", "doc");
        let files = MockFiles::new().with_file("manifest.json", "{}");
        let store =
            FileSessionStore::with_persistence(Arc::new(files), scope.tabs(backend.clone()));

        open_loaded(&store, "manifest.json").await;
        store.close_tab("manifest.json");

        assert!(store.tabs().is_empty());
        assert_eq!(store.active_tab_id(), None);
        let stored = scope.tabs(backend).get().unwrap().unwrap();
        assert!(stored.open_tabs.is_empty());
        assert_eq!(stored.active_tab_id, None);
    }

    /// Memory backend that reads the store back while a write is in progress.
    #[derive(Default)]
    struct ReentrantBackend {
        inner: MemoryBackend,
        store: OnceLock<FileSessionStore>,
        tabs_seen_during_write: Mutex<Vec<usize>>,
    }

    impl PersistenceBackend for ReentrantBackend {
        fn get(&self, key: &str) -> SessionResult<Option<serde_json::Value>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: serde_json::Value) -> SessionResult<()> {
            if let Some(store) = self.store.get() {
                self.tabs_seen_during_write.lock().push(store.tabs().len());
            }
            self.inner.set(key, value)
        }

        fn clear(&self, key: &str) -> SessionResult<()> {
            self.inner.clear(key)
        }
    }

    #[tokio::test]
    async fn test_persistence_write_runs_outside_state_lock() {
        let backend = Arc::new(ReentrantBackend::default());
        let shared: SharedBackend = backend.clone();
        let scope = SessionScope::new("ws", "doc");
        let files = MockFiles::new()
            .with_file("a.txt", "a")
            .with_file("b.txt", "b");
        let store = FileSessionStore::with_persistence(Arc::new(files), scope.tabs(shared.clone()));
        assert!(backend.store.set(store.clone()).is_ok());

        store.open_file("a.txt");
        store.open_file("b.txt");
        store.wait_for_loads().await;

        let seen = backend.tabs_seen_during_write.lock().clone();
        assert!(!seen.is_empty());
        assert_eq!(seen.last(), Some(&2));
        let stored = scope.tabs(shared).get().unwrap().unwrap();
        assert_eq!(stored.open_tabs.len(), 2);
        assert_eq!(stored.active_tab_id.as_deref(), Some("b.txt"));
    }

    #[tokio::test]
    async fn test_restore_without_snapshot_is_noop() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let store = FileSessionStore::with_persistence(
            Arc::new(MockFiles::new()),
            SessionScope::new("ws", "doc").tabs(backend),
        );
        assert_eq!(store.restore(&FileTree::new()), 0);
        assert!(store.tabs().is_empty());
    }
}
