//! Snapshot shapes persisted between reloads.
//!
//! Two snapshots are stored per [`crate::SessionScope`]:
//! - [`TabSessionSnapshot`]: open tabs, pin flags, active tab and MRU order
//! - [`ConsoleSnapshot`]: console panel size and visibility
//!
//! The console snapshot is versioned. Version 1 stored the panel height in
//! pixels; version 2 stores a fraction of the container so the layout
//! survives window resizes. Version 1 snapshots are migrated at read time.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{Result, SessionError};
use crate::scope::ConsoleHandle;

// ─────────────────────────────────────────────────────────────────────────────
// Tab session
// ─────────────────────────────────────────────────────────────────────────────

/// One open tab as persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedTab {
    /// Tab id (the file path).
    pub id: String,
    /// Whether the tab sits in the pinned partition.
    #[serde(default)]
    pub pinned: bool,
}

impl PersistedTab {
    /// Create a persisted tab entry.
    pub fn new(id: impl Into<String>, pinned: bool) -> Self {
        Self {
            id: id.into(),
            pinned,
        }
    }
}

/// Persisted tab layout of an editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TabSessionSnapshot {
    /// Open tabs in visual order.
    #[serde(default)]
    pub open_tabs: Vec<PersistedTab>,

    /// The active tab, if any. An empty string is read as no active tab.
    #[serde(default, deserialize_with = "empty_as_none")]
    pub active_tab_id: Option<String>,

    /// Tab ids, most recently used first.
    #[serde(default)]
    pub mru: Vec<String>,
}

impl TabSessionSnapshot {
    /// Drop every entry whose id does not satisfy `exists`.
    ///
    /// Duplicate tabs are collapsed, MRU entries that do not refer to an open
    /// tab are removed, and an active id that no longer refers to an open tab
    /// is cleared. Returns the number of tab ids that were dropped.
    pub fn retain_known(&mut self, exists: impl Fn(&str) -> bool) -> usize {
        let before = self.open_tabs.len();
        let mut seen = HashSet::new();
        self.open_tabs
            .retain(|tab| exists(tab.id.as_str()) && seen.insert(tab.id.clone()));
        let dropped = before - self.open_tabs.len();

        let mut seen_mru = HashSet::new();
        self.mru
            .retain(|id| seen.contains(id) && seen_mru.insert(id.clone()));

        if let Some(active) = &self.active_tab_id
            && !seen.contains(active)
        {
            self.active_tab_id = None;
        }

        if dropped > 0 {
            debug!(dropped, "Dropped persisted tabs that no longer resolve");
        }
        dropped
    }
}

fn empty_as_none<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Console panel
// ─────────────────────────────────────────────────────────────────────────────

/// Current console snapshot schema version.
pub const CONSOLE_SNAPSHOT_VERSION: u64 = 2;

/// Smallest console height as a fraction of its container.
pub const MIN_CONSOLE_FRACTION: f64 = 0.1;

/// Largest console height as a fraction of its container.
pub const MAX_CONSOLE_FRACTION: f64 = 0.9;

/// Fraction used when a stored height cannot be converted.
const DEFAULT_CONSOLE_FRACTION: f64 = 0.3;

/// Console panel visibility.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsoleState {
    /// Panel shown at its stored size.
    #[default]
    Expanded,
    /// Panel reduced to its header.
    Collapsed,
    /// Panel fills the container.
    Maximized,
}

/// Console panel sizing and visibility (schema version 2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsoleSnapshot {
    /// Schema version; always [`CONSOLE_SNAPSHOT_VERSION`] once read.
    pub version: u64,
    /// Panel height as a fraction of the container.
    pub fraction: f64,
    /// Panel visibility.
    #[serde(default)]
    pub state: ConsoleState,
}

impl Default for ConsoleSnapshot {
    fn default() -> Self {
        Self::new(DEFAULT_CONSOLE_FRACTION, ConsoleState::default())
    }
}

impl ConsoleSnapshot {
    /// Create a current-version snapshot, clamping `fraction`.
    pub fn new(fraction: f64, state: ConsoleState) -> Self {
        Self {
            version: CONSOLE_SNAPSHOT_VERSION,
            fraction: clamp_fraction(fraction),
            state,
        }
    }

    /// Decode a stored value of any known version.
    ///
    /// `container_px` is the current container height, needed to convert a
    /// version 1 pixel height into a fraction. A value without a `version`
    /// field is treated as version 1.
    pub fn from_stored(key: &str, value: Value, container_px: f64) -> Result<Self> {
        let version = value.get("version").and_then(Value::as_u64).unwrap_or(1);
        match version {
            1 => {
                let legacy: LegacyConsoleSnapshot =
                    serde_json::from_value(value).map_err(|source| SessionError::Serde {
                        key: key.to_string(),
                        source,
                    })?;
                Ok(legacy.migrate(container_px))
            }
            CONSOLE_SNAPSHOT_VERSION => {
                let snapshot: ConsoleSnapshot =
                    serde_json::from_value(value).map_err(|source| SessionError::Serde {
                        key: key.to_string(),
                        source,
                    })?;
                Ok(Self::new(snapshot.fraction, snapshot.state))
            }
            other => Err(SessionError::UnsupportedVersion {
                key: key.to_string(),
                version: other,
            }),
        }
    }
}

/// Version 1 console snapshot: height in pixels.
#[derive(Debug, Deserialize)]
struct LegacyConsoleSnapshot {
    height: f64,
    #[serde(default)]
    state: ConsoleState,
}

impl LegacyConsoleSnapshot {
    fn migrate(self, container_px: f64) -> ConsoleSnapshot {
        let fraction = if container_px > 0.0 && self.height.is_finite() {
            self.height / container_px
        } else {
            DEFAULT_CONSOLE_FRACTION
        };
        debug!(
            height = self.height,
            container_px, fraction, "Migrated console snapshot from v1"
        );
        ConsoleSnapshot::new(fraction, self.state)
    }
}

fn clamp_fraction(fraction: f64) -> f64 {
    if fraction.is_nan() {
        DEFAULT_CONSOLE_FRACTION
    } else {
        fraction.clamp(MIN_CONSOLE_FRACTION, MAX_CONSOLE_FRACTION)
    }
}

/// Read the console snapshot, migrating older shapes.
///
/// Unreadable snapshots are logged and treated as absent so a bad value never
/// blocks the session from opening.
pub fn load_console_snapshot(handle: &ConsoleHandle, container_px: f64) -> Option<ConsoleSnapshot> {
    match handle.get(container_px) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(key = %handle.key(), error = %e, "Ignoring unreadable console snapshot");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::backend::{MemoryBackend, PersistenceBackend, SharedBackend};
    use crate::scope::SessionScope;

    fn snapshot() -> TabSessionSnapshot {
        TabSessionSnapshot {
            open_tabs: vec![
                PersistedTab::new("manifest.json", true),
                PersistedTab::new("src/data.py", false),
                PersistedTab::new("src/gone.py", false),
            ],
            active_tab_id: Some("src/gone.py".to_string()),
            mru: vec![
                "src/gone.py".to_string(),
                "src/data.py".to_string(),
                "manifest.json".to_string(),
            ],
        }
    }

    #[test]
    fn test_wire_shape_is_camel_case() {
        let value = serde_json::to_value(snapshot()).unwrap();
        assert!(value.get("openTabs").is_some());
        assert!(value.get("activeTabId").is_some());
        assert_eq!(value["openTabs"][0], json!({"id": "manifest.json", "pinned": true}));
    }

    #[test]
    fn test_empty_active_id_reads_as_none() {
        let parsed: TabSessionSnapshot =
            serde_json::from_value(json!({"openTabs": [], "activeTabId": "", "mru": []})).unwrap();
        assert_eq!(parsed.active_tab_id, None);
    }

    #[test]
    fn test_retain_known_drops_missing_files() {
        let mut snap = snapshot();
        let dropped = snap.retain_known(|id| id != "src/gone.py");

        assert_eq!(dropped, 1);
        let ids: Vec<_> = snap.open_tabs.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["manifest.json", "src/data.py"]);
        assert_eq!(snap.mru, vec!["src/data.py", "manifest.json"]);
        assert_eq!(snap.active_tab_id, None);
        assert!(snap.open_tabs[0].pinned);
    }

    #[test]
    fn test_retain_known_collapses_duplicates() {
        let mut snap = TabSessionSnapshot {
            open_tabs: vec![
                PersistedTab::new("a", false),
                PersistedTab::new("a", true),
            ],
            active_tab_id: Some("a".to_string()),
            mru: vec!["a".to_string(), "a".to_string(), "b".to_string()],
        };
        snap.retain_known(|_| true);
        assert_eq!(snap.open_tabs, vec![PersistedTab::new("a", false)]);
        assert_eq!(snap.mru, vec!["a"]);
        assert_eq!(snap.active_tab_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_console_v1_migrates_to_fraction() {
        let snap =
            ConsoleSnapshot::from_stored("k", json!({"version": 1, "height": 240.0, "state": "collapsed"}), 800.0)
                .unwrap();
        assert_eq!(snap.version, CONSOLE_SNAPSHOT_VERSION);
        assert!((snap.fraction - 0.3).abs() < f64::EPSILON);
        assert_eq!(snap.state, ConsoleState::Collapsed);
    }

    #[test]
    fn test_console_unversioned_is_v1_and_clamped() {
        let snap = ConsoleSnapshot::from_stored("k", json!({"height": 5000.0}), 800.0).unwrap();
        assert_eq!(snap.fraction, MAX_CONSOLE_FRACTION);
        assert_eq!(snap.state, ConsoleState::Expanded);
    }

    #[test]
    fn test_console_v1_without_container_uses_default() {
        let snap = ConsoleSnapshot::from_stored("k", json!({"version": 1, "height": 200.0}), 0.0).unwrap();
        assert!((snap.fraction - DEFAULT_CONSOLE_FRACTION).abs() < f64::EPSILON);
    }

    #[test]
    fn test_console_unknown_version_rejected() {
        let result = ConsoleSnapshot::from_stored("k", json!({"version": 9, "fraction": 0.5}), 800.0);
        assert!(matches!(
            result,
            Err(SessionError::UnsupportedVersion { version: 9, .. })
        ));
    }

    #[test]
    fn test_load_console_snapshot_is_lenient() {
        let backend: SharedBackend = Arc::new(MemoryBackend::new());
        let handle = SessionScope::new("acme", "doc").console(backend.clone());
        assert!(load_console_snapshot(&handle, 800.0).is_none());

        backend.set(handle.key(), json!({"version": 42})).unwrap();
        assert!(load_console_snapshot(&handle, 800.0).is_none());

        handle
            .set(&ConsoleSnapshot::new(0.5, ConsoleState::Maximized))
            .unwrap();
        let loaded = load_console_snapshot(&handle, 800.0).unwrap();
        assert_eq!(loaded.fraction, 0.5);
        assert_eq!(loaded.state, ConsoleState::Maximized);
    }
}
