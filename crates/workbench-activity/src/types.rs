//! Core types shared by the activity model and the ledger.

use std::collections::BTreeMap;
use std::fmt;
use std::ops::{Index, IndexMut};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// ID Types
// ─────────────────────────────────────────────────────────────────────────────

/// Unique identifier for an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ActivityId(Uuid);

impl ActivityId {
    /// Create a new random activity ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for ActivityId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ActivityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Kind & Status
// ─────────────────────────────────────────────────────────────────────────────

/// What an activity does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// Environment build.
    Build,
    /// Configuration validation.
    Validation,
    /// Extraction run.
    Extraction,
}

impl ActivityKind {
    /// Every kind, in display order.
    pub const ALL: [ActivityKind; 3] = [
        ActivityKind::Build,
        ActivityKind::Validation,
        ActivityKind::Extraction,
    ];

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::Build => "build",
            ActivityKind::Validation => "validation",
            ActivityKind::Extraction => "extraction",
        }
    }
}

impl fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityStatus {
    Idle,
    Queued,
    Running,
    Succeeded,
    Failed,
    Canceled,
}

impl ActivityStatus {
    /// Whether the status is final.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ActivityStatus::Succeeded | ActivityStatus::Failed | ActivityStatus::Canceled
        )
    }

    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityStatus::Idle => "idle",
            ActivityStatus::Queued => "queued",
            ActivityStatus::Running => "running",
            ActivityStatus::Succeeded => "succeeded",
            ActivityStatus::Failed => "failed",
            ActivityStatus::Canceled => "canceled",
        }
    }
}

impl fmt::Display for ActivityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Per-kind map
// ─────────────────────────────────────────────────────────────────────────────

/// One value per [`ActivityKind`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindMap<T> {
    pub build: T,
    pub validation: T,
    pub extraction: T,
}

impl<T> KindMap<T> {
    /// Build a map by evaluating `f` for each kind.
    pub fn from_fn(mut f: impl FnMut(ActivityKind) -> T) -> Self {
        Self {
            build: f(ActivityKind::Build),
            validation: f(ActivityKind::Validation),
            extraction: f(ActivityKind::Extraction),
        }
    }

    /// Iterate `(kind, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (ActivityKind, &T)> {
        ActivityKind::ALL.into_iter().map(move |kind| (kind, &self[kind]))
    }
}

impl<T> Index<ActivityKind> for KindMap<T> {
    type Output = T;

    fn index(&self, kind: ActivityKind) -> &T {
        match kind {
            ActivityKind::Build => &self.build,
            ActivityKind::Validation => &self.validation,
            ActivityKind::Extraction => &self.extraction,
        }
    }
}

impl<T> IndexMut<ActivityKind> for KindMap<T> {
    fn index_mut(&mut self, kind: ActivityKind) -> &mut T {
        match kind {
            ActivityKind::Build => &mut self.build,
            ActivityKind::Validation => &mut self.validation,
            ActivityKind::Extraction => &mut self.extraction,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logs & Issues
// ─────────────────────────────────────────────────────────────────────────────

/// Severity of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
    Error,
}

impl LogLevel {
    /// Short prefix for console output.
    pub fn prefix(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DBG",
            LogLevel::Info => "INF",
            LogLevel::Warning => "WRN",
            LogLevel::Error => "ERR",
        }
    }
}

/// One line of activity output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogLine {
    pub level: LogLevel,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl LogLine {
    /// Create a line stamped now.
    pub fn new(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Debug, message)
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(LogLevel::Error, message)
    }
}

/// Severity of a structured issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueLevel {
    Error,
    Warning,
    Info,
}

/// A structured, non-fatal finding from validation or extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub level: IssueLevel,
    pub message: String,
    /// Location inside the configuration (e.g. `sheets[0].columns`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl Issue {
    pub fn new(level: IssueLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            path: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(IssueLevel::Error, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(IssueLevel::Warning, message)
    }

    /// Attach a location.
    pub fn at(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Metadata & Outputs
// ─────────────────────────────────────────────────────────────────────────────

/// Kind-specific activity metadata.
///
/// Every field is optional so that a partial value can be shallow-merged
/// onto an existing one (see [`ActivityMetadata::merge`]).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityMetadata {
    /// Build: rebuild even when the environment is current.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub force: Option<bool>,
    /// Build: wait for the environment to become active.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,
    /// Extraction: source document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_id: Option<String>,
    /// Extraction: sheets to extract.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sheet_names: Option<Vec<String>>,
    /// Validation: digest of the validated configuration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
    /// Remote build id, known once the build is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    /// Remote run id, known once the run is created.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    /// Process exit code reported on completion.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    /// Anything else a collaborator reports.
    #[serde(default, flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ActivityMetadata {
    /// Shallow merge: every field set in `other` overwrites ours.
    pub fn merge(&mut self, other: ActivityMetadata) {
        fn take<T>(slot: &mut Option<T>, value: Option<T>) {
            if value.is_some() {
                *slot = value;
            }
        }
        take(&mut self.force, other.force);
        take(&mut self.wait, other.wait);
        take(&mut self.document_id, other.document_id);
        take(&mut self.sheet_names, other.sheet_names);
        take(&mut self.digest, other.digest);
        take(&mut self.build_id, other.build_id);
        take(&mut self.run_id, other.run_id);
        take(&mut self.exit_code, other.exit_code);
        self.extra.extend(other.extra);
    }
}

/// One file produced by an extraction run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunOutput {
    pub path: String,
    pub byte_size: u64,
}

/// A link to download or inspect one output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputLink {
    pub label: String,
    pub href: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_statuses() {
        assert!(ActivityStatus::Succeeded.is_terminal());
        assert!(ActivityStatus::Failed.is_terminal());
        assert!(ActivityStatus::Canceled.is_terminal());
        assert!(!ActivityStatus::Running.is_terminal());
        assert!(!ActivityStatus::Queued.is_terminal());
        assert!(!ActivityStatus::Idle.is_terminal());
    }

    #[test]
    fn test_kind_map_indexing() {
        let mut map = KindMap::from_fn(|kind| kind.as_str().len());
        assert_eq!(map[ActivityKind::Build], 5);
        map[ActivityKind::Extraction] = 0;
        assert_eq!(map.extraction, 0);
        assert_eq!(map.iter().count(), 3);
    }

    #[test]
    fn test_metadata_merge_is_shallow() {
        let mut base = ActivityMetadata {
            document_id: Some("doc-1".to_string()),
            sheet_names: Some(vec!["A".to_string()]),
            ..Default::default()
        };
        let mut extra = BTreeMap::new();
        extra.insert("attempt".to_string(), Value::from(2));

        base.merge(ActivityMetadata {
            run_id: Some("run-9".to_string()),
            sheet_names: Some(vec!["B".to_string()]),
            extra,
            ..Default::default()
        });

        assert_eq!(base.document_id.as_deref(), Some("doc-1"));
        assert_eq!(base.run_id.as_deref(), Some("run-9"));
        assert_eq!(base.sheet_names, Some(vec!["B".to_string()]));
        assert_eq!(base.extra["attempt"], Value::from(2));
    }

    #[test]
    fn test_status_wire_names() {
        assert_eq!(
            serde_json::to_string(&ActivityStatus::Canceled).unwrap(),
            "\"canceled\""
        );
        assert_eq!(ActivityKind::Validation.to_string(), "validation");
    }
}
