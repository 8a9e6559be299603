//! The activity record: one build, validation or extraction attempt.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::bounded::BoundedLog;
use crate::ledger::LOG_CAPACITY;
use crate::types::{
    ActivityId, ActivityKind, ActivityMetadata, ActivityStatus, Issue, IssueLevel, LogLine,
    OutputLink, RunOutput,
};

/// One recorded attempt, with its own log and issue history.
///
/// Status, logs and issues are private: they only change through the
/// [`crate::ActivityLedger`] reducer so that the terminal-once rule and the
/// derived issue counts cannot be bypassed.
#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: ActivityId,
    pub kind: ActivityKind,
    status: ActivityStatus,
    pub label: String,
    pub started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    pub metadata: ActivityMetadata,
    logs: BoundedLog<LogLine>,
    issues: Vec<Issue>,
    error_count: usize,
    warning_count: usize,
    pub summary: Option<String>,
    pub error_message: Option<String>,
    pub outputs: Vec<RunOutput>,
    pub output_links: Vec<OutputLink>,
}

impl Activity {
    /// Create a running activity stamped now.
    pub fn new(kind: ActivityKind, label: impl Into<String>) -> Self {
        Self {
            id: ActivityId::new(),
            kind,
            status: ActivityStatus::Running,
            label: label.into(),
            started_at: Utc::now(),
            finished_at: None,
            metadata: ActivityMetadata::default(),
            logs: BoundedLog::new(LOG_CAPACITY),
            issues: Vec::new(),
            error_count: 0,
            warning_count: 0,
            summary: None,
            error_message: None,
            outputs: Vec::new(),
            output_links: Vec::new(),
        }
    }

    /// Start in the queued state instead of running.
    pub fn queued(mut self) -> Self {
        self.status = ActivityStatus::Queued;
        self
    }

    /// Use a specific id.
    pub fn with_id(mut self, id: ActivityId) -> Self {
        self.id = id;
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: ActivityMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Seed the log with a first line.
    pub fn with_log(mut self, line: LogLine) -> Self {
        self.logs.push(line);
        self
    }

    pub fn status(&self) -> ActivityStatus {
        self.status
    }

    pub fn finished_at(&self) -> Option<DateTime<Utc>> {
        self.finished_at
    }

    /// Whether the activity has reached a terminal status.
    pub fn is_finished(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the activity is currently running.
    pub fn is_running(&self) -> bool {
        self.status == ActivityStatus::Running
    }

    /// Retained log lines, oldest first.
    pub fn logs(&self) -> &BoundedLog<LogLine> {
        &self.logs
    }

    /// Accumulated issues, in arrival order.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn warning_count(&self) -> usize {
        self.warning_count
    }

    /// Wall time from start to finish, if finished.
    pub fn duration(&self) -> Option<chrono::Duration> {
        self.finished_at.map(|end| end - self.started_at)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Reducer-only mutations
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn set_log_capacity(&mut self, capacity: usize) {
        self.logs.set_capacity(capacity);
    }

    pub(crate) fn push_log(&mut self, line: LogLine) {
        self.logs.push(line);
    }

    pub(crate) fn push_issues(&mut self, issues: Vec<Issue>) {
        self.issues.extend(issues);
        self.recount_issues();
    }

    pub(crate) fn set_status(&mut self, status: ActivityStatus) {
        self.status = status;
    }

    pub(crate) fn set_finished_at(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    /// Full recount so the counters can never drift from the issue list.
    fn recount_issues(&mut self) {
        self.error_count = self
            .issues
            .iter()
            .filter(|i| i.level == IssueLevel::Error)
            .count();
        self.warning_count = self
            .issues
            .iter()
            .filter(|i| i.level == IssueLevel::Warning)
            .count();
    }
}

/// A partial update shallow-merged onto an activity.
///
/// `status` may only move between non-terminal statuses (e.g. queued to
/// running); terminal transitions go through `Complete`.
#[derive(Debug, Clone, Default)]
pub struct ActivityPatch {
    pub label: Option<String>,
    pub status: Option<ActivityStatus>,
    pub metadata: Option<ActivityMetadata>,
    pub summary: Option<String>,
    pub error_message: Option<String>,
    pub outputs: Option<Vec<RunOutput>>,
    pub output_links: Option<Vec<OutputLink>>,
}

impl ActivityPatch {
    /// Patch that only merges metadata.
    pub fn metadata(metadata: ActivityMetadata) -> Self {
        Self {
            metadata: Some(metadata),
            ..Default::default()
        }
    }

    /// Patch that only moves a queued activity to running.
    pub fn running() -> Self {
        Self {
            status: Some(ActivityStatus::Running),
            ..Default::default()
        }
    }

    /// Patch that records extraction outputs.
    pub fn outputs(outputs: Vec<RunOutput>, links: Vec<OutputLink>) -> Self {
        Self {
            outputs: Some(outputs),
            output_links: Some(links),
            ..Default::default()
        }
    }

    /// Patch that records a non-fatal error message.
    pub fn error_message(message: impl Into<String>) -> Self {
        Self {
            error_message: Some(message.into()),
            ..Default::default()
        }
    }
}
