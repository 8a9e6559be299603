//! The activity ledger reducer.
//!
//! Every transition goes through [`ActivityLedger::reduce`] with a tagged
//! [`LedgerAction`], which keeps the state machine enumerable and testable
//! in isolation. Per-kind views are derived on demand and never stored.

use chrono::{DateTime, Utc};
use tracing::{debug, trace, warn};

use crate::activity::{Activity, ActivityPatch};
use crate::types::{ActivityId, ActivityKind, ActivityStatus, Issue, KindMap, LogLine};

/// Maximum number of log lines retained per activity.
pub const LOG_CAPACITY: usize = 400;

/// Terminal details recorded by `Complete`.
#[derive(Debug, Clone)]
pub struct Completion {
    /// Must be terminal.
    pub status: ActivityStatus,
    /// Defaults to now.
    pub finished_at: Option<DateTime<Utc>>,
    pub summary: Option<String>,
    pub error_message: Option<String>,
}

impl Completion {
    pub fn new(status: ActivityStatus) -> Self {
        Self {
            status,
            finished_at: None,
            summary: None,
            error_message: None,
        }
    }

    pub fn succeeded() -> Self {
        Self::new(ActivityStatus::Succeeded)
    }

    pub fn failed(error_message: impl Into<String>) -> Self {
        Self::new(ActivityStatus::Failed).with_error_message(error_message)
    }

    pub fn canceled() -> Self {
        Self::new(ActivityStatus::Canceled)
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }

    pub fn at(mut self, finished_at: DateTime<Utc>) -> Self {
        self.finished_at = Some(finished_at);
        self
    }
}

/// Actions accepted by the ledger.
#[derive(Debug, Clone)]
pub enum LedgerAction {
    /// Prepend an activity, replacing any entry with the same id.
    Start {
        activity: Box<Activity>,
        select: bool,
    },
    /// Append one log line.
    AppendLog { id: ActivityId, line: LogLine },
    /// Append structured issues.
    AppendIssues { id: ActivityId, issues: Vec<Issue> },
    /// Shallow-merge fields.
    Patch { id: ActivityId, patch: ActivityPatch },
    /// Move into a terminal status, exactly once.
    Complete {
        id: ActivityId,
        completion: Completion,
    },
    /// Select an activity, or the newest one when `None` or unknown.
    Select(Option<ActivityId>),
}

/// Newest-first list of activities plus the current selection.
#[derive(Debug, Clone)]
pub struct ActivityLedger {
    activities: Vec<Activity>,
    selected: Option<ActivityId>,
    log_capacity: usize,
}

impl Default for ActivityLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl ActivityLedger {
    /// Create an empty ledger with the default log capacity.
    pub fn new() -> Self {
        Self::with_log_capacity(LOG_CAPACITY)
    }

    /// Create an empty ledger retaining at most `log_capacity` lines per
    /// activity. A capacity of 0 falls back to [`LOG_CAPACITY`].
    pub fn with_log_capacity(log_capacity: usize) -> Self {
        Self {
            activities: Vec::new(),
            selected: None,
            log_capacity: if log_capacity == 0 {
                LOG_CAPACITY
            } else {
                log_capacity
            },
        }
    }

    pub fn log_capacity(&self) -> usize {
        self.log_capacity
    }

    /// Apply an action. Returns whether the state changed.
    pub fn reduce(&mut self, action: LedgerAction) -> bool {
        match action {
            LedgerAction::Start { activity, select } => self.apply_start(*activity, select),
            LedgerAction::AppendLog { id, line } => match self.get_mut(id) {
                Some(activity) => {
                    activity.push_log(line);
                    true
                }
                None => {
                    trace!(activity_id = %id, "Dropping log line for unknown activity");
                    false
                }
            },
            LedgerAction::AppendIssues { id, issues } => match self.get_mut(id) {
                Some(activity) => {
                    if issues.is_empty() {
                        return false;
                    }
                    activity.push_issues(issues);
                    true
                }
                None => {
                    trace!(activity_id = %id, "Dropping issues for unknown activity");
                    false
                }
            },
            LedgerAction::Patch { id, patch } => self.apply_patch(id, patch),
            LedgerAction::Complete { id, completion } => self.apply_complete(id, completion),
            LedgerAction::Select(id) => {
                let next = id
                    .filter(|id| self.get(*id).is_some())
                    .or_else(|| self.newest().map(|a| a.id));
                let changed = next != self.selected;
                self.selected = next;
                changed
            }
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Convenience dispatchers
    // ─────────────────────────────────────────────────────────────────────────

    pub fn start(&mut self, activity: Activity, select: bool) -> bool {
        self.reduce(LedgerAction::Start {
            activity: Box::new(activity),
            select,
        })
    }

    pub fn append_log(&mut self, id: ActivityId, line: LogLine) -> bool {
        self.reduce(LedgerAction::AppendLog { id, line })
    }

    pub fn append_issues(&mut self, id: ActivityId, issues: Vec<Issue>) -> bool {
        self.reduce(LedgerAction::AppendIssues { id, issues })
    }

    pub fn patch(&mut self, id: ActivityId, patch: ActivityPatch) -> bool {
        self.reduce(LedgerAction::Patch { id, patch })
    }

    pub fn complete(&mut self, id: ActivityId, completion: Completion) -> bool {
        self.reduce(LedgerAction::Complete { id, completion })
    }

    pub fn select(&mut self, id: Option<ActivityId>) -> bool {
        self.reduce(LedgerAction::Select(id))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// All activities, newest first.
    pub fn activities(&self) -> &[Activity] {
        &self.activities
    }

    pub fn len(&self) -> usize {
        self.activities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.activities.is_empty()
    }

    pub fn get(&self, id: ActivityId) -> Option<&Activity> {
        self.activities.iter().find(|a| a.id == id)
    }

    /// The most recently started activity.
    pub fn newest(&self) -> Option<&Activity> {
        self.activities.first()
    }

    /// The selected activity, falling back to the newest when the stored
    /// selection is unset or no longer resolves.
    pub fn selected(&self) -> Option<&Activity> {
        self.selected
            .and_then(|id| self.get(id))
            .or_else(|| self.newest())
    }

    /// The selected activity's id, with the same fallback as [`selected`].
    ///
    /// [`selected`]: ActivityLedger::selected
    pub fn selected_id(&self) -> Option<ActivityId> {
        self.selected().map(|a| a.id)
    }

    /// The running activity of `kind`, if any.
    pub fn running(&self, kind: ActivityKind) -> Option<&Activity> {
        self.activities
            .iter()
            .find(|a| a.kind == kind && a.is_running())
    }

    /// The most recent activity of `kind`, whatever its status.
    pub fn latest(&self, kind: ActivityKind) -> Option<&Activity> {
        self.activities.iter().find(|a| a.kind == kind)
    }

    /// Running activity per kind.
    pub fn running_by_kind(&self) -> KindMap<Option<&Activity>> {
        KindMap::from_fn(|kind| self.running(kind))
    }

    /// Most recent activity per kind.
    pub fn latest_by_kind(&self) -> KindMap<Option<&Activity>> {
        KindMap::from_fn(|kind| self.latest(kind))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transitions
    // ─────────────────────────────────────────────────────────────────────────

    fn get_mut(&mut self, id: ActivityId) -> Option<&mut Activity> {
        self.activities.iter_mut().find(|a| a.id == id)
    }

    fn apply_start(&mut self, mut activity: Activity, select: bool) -> bool {
        if let Some(pos) = self.activities.iter().position(|a| a.id == activity.id) {
            debug!(activity_id = %activity.id, "Replacing activity with the same id");
            self.activities.remove(pos);
        }

        activity.set_log_capacity(self.log_capacity);
        let id = activity.id;
        debug!(
            activity_id = %id,
            kind = %activity.kind,
            status = %activity.status(),
            "Activity started"
        );
        self.activities.insert(0, activity);

        if select {
            self.selected = Some(id);
        }
        true
    }

    fn apply_patch(&mut self, id: ActivityId, patch: ActivityPatch) -> bool {
        let Some(activity) = self.get_mut(id) else {
            trace!(activity_id = %id, "Dropping patch for unknown activity");
            return false;
        };

        if let Some(status) = patch.status {
            if status.is_terminal() {
                warn!(activity_id = %id, status = %status, "Terminal status must go through complete");
            } else if activity.is_finished() {
                debug!(activity_id = %id, "Ignoring status patch on finished activity");
            } else {
                activity.set_status(status);
            }
        }
        if let Some(label) = patch.label {
            activity.label = label;
        }
        if let Some(metadata) = patch.metadata {
            activity.metadata.merge(metadata);
        }
        if let Some(summary) = patch.summary {
            activity.summary = Some(summary);
        }
        if let Some(message) = patch.error_message {
            activity.error_message = Some(message);
        }
        if let Some(outputs) = patch.outputs {
            activity.outputs = outputs;
        }
        if let Some(links) = patch.output_links {
            activity.output_links = links;
        }
        true
    }

    fn apply_complete(&mut self, id: ActivityId, completion: Completion) -> bool {
        if !completion.status.is_terminal() {
            warn!(activity_id = %id, status = %completion.status, "Complete requires a terminal status");
            return false;
        }

        let Some(activity) = self.get_mut(id) else {
            trace!(activity_id = %id, "Dropping completion for unknown activity");
            return false;
        };

        if activity.is_finished() {
            debug!(
                activity_id = %id,
                status = %activity.status(),
                "Activity already completed"
            );
            return false;
        }

        activity.set_status(completion.status);
        activity.set_finished_at(completion.finished_at.unwrap_or_else(Utc::now));
        if completion.summary.is_some() {
            activity.summary = completion.summary;
        }
        if completion.error_message.is_some() {
            activity.error_message = completion.error_message;
        }

        debug!(activity_id = %id, status = %completion.status, "Activity completed");
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ActivityMetadata, IssueLevel, RunOutput};

    fn build() -> Activity {
        Activity::new(ActivityKind::Build, "Build environment")
    }

    #[test]
    fn test_start_prepends_and_selects() {
        let mut ledger = ActivityLedger::new();
        let first = build();
        let second = Activity::new(ActivityKind::Validation, "Validate");
        let (a, b) = (first.id, second.id);

        ledger.start(first, true);
        ledger.start(second, true);

        let ids: Vec<_> = ledger.activities().iter().map(|x| x.id).collect();
        assert_eq!(ids, vec![b, a]);
        assert_eq!(ledger.selected_id(), Some(b));
    }

    #[test]
    fn test_start_without_select_keeps_selection() {
        let mut ledger = ActivityLedger::new();
        let first = build();
        let a = first.id;
        ledger.start(first, true);
        ledger.start(Activity::new(ActivityKind::Extraction, "Extract"), false);

        assert_eq!(ledger.selected_id(), Some(a));
    }

    #[test]
    fn test_start_replaces_same_id() {
        let mut ledger = ActivityLedger::new();
        let original = build();
        let id = original.id;
        ledger.start(original, true);
        ledger.append_log(id, LogLine::info("old"));

        ledger.start(build().with_id(id).with_log(LogLine::info("new")), true);

        assert_eq!(ledger.len(), 1);
        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.logs().len(), 1);
        assert_eq!(entry.logs().first().unwrap().message, "new");
    }

    #[test]
    fn test_log_capacity_keeps_newest() {
        let mut ledger = ActivityLedger::new();
        let activity = build();
        let id = activity.id;
        ledger.start(activity, true);

        for i in 0..(LOG_CAPACITY + 250) {
            ledger.append_log(id, LogLine::info(format!("line {i}")));
            assert!(ledger.get(id).unwrap().logs().len() <= LOG_CAPACITY);
        }

        let logs = ledger.get(id).unwrap().logs();
        assert_eq!(logs.len(), LOG_CAPACITY);
        assert_eq!(logs.first().unwrap().message, "line 250");
        assert_eq!(
            logs.last().unwrap().message,
            format!("line {}", LOG_CAPACITY + 249)
        );
    }

    #[test]
    fn test_custom_log_capacity_applies_to_started_activities() {
        let mut ledger = ActivityLedger::with_log_capacity(3);
        let activity = build();
        let id = activity.id;
        ledger.start(activity, true);
        for i in 0..5 {
            ledger.append_log(id, LogLine::info(i.to_string()));
        }
        let messages: Vec<_> = ledger
            .get(id)
            .unwrap()
            .logs()
            .iter()
            .map(|l| l.message.clone())
            .collect();
        assert_eq!(messages, vec!["2", "3", "4"]);
    }

    #[test]
    fn test_issue_counts_are_recounted() {
        let mut ledger = ActivityLedger::new();
        let activity = Activity::new(ActivityKind::Validation, "Validate");
        let id = activity.id;
        ledger.start(activity, true);

        ledger.append_issues(
            id,
            vec![
                Issue::error("missing column").at("sheets[0]"),
                Issue::warning("unused mapping"),
            ],
        );
        ledger.append_issues(
            id,
            vec![Issue::error("bad type"), Issue::new(IssueLevel::Info, "note")],
        );

        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.issues().len(), 4);
        assert_eq!(entry.error_count(), 2);
        assert_eq!(entry.warning_count(), 1);
        assert_eq!(entry.issues()[0].path.as_deref(), Some("sheets[0]"));
    }

    #[test]
    fn test_complete_is_terminal_once() {
        let mut ledger = ActivityLedger::new();
        let activity = build();
        let id = activity.id;
        ledger.start(activity, true);

        assert!(ledger.complete(id, Completion::failed("boom (exit code 2)")));
        assert!(!ledger.complete(id, Completion::succeeded()));

        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.status(), ActivityStatus::Failed);
        assert_eq!(entry.error_message.as_deref(), Some("boom (exit code 2)"));
        assert!(entry.finished_at().is_some());
    }

    #[test]
    fn test_complete_rejects_non_terminal_status() {
        let mut ledger = ActivityLedger::new();
        let activity = build();
        let id = activity.id;
        ledger.start(activity, true);

        assert!(!ledger.complete(id, Completion::new(ActivityStatus::Running)));
        assert!(ledger.get(id).unwrap().is_running());
    }

    #[test]
    fn test_trailing_output_does_not_resurrect() {
        let mut ledger = ActivityLedger::new();
        let activity = build();
        let id = activity.id;
        ledger.start(activity, true);
        ledger.complete(id, Completion::canceled());

        assert!(ledger.append_log(id, LogLine::info("late line")));
        assert!(ledger.append_issues(id, vec![Issue::warning("late issue")]));
        ledger.patch(id, ActivityPatch::running());

        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.status(), ActivityStatus::Canceled);
        assert_eq!(entry.logs().len(), 1);
        assert_eq!(entry.warning_count(), 1);
    }

    #[test]
    fn test_patch_merges_metadata_and_late_outputs() {
        let mut ledger = ActivityLedger::new();
        let activity = Activity::new(ActivityKind::Extraction, "Extract").with_metadata(
            ActivityMetadata {
                document_id: Some("doc-1".to_string()),
                ..Default::default()
            },
        );
        let id = activity.id;
        ledger.start(activity, true);

        ledger.patch(
            id,
            ActivityPatch::metadata(ActivityMetadata {
                run_id: Some("run-1".to_string()),
                ..Default::default()
            }),
        );
        ledger.complete(id, Completion::succeeded());
        ledger.patch(
            id,
            ActivityPatch::outputs(
                vec![RunOutput {
                    path: "out/a.csv".to_string(),
                    byte_size: 12,
                }],
                vec![],
            ),
        );

        let entry = ledger.get(id).unwrap();
        assert_eq!(entry.metadata.document_id.as_deref(), Some("doc-1"));
        assert_eq!(entry.metadata.run_id.as_deref(), Some("run-1"));
        assert_eq!(entry.outputs.len(), 1);
        assert_eq!(entry.status(), ActivityStatus::Succeeded);
    }

    #[test]
    fn test_queued_moves_to_running_via_patch() {
        let mut ledger = ActivityLedger::new();
        let activity = build().queued();
        let id = activity.id;
        ledger.start(activity, true);
        assert!(ledger.running(ActivityKind::Build).is_none());

        ledger.patch(id, ActivityPatch::running());
        assert_eq!(ledger.running(ActivityKind::Build).map(|a| a.id), Some(id));
    }

    #[test]
    fn test_patch_cannot_set_terminal_status() {
        let mut ledger = ActivityLedger::new();
        let activity = build();
        let id = activity.id;
        ledger.start(activity, true);

        ledger.patch(
            id,
            ActivityPatch {
                status: Some(ActivityStatus::Succeeded),
                ..Default::default()
            },
        );
        assert!(ledger.get(id).unwrap().is_running());
    }

    #[test]
    fn test_select_falls_back_to_newest() {
        let mut ledger = ActivityLedger::new();
        assert!(ledger.selected().is_none());

        let first = build();
        let second = build();
        let (a, b) = (first.id, second.id);
        ledger.start(first, false);
        ledger.start(second, false);

        // Nothing selected yet: the newest is reported.
        assert_eq!(ledger.selected_id(), Some(b));

        ledger.select(Some(a));
        assert_eq!(ledger.selected_id(), Some(a));

        ledger.select(Some(ActivityId::new()));
        assert_eq!(ledger.selected_id(), Some(b));

        ledger.select(None);
        assert_eq!(ledger.selected_id(), Some(b));
    }

    #[test]
    fn test_views_per_kind() {
        let mut ledger = ActivityLedger::new();
        let old_build = build();
        let old_id = old_build.id;
        ledger.start(old_build, true);
        ledger.complete(old_id, Completion::succeeded());

        let new_build = build();
        let new_id = new_build.id;
        ledger.start(new_build, true);
        let validation = Activity::new(ActivityKind::Validation, "Validate");
        let validation_id = validation.id;
        ledger.start(validation, true);
        ledger.complete(validation_id, Completion::failed("2 errors"));

        let running = ledger.running_by_kind();
        assert_eq!(running.build.map(|a| a.id), Some(new_id));
        assert!(running.validation.is_none());
        assert!(running.extraction.is_none());

        let latest = ledger.latest_by_kind();
        assert_eq!(latest.build.map(|a| a.id), Some(new_id));
        assert_eq!(latest.validation.map(|a| a.id), Some(validation_id));
        assert!(latest.extraction.is_none());
    }

    #[test]
    fn test_unknown_ids_are_ignored() {
        let mut ledger = ActivityLedger::new();
        let ghost = ActivityId::new();
        assert!(!ledger.append_log(ghost, LogLine::info("x")));
        assert!(!ledger.append_issues(ghost, vec![Issue::error("x")]));
        assert!(!ledger.patch(ghost, ActivityPatch::default()));
        assert!(!ledger.complete(ghost, Completion::succeeded()));
    }
}
