//! The stream coordinator.
//!
//! Each start request creates an activity in the ledger and spawns one task
//! that consumes the remote stream for it, strictly in arrival order. Every
//! task is attached to a child of the coordinator's root cancellation token:
//! cancelling a kind stops its task, and dropping the last coordinator handle
//! stops all of them. A canceled activity completes as `canceled`; transport
//! and remote failures complete as `failed` and raise a notice.

use std::future::Future;
use std::sync::Arc;

use futures::StreamExt;
use parking_lot::Mutex;
use thiserror::Error;
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::{CancellationToken, DropGuard};
use tracing::{debug, info, trace, warn};
use workbench_activity::{
    Activity, ActivityId, ActivityKind, ActivityLedger, ActivityMetadata, ActivityPatch,
    ActivityStatus, Completion, Issue, KindMap, LOG_CAPACITY, LogLevel, LogLine, OutputLink,
    RunOutput,
};

use crate::error::{Result, StreamError};
use crate::events::{BuildEvent, BuildStatus, Frame, OutputStream, RunEvent, RunStatus};
use crate::notice::{Notice, NoticeBoard, NoticeLevel};
use crate::source::{
    BuildRequest, BuildSource, ExtractionRequest, OutputListing, RunSource, SharedBuildSource,
    SharedLoadGate, SharedRunSource, SharedValidationSource, ValidationRequest, ValidationSource,
};

/// Capacity of the event feed before slow subscribers start lagging.
const EVENT_FEED_CAPACITY: usize = 1024;

// ─────────────────────────────────────────────────────────────────────────────
// Public types
// ─────────────────────────────────────────────────────────────────────────────

/// Why a start request was turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StartRejection {
    #[error("an activity of this kind is already running ({0})")]
    AlreadyRunning(ActivityId),
    #[error("files are still loading")]
    FilesLoading,
    #[error("no {0} service is configured")]
    Unavailable(ActivityKind),
    #[error("the coordinator is shutting down")]
    ShuttingDown,
    #[error("no async runtime is available")]
    NoRuntime,
}

/// Result of a start request. A rejection is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(ActivityId),
    Rejected(StartRejection),
}

impl StartOutcome {
    pub fn activity_id(&self) -> Option<ActivityId> {
        match self {
            StartOutcome::Started(id) => Some(*id),
            StartOutcome::Rejected(_) => None,
        }
    }

    pub fn is_started(&self) -> bool {
        matches!(self, StartOutcome::Started(_))
    }
}

/// Live feed of ledger changes made by the coordinator.
#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    Started {
        id: ActivityId,
        kind: ActivityKind,
        label: String,
    },
    Log {
        id: ActivityId,
        line: LogLine,
    },
    Issues {
        id: ActivityId,
        issues: Vec<Issue>,
    },
    Completed {
        id: ActivityId,
        kind: ActivityKind,
        status: ActivityStatus,
        summary: Option<String>,
        error_message: Option<String>,
    },
    Outputs {
        id: ActivityId,
        outputs: Vec<RunOutput>,
        links: Vec<OutputLink>,
    },
    Notice(Notice),
}

// ─────────────────────────────────────────────────────────────────────────────
// Builder
// ─────────────────────────────────────────────────────────────────────────────

/// Builder for [`StreamCoordinator`].
#[derive(Default)]
pub struct StreamCoordinatorBuilder {
    builds: Option<SharedBuildSource>,
    runs: Option<SharedRunSource>,
    validator: Option<SharedValidationSource>,
    gate: Option<SharedLoadGate>,
    log_capacity: Option<usize>,
}

impl StreamCoordinatorBuilder {
    pub fn builds(mut self, source: SharedBuildSource) -> Self {
        self.builds = Some(source);
        self
    }

    pub fn runs(mut self, source: SharedRunSource) -> Self {
        self.runs = Some(source);
        self
    }

    pub fn validator(mut self, source: SharedValidationSource) -> Self {
        self.validator = Some(source);
        self
    }

    /// Refuse new starts while this gate reports loading.
    pub fn load_gate(mut self, gate: SharedLoadGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Log lines retained per activity.
    pub fn log_capacity(mut self, capacity: usize) -> Self {
        self.log_capacity = Some(capacity);
        self
    }

    pub fn build(self) -> StreamCoordinator {
        let (events, _) = broadcast::channel(EVENT_FEED_CAPACITY);
        let root = CancellationToken::new();
        let shared = Shared {
            state: Mutex::new(CoordinatorState {
                ledger: ActivityLedger::with_log_capacity(
                    self.log_capacity.unwrap_or(LOG_CAPACITY),
                ),
                flights: KindMap::default(),
                live: None,
                notices: NoticeBoard::default(),
            }),
            tasks: Mutex::new(KindMap::default()),
            events,
            builds: self.builds,
            runs: self.runs,
            validator: self.validator,
            gate: self.gate,
            root: root.clone(),
        };
        StreamCoordinator {
            shared: Arc::new(shared),
            _teardown: Arc::new(root.drop_guard()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

/// Folds remote build, validation and extraction streams into an
/// [`ActivityLedger`], with at most one running activity per kind.
///
/// Cheap to clone. When the last clone is dropped every outstanding stream is
/// canceled.
#[derive(Clone)]
pub struct StreamCoordinator {
    shared: Arc<Shared>,
    _teardown: Arc<DropGuard>,
}

impl StreamCoordinator {
    pub fn builder() -> StreamCoordinatorBuilder {
        StreamCoordinatorBuilder::default()
    }

    /// Start an environment build.
    pub fn start_build(&self, request: BuildRequest) -> StartOutcome {
        let Some(source) = self.shared.builds.clone() else {
            return StartOutcome::Rejected(StartRejection::Unavailable(ActivityKind::Build));
        };
        let metadata = ActivityMetadata {
            force: Some(request.force),
            wait: Some(request.wait),
            ..Default::default()
        };
        let label = if request.force {
            "Environment build (forced)"
        } else {
            "Environment build"
        };
        let activity = Activity::new(ActivityKind::Build, label)
            .with_metadata(metadata)
            .with_log(LogLine::info("Starting environment build"));

        self.launch(activity, move |shared, id, token| {
            shared.run_build(id, token, source, request)
        })
    }

    /// Start a configuration validation.
    pub fn start_validation(&self, request: ValidationRequest) -> StartOutcome {
        let Some(source) = self.shared.validator.clone() else {
            return StartOutcome::Rejected(StartRejection::Unavailable(ActivityKind::Validation));
        };
        let metadata = ActivityMetadata {
            digest: request.digest.clone(),
            ..Default::default()
        };
        let activity = Activity::new(ActivityKind::Validation, "Configuration validation")
            .with_metadata(metadata)
            .with_log(LogLine::info("Validating configuration"));

        self.launch(activity, move |shared, id, token| {
            shared.run_validation(id, token, source, request)
        })
    }

    /// Start an extraction run.
    pub fn start_extraction(&self, request: ExtractionRequest) -> StartOutcome {
        let Some(source) = self.shared.runs.clone() else {
            return StartOutcome::Rejected(StartRejection::Unavailable(ActivityKind::Extraction));
        };
        let metadata = ActivityMetadata {
            document_id: Some(request.document_id.clone()),
            sheet_names: (!request.sheet_names.is_empty()).then(|| request.sheet_names.clone()),
            ..Default::default()
        };
        let activity = Activity::new(
            ActivityKind::Extraction,
            format!("Extraction of {}", request.document_id),
        )
        .with_metadata(metadata)
        .with_log(LogLine::info(format!(
            "Starting extraction for document {}",
            request.document_id
        )));

        self.launch(activity, move |shared, id, token| {
            shared.run_extraction(id, token, source, request)
        })
    }

    /// Cancel the in-flight stream of `kind`.
    ///
    /// Returns whether a running activity was canceled. The remote operation
    /// is asked to stop on a best-effort basis once its id is known.
    ///
    /// A finished activity whose task is still fetching outputs is left alone.
    pub fn cancel(&self, kind: ActivityKind) -> bool {
        let mut state = self.shared.state.lock();
        let CoordinatorState {
            ledger, flights, ..
        } = &mut *state;
        let Some(flight) = flights[kind].as_mut() else {
            return false;
        };
        if !ledger.get(flight.activity_id).is_some_and(Activity::is_running) {
            return false;
        }
        flight.intentional = true;
        flight.token.cancel();
        info!(activity_id = %flight.activity_id, kind = %kind, "Cancellation requested");
        true
    }

    /// Cancel every stream and wait for the tasks to finish. Later start
    /// requests are rejected.
    pub async fn shutdown(&self) {
        self.shared.root.cancel();
        for kind in ActivityKind::ALL {
            self.join(kind).await;
        }
    }

    /// Wait for every task of `kind` to finish, output fetching included.
    pub async fn join(&self, kind: ActivityKind) {
        let handles = std::mem::take(&mut self.shared.tasks.lock()[kind]);
        for handle in handles {
            if let Err(e) = handle.await {
                warn!(kind = %kind, error = %e, "Stream task failed");
            }
        }
    }

    /// Append a locally produced line to the live activity, or to the selected
    /// one when nothing is live. Returns the activity that received it.
    pub fn append_console_line(&self, line: LogLine) -> Option<ActivityId> {
        let target = {
            let state = self.shared.state.lock();
            state
                .live
                .filter(|id| state.ledger.get(*id).is_some())
                .or_else(|| state.ledger.selected_id())
        }?;
        self.shared.log(target, line);
        Some(target)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Run `f` against the current ledger.
    pub fn with_ledger<R>(&self, f: impl FnOnce(&ActivityLedger) -> R) -> R {
        f(&self.shared.state.lock().ledger)
    }

    pub fn activity(&self, id: ActivityId) -> Option<Activity> {
        self.with_ledger(|ledger| ledger.get(id).cloned())
    }

    pub fn activities(&self) -> Vec<Activity> {
        self.with_ledger(|ledger| ledger.activities().to_vec())
    }

    /// Id of the running activity of `kind`, if any.
    pub fn running(&self, kind: ActivityKind) -> Option<ActivityId> {
        self.with_ledger(|ledger| ledger.running(kind).map(|a| a.id))
    }

    /// The activity currently receiving stream events.
    pub fn live_activity(&self) -> Option<ActivityId> {
        self.shared.state.lock().live
    }

    pub fn select(&self, id: Option<ActivityId>) -> bool {
        self.shared.state.lock().ledger.select(id)
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.shared.state.lock().notices.all().to_vec()
    }

    pub fn dismiss_notice(&self, id: u64) -> bool {
        self.shared.state.lock().notices.dismiss(id)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.shared.events.subscribe()
    }

    fn launch<F, Fut>(&self, activity: Activity, drive: F) -> StartOutcome
    where
        F: FnOnce(Arc<Shared>, ActivityId, CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let Ok(runtime) = Handle::try_current() else {
            warn!(kind = %activity.kind, "No async runtime, refusing to start");
            return StartOutcome::Rejected(StartRejection::NoRuntime);
        };
        let kind = activity.kind;
        let (id, token) = match self.shared.begin(activity) {
            Ok(started) => started,
            Err(rejection) => {
                debug!(kind = %kind, reason = %rejection, "Start rejected");
                return StartOutcome::Rejected(rejection);
            }
        };
        let handle = runtime.spawn(drive(self.shared.clone(), id, token));
        let mut tasks = self.shared.tasks.lock();
        tasks[kind].retain(|task| !task.is_finished());
        tasks[kind].push(handle);
        StartOutcome::Started(id)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shared state and stream tasks
// ─────────────────────────────────────────────────────────────────────────────

/// The stream currently attached to a kind.
struct Flight {
    activity_id: ActivityId,
    token: CancellationToken,
    /// Set by an explicit cancel, as opposed to teardown.
    intentional: bool,
}

struct CoordinatorState {
    ledger: ActivityLedger,
    flights: KindMap<Option<Flight>>,
    live: Option<ActivityId>,
    notices: NoticeBoard,
}

struct Shared {
    state: Mutex<CoordinatorState>,
    tasks: Mutex<KindMap<Vec<JoinHandle<()>>>>,
    events: broadcast::Sender<CoordinatorEvent>,
    builds: Option<SharedBuildSource>,
    runs: Option<SharedRunSource>,
    validator: Option<SharedValidationSource>,
    gate: Option<SharedLoadGate>,
    root: CancellationToken,
}

impl Shared {
    /// Check preconditions and record the activity, all under one lock so two
    /// racing starts of the same kind cannot both pass.
    fn begin(
        &self,
        activity: Activity,
    ) -> std::result::Result<(ActivityId, CancellationToken), StartRejection> {
        if self.root.is_cancelled() {
            return Err(StartRejection::ShuttingDown);
        }
        if self.gate.as_ref().is_some_and(|gate| gate.is_loading()) {
            return Err(StartRejection::FilesLoading);
        }

        let kind = activity.kind;
        let id = activity.id;
        let label = activity.label.clone();
        let token = self.root.child_token();
        {
            let mut state = self.state.lock();
            if let Some(running) = state.ledger.running(kind) {
                return Err(StartRejection::AlreadyRunning(running.id));
            }
            // A finished predecessor may still be fetching outputs; detach it
            // without cutting that short.
            if let Some(previous) = state.flights[kind].take() {
                if state
                    .ledger
                    .get(previous.activity_id)
                    .is_some_and(Activity::is_running)
                {
                    debug!(activity_id = %previous.activity_id, kind = %kind, "Canceling previous stream");
                    previous.token.cancel();
                } else {
                    debug!(activity_id = %previous.activity_id, kind = %kind, "Detaching finished stream");
                }
            }
            state.ledger.start(activity, true);
            state.live = Some(id);
            state.flights[kind] = Some(Flight {
                activity_id: id,
                token: token.clone(),
                intentional: false,
            });
        }

        info!(activity_id = %id, kind = %kind, "Activity started");
        self.emit(CoordinatorEvent::Started { id, kind, label });
        Ok((id, token))
    }

    async fn run_build(
        self: Arc<Self>,
        id: ActivityId,
        token: CancellationToken,
        source: SharedBuildSource,
        request: BuildRequest,
    ) {
        let kind = ActivityKind::Build;
        let outcome = cancellable(&token, self.fold_build(id, source.as_ref(), request)).await;
        let intentional = outcome.is_none() && self.was_intentional(kind, id);
        self.finish(kind, id, outcome);

        if intentional && let Some(build_id) = self.metadata(id).and_then(|m| m.build_id) {
            if let Err(e) = source.cancel_build(&build_id).await {
                warn!(build_id = %build_id, error = %e, "Remote build cancel failed");
            }
        }
        self.release(kind, id);
    }

    async fn run_validation(
        self: Arc<Self>,
        id: ActivityId,
        token: CancellationToken,
        source: SharedValidationSource,
        request: ValidationRequest,
    ) {
        let kind = ActivityKind::Validation;
        let outcome =
            cancellable(&token, self.fold_validation(id, source.as_ref(), request)).await;
        self.finish(kind, id, outcome);
        self.release(kind, id);
    }

    async fn run_extraction(
        self: Arc<Self>,
        id: ActivityId,
        token: CancellationToken,
        source: SharedRunSource,
        request: ExtractionRequest,
    ) {
        let kind = ActivityKind::Extraction;
        let outcome = cancellable(&token, self.fold_run(id, source.as_ref(), request)).await;
        let intentional = outcome.is_none() && self.was_intentional(kind, id);
        let succeeded = matches!(&outcome, Some(Ok(c)) if c.status == ActivityStatus::Succeeded);
        self.finish(kind, id, outcome);

        let run_id = self.metadata(id).and_then(|m| m.run_id);
        match run_id {
            Some(run_id) if succeeded => {
                match cancellable(&token, source.fetch_outputs(&run_id)).await {
                    Some(Ok(listing)) => self.record_outputs(id, &run_id, listing, source.as_ref()),
                    Some(Err(e)) => {
                        warn!(activity_id = %id, run_id = %run_id, error = %e, "Failed to load outputs");
                        self.patch(id, ActivityPatch::error_message(format!("Failed to load outputs: {e}")));
                    }
                    None => {
                        debug!(activity_id = %id, "Output fetch canceled");
                        self.patch(id, ActivityPatch::error_message("Output fetch canceled"));
                    }
                }
            }
            Some(run_id) if intentional => {
                if let Err(e) = source.cancel_run(&run_id).await {
                    warn!(run_id = %run_id, error = %e, "Remote run cancel failed");
                }
            }
            None if succeeded => debug!(activity_id = %id, "No run id reported, skipping outputs"),
            _ => {}
        }
        self.release(kind, id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Folding
    // ─────────────────────────────────────────────────────────────────────────

    async fn fold_build(
        &self,
        id: ActivityId,
        source: &dyn BuildSource,
        request: BuildRequest,
    ) -> Result<Completion> {
        let mut stream = source.stream_build(request).await?;
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Frame::Event(event)) => {
                    if let Some(completion) = self.apply_build_event(id, event) {
                        return Ok(completion);
                    }
                }
                Ok(Frame::Telemetry(_)) => trace!(activity_id = %id, "Ignoring telemetry frame"),
                Ok(Frame::Unknown(event_type)) => {
                    debug!(activity_id = %id, event_type = %event_type, "Skipping unknown build event");
                }
                Err(StreamError::InvalidEvent(reason)) => {
                    warn!(activity_id = %id, reason = %reason, "Skipping unparseable build event");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StreamError::Incomplete)
    }

    fn apply_build_event(&self, id: ActivityId, event: BuildEvent) -> Option<Completion> {
        match event {
            BuildEvent::Created { build_id, status } => {
                self.patch(
                    id,
                    ActivityPatch::metadata(ActivityMetadata {
                        build_id: Some(build_id.clone()),
                        ..Default::default()
                    }),
                );
                let message = match status {
                    Some(status) => format!("Build {build_id} created ({status})"),
                    None => format!("Build {build_id} created"),
                };
                self.log(id, LogLine::info(message));
                None
            }
            BuildEvent::Step { step, message } => {
                let line = match message {
                    Some(message) => format!("{step}: {message}"),
                    None => step,
                };
                self.log(id, LogLine::info(line));
                None
            }
            BuildEvent::Log { stream, message } => {
                self.log(id, LogLine::new(stream_level(stream), message));
                None
            }
            BuildEvent::Completed {
                status,
                exit_code,
                error_message,
                summary,
            } => {
                self.record_exit_code(id, exit_code);
                let completion = match status {
                    BuildStatus::Active => Completion::succeeded(),
                    BuildStatus::Canceled => Completion::canceled(),
                    BuildStatus::Failed | BuildStatus::Other => Completion::failed(
                        failure_message(error_message.as_deref(), exit_code, "Build failed"),
                    ),
                };
                Some(match summary {
                    Some(summary) => completion.with_summary(summary),
                    None => completion,
                })
            }
        }
    }

    async fn fold_run(
        &self,
        id: ActivityId,
        source: &dyn RunSource,
        request: ExtractionRequest,
    ) -> Result<Completion> {
        let mut stream = source.stream_run(request).await?;
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(Frame::Event(event)) => {
                    if let Some(completion) = self.apply_run_event(id, event) {
                        return Ok(completion);
                    }
                }
                Ok(Frame::Telemetry(_)) => trace!(activity_id = %id, "Ignoring telemetry frame"),
                Ok(Frame::Unknown(event_type)) => {
                    debug!(activity_id = %id, event_type = %event_type, "Skipping unknown run event");
                }
                Err(StreamError::InvalidEvent(reason)) => {
                    warn!(activity_id = %id, reason = %reason, "Skipping unparseable run event");
                }
                Err(e) => return Err(e),
            }
        }
        Err(StreamError::Incomplete)
    }

    fn apply_run_event(&self, id: ActivityId, event: RunEvent) -> Option<Completion> {
        match event {
            RunEvent::Created { run_id, status } => {
                self.patch(
                    id,
                    ActivityPatch::metadata(ActivityMetadata {
                        run_id: Some(run_id.clone()),
                        ..Default::default()
                    }),
                );
                let message = match status {
                    Some(status) => format!("Run {run_id} created ({status})"),
                    None => format!("Run {run_id} created"),
                };
                self.log(id, LogLine::info(message));
                None
            }
            RunEvent::Started { .. } => {
                self.log(id, LogLine::info("Run started"));
                None
            }
            RunEvent::Log { stream, message } => {
                self.log(id, LogLine::new(stream_level(stream), message));
                None
            }
            RunEvent::Completed {
                status,
                exit_code,
                error_message,
            } => {
                self.record_exit_code(id, exit_code);
                Some(match status {
                    RunStatus::Succeeded => Completion::succeeded(),
                    RunStatus::Canceled => Completion::canceled(),
                    RunStatus::Failed | RunStatus::Other => Completion::failed(failure_message(
                        error_message.as_deref(),
                        exit_code,
                        "Extraction failed",
                    )),
                })
            }
        }
    }

    async fn fold_validation(
        &self,
        id: ActivityId,
        source: &dyn ValidationSource,
        request: ValidationRequest,
    ) -> Result<Completion> {
        let report = source.validate(request).await?;
        if let Some(digest) = &report.digest {
            self.patch(
                id,
                ActivityPatch::metadata(ActivityMetadata {
                    digest: Some(digest.clone()),
                    ..Default::default()
                }),
            );
        }

        let errors = report.error_count();
        let warnings = report.warning_count();
        let summary = format!(
            "{}, {}",
            plural(errors, "error", "errors"),
            plural(warnings, "warning", "warnings")
        );
        self.log(id, LogLine::info(format!("Validation finished: {summary}")));
        self.append_issues(id, report.issues);

        if errors == 0 && report.valid {
            Ok(Completion::succeeded().with_summary(summary))
        } else {
            Ok(Completion::failed(format!("Configuration is invalid: {summary}"))
                .with_summary(summary))
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Ledger mutations
    // ─────────────────────────────────────────────────────────────────────────

    fn log(&self, id: ActivityId, line: LogLine) {
        let appended = self.state.lock().ledger.append_log(id, line.clone());
        if appended {
            self.emit(CoordinatorEvent::Log { id, line });
        }
    }

    fn append_issues(&self, id: ActivityId, issues: Vec<Issue>) {
        let appended = self.state.lock().ledger.append_issues(id, issues.clone());
        if appended {
            self.emit(CoordinatorEvent::Issues { id, issues });
        }
    }

    fn patch(&self, id: ActivityId, patch: ActivityPatch) {
        self.state.lock().ledger.patch(id, patch);
    }

    fn record_exit_code(&self, id: ActivityId, exit_code: Option<i32>) {
        if exit_code.is_some() {
            self.patch(
                id,
                ActivityPatch::metadata(ActivityMetadata {
                    exit_code,
                    ..Default::default()
                }),
            );
        }
    }

    fn metadata(&self, id: ActivityId) -> Option<ActivityMetadata> {
        self.state.lock().ledger.get(id).map(|a| a.metadata.clone())
    }

    fn was_intentional(&self, kind: ActivityKind, id: ActivityId) -> bool {
        self.state.lock().flights[kind]
            .as_ref()
            .is_some_and(|f| f.activity_id == id && f.intentional)
    }

    fn record_outputs(
        &self,
        id: ActivityId,
        run_id: &str,
        listing: OutputListing,
        source: &dyn RunSource,
    ) {
        let links: Vec<OutputLink> = listing
            .files
            .iter()
            .filter_map(|output| source.output_link(run_id, output))
            .collect();
        debug!(activity_id = %id, outputs = listing.files.len(), "Recorded run outputs");
        self.patch(id, ActivityPatch::outputs(listing.files.clone(), links.clone()));
        self.emit(CoordinatorEvent::Outputs {
            id,
            outputs: listing.files,
            links,
        });
    }

    /// Complete the activity and raise a notice for failures. `None` means
    /// the stream was canceled.
    fn finish(&self, kind: ActivityKind, id: ActivityId, outcome: Option<Result<Completion>>) {
        let notify = match &outcome {
            Some(Err(_)) => true,
            Some(Ok(c)) => c.status == ActivityStatus::Failed && kind != ActivityKind::Validation,
            None => false,
        };
        let completion = match outcome {
            None => Completion::canceled().with_summary("Canceled"),
            Some(Ok(completion)) => completion,
            Some(Err(e)) => {
                warn!(activity_id = %id, kind = %kind, error = %e, "Stream failed");
                Completion::failed(e.to_string())
            }
        };

        let (event, notice) = {
            let mut state = self.state.lock();
            if !state.ledger.complete(id, completion) {
                return;
            }
            let Some((event, message)) = state.ledger.get(id).map(|activity| {
                let event = CoordinatorEvent::Completed {
                    id,
                    kind,
                    status: activity.status(),
                    summary: activity.summary.clone(),
                    error_message: activity.error_message.clone(),
                };
                let message = format!(
                    "{} failed: {}",
                    activity.label,
                    activity.error_message.as_deref().unwrap_or("unknown error")
                );
                (event, message)
            }) else {
                return;
            };
            let notice = notify.then(|| state.notices.push(NoticeLevel::Error, message, Some(id)));
            (event, notice)
        };

        if let CoordinatorEvent::Completed { status, .. } = &event {
            info!(activity_id = %id, kind = %kind, status = %status, "Activity finished");
        }
        self.emit(event);
        if let Some(notice) = notice {
            self.emit(CoordinatorEvent::Notice(notice));
        }
    }

    /// Detach the flight and the live pointer, but only if they still point
    /// at this activity.
    fn release(&self, kind: ActivityKind, id: ActivityId) {
        let mut state = self.state.lock();
        if state.flights[kind]
            .as_ref()
            .is_some_and(|f| f.activity_id == id)
        {
            state.flights[kind] = None;
        }
        if state.live == Some(id) {
            state.live = None;
        }
    }

    fn emit(&self, event: CoordinatorEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }
}

/// Run `work` unless `token` fires first.
async fn cancellable<F: Future>(token: &CancellationToken, work: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = work => Some(output),
    }
}

fn stream_level(stream: OutputStream) -> LogLevel {
    match stream {
        OutputStream::Stderr => LogLevel::Warning,
        OutputStream::Stdout | OutputStream::Other => LogLevel::Info,
    }
}

fn failure_message(error_message: Option<&str>, exit_code: Option<i32>, fallback: &str) -> String {
    let message = error_message.filter(|m| !m.is_empty()).unwrap_or(fallback);
    match exit_code {
        Some(code) => format!("{message} (exit code {code})"),
        None => message.to_string(),
    }
}

fn plural(count: usize, one: &str, many: &str) -> String {
    if count == 1 {
        format!("{count} {one}")
    } else {
        format!("{count} {many}")
    }
}
