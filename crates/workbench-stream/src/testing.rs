//! Scripted event sources for tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use workbench_activity::{OutputLink, RunOutput};

use crate::error::{Result, StreamError};
use crate::events::{BuildEvent, Frame, RunEvent};
use crate::source::{
    BuildRequest, BuildSource, EventStream, ExtractionRequest, OutputListing, RunSource,
    ValidationReport, ValidationRequest, ValidationSource,
};

/// One step of a scripted stream.
#[derive(Debug, Clone)]
pub enum Script<E> {
    /// Yield a frame.
    Frame(Frame<E>),
    /// Yield a transport error.
    Error(String),
    /// Yield a frame that failed to decode.
    Invalid(String),
    /// Sleep before the next step.
    Delay(Duration),
    /// Never yield again (until dropped).
    Hang,
}

impl<E> Script<E> {
    pub fn event(event: E) -> Self {
        Script::Frame(Frame::Event(event))
    }
}

fn scripted<E: Send + 'static>(steps: Vec<Script<E>>) -> EventStream<E> {
    Box::pin(async_stream::stream! {
        for step in steps {
            match step {
                Script::Frame(frame) => yield Ok(frame),
                Script::Error(message) => yield Err(StreamError::Stream(message)),
                Script::Invalid(reason) => yield Err(StreamError::InvalidEvent(reason)),
                Script::Delay(delay) => tokio::time::sleep(delay).await,
                Script::Hang => futures::future::pending::<()>().await,
            }
        }
    })
}

/// What the next stream request returns.
enum Reply<E> {
    Stream(Vec<Script<E>>),
    Refuse(String),
}

fn next_stream<E: Send + 'static>(queue: &Mutex<VecDeque<Reply<E>>>) -> Result<EventStream<E>> {
    match queue.lock().pop_front() {
        Some(Reply::Stream(steps)) => Ok(scripted(steps)),
        Some(Reply::Refuse(message)) => Err(StreamError::Connection(message)),
        None => Ok(scripted(Vec::new())),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Builds
// ─────────────────────────────────────────────────────────────────────────────

/// A [`BuildSource`] that replays queued scripts, one per request.
#[derive(Clone, Default)]
pub struct MockBuilds {
    replies: Arc<Mutex<VecDeque<Reply<BuildEvent>>>>,
    requests: Arc<Mutex<Vec<BuildRequest>>>,
    cancels: Arc<Mutex<Vec<String>>>,
}

impl MockBuilds {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, steps: Vec<Script<BuildEvent>>) {
        self.replies.lock().push_back(Reply::Stream(steps));
    }

    pub fn push_events(&self, events: Vec<BuildEvent>) {
        self.push_script(events.into_iter().map(Script::event).collect());
    }

    /// Make the next request fail before any stream is opened.
    pub fn refuse_next(&self, message: &str) {
        self.replies
            .lock()
            .push_back(Reply::Refuse(message.to_string()));
    }

    pub fn requests(&self) -> Vec<BuildRequest> {
        self.requests.lock().clone()
    }

    /// Remote ids passed to `cancel_build`.
    pub fn cancels(&self) -> Vec<String> {
        self.cancels.lock().clone()
    }
}

#[async_trait]
impl BuildSource for MockBuilds {
    async fn stream_build(&self, request: BuildRequest) -> Result<EventStream<BuildEvent>> {
        self.requests.lock().push(request);
        next_stream(&self.replies)
    }

    async fn cancel_build(&self, build_id: &str) -> Result<()> {
        self.cancels.lock().push(build_id.to_string());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Runs
// ─────────────────────────────────────────────────────────────────────────────

/// A [`RunSource`] that replays queued scripts and serves canned outputs.
#[derive(Clone, Default)]
pub struct MockRuns {
    replies: Arc<Mutex<VecDeque<Reply<RunEvent>>>>,
    requests: Arc<Mutex<Vec<ExtractionRequest>>>,
    outputs: Arc<Mutex<HashMap<String, std::result::Result<OutputListing, String>>>>,
    cancels: Arc<Mutex<Vec<String>>>,
    output_latency: Arc<Mutex<Option<Duration>>>,
}

impl MockRuns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_script(&self, steps: Vec<Script<RunEvent>>) {
        self.replies.lock().push_back(Reply::Stream(steps));
    }

    pub fn push_events(&self, events: Vec<RunEvent>) {
        self.push_script(events.into_iter().map(Script::event).collect());
    }

    pub fn refuse_next(&self, message: &str) {
        self.replies
            .lock()
            .push_back(Reply::Refuse(message.to_string()));
    }

    pub fn set_outputs(&self, run_id: &str, files: Vec<RunOutput>) {
        self.outputs
            .lock()
            .insert(run_id.to_string(), Ok(OutputListing { files }));
    }

    pub fn fail_outputs(&self, run_id: &str, message: &str) {
        self.outputs
            .lock()
            .insert(run_id.to_string(), Err(message.to_string()));
    }

    /// Delay every output listing by `latency`.
    pub fn set_output_latency(&self, latency: Duration) {
        *self.output_latency.lock() = Some(latency);
    }

    pub fn requests(&self) -> Vec<ExtractionRequest> {
        self.requests.lock().clone()
    }

    pub fn cancels(&self) -> Vec<String> {
        self.cancels.lock().clone()
    }
}

#[async_trait]
impl RunSource for MockRuns {
    async fn stream_run(&self, request: ExtractionRequest) -> Result<EventStream<RunEvent>> {
        self.requests.lock().push(request);
        next_stream(&self.replies)
    }

    async fn fetch_outputs(&self, run_id: &str) -> Result<OutputListing> {
        let latency = *self.output_latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.outputs.lock().get(run_id) {
            Some(Ok(listing)) => Ok(listing.clone()),
            Some(Err(message)) => Err(StreamError::remote(500, message.clone())),
            None => Err(StreamError::remote(404, format!("run {run_id} not found"))),
        }
    }

    fn output_link(&self, run_id: &str, output: &RunOutput) -> Option<OutputLink> {
        Some(OutputLink {
            label: output.path.clone(),
            href: format!("mock://runs/{run_id}/outputs/{}", output.path),
        })
    }

    async fn cancel_run(&self, run_id: &str) -> Result<()> {
        self.cancels.lock().push(run_id.to_string());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Validation
// ─────────────────────────────────────────────────────────────────────────────

/// A [`ValidationSource`] returning queued reports.
#[derive(Clone, Default)]
pub struct MockValidator {
    replies: Arc<Mutex<VecDeque<std::result::Result<ValidationReport, String>>>>,
    requests: Arc<Mutex<Vec<ValidationRequest>>>,
    latency: Arc<Mutex<Option<Duration>>>,
}

impl MockValidator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_report(&self, report: ValidationReport) {
        self.replies.lock().push_back(Ok(report));
    }

    pub fn push_failure(&self, message: &str) {
        self.replies.lock().push_back(Err(message.to_string()));
    }

    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock() = Some(latency);
    }

    pub fn requests(&self) -> Vec<ValidationRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl ValidationSource for MockValidator {
    async fn validate(&self, request: ValidationRequest) -> Result<ValidationReport> {
        self.requests.lock().push(request);
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        match self.replies.lock().pop_front() {
            Some(Ok(report)) => Ok(report),
            Some(Err(message)) => Err(StreamError::remote(500, message)),
            None => Ok(ValidationReport {
                valid: true,
                ..Default::default()
            }),
        }
    }
}
