//! Collaborator boundaries for the remote build, run and validation services.

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use workbench_activity::{Issue, IssueLevel, OutputLink, RunOutput};

use crate::error::Result;
use crate::events::{BuildEvent, Frame, RunEvent};

/// A boxed stream of decoded frames.
pub type EventStream<E> = Pin<Box<dyn Stream<Item = Result<Frame<E>>> + Send + 'static>>;

// ─────────────────────────────────────────────────────────────────────────────
// Requests & responses
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters for an environment build.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Rebuild even if the environment is current.
    pub force: bool,
    /// Keep streaming until the environment is active.
    pub wait: bool,
}

/// Parameters for an extraction run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRequest {
    pub document_id: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sheet_names: Vec<String>,
}

impl ExtractionRequest {
    pub fn new(document_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            sheet_names: Vec::new(),
        }
    }

    pub fn with_sheets<I, S>(mut self, sheets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sheet_names = sheets.into_iter().map(Into::into).collect();
        self
    }
}

/// Parameters for a configuration validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    /// Validate the configuration at this digest instead of the current one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Result of a configuration validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationReport {
    #[serde(default)]
    pub digest: Option<String>,
    pub valid: bool,
    #[serde(default)]
    pub issues: Vec<Issue>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.count(IssueLevel::Error)
    }

    pub fn warning_count(&self) -> usize {
        self.count(IssueLevel::Warning)
    }

    fn count(&self, level: IssueLevel) -> usize {
        self.issues.iter().filter(|i| i.level == level).count()
    }
}

/// Files produced by a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputListing {
    #[serde(default)]
    pub files: Vec<RunOutput>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Traits
// ─────────────────────────────────────────────────────────────────────────────

/// Streams environment builds.
#[async_trait]
pub trait BuildSource: Send + Sync {
    async fn stream_build(&self, request: BuildRequest) -> Result<EventStream<BuildEvent>>;

    /// Ask the service to stop a build. Best effort.
    async fn cancel_build(&self, build_id: &str) -> Result<()> {
        let _ = build_id;
        Ok(())
    }
}

/// Streams extraction runs and lists their outputs.
#[async_trait]
pub trait RunSource: Send + Sync {
    async fn stream_run(&self, request: ExtractionRequest) -> Result<EventStream<RunEvent>>;

    async fn fetch_outputs(&self, run_id: &str) -> Result<OutputListing>;

    /// Where one output can be downloaded, if the service exposes it.
    fn output_link(&self, run_id: &str, output: &RunOutput) -> Option<OutputLink> {
        let _ = (run_id, output);
        None
    }

    /// Ask the service to stop a run. Best effort.
    async fn cancel_run(&self, run_id: &str) -> Result<()> {
        let _ = run_id;
        Ok(())
    }
}

/// Validates the workspace configuration.
#[async_trait]
pub trait ValidationSource: Send + Sync {
    async fn validate(&self, request: ValidationRequest) -> Result<ValidationReport>;
}

/// Reports whether file content is still loading, which blocks new starts.
pub trait LoadGate: Send + Sync {
    fn is_loading(&self) -> bool;
}

impl<F> LoadGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_loading(&self) -> bool {
        self()
    }
}

pub type SharedBuildSource = Arc<dyn BuildSource>;
pub type SharedRunSource = Arc<dyn RunSource>;
pub type SharedValidationSource = Arc<dyn ValidationSource>;
pub type SharedLoadGate = Arc<dyn LoadGate>;
