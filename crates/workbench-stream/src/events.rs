//! Wire taxonomies for build and run event streams.
//!
//! Both streams carry JSON frames discriminated by a `type` field. Run
//! streams additionally interleave telemetry envelopes which are recognized
//! first so they are never decoded as run events.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Result, StreamError};

// ─────────────────────────────────────────────────────────────────────────────
// Shared
// ─────────────────────────────────────────────────────────────────────────────

/// Which process stream a log line came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
    #[serde(other)]
    Other,
}

// ─────────────────────────────────────────────────────────────────────────────
// Build events
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal status reported by `build.completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildStatus {
    /// The environment is built and usable.
    #[serde(alias = "succeeded")]
    Active,
    Canceled,
    Failed,
    #[serde(other)]
    Other,
}

/// One frame of an environment build stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum BuildEvent {
    #[serde(rename = "build.created")]
    Created {
        build_id: String,
        #[serde(default)]
        status: Option<String>,
    },
    #[serde(rename = "build.step")]
    Step {
        step: String,
        #[serde(default)]
        message: Option<String>,
    },
    #[serde(rename = "build.log")]
    Log {
        stream: OutputStream,
        message: String,
    },
    #[serde(rename = "build.completed")]
    Completed {
        status: BuildStatus,
        #[serde(default)]
        exit_code: Option<i32>,
        #[serde(default)]
        error_message: Option<String>,
        #[serde(default)]
        summary: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Run events
// ─────────────────────────────────────────────────────────────────────────────

/// Terminal status reported by `run.completed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Succeeded,
    Canceled,
    Failed,
    #[serde(other)]
    Other,
}

/// One frame of an extraction run stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RunEvent {
    #[serde(rename = "run.created")]
    Created {
        run_id: String,
        #[serde(default)]
        status: Option<String>,
    },
    #[serde(rename = "run.started")]
    Started {
        #[serde(default)]
        run_id: Option<String>,
    },
    #[serde(rename = "run.log")]
    Log {
        stream: OutputStream,
        message: String,
    },
    #[serde(rename = "run.completed")]
    Completed {
        status: RunStatus,
        #[serde(default)]
        exit_code: Option<i32>,
        #[serde(default)]
        error_message: Option<String>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames
// ─────────────────────────────────────────────────────────────────────────────

/// An event family with a fixed set of `type` discriminators.
pub trait EventTaxonomy: DeserializeOwned + Send + 'static {
    /// Every `type` value this family defines.
    const TYPES: &'static [&'static str];
}

impl EventTaxonomy for BuildEvent {
    const TYPES: &'static [&'static str] =
        &["build.created", "build.step", "build.log", "build.completed"];
}

impl EventTaxonomy for RunEvent {
    const TYPES: &'static [&'static str] =
        &["run.created", "run.started", "run.log", "run.completed"];
}

/// One decoded frame from an event stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame<E> {
    Event(E),
    /// Opaque telemetry, never interpreted.
    Telemetry(Value),
    /// A frame whose `type` this client does not know.
    Unknown(String),
}

impl<E: EventTaxonomy> Frame<E> {
    /// Decode one JSON frame.
    pub fn parse(data: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(data).map_err(|e| StreamError::InvalidEvent(e.to_string()))?;
        Self::from_value(value)
    }

    pub fn from_value(value: Value) -> Result<Self> {
        let kind = value
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        if is_telemetry(&kind, &value) {
            return Ok(Frame::Telemetry(value));
        }
        if !E::TYPES.contains(&kind.as_str()) {
            return Ok(Frame::Unknown(kind));
        }
        serde_json::from_value(value)
            .map(Frame::Event)
            .map_err(|e| StreamError::InvalidEvent(format!("{kind}: {e}")))
    }
}

impl<E> From<E> for Frame<E> {
    fn from(event: E) -> Self {
        Frame::Event(event)
    }
}

/// Telemetry envelopes are typed `telemetry` (or `*.telemetry`) or carry a
/// top-level `telemetry` payload.
fn is_telemetry(kind: &str, value: &Value) -> bool {
    kind == "telemetry" || kind.ends_with(".telemetry") || value.get("telemetry").is_some()
}
