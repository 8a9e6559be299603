//! Stream coordinator for the workbench.
//!
//! Turns remote build, validation and extraction streams into
//! [`workbench_activity::ActivityLedger`] mutations:
//!
//! - [`events`]: the `build.*` and `run.*` wire taxonomies, plus the
//!   telemetry envelope that run streams interleave
//! - [`source`]: collaborator traits the HTTP client implements
//! - [`StreamCoordinator`]: single-flight per kind, cancellation, notices and
//!   a live event feed
//!
//! # Example
//!
//! ```rust,ignore
//! let coordinator = StreamCoordinator::builder()
//!     .builds(Arc::new(client.clone()))
//!     .runs(Arc::new(client))
//!     .build();
//!
//! if let StartOutcome::Started(id) = coordinator.start_build(BuildRequest::default()) {
//!     coordinator.join(ActivityKind::Build).await;
//!     println!("{:?}", coordinator.activity(id).map(|a| a.status()));
//! }
//! ```

pub mod coordinator;
pub mod error;
pub mod events;
pub mod notice;
pub mod source;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use coordinator::{
    CoordinatorEvent, StartOutcome, StartRejection, StreamCoordinator, StreamCoordinatorBuilder,
};
pub use error::{Result, StreamError};
pub use events::{
    BuildEvent, BuildStatus, EventTaxonomy, Frame, OutputStream, RunEvent, RunStatus,
};
pub use notice::{Notice, NoticeLevel};
pub use source::{
    BuildRequest, BuildSource, EventStream, ExtractionRequest, LoadGate, OutputListing,
    RunSource, SharedBuildSource, SharedLoadGate, SharedRunSource, SharedValidationSource,
    ValidationReport, ValidationRequest, ValidationSource,
};
