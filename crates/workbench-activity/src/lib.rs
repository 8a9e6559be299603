//! Activity ledger for the workbench.
//!
//! The ledger is the single source of truth for what has run, what is
//! running, and what each attempt produced. It is a pure reducer over
//! [`LedgerAction`]s with no I/O of its own:
//!
//! - [`Activity`]: one build, validation or extraction attempt
//! - [`BoundedLog`]: ring buffer keeping only the newest log lines
//! - [`ActivityLedger`]: newest-first activity list plus selection
//! - [`KindMap`]: per-kind derived views (`running_by_kind`, `latest_by_kind`)

pub mod activity;
pub mod bounded;
pub mod ledger;
pub mod types;

pub use activity::{Activity, ActivityPatch};
pub use bounded::BoundedLog;
pub use ledger::{ActivityLedger, Completion, LOG_CAPACITY, LedgerAction};
pub use types::{
    ActivityId, ActivityKind, ActivityMetadata, ActivityStatus, Issue, IssueLevel, KindMap,
    LogLevel, LogLine, OutputLink, RunOutput,
};
