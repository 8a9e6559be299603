//! Durable session snapshots for the workbench.
//!
//! This crate provides the storage-agnostic persistence layer used to make
//! tab layout and console preferences survive a reload:
//! - A [`PersistenceBackend`] trait with in-memory and file-backed backends
//! - [`SessionScope`] keys scoped per workspace + document
//! - Typed [`Scoped`] handles with `get`/`set`/`clear`
//! - Versioned snapshot shapes with read-time migration
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use workbench_session::{MemoryBackend, SessionScope, TabSessionSnapshot};
//!
//! let scope = SessionScope::new("acme", "pipeline.yaml");
//! let tabs = scope.tabs(Arc::new(MemoryBackend::new()));
//! tabs.set(&TabSessionSnapshot::default())?;
//! ```

mod backend;
mod error;
mod scope;
mod snapshot;

pub use backend::{FileBackend, MemoryBackend, PersistenceBackend, SharedBackend};
pub use error::{Result, SessionError};
pub use scope::{ConsoleHandle, Scoped, SessionScope};
pub use snapshot::{
    CONSOLE_SNAPSHOT_VERSION, ConsoleSnapshot, ConsoleState, MAX_CONSOLE_FRACTION,
    MIN_CONSOLE_FRACTION, PersistedTab, TabSessionSnapshot, load_console_snapshot,
};
