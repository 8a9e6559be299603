//! File session store for the workbench.
//!
//! Owns the set of open tabs and drives the load → edit → save round-trip:
//! - [`FileSessionState`]: pure reducer over [`TabAction`]s
//! - [`FileSessionStore`]: async shell that runs loads and saves against a
//!   [`FileContent`] collaborator and persists the tab layout on every change
//! - Saves are compare-and-swap on the tab's etag; a conflict triggers a
//!   reload of the server version instead of an overwrite
//!
//! # Example
//!
//! ```rust,ignore
//! let store = FileSessionStore::new(files).with_persistence(scope.tabs(backend));
//! store.open_file("manifest.json");
//! store.wait_for_loads().await;
//! store.update_content("manifest.json", "{}");
//! store.save_tab("manifest.json").await?;
//! ```

pub mod content;
pub mod error;
pub mod state;
pub mod store;
pub mod tab;
pub mod tree;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use content::{FileContent, LoadedFile, SaveReceipt, SaveRequest, SharedFileContent};
pub use error::{FileError, Result};
pub use state::{FileSessionState, LoadTicket, Outcome, RecentDirection, TabAction, TabZone};
pub use store::{FileSessionStore, SaveAllReport, SaveOutcome};
pub use tab::{FileMetadata, FileTab, TabStatus, language_for};
pub use tree::FileTree;
