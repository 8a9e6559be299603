//! HTTP client for the workbench services.
//!
//! This crate provides a typed client for the workspace file, environment
//! build, extraction run and configuration endpoints, and implements the
//! collaborator traits the session layer is written against:
//!
//! - [`workbench_files::FileContent`]: `GET`/`PUT api/v1/files/{path}` with
//!   `ETag`/`If-Match` versioning (412 becomes a conflict)
//! - [`workbench_stream::BuildSource`]: `POST api/v1/environment/builds/stream` (SSE)
//! - [`workbench_stream::RunSource`]: `POST api/v1/runs/stream` (SSE) and
//!   `GET api/v1/runs/{id}/outputs`
//! - [`workbench_stream::ValidationSource`]: `POST api/v1/config/validate`
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use workbench_client::WorkbenchClient;
//! use workbench_stream::{BuildRequest, StreamCoordinator};
//!
//! # async fn example() -> workbench_client::Result<()> {
//! let client = Arc::new(
//!     WorkbenchClient::builder()
//!         .base_url("http://localhost:8080")
//!         .build()?,
//! );
//!
//! let coordinator = StreamCoordinator::builder()
//!     .builds(client.clone())
//!     .runs(client.clone())
//!     .validator(client)
//!     .build();
//! coordinator.start_build(BuildRequest::default());
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod error;
mod sources;
mod sse;

pub use client::{ClientBuilder, WorkbenchClient};
pub use error::{Error, Result};
