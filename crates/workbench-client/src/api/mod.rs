//! API endpoint implementations.

mod builds;
mod config;
mod files;
mod runs;

pub use builds::BuildsApi;
pub use config::ConfigApi;
pub use files::FilesApi;
pub use runs::RunsApi;
