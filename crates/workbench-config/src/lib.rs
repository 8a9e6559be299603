//! Configuration for the workbench.
//!
//! Provides TOML-based configuration with:
//! - Server connection (`[server]`), session scope (`[session]`), activity
//!   limits (`[activity]`), console defaults (`[console]`) and logging
//!   (`[logging]`)
//! - Config file layering (user config, then `./workbench.toml`, then an
//!   explicit file, then CLI flags)
//! - Validation of values the session layer cannot work with

pub mod discovery;
pub mod error;
pub mod types;

pub use discovery::{
    ConfigLayer, ConfigSource, LoadOptions, LoadedConfig, load_config, load_config_file,
    load_config_with_options, save_config, user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
