//! Finding config files and layering them.
//!
//! Layers, lowest precedence first:
//! 1. the user file, `$WORKBENCH_CONFIG_DIR/config.toml` or
//!    `~/.config/workbench/config.toml`
//! 2. `workbench.toml` in the project directory
//! 3. a file named with `--config`
//!
//! Command-line flags are applied by the binary on top of the result.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{ConfigError, Result, WorkbenchConfig};

const PROJECT_FILE: &str = "workbench.toml";
const USER_FILE: &str = "config.toml";
const CONFIG_DIR_ENV: &str = "WORKBENCH_CONFIG_DIR";

/// Which layer a config file belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    User,
    Project,
    Explicit,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConfigLayer::User => "user",
            ConfigLayer::Project => "project",
            ConfigLayer::Explicit => "explicit",
        })
    }
}

/// One file that discovery looked at.
#[derive(Debug, Clone)]
pub struct ConfigSource {
    pub layer: ConfigLayer,
    pub path: PathBuf,
    /// False when the file was absent or skipped.
    pub loaded: bool,
}

/// The merged configuration and how it was assembled.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config: WorkbenchConfig,
    /// Every file considered, lowest precedence first.
    pub sources: Vec<ConfigSource>,
    /// Layers that were skipped because they could not be read or parsed.
    pub warnings: Vec<String>,
}

impl LoadedConfig {
    /// Files that actually contributed, lowest precedence first.
    pub fn loaded_from(&self) -> Vec<&Path> {
        self.sources
            .iter()
            .filter_map(|source| source.loaded.then_some(source.path.as_path()))
            .collect()
    }
}

/// Options for [`load_config_with_options`].
#[derive(Debug, Clone, Default)]
pub struct LoadOptions<'a> {
    /// Where to look for `workbench.toml`. Defaults to the working directory.
    pub project_dir: Option<&'a Path>,
    /// Replaces `WORKBENCH_CONFIG_DIR` and the platform config directory.
    pub config_dir: Option<&'a Path>,
    /// Layered last. Unlike discovered files it must exist and parse.
    pub explicit: Option<&'a Path>,
}

/// Discover and merge config for `project_dir` (or the working directory).
pub fn load_config(project_dir: Option<&Path>) -> Result<LoadedConfig> {
    load_config_with_options(LoadOptions {
        project_dir,
        ..Default::default()
    })
}

/// Discover, merge and validate config.
///
/// Absent discovered files are skipped quietly; unreadable ones are skipped
/// with a warning. An explicit file that fails to load is an error.
pub fn load_config_with_options(options: LoadOptions<'_>) -> Result<LoadedConfig> {
    let mut loaded = LoadedConfig {
        config: WorkbenchConfig::new(),
        sources: Vec::new(),
        warnings: Vec::new(),
    };

    let user_file = match options.config_dir {
        Some(dir) => Some(dir.join(USER_FILE)),
        None => user_config_path(),
    };
    if let Some(path) = user_file {
        loaded.discover(ConfigLayer::User, path);
    }

    let project_file = options.project_dir.unwrap_or(Path::new(".")).join(PROJECT_FILE);
    loaded.discover(ConfigLayer::Project, project_file);

    if let Some(path) = options.explicit {
        loaded.config.merge(load_config_file(path)?);
        loaded.sources.push(ConfigSource {
            layer: ConfigLayer::Explicit,
            path: path.to_path_buf(),
            loaded: true,
        });
    }

    loaded.config.validate()?;
    debug!(
        files = loaded.loaded_from().len(),
        skipped = loaded.warnings.len(),
        "Configuration loaded"
    );
    Ok(loaded)
}

impl LoadedConfig {
    /// Merge an optional discovered file, recording the outcome.
    fn discover(&mut self, layer: ConfigLayer, path: PathBuf) {
        let loaded = path.is_file()
            && match load_config_file(&path) {
                Ok(file) => {
                    self.config.merge(file);
                    true
                }
                Err(e) => {
                    warn!(layer = %layer, path = %path.display(), error = %e, "Skipping config file");
                    self.warnings
                        .push(format!("Failed to load {} config {}: {e}", layer, path.display()));
                    false
                }
            };
        self.sources.push(ConfigSource {
            layer,
            path,
            loaded,
        });
    }
}

/// Read and parse one file, without discovery or validation.
pub fn load_config_file(path: &Path) -> Result<WorkbenchConfig> {
    let text = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    WorkbenchConfig::from_toml(&text)
}

/// Write `config` to `path`, creating missing directories.
pub fn save_config(config: &WorkbenchConfig, path: &Path) -> Result<()> {
    let write_error = |path: &Path| {
        let path = path.to_path_buf();
        move |source: std::io::Error| ConfigError::WriteFile { path, source }
    };
    if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(write_error(dir))?;
    }
    std::fs::write(path, config.to_toml()?).map_err(write_error(path))
}

/// The user config file, if a config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    user_config_dir().map(|dir| dir.join(USER_FILE))
}

/// `WORKBENCH_CONFIG_DIR` when set, otherwise the platform config directory
/// (`~/.config/workbench` on Linux).
pub fn user_config_dir() -> Option<PathBuf> {
    match std::env::var(CONFIG_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => Some(PathBuf::from(dir)),
        _ => dirs::config_dir().map(|dir| dir.join("workbench")),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
