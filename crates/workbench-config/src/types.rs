//! Configuration types.
//!
//! ```toml
//! [server]
//! url = "https://workbench.example.com"
//! auth_token = "..."
//! timeout_secs = 30
//! stream_timeout_secs = 1800
//!
//! [session]
//! workspace = "acme"
//! document = "pipeline.yaml"
//! state_dir = "~/.local/share/workbench"
//!
//! [activity]
//! log_capacity = 400
//!
//! [console]
//! default_fraction = 0.3
//!
//! [logging]
//! level = "info"
//! file = true
//! ```

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Environment variable that overrides `[session] state_dir`.
const STATE_DIR_ENV: &str = "WORKBENCH_STATE_DIR";

/// Root configuration. Every section is optional; a missing section means
/// defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WorkbenchConfig {
    pub server: Option<ServerConfig>,
    pub session: Option<SessionConfig>,
    pub activity: Option<ActivityConfig>,
    pub console: Option<ConsoleConfig>,
    pub logging: Option<LoggingConfig>,
}

impl WorkbenchConfig {
    /// Create an empty config.
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        Ok(toml::from_str(toml_str)?)
    }

    /// Serialize to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge another config on top of this one (other takes priority).
    /// Sections are replaced whole.
    pub fn merge(&mut self, other: WorkbenchConfig) {
        if other.server.is_some() {
            self.server = other.server;
        }
        if other.session.is_some() {
            self.session = other.session;
        }
        if other.activity.is_some() {
            self.activity = other.activity;
        }
        if other.console.is_some() {
            self.console = other.console;
        }
        if other.logging.is_some() {
            self.logging = other.logging;
        }
    }

    /// Reject values the session layer cannot work with.
    pub fn validate(&self) -> Result<()> {
        if let Some(activity) = &self.activity
            && activity.log_capacity == 0
        {
            return Err(ConfigError::invalid(
                "activity.log_capacity",
                "must be greater than zero",
            ));
        }
        if let Some(console) = &self.console
            && !(console.default_fraction > 0.0 && console.default_fraction < 1.0)
        {
            return Err(ConfigError::invalid(
                "console.default_fraction",
                format!("{} is not between 0 and 1", console.default_fraction),
            ));
        }
        if let Some(server) = &self.server {
            if server.timeout_secs == 0 {
                return Err(ConfigError::invalid(
                    "server.timeout_secs",
                    "must be greater than zero",
                ));
            }
            if server.stream_timeout_secs == 0 {
                return Err(ConfigError::invalid(
                    "server.stream_timeout_secs",
                    "must be greater than zero",
                ));
            }
        }
        Ok(())
    }

    // Section accessors with defaults.

    pub fn server(&self) -> ServerConfig {
        self.server.clone().unwrap_or_default()
    }

    pub fn session(&self) -> SessionConfig {
        self.session.clone().unwrap_or_default()
    }

    pub fn activity(&self) -> ActivityConfig {
        self.activity.clone().unwrap_or_default()
    }

    pub fn console(&self) -> ConsoleConfig {
        self.console.clone().unwrap_or_default()
    }

    pub fn logging(&self) -> LoggingConfig {
        self.logging.clone().unwrap_or_default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Server
// ─────────────────────────────────────────────────────────────────────────────

/// Remote workbench service connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL of the service.
    pub url: Option<String>,
    /// Bearer token sent with every request.
    pub auth_token: Option<String>,
    /// Timeout for plain requests, in seconds.
    pub timeout_secs: u64,
    /// Timeout for event streams, in seconds.
    pub stream_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            url: None,
            auth_token: None,
            timeout_secs: 30,
            stream_timeout_secs: 30 * 60,
        }
    }
}

impl ServerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Which session to open and where its snapshots live.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Workspace the session belongs to.
    pub workspace: String,
    /// Document the session belongs to.
    pub document: String,
    /// Directory for persisted snapshots and log files.
    pub state_dir: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            workspace: "default".to_string(),
            document: "default".to_string(),
            state_dir: None,
        }
    }
}

impl SessionConfig {
    /// Resolve the state directory.
    ///
    /// Resolution order:
    /// 1. `WORKBENCH_STATE_DIR` environment variable
    /// 2. Configured `state_dir`
    /// 3. Platform data dir (`~/.local/share/workbench` on Linux)
    /// 4. `./.workbench`
    pub fn effective_state_dir(&self) -> PathBuf {
        if let Ok(dir) = std::env::var(STATE_DIR_ENV)
            && !dir.is_empty()
        {
            return PathBuf::from(dir);
        }
        self.state_dir.clone().unwrap_or_else(|| {
            dirs::data_local_dir()
                .map(|d| d.join("workbench"))
                .unwrap_or_else(|| PathBuf::from(".workbench"))
        })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity & Console
// ─────────────────────────────────────────────────────────────────────────────

/// Activity ledger limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActivityConfig {
    /// Log lines retained per activity.
    pub log_capacity: usize,
}

impl Default for ActivityConfig {
    fn default() -> Self {
        Self { log_capacity: 400 }
    }
}

/// Console panel defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsoleConfig {
    /// Panel height, as a fraction of its container, when nothing is stored.
    pub default_fraction: f64,
    /// Container height used to migrate pixel-based snapshots.
    pub container_px: f64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            default_fraction: 0.3,
            container_px: 800.0,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Logging
// ─────────────────────────────────────────────────────────────────────────────

/// Logging configuration section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,
    /// Write JSON logs to a daily file under the state directory.
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = WorkbenchConfig::from_toml(
            r#"
[server]
url = "http://localhost:9000"
timeout_secs = 5

[session]
workspace = "acme"
document = "pipeline.yaml"

[activity]
log_capacity = 1000

[console]
default_fraction = 0.4
"#,
        )
        .unwrap();

        let server = config.server();
        assert_eq!(server.url.as_deref(), Some("http://localhost:9000"));
        assert_eq!(server.timeout(), Duration::from_secs(5));
        assert_eq!(server.stream_timeout_secs, 1800);
        assert_eq!(config.session().workspace, "acme");
        assert_eq!(config.activity().log_capacity, 1000);
        assert_eq!(config.console().default_fraction, 0.4);
        assert_eq!(config.logging(), LoggingConfig::default());
        config.validate().unwrap();
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = WorkbenchConfig::from_toml("").unwrap();
        assert_eq!(config, WorkbenchConfig::default());
        assert_eq!(config.activity().log_capacity, 400);
        assert_eq!(config.session().document, "default");
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_zero_log_capacity() {
        let config = WorkbenchConfig::from_toml("[activity]\nlog_capacity = 0\n").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("activity.log_capacity"));
    }

    #[test]
    fn test_validate_rejects_fraction_out_of_range() {
        for fraction in ["0.0", "1.0", "1.5", "-0.2"] {
            let config =
                WorkbenchConfig::from_toml(&format!("[console]\ndefault_fraction = {fraction}\n"))
                    .unwrap();
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid { ref field, .. }) if field == "console.default_fraction"),
                "fraction {fraction} should be rejected"
            );
        }
    }

    #[test]
    fn test_merge_replaces_sections() {
        let mut base = WorkbenchConfig::from_toml(
            "[server]\nurl = \"http://a\"\n\n[activity]\nlog_capacity = 10\n",
        )
        .unwrap();
        let overlay = WorkbenchConfig::from_toml("[server]\nurl = \"http://b\"\n").unwrap();
        base.merge(overlay);

        assert_eq!(base.server().url.as_deref(), Some("http://b"));
        assert_eq!(base.activity().log_capacity, 10);
    }

    #[test]
    fn test_toml_roundtrip() {
        let mut config = WorkbenchConfig::new();
        config.session = Some(SessionConfig {
            workspace: "acme".into(),
            ..Default::default()
        });
        let parsed = WorkbenchConfig::from_toml(&config.to_toml().unwrap()).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_configured_state_dir() {
        let session = SessionConfig {
            state_dir: Some(PathBuf::from("/tmp/wb-state")),
            ..Default::default()
        };
        if std::env::var(STATE_DIR_ENV).is_err() {
            assert_eq!(session.effective_state_dir(), PathBuf::from("/tmp/wb-state"));
        }
    }
}
