//! CLI command handlers.

pub mod activity;
pub mod build;
pub mod extract;
pub mod save;
pub mod session;
pub mod validate;

use std::sync::Arc;

use anyhow::Result;
use workbench_client::WorkbenchClient;
use workbench_config::WorkbenchConfig;
use workbench_session::{FileBackend, SessionScope, SharedBackend};
use workbench_stream::StreamCoordinator;

/// Server used when neither the command line nor the config names one.
const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Layered configuration.
    pub config: WorkbenchConfig,
    /// Server URL given on the command line.
    pub server_url: Option<String>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Command line, then `[server] url`, then localhost.
    pub fn server_url(&self) -> String {
        self.server_url
            .clone()
            .or_else(|| self.config.server().url)
            .unwrap_or_else(|| DEFAULT_SERVER_URL.to_string())
    }

    pub fn client(&self) -> Result<Arc<WorkbenchClient>> {
        let server = self.config.server();
        let mut builder = WorkbenchClient::builder()
            .base_url(self.server_url())
            .timeout(server.timeout())
            .stream_timeout(server.stream_timeout());
        if let Some(token) = &server.auth_token {
            builder = builder.auth_token(token);
        }
        Ok(Arc::new(builder.build()?))
    }

    /// A coordinator whose builds, runs and validations all go to `client`.
    pub fn coordinator(&self, client: &Arc<WorkbenchClient>) -> StreamCoordinator {
        StreamCoordinator::builder()
            .builds(client.clone())
            .runs(client.clone())
            .validator(client.clone())
            .log_capacity(self.config.activity().log_capacity)
            .build()
    }

    /// Session storage under the state directory.
    pub fn backend(&self) -> SharedBackend {
        let dir = self.config.session().effective_state_dir().join("sessions");
        Arc::new(FileBackend::new(dir))
    }

    /// The configured workspace/document scope, with optional overrides.
    pub fn scope(&self, workspace: Option<&str>, document: Option<&str>) -> SessionScope {
        let session = self.config.session();
        SessionScope::new(
            workspace.unwrap_or(&session.workspace),
            document.unwrap_or(&session.document),
        )
    }
}
