//! Configuration API.

use workbench_stream::{ValidationReport, ValidationRequest};

use crate::client::WorkbenchClient;
use crate::error::Result;

/// Config API client.
pub struct ConfigApi {
    client: WorkbenchClient,
}

impl ConfigApi {
    pub(crate) fn new(client: WorkbenchClient) -> Self {
        Self { client }
    }

    /// Validate the workspace configuration, optionally at a given digest.
    pub async fn validate(&self, request: &ValidationRequest) -> Result<ValidationReport> {
        self.client.post("config/validate", request).await
    }
}
