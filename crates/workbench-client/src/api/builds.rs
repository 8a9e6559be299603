//! Environment builds API.

use workbench_stream::{BuildEvent, BuildRequest, EventStream};

use crate::client::WorkbenchClient;
use crate::error::Result;
use crate::sse;

/// Builds API client.
pub struct BuildsApi {
    client: WorkbenchClient,
}

impl BuildsApi {
    pub(crate) fn new(client: WorkbenchClient) -> Self {
        Self { client }
    }

    /// Start a build and stream its events.
    pub async fn stream(&self, request: &BuildRequest) -> Result<EventStream<BuildEvent>> {
        let response = self
            .client
            .post_stream("environment/builds/stream", request)
            .await?;
        Ok(sse::frames(response))
    }

    /// Ask the server to stop a build.
    pub async fn cancel(&self, build_id: &str) -> Result<()> {
        self.client
            .post_empty(&format!("environment/builds/{}/cancel", build_id))
            .await
    }
}
