//! Collaborator trait implementations backed by the HTTP API.

use async_trait::async_trait;
use workbench_activity::{OutputLink, RunOutput};
use workbench_files::{FileContent, LoadedFile, SaveReceipt, SaveRequest};
use workbench_stream::{
    BuildEvent, BuildRequest, BuildSource, EventStream, ExtractionRequest, OutputListing,
    RunEvent, RunSource, StreamError, ValidationReport, ValidationRequest, ValidationSource,
};

use crate::client::WorkbenchClient;

#[async_trait]
impl FileContent for WorkbenchClient {
    async fn load_file(&self, path: &str) -> workbench_files::Result<LoadedFile> {
        self.files()
            .load(path)
            .await
            .map_err(|e| e.into_load_error(path))
    }

    async fn save_file(&self, request: SaveRequest) -> workbench_files::Result<SaveReceipt> {
        self.files()
            .save(&request)
            .await
            .map_err(|e| e.into_save_error(&request.path))
    }
}

#[async_trait]
impl BuildSource for WorkbenchClient {
    async fn stream_build(
        &self,
        request: BuildRequest,
    ) -> workbench_stream::Result<EventStream<BuildEvent>> {
        self.builds()
            .stream(&request)
            .await
            .map_err(StreamError::from)
    }

    async fn cancel_build(&self, build_id: &str) -> workbench_stream::Result<()> {
        self.builds()
            .cancel(build_id)
            .await
            .map_err(StreamError::from)
    }
}

#[async_trait]
impl RunSource for WorkbenchClient {
    async fn stream_run(
        &self,
        request: ExtractionRequest,
    ) -> workbench_stream::Result<EventStream<RunEvent>> {
        self.runs()
            .stream(&request)
            .await
            .map_err(StreamError::from)
    }

    async fn fetch_outputs(&self, run_id: &str) -> workbench_stream::Result<OutputListing> {
        self.runs()
            .outputs(run_id)
            .await
            .map_err(StreamError::from)
    }

    fn output_link(&self, run_id: &str, output: &RunOutput) -> Option<OutputLink> {
        let url = self.runs().output_url(run_id, &output.path).ok()?;
        Some(OutputLink {
            label: output.path.clone(),
            href: url.to_string(),
        })
    }

    async fn cancel_run(&self, run_id: &str) -> workbench_stream::Result<()> {
        self.runs()
            .cancel(run_id)
            .await
            .map_err(StreamError::from)
    }
}

#[async_trait]
impl ValidationSource for WorkbenchClient {
    async fn validate(
        &self,
        request: ValidationRequest,
    ) -> workbench_stream::Result<ValidationReport> {
        self.config()
            .validate(&request)
            .await
            .map_err(StreamError::from)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use workbench_activity::{ActivityKind, ActivityStatus};
    use workbench_files::{FileSessionStore, SaveOutcome};
    use workbench_stream::StreamCoordinator;

    use super::*;

    async fn client(server: &MockServer) -> WorkbenchClient {
        WorkbenchClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_store_reloads_after_http_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/files/manifest.json"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("{\"v\":2}")
                    .insert_header("etag", "\"v2\""),
            )
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/files/manifest.json"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let store = FileSessionStore::new(Arc::new(client(&server).await));
        store.open_file("manifest.json");
        store.wait_for_loads().await;
        store.update_content("manifest.json", "{\"v\":\"local\"}");

        let outcome = store.save_tab("manifest.json").await.unwrap();
        assert_eq!(outcome, SaveOutcome::Reloaded);

        let tab = store.tab("manifest.json").unwrap();
        assert_eq!(tab.content, "{\"v\":2}");
        assert!(!tab.is_dirty());
    }

    #[tokio::test]
    async fn test_coordinator_runs_extraction_over_http() {
        let server = MockServer::start().await;
        let body = "\
data: {\"type\":\"run.created\",\"run_id\":\"r-5\"}

data: {\"type\":\"run.log\",\"stream\":\"stdout\",\"message\":\"reading Sheet1\"}

data: {\"type\":\"run.completed\",\"status\":\"succeeded\"}

";
        Mock::given(method("POST"))
            .and(path("/api/v1/runs/stream"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/v1/runs/r-5/outputs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"path": "sheet1.csv", "byte_size": 10}],
            })))
            .mount(&server)
            .await;

        let client = Arc::new(client(&server).await);
        let coordinator = StreamCoordinator::builder().runs(client).build();
        let id = coordinator
            .start_extraction(ExtractionRequest::new("doc-1"))
            .activity_id()
            .unwrap();
        coordinator.join(ActivityKind::Extraction).await;

        let activity = coordinator.activity(id).unwrap();
        assert_eq!(activity.status(), ActivityStatus::Succeeded);
        assert_eq!(activity.metadata.run_id.as_deref(), Some("r-5"));
        assert_eq!(activity.logs().last().unwrap().message, "reading Sheet1");
        assert_eq!(activity.outputs.len(), 1);
        assert!(
            activity.output_links[0]
                .href
                .ends_with("/api/v1/runs/r-5/outputs/sheet1.csv")
        );
    }
}
