//! Extraction runs API.

use url::Url;
use workbench_stream::{EventStream, ExtractionRequest, OutputListing, RunEvent};

use crate::client::WorkbenchClient;
use crate::error::Result;
use crate::sse;

/// Runs API client.
pub struct RunsApi {
    client: WorkbenchClient,
}

impl RunsApi {
    pub(crate) fn new(client: WorkbenchClient) -> Self {
        Self { client }
    }

    /// Start an extraction run and stream its events. Telemetry envelopes
    /// are passed through as [`workbench_stream::Frame::Telemetry`].
    pub async fn stream(&self, request: &ExtractionRequest) -> Result<EventStream<RunEvent>> {
        let response = self.client.post_stream("runs/stream", request).await?;
        Ok(sse::frames(response))
    }

    /// List the files a finished run produced.
    pub async fn outputs(&self, run_id: &str) -> Result<OutputListing> {
        self.client.get(&format!("runs/{}/outputs", run_id)).await
    }

    /// Download location of one output file.
    pub fn output_url(&self, run_id: &str, output_path: &str) -> Result<Url> {
        self.client
            .nested_url(&format!("runs/{}/outputs/", run_id), output_path)
    }

    /// Ask the server to stop a run.
    pub async fn cancel(&self, run_id: &str) -> Result<()> {
        self.client
            .post_empty(&format!("runs/{}/cancel", run_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use futures::StreamExt;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};
    use workbench_activity::RunOutput;
    use workbench_stream::{Frame, RunStatus};

    use super::*;

    const RUN_STREAM: &str = "\
data: {\"type\":\"run.created\",\"run_id\":\"r-1\"}

data: {\"type\":\"run.telemetry\",\"rows\":120}

data: {\"type\":\"telemetry\",\"payload\":{\"type\":\"run.completed\"}}

data: {\"type\":\"run.completed\",\"status\":\"succeeded\"}

";

    async fn client(server: &MockServer) -> WorkbenchClient {
        WorkbenchClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_stream_separates_telemetry() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/runs/stream"))
            .and(body_json(serde_json::json!({
                "document_id": "doc-1",
                "sheet_names": ["Sheet1"],
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(RUN_STREAM, "text/event-stream"))
            .mount(&server)
            .await;

        let request = ExtractionRequest::new("doc-1").with_sheets(["Sheet1"]);
        let frames: Vec<Frame<RunEvent>> = client(&server)
            .await
            .runs()
            .stream(&request)
            .await
            .unwrap()
            .map(|f| f.unwrap())
            .collect()
            .await;

        assert_eq!(frames.len(), 4);
        assert!(matches!(&frames[0], Frame::Event(RunEvent::Created { run_id, .. }) if run_id == "r-1"));
        assert!(matches!(frames[1], Frame::Telemetry(_)));
        assert!(matches!(frames[2], Frame::Telemetry(_)));
        assert!(matches!(
            frames[3],
            Frame::Event(RunEvent::Completed {
                status: RunStatus::Succeeded,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_outputs() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/runs/r-1/outputs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "files": [{"path": "out/sheet1.csv", "byte_size": 2048}],
            })))
            .mount(&server)
            .await;

        let listing = client(&server).await.runs().outputs("r-1").await.unwrap();
        assert_eq!(
            listing.files,
            vec![RunOutput {
                path: "out/sheet1.csv".into(),
                byte_size: 2048,
            }]
        );
    }

    #[tokio::test]
    async fn test_outputs_for_unknown_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/runs/r-404/outputs"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": "not_found",
                "message": "no such run",
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.runs().outputs("r-404").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_output_url() {
        let client = WorkbenchClient::builder()
            .base_url("http://localhost:8080")
            .build()
            .unwrap();
        let url = client.runs().output_url("r-1", "out/sheet 1.csv").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/api/v1/runs/r-1/outputs/out/sheet%201.csv"
        );
    }
}
