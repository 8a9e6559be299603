//! Workspace files API.
//!
//! Content travels as the raw request/response body. Versions travel in the
//! `ETag` header on reads and the `If-Match` header on writes.

use chrono::{DateTime, Utc};
use reqwest::Method;
use reqwest::header::{CONTENT_TYPE, ETAG, HeaderMap, IF_MATCH, LAST_MODIFIED};
use tracing::debug;
use workbench_files::{FileMetadata, LoadedFile, SaveReceipt, SaveRequest};

use crate::client::{Deadline, WorkbenchClient};
use crate::error::Result;

/// Files API client.
pub struct FilesApi {
    client: WorkbenchClient,
}

impl FilesApi {
    pub(crate) fn new(client: WorkbenchClient) -> Self {
        Self { client }
    }

    /// Fetch a file's content, version and metadata.
    pub async fn load(&self, path: &str) -> Result<LoadedFile> {
        let url = self.client.nested_url("files/", path)?;
        let response = self
            .client
            .send(self.client.request(Method::GET, url, Deadline::Request))
            .await?;

        let headers = response.headers();
        let etag = header(headers, ETAG);
        let modified_at = header(headers, LAST_MODIFIED).and_then(|value| {
            DateTime::parse_from_rfc2822(&value)
                .ok()
                .map(|date| date.with_timezone(&Utc))
        });
        let content_type = header(headers, CONTENT_TYPE);
        let content = response.text().await?;

        debug!(path, etag = ?etag, bytes = content.len(), "Loaded file");
        let metadata = FileMetadata {
            size: Some(content.len() as u64),
            modified_at,
            content_type,
            etag: etag.clone(),
        };
        Ok(LoadedFile::new(content, etag).with_metadata(metadata))
    }

    /// Write a file. With an etag the write is conditional and fails with
    /// [`crate::Error::Conflict`] when the server holds a different version.
    pub async fn save(&self, request: &SaveRequest) -> Result<SaveReceipt> {
        let url = self.client.nested_url("files/", &request.path)?;

        let mut query = Vec::new();
        if request.create {
            query.push(("create", "true"));
        }
        if request.parents {
            query.push(("parents", "true"));
        }

        let mut builder = self
            .client
            .request(Method::PUT, url, Deadline::Request)
            .query(&query)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(request.content.clone());
        if let Some(etag) = &request.etag {
            builder = builder.header(IF_MATCH, etag.as_str());
        }

        let response = self.client.send(builder).await?;

        let header_etag = header(response.headers(), ETAG);
        let body = response.text().await?;
        let mut receipt: SaveReceipt = if body.trim().is_empty() {
            SaveReceipt::default()
        } else {
            serde_json::from_str(&body)?
        };
        if receipt.etag.is_none() {
            receipt.etag = header_etag;
        }

        debug!(path = %request.path, etag = ?receipt.etag, "Saved file");
        Ok(receipt)
    }
}

fn header(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_string, header as header_eq, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::Error;

    async fn client(server: &MockServer) -> WorkbenchClient {
        WorkbenchClient::builder()
            .base_url(server.uri())
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_reads_etag_and_metadata() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/files/src/data.py"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("print('hi')\n", "text/x-python")
                    .insert_header("etag", "\"v3\"")
                    .insert_header("last-modified", "Tue, 15 Nov 1994 08:12:31 GMT"),
            )
            .mount(&server)
            .await;

        let file = client(&server).await.files().load("src/data.py").await.unwrap();
        assert_eq!(file.content, "print('hi')\n");
        assert_eq!(file.etag.as_deref(), Some("\"v3\""));
        assert_eq!(file.metadata.etag, file.etag);
        assert_eq!(file.metadata.size, Some(12));
        assert_eq!(file.metadata.content_type.as_deref(), Some("text/x-python"));
        assert_eq!(
            file.metadata.modified_at.map(|d| d.to_rfc3339()),
            Some("1994-11-15T08:12:31+00:00".to_string())
        );
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/files/gone.txt"))
            .respond_with(ResponseTemplate::new(404).set_body_json(serde_json::json!({
                "code": "not_found",
                "message": "gone.txt does not exist",
            })))
            .mount(&server)
            .await;

        let err = client(&server).await.files().load("gone.txt").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(
            err.into_load_error("gone.txt").to_string(),
            "Failed to load gone.txt: gone.txt does not exist"
        );
    }

    #[tokio::test]
    async fn test_save_sends_if_match() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/files/manifest.json"))
            .and(header_eq("if-match", "\"v1\""))
            .and(body_string("{\"name\":\"demo\"}"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "etag": "\"v2\"",
                "size": 15,
            })))
            .expect(1)
            .mount(&server)
            .await;

        let request = SaveRequest::update(
            "manifest.json",
            "{\"name\":\"demo\"}",
            Some("\"v1\"".to_string()),
        );
        let receipt = client(&server).await.files().save(&request).await.unwrap();
        assert_eq!(receipt.etag.as_deref(), Some("\"v2\""));
        assert_eq!(receipt.size, Some(15));
    }

    #[tokio::test]
    async fn test_save_falls_back_to_etag_header() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/files/notes/new.md"))
            .and(query_param("create", "true"))
            .and(query_param("parents", "true"))
            .respond_with(ResponseTemplate::new(201).insert_header("etag", "\"v1\""))
            .mount(&server)
            .await;

        let request = SaveRequest::create("notes/new.md", "# New");
        let receipt = client(&server).await.files().save(&request).await.unwrap();
        assert_eq!(receipt.etag.as_deref(), Some("\"v1\""));
    }

    #[tokio::test]
    async fn test_save_precondition_failure_is_conflict() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/v1/files/manifest.json"))
            .respond_with(ResponseTemplate::new(412))
            .mount(&server)
            .await;

        let request = SaveRequest::update("manifest.json", "{}", Some("\"v1\"".to_string()));
        let err = client(&server).await.files().save(&request).await.unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
        assert!(err.into_save_error("manifest.json").is_conflict());
    }
}
