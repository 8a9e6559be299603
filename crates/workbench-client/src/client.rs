//! The HTTP client shared by every API group.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::api::{BuildsApi, ConfigApi, FilesApi, RunsApi};
use crate::error::{Error, ErrorResponse, Result};

/// Timeout for plain requests.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Default timeout for streaming requests. Builds can take a while.
const DEFAULT_STREAM_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// Workbench API client.
///
/// Provides typed access to the file, build, run and validation endpoints,
/// and implements every remote collaborator the session layer needs.
///
/// # Example
///
/// ```no_run
/// use workbench_client::WorkbenchClient;
///
/// # async fn example() -> workbench_client::Result<()> {
/// let client = WorkbenchClient::builder()
///     .base_url("http://localhost:8080")
///     .auth_token("secret")
///     .build()?;
///
/// let file = client.files().load("manifest.json").await?;
/// println!("{} bytes at {:?}", file.content.len(), file.etag);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct WorkbenchClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    /// Server root, always ending in `/`.
    base_url: Url,
    timeout: Duration,
    stream_timeout: Duration,
}

/// How long a request may take.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Deadline {
    /// Plain request/response calls.
    Request,
    /// Long-lived event streams.
    Stream,
}

impl WorkbenchClient {
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Client for a server on the default local port.
    pub fn localhost() -> Result<Self> {
        Self::builder().base_url("http://127.0.0.1:8080").build()
    }

    pub fn base_url(&self) -> &Url {
        &self.inner.base_url
    }

    // ─────────────────────────────────────────────────────────────────────────
    // API accessors
    // ─────────────────────────────────────────────────────────────────────────

    pub fn files(&self) -> FilesApi {
        FilesApi::new(self.clone())
    }

    pub fn builds(&self) -> BuildsApi {
        BuildsApi::new(self.clone())
    }

    pub fn runs(&self) -> RunsApi {
        RunsApi::new(self.clone())
    }

    pub fn config(&self) -> ConfigApi {
        ConfigApi::new(self.clone())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Transport
    // ─────────────────────────────────────────────────────────────────────────

    /// Resolve an endpoint below `api/v1/`.
    pub(crate) fn url(&self, endpoint: &str) -> Result<Url> {
        let endpoint = endpoint.trim_start_matches('/');
        Ok(self.inner.base_url.join("api/v1/")?.join(endpoint)?)
    }

    /// Resolve `prefix` followed by a slash-separated workspace path, with
    /// every segment percent-encoded.
    pub(crate) fn nested_url(&self, prefix: &str, path: &str) -> Result<Url> {
        let mut url = self.url(prefix)?;
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("cannot nest paths under {prefix}")))?
            .pop_if_empty()
            .extend(path.trim_start_matches('/').split('/'));
        Ok(url)
    }

    /// Start a request to `url` with the given deadline applied.
    pub(crate) fn request(
        &self,
        method: Method,
        url: Url,
        deadline: Deadline,
    ) -> reqwest::RequestBuilder {
        let timeout = match deadline {
            Deadline::Request => self.inner.timeout,
            Deadline::Stream => self.inner.stream_timeout,
        };
        self.inner.http.request(method, url).timeout(timeout)
    }

    /// Send a request and turn any non-2xx status into an [`Error`].
    pub(crate) async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        // An unreadable or non-JSON error body still classifies by status.
        let body = response.json::<ErrorResponse>().await.ok();
        Err(Error::from_status(status.as_u16(), body))
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let request = self.request(Method::GET, self.url(endpoint)?, Deadline::Request);
        Ok(self.send(request).await?.json().await?)
    }

    pub(crate) async fn post<T, B>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self
            .request(Method::POST, self.url(endpoint)?, Deadline::Request)
            .json(body);
        Ok(self.send(request).await?.json().await?)
    }

    /// POST without a body; whatever the server answers is discarded.
    pub(crate) async fn post_empty(&self, endpoint: &str) -> Result<()> {
        let request = self.request(Method::POST, self.url(endpoint)?, Deadline::Request);
        self.send(request).await?;
        Ok(())
    }

    /// POST that expects a `text/event-stream` answer. The response is
    /// returned unread.
    pub(crate) async fn post_stream<B>(&self, endpoint: &str, body: &B) -> Result<reqwest::Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(endpoint)?;
        debug!(url = %url, "Opening event stream");
        let request = self
            .request(Method::POST, url, Deadline::Stream)
            .header(ACCEPT, "text/event-stream")
            .json(body);
        self.send(request).await
    }
}

/// Builder for [`WorkbenchClient`].
#[derive(Debug)]
pub struct ClientBuilder {
    base_url: Option<String>,
    auth_token: Option<String>,
    timeout: Duration,
    stream_timeout: Duration,
    user_agent: Option<String>,
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self {
            base_url: None,
            auth_token: None,
            timeout: DEFAULT_TIMEOUT,
            stream_timeout: DEFAULT_STREAM_TIMEOUT,
            user_agent: None,
        }
    }

    /// Server root, e.g. `http://localhost:8080`. Required.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Bearer token sent with every request.
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn build(self) -> Result<WorkbenchClient> {
        let Some(raw) = self.base_url else {
            return Err(Error::Config("a base URL is required".to_string()));
        };
        let base_url = directory_url(Url::parse(&raw)?);

        let mut headers = HeaderMap::new();
        if let Some(token) = self.auth_token.as_deref() {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| Error::Config("auth token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            headers.insert(AUTHORIZATION, value);
        }

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .user_agent(self.user_agent.unwrap_or_else(|| {
                concat!("workbench-client/", env!("CARGO_PKG_VERSION")).to_string()
            }))
            .build()?;

        debug!(base_url = %base_url, "Workbench client ready");
        Ok(WorkbenchClient {
            inner: Arc::new(ClientInner {
                http,
                base_url,
                timeout: self.timeout,
                stream_timeout: self.stream_timeout,
            }),
        })
    }
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Make relative joins land below the configured path, not beside it.
fn directory_url(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
