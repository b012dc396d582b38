//! HTTP client for the image service's MCP endpoints.

use std::time::Duration;

use tracing::instrument;

use crate::error::{Error, Result};
use crate::protocol::{GENERATE_IMAGE, GET_IMAGE_STATUS, ToolRequest, ToolResponse};
use crate::stream::{self, EventStream, StreamEvent, StreamHandle};

/// Base URL used when none is configured.
pub const DEFAULT_BASE_URL: &str = "http://localhost:3123";

/// Default total timeout for a request/response call.
/// Generation is synchronous on the server side, so this is generous.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// Default TCP connect timeout, shared with the event stream.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const MESSAGES_PATH: &str = "/mcp/messages";
const SSE_PATH: &str = "/mcp/sse";
const HEALTH_PATH: &str = "/health";

/// Builder for creating a [`Client`].
#[derive(Debug, Clone)]
pub struct ClientBuilder {
    base_url: String,
    timeout: Option<Duration>,
    connect_timeout: Duration,
}

impl Default for ClientBuilder {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl ClientBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Total timeout for request/response calls. `None` disables it; the
    /// event stream never has one.
    pub fn timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn build(self) -> Result<Client> {
        let base_url = normalize_base_url(&self.base_url)?;
        let http = reqwest::Client::builder()
            .connect_timeout(self.connect_timeout)
            .build()?;

        tracing::debug!(%base_url, "created MCP client");
        Ok(Client {
            http,
            base_url,
            timeout: self.timeout,
        })
    }
}

/// Client for an MCP image service.
///
/// Each call is one HTTP exchange. Failures are returned, never retried.
/// Cloning is cheap and shares the connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: String,
    timeout: Option<Duration>,
}

impl Client {
    /// Client for `base_url` with default timeouts.
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        Self::builder().base_url(base_url).build()
    }

    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    /// Base URL with any trailing slash removed.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Check that the service is up.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn health(&self) -> Result<()> {
        let mut req = self.http.get(self.url(HEALTH_PATH));
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::debug!(%status, "health check failed");
            return Err(Error::Protocol {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    /// List the tools the service offers.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn list_tools(&self) -> Result<ToolResponse> {
        self.send(&ToolRequest::list_tools()).await
    }

    /// Ask the service to generate an image for `prompt`.
    ///
    /// The prompt is forwarded as-is; only an empty prompt is rejected.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn generate_image(&self, prompt: &str) -> Result<ToolResponse> {
        if prompt.is_empty() {
            return Err(Error::EmptyPrompt);
        }
        self.call_tool(GENERATE_IMAGE, [("prompt", prompt)]).await
    }

    /// Look up the status of a previously generated image.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn get_image_status(&self, image_id: &str) -> Result<ToolResponse> {
        self.call_tool(GET_IMAGE_STATUS, [("imageId", image_id)]).await
    }

    /// Call a tool by name.
    pub async fn call_tool<I, K, V>(&self, name: &str, arguments: I) -> Result<ToolResponse>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.send(&ToolRequest::call_tool(name, arguments)).await
    }

    /// Open the service's event stream.
    ///
    /// Resolves once the server has accepted the connection; frames are
    /// then read in the background until the stream is closed.
    #[instrument(skip(self), fields(base_url = %self.base_url))]
    pub async fn events(&self) -> Result<EventStream> {
        EventStream::connect(self.http.clone(), self.url(SSE_PATH)).await
    }

    /// Callback form of [`Client::events`].
    ///
    /// Returns immediately; connecting happens in the background. `on_event`
    /// receives every decoded frame in arrival order. `on_error` receives
    /// malformed frames (the subscription stays open) and the fault that
    /// ends it, if any. Neither is called after [`StreamHandle::close`].
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe<E, F>(&self, on_event: E, on_error: F) -> StreamHandle
    where
        E: FnMut(StreamEvent) + Send + 'static,
        F: FnMut(Error) + Send + 'static,
    {
        stream::subscribe(self.http.clone(), self.url(SSE_PATH), on_event, on_error)
    }

    async fn send(&self, request: &ToolRequest) -> Result<ToolResponse> {
        let method = request.method();
        tracing::debug!(%method, tool = ?request.params().map(|p| &p.name), "sending MCP request");

        let mut req = self.http.post(self.url(MESSAGES_PATH)).json(request);
        if let Some(timeout) = self.timeout {
            req = req.timeout(timeout);
        }

        let response = req.send().await.map_err(|e| {
            tracing::debug!(%method, error = %e, "MCP request failed");
            Error::Transport(e)
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(%method, %status, "MCP request rejected");
            return Err(Error::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        let value: serde_json::Value = serde_json::from_str(&body)?;
        Ok(ToolResponse::new(value))
    }

    fn url(&self, path: &str) -> String {
        let base = &self.base_url;
        format!("{base}{path}")
    }
}

fn normalize_base_url(raw: &str) -> Result<String> {
    let trimmed = raw.trim().trim_end_matches('/');
    let invalid = |reason: String| Error::InvalidBaseUrl {
        url: raw.to_string(),
        reason,
    };

    let url = reqwest::Url::parse(trimmed).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }
    Ok(trimmed.to_string())
}
