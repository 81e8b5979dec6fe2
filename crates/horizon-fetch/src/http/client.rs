//! The fetch client: request construction, progress loop and error escalation.

use std::sync::Arc;
use std::time::Duration;

use reqwest::redirect::Policy;
use serde::de::DeserializeOwned;
use tokio::time::MissedTickBehavior;

use super::multipart::MultipartForm;
use super::options::{CancelToken, FetchOptions, RequestBody};
use super::request::{HttpMethod, TransportRequest};
use super::response::FetchResponse;
use super::transport::{ReqwestTransport, TransferHandle, Transport};
use crate::error::{FetchError, Result};

const JSON_CONTENT_TYPE: &str = "application/json";

/// Configuration for the fetch client.
#[derive(Clone, Debug)]
pub struct FetchClientConfig {
    /// Request timeout.
    pub timeout: Option<Duration>,
    /// Connect timeout.
    pub connect_timeout: Option<Duration>,
    /// Whether to follow redirects.
    pub follow_redirects: bool,
    /// Maximum number of redirects to follow.
    pub max_redirects: usize,
    /// Default user agent.
    pub user_agent: Option<String>,
    /// How often progress callbacks are polled while a transfer runs.
    pub progress_interval: Duration,
}

impl Default for FetchClientConfig {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(30)),
            connect_timeout: Some(Duration::from_secs(10)),
            follow_redirects: true,
            max_redirects: 10,
            user_agent: Some(format!(
                "HorizonFetch/{} (Rust)",
                env!("CARGO_PKG_VERSION")
            )),
            progress_interval: Duration::from_millis(16),
        }
    }
}

/// Builder for creating a fetch client with custom configuration.
pub struct FetchClientBuilder {
    config: FetchClientConfig,
    default_headers: http::HeaderMap,
    transport: Option<Arc<dyn Transport>>,
}

impl Default for FetchClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClientBuilder {
    /// Create a new builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: FetchClientConfig::default(),
            default_headers: http::HeaderMap::new(),
            transport: None,
        }
    }

    /// Set the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = Some(timeout);
        self
    }

    /// Disable request timeout.
    pub fn no_timeout(mut self) -> Self {
        self.config.timeout = None;
        self
    }

    /// Set the connect timeout.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = Some(timeout);
        self
    }

    /// Disable redirect following.
    pub fn no_redirects(mut self) -> Self {
        self.config.follow_redirects = false;
        self
    }

    /// Set the maximum number of redirects to follow.
    pub fn max_redirects(mut self, max: usize) -> Self {
        self.config.max_redirects = max;
        self
    }

    /// Set the user agent string.
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = Some(user_agent.into());
        self
    }

    /// Set how often progress is polled while a transfer runs.
    pub fn progress_interval(mut self, interval: Duration) -> Self {
        self.config.progress_interval = interval.max(Duration::from_millis(1));
        self
    }

    /// Add a default header that will be sent with every request.
    pub fn default_header(
        mut self,
        name: impl TryInto<http::HeaderName>,
        value: impl TryInto<http::HeaderValue>,
    ) -> Result<Self> {
        let name = name
            .try_into()
            .map_err(|_| FetchError::InvalidHeader("Invalid header name".to_string()))?;
        let value = value
            .try_into()
            .map_err(|_| FetchError::InvalidHeader("Invalid header value".to_string()))?;
        self.default_headers.insert(name, value);
        Ok(self)
    }

    /// Send requests through a custom transport instead of reqwest.
    ///
    /// Timeouts, redirects, user agent and default headers only configure the
    /// built-in transport.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Build the fetch client.
    pub fn build(self) -> Result<FetchClient> {
        let transport = match self.transport {
            Some(transport) => transport,
            None => Arc::new(ReqwestTransport::new(Self::reqwest_client(
                &self.config,
                self.default_headers,
            )?)),
        };

        Ok(FetchClient {
            inner: Arc::new(FetchClientInner {
                transport,
                config: self.config,
            }),
        })
    }

    fn reqwest_client(
        config: &FetchClientConfig,
        default_headers: http::HeaderMap,
    ) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder();

        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(connect_timeout) = config.connect_timeout {
            builder = builder.connect_timeout(connect_timeout);
        }

        if config.follow_redirects {
            builder = builder.redirect(Policy::limited(config.max_redirects));
        } else {
            builder = builder.redirect(Policy::none());
        }

        if let Some(ref ua) = config.user_agent {
            builder = builder.user_agent(ua);
        }

        builder
            .default_headers(default_headers)
            .build()
            .map_err(|e| FetchError::Client(e.to_string()))
    }
}

struct FetchClientInner {
    transport: Arc<dyn Transport>,
    config: FetchClientConfig,
}

/// An HTTP client that runs one independent request per call and reports
/// upload/download progress while it is in flight.
///
/// The client is cheaply cloneable and thread-safe. Calls share nothing but
/// the transport; concurrent calls do not interfere.
///
/// # Example
///
/// ```ignore
/// use horizon_fetch::{FetchClient, FetchOptions};
///
/// let client = FetchClient::new();
///
/// // Fails with FetchError::Transport on a non-2xx status
/// let response = client.get("https://example.com/todos/1", None).await?;
/// println!("{}", response.text());
///
/// // Report failures on the response instead
/// let options = FetchOptions::new().throw_on_error(false);
/// let response = client.get("https://example.com/missing", Some(options)).await?;
/// if response.is_error() {
///     println!("{}: {:?}", response.status_code(), response.error_message());
/// }
///
/// // Typed decode
/// let todo: Todo = client.get_json("https://example.com/todos/1", None).await?;
/// ```
#[derive(Clone)]
pub struct FetchClient {
    inner: Arc<FetchClientInner>,
}

impl Default for FetchClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FetchClient {
    /// Create a new fetch client with default configuration.
    pub fn new() -> Self {
        FetchClientBuilder::new()
            .build()
            .expect("Failed to create fetch client with default configuration")
    }

    /// Create a builder for configuring a new fetch client.
    pub fn builder() -> FetchClientBuilder {
        FetchClientBuilder::new()
    }

    /// Get the client's configuration.
    pub fn config(&self) -> &FetchClientConfig {
        &self.inner.config
    }

    /// Send a GET request.
    pub async fn get(
        &self,
        url: impl AsRef<str>,
        options: Option<FetchOptions>,
    ) -> Result<FetchResponse> {
        self.execute(HttpMethod::Get, url, options).await
    }

    /// Send a DELETE request.
    pub async fn delete(
        &self,
        url: impl AsRef<str>,
        options: Option<FetchOptions>,
    ) -> Result<FetchResponse> {
        self.execute(HttpMethod::Delete, url, options).await
    }

    /// Send a POST request with a JSON body.
    pub async fn post(
        &self,
        url: impl AsRef<str>,
        json_body: impl Into<String>,
        options: Option<FetchOptions>,
    ) -> Result<FetchResponse> {
        let options = options.unwrap_or_default().json_body(json_body);
        self.execute(HttpMethod::Post, url, Some(options)).await
    }

    /// Send a PUT request with a JSON body.
    pub async fn put(
        &self,
        url: impl AsRef<str>,
        json_body: impl Into<String>,
        options: Option<FetchOptions>,
    ) -> Result<FetchResponse> {
        let options = options.unwrap_or_default().json_body(json_body);
        self.execute(HttpMethod::Put, url, Some(options)).await
    }

    /// POST a multipart form.
    pub async fn upload(
        &self,
        url: impl AsRef<str>,
        form: MultipartForm,
        options: Option<FetchOptions>,
    ) -> Result<FetchResponse> {
        let options = options.unwrap_or_default().form(form);
        self.execute(HttpMethod::Post, url, Some(options)).await
    }

    /// Send a GET request and decode the body as JSON.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: impl AsRef<str>,
        options: Option<FetchOptions>,
    ) -> Result<T> {
        self.execute_json(HttpMethod::Get, url, options).await
    }

    /// Send a POST request with a JSON body and decode the response as JSON.
    pub async fn post_json<T: DeserializeOwned>(
        &self,
        url: impl AsRef<str>,
        json_body: impl Into<String>,
        options: Option<FetchOptions>,
    ) -> Result<T> {
        let response = self.post(url, json_body, options).await?;
        Ok(serde_json::from_str(response.text())?)
    }

    /// Execute a request and decode the body as JSON.
    ///
    /// Decode failures are returned as [`FetchError::Decode`].
    pub async fn execute_json<T: DeserializeOwned>(
        &self,
        method: HttpMethod,
        url: impl AsRef<str>,
        options: Option<FetchOptions>,
    ) -> Result<T> {
        let response = self.execute(method, url, options).await?;
        Ok(serde_json::from_str(response.text())?)
    }

    /// Execute a single request.
    ///
    /// Progress callbacks in `options` receive `0.0` before the transfer is
    /// polled and `1.0` once it finishes, whatever the outcome. A failed
    /// transfer is returned as [`FetchError::Transport`] when the options
    /// throw on error, otherwise as a response with `is_error()` set.
    pub async fn execute(
        &self,
        method: HttpMethod,
        url: impl AsRef<str>,
        options: Option<FetchOptions>,
    ) -> Result<FetchResponse> {
        let url = url.as_ref();
        let options = options.unwrap_or_default();
        let request = self.build_request(method, url, &options).await?;

        if options.cancel().is_some_and(CancelToken::is_cancelled) {
            return Err(FetchError::Cancelled);
        }

        tracing::debug!(target: "horizon_fetch::http", "{} {}", request.method, url);
        let handle = self.inner.transport.start(request);
        self.drive(&handle, &options).await?;

        let response = FetchResponse::from_transfer(handle);
        Self::escalate(response, url, options.throws_on_error())
    }

    /// Build the transport request for `method` and `url` from `options`.
    ///
    /// The body picked by [`FetchOptions::body`] is attached only if the
    /// method carries one, together with its implied `Content-Type`. Caller
    /// headers are applied last and override implied ones.
    pub async fn build_request(
        &self,
        method: HttpMethod,
        url: &str,
        options: &FetchOptions,
    ) -> Result<TransportRequest> {
        let url = url::Url::parse(url)?;
        if let Some(invalid) = options.invalid_header() {
            return Err(FetchError::InvalidHeader(invalid.to_string()));
        }

        let mut request = TransportRequest::new(method, url);
        if request.method.carries_body() {
            if let Some(body) = options.body() {
                let (content_type, bytes) = match body {
                    RequestBody::Multipart(form) => {
                        let encoded = form.encode().await?;
                        (Some(encoded.content_type), encoded.bytes)
                    }
                    RequestBody::Json(bytes) => (Some(JSON_CONTENT_TYPE.to_string()), bytes),
                    RequestBody::Raw(bytes) => (None, bytes),
                };
                if let Some(content_type) = content_type {
                    request.headers.insert(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_str(&content_type)?,
                    );
                }
                request.body = Some(bytes);
            }
        } else if options.has_body() {
            tracing::debug!(
                target: "horizon_fetch::http",
                "Ignoring body for {} {}",
                request.method,
                request.url
            );
        }

        // Replaces implied values for every name the caller set.
        request.headers.extend(options.header_map().clone());

        Ok(request)
    }

    async fn drive(&self, handle: &TransferHandle, options: &FetchOptions) -> Result<()> {
        options.report_download(0.0);
        options.report_upload(0.0);

        let mut ticker = tokio::time::interval(self.inner.config.progress_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        while !handle.is_finished() {
            options.report_download(fraction(handle.download_progress().fraction()));
            options.report_upload(fraction(handle.upload_progress().fraction()));

            tokio::select! {
                biased;
                _ = cancelled(options.cancel()) => {
                    tracing::debug!(target: "horizon_fetch::http", "Request cancelled");
                    return Err(FetchError::Cancelled);
                }
                _ = handle.finished() => {}
                _ = ticker.tick() => {}
            }
        }

        options.report_download(1.0);
        options.report_upload(1.0);
        Ok(())
    }

    fn escalate(
        response: FetchResponse,
        url: &str,
        throw_on_error: bool,
    ) -> Result<FetchResponse> {
        if !(response.is_error() && throw_on_error) {
            return Ok(response);
        }

        let err = FetchError::Transport {
            status: response.status_code(),
            message: response.error_message().unwrap_or_default().to_string(),
            url: url.to_string(),
        };
        drop(response);
        Err(err)
    }
}

impl std::fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchClient")
            .field("config", &self.inner.config)
            .finish()
    }
}

fn fraction(value: Option<f64>) -> f32 {
    value.unwrap_or(0.0).clamp(0.0, 1.0) as f32
}

async fn cancelled(token: Option<&CancelToken>) {
    match token {
        Some(token) => token.cancelled().await,
        None => std::future::pending().await,
    }
}
