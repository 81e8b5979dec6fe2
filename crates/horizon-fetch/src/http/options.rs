//! Per-request options.

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;
use tokio::sync::watch;

use super::multipart::MultipartForm;

/// Callback receiving a transfer fraction in `0.0..=1.0`.
pub type ProgressCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// The body that will actually be sent after precedence is applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RequestBody {
    /// Multipart form, encoded when the request is built.
    Multipart(MultipartForm),
    /// UTF-8 encoded JSON text.
    Json(Bytes),
    /// Raw bytes with no implied content type.
    Raw(Bytes),
}

/// A cancellation token for a pending fetch.
///
/// Clones share state: cancelling any clone cancels them all. A cancelled
/// fetch fails with [`FetchError::Cancelled`](crate::FetchError::Cancelled).
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: Arc<watch::Sender<bool>>,
}

impl CancelToken {
    /// Create a new, un-cancelled token.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Cancel the token.
    ///
    /// Returns `true` if this call performed the cancellation, `false` if the
    /// token was already cancelled.
    pub fn cancel(&self) -> bool {
        !self.tx.send_replace(true)
    }

    /// Check if the token has been cancelled.
    pub fn is_cancelled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Wait until the token is cancelled.
    pub async fn cancelled(&self) {
        let mut rx = self.tx.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Options for a single fetch.
///
/// Options are built up front and are not modified while the request runs.
/// Several body kinds may be set at once; the one that is sent is chosen by
/// [`FetchOptions::body`].
///
/// # Example
///
/// ```ignore
/// use horizon_fetch::FetchOptions;
///
/// let options = FetchOptions::new()
///     .header("Authorization", "Bearer token")
///     .json_body(r#"{"name":"John"}"#)
///     .on_upload_progress(|p| println!("upload {:.0}%", p * 100.0))
///     .throw_on_error(false);
/// ```
#[derive(Clone)]
pub struct FetchOptions {
    headers: http::HeaderMap,
    invalid_header: Option<String>,
    body_raw: Option<Bytes>,
    json_body: Option<String>,
    form: Option<MultipartForm>,
    on_download_progress: Option<ProgressCallback>,
    on_upload_progress: Option<ProgressCallback>,
    throw_on_error: bool,
    cancel: Option<CancelToken>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            headers: http::HeaderMap::new(),
            invalid_header: None,
            body_raw: None,
            json_body: None,
            form: None,
            on_download_progress: None,
            on_upload_progress: None,
            throw_on_error: true,
            cancel: None,
        }
    }
}

impl FetchOptions {
    /// Create options with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a header, replacing any previous value for the same name.
    ///
    /// Header names are case-insensitive. An invalid name or value makes the
    /// request fail with [`FetchError::InvalidHeader`](crate::FetchError::InvalidHeader)
    /// before anything is sent.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let name = name.into();
        match parse_header(&name, &value.into()) {
            Ok((name, value)) => {
                self.headers.insert(name, value);
            }
            Err(err) => {
                tracing::warn!(
                    target: "horizon_fetch::http",
                    "Invalid header '{}': {}",
                    name,
                    err
                );
                self.invalid_header.get_or_insert(format!("{name}: {err}"));
            }
        }
        self
    }

    /// Set multiple headers, in iteration order.
    pub fn headers<K, V>(self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        headers
            .into_iter()
            .fold(self, |options, (name, value)| options.header(name, value))
    }

    /// Set a raw binary body.
    pub fn body_raw(mut self, body: impl Into<Bytes>) -> Self {
        self.body_raw = Some(body.into());
        self
    }

    /// Set a pre-encoded JSON body.
    pub fn json_body(mut self, json: impl Into<String>) -> Self {
        self.json_body = Some(json.into());
        self
    }

    /// Serialize a value into the JSON body.
    pub fn json<T: Serialize>(self, value: &T) -> serde_json::Result<Self> {
        let json = serde_json::to_string(value)?;
        Ok(self.json_body(json))
    }

    /// Set a multipart form body.
    pub fn form(mut self, form: MultipartForm) -> Self {
        self.form = Some(form);
        self
    }

    /// Set the download progress callback.
    pub fn on_download_progress(
        mut self,
        callback: impl Fn(f32) + Send + Sync + 'static,
    ) -> Self {
        self.on_download_progress = Some(Arc::new(callback));
        self
    }

    /// Set the upload progress callback.
    pub fn on_upload_progress(
        mut self,
        callback: impl Fn(f32) + Send + Sync + 'static,
    ) -> Self {
        self.on_upload_progress = Some(Arc::new(callback));
        self
    }

    /// Choose whether a failed transfer is returned as an error (`true`,
    /// the default) or as a response with `is_error()` set.
    pub fn throw_on_error(mut self, throw: bool) -> Self {
        self.throw_on_error = throw;
        self
    }

    /// Attach a cancellation token.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Get the caller headers.
    pub fn header_map(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// The first invalid header passed to [`FetchOptions::header`], if any.
    pub fn invalid_header(&self) -> Option<&str> {
        self.invalid_header.as_deref()
    }

    /// Check whether failures are returned as errors.
    pub fn throws_on_error(&self) -> bool {
        self.throw_on_error
    }

    /// Get the cancellation token, if any.
    pub fn cancel(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    /// The body to send.
    ///
    /// Precedence: multipart form, then a non-empty JSON string, then raw
    /// bytes. Lower-precedence fields are ignored without error.
    pub fn body(&self) -> Option<RequestBody> {
        if let Some(form) = &self.form {
            if self.json_body.is_some() || self.body_raw.is_some() {
                tracing::debug!(
                    target: "horizon_fetch::http",
                    "Multipart form takes precedence over other body fields"
                );
            }
            return Some(RequestBody::Multipart(form.clone()));
        }
        if let Some(json) = self.json_body.as_deref().filter(|json| !json.is_empty()) {
            if self.body_raw.is_some() {
                tracing::debug!(
                    target: "horizon_fetch::http",
                    "JSON body takes precedence over raw body"
                );
            }
            return Some(RequestBody::Json(Bytes::copy_from_slice(json.as_bytes())));
        }
        self.body_raw.clone().map(RequestBody::Raw)
    }

    /// Check whether any body field is set.
    pub fn has_body(&self) -> bool {
        self.form.is_some() || self.json_body.is_some() || self.body_raw.is_some()
    }

    pub(crate) fn report_download(&self, fraction: f32) {
        if let Some(callback) = &self.on_download_progress {
            callback(fraction);
        }
    }

    pub(crate) fn report_upload(&self, fraction: f32) {
        if let Some(callback) = &self.on_upload_progress {
            callback(fraction);
        }
    }
}

fn parse_header(
    name: &str,
    value: &str,
) -> Result<(http::HeaderName, http::HeaderValue), String> {
    let name = http::HeaderName::from_bytes(name.as_bytes()).map_err(|e| e.to_string())?;
    let value = http::HeaderValue::from_str(value).map_err(|e| e.to_string())?;
    Ok((name, value))
}

impl std::fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchOptions")
            .field("headers", &self.headers)
            .field("body_raw", &self.body_raw.as_ref().map(Bytes::len))
            .field("json_body", &self.json_body)
            .field("form", &self.form)
            .field("on_download_progress", &self.on_download_progress.is_some())
            .field("on_upload_progress", &self.on_upload_progress.is_some())
            .field("throw_on_error", &self.throw_on_error)
            .field("cancel", &self.cancel)
            .finish()
    }
}
