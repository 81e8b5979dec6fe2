//! HTTP response types.

use bytes::Bytes;
use serde::de::DeserializeOwned;

use super::transport::{TransferHandle, TransferOutcome};
use crate::error::Result;

/// The result of a single fetch.
///
/// Body text and bytes are copied out of the transfer when the response is
/// built, so they stay readable after the [`TransferHandle`] is released.
///
/// # Handle ownership
///
/// The response owns the handle of the transfer that produced it. The caller
/// decides when it goes away: [`FetchResponse::release_handle`] frees it
/// early, and dropping the response (or the handle taken out of it) frees it
/// on every other path.
pub struct FetchResponse {
    text: String,
    raw_bytes: Bytes,
    status_code: u16,
    headers: http::HeaderMap,
    error_message: Option<String>,
    handle: Option<TransferHandle>,
}

impl FetchResponse {
    /// Build from a finished transfer.
    pub(crate) fn from_transfer(handle: TransferHandle) -> Self {
        let outcome = handle.outcome().unwrap_or_else(|| {
            TransferOutcome::failed("transfer finished without an outcome")
        });
        let mut response = Self::from_outcome(outcome);
        response.handle = Some(handle);
        response
    }

    fn from_outcome(outcome: TransferOutcome) -> Self {
        let text = std::str::from_utf8(&outcome.body)
            .map(str::to_owned)
            .unwrap_or_default();
        Self {
            text,
            raw_bytes: outcome.body,
            status_code: outcome.status,
            headers: outcome.headers,
            error_message: outcome.error,
            handle: None,
        }
    }

    /// The body decoded as UTF-8 text, empty if there is no body or it is
    /// not valid UTF-8.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The body as raw bytes.
    pub fn raw_bytes(&self) -> &Bytes {
        &self.raw_bytes
    }

    /// The HTTP status code, `0` if the server was never reached.
    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    /// Check if the transfer was not a clean success.
    pub fn is_error(&self) -> bool {
        self.error_message.is_some()
    }

    /// Description of the failure, present iff [`is_error`](Self::is_error).
    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Get the response headers.
    pub fn headers(&self) -> &http::HeaderMap {
        &self.headers
    }

    /// Get a specific header value.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Parse the body text as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        Ok(serde_json::from_str(&self.text)?)
    }

    /// Get the transfer handle, if it has not been taken or released.
    pub fn handle(&self) -> Option<&TransferHandle> {
        self.handle.as_ref()
    }

    /// Take ownership of the transfer handle.
    pub fn take_handle(&mut self) -> Option<TransferHandle> {
        self.handle.take()
    }

    /// Release the transfer handle now.
    ///
    /// Returns `false` if it was already taken or released.
    pub fn release_handle(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.release();
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for FetchResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FetchResponse")
            .field("status_code", &self.status_code)
            .field("is_error", &self.is_error())
            .field("error_message", &self.error_message)
            .field("bytes", &self.raw_bytes.len())
            .field("handle", &self.handle.is_some())
            .finish()
    }
}

/// Progress information for downloads/uploads.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TransferProgress {
    /// Number of bytes transferred so far.
    pub bytes_transferred: u64,
    /// Total number of bytes, if known.
    pub total_bytes: Option<u64>,
}

impl TransferProgress {
    /// Get the progress as a fraction (0.0 to 1.0), if total is known.
    pub fn fraction(&self) -> Option<f64> {
        self.total_bytes.map(|total| {
            if total == 0 {
                1.0
            } else {
                (self.bytes_transferred as f64 / total as f64).min(1.0)
            }
        })
    }
}
