//! Error types for fetch operations.

use thiserror::Error;

/// Errors that can occur while executing a fetch.
///
/// Transport-level failures only surface as [`FetchError::Transport`] when the
/// request options ask for it (`throw_on_error`); otherwise they are reported
/// on the response itself. Decode failures always propagate.
#[derive(Error, Debug)]
pub enum FetchError {
    /// The transfer did not complete as a clean success.
    #[error("request to {url} failed [{status}]: {message}")]
    Transport {
        /// HTTP status code, `0` if the server was never reached.
        status: u16,
        /// Human-readable description from the transport.
        message: String,
        /// The requested URL.
        url: String,
    },

    /// The response body could not be decoded into the requested type.
    #[error("failed to decode response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request was cancelled before it finished.
    #[error("request was cancelled")]
    Cancelled,

    /// Invalid URL provided.
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Invalid header name or value.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Unknown HTTP method name.
    #[error("invalid HTTP method: {0}")]
    InvalidMethod(String),

    /// A multipart form could not be encoded.
    #[error("failed to encode multipart form: {0}")]
    Form(String),

    /// The underlying HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    Client(String),
}

impl FetchError {
    /// Check if this is a transport failure.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. })
    }

    /// Check if this is a decode failure.
    pub fn is_decode(&self) -> bool {
        matches!(self, Self::Decode(_))
    }

    /// Check if the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The HTTP status carried by a transport failure.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Transport { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<url::ParseError> for FetchError {
    fn from(err: url::ParseError) -> Self {
        Self::InvalidUrl(err.to_string())
    }
}

impl From<http::header::InvalidHeaderName> for FetchError {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

impl From<http::header::InvalidHeaderValue> for FetchError {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Self::InvalidHeader(err.to_string())
    }
}

/// A specialized Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
