//! HTTP methods and the transport-level request description.

use std::str::FromStr;

use bytes::Bytes;

use crate::error::FetchError;

/// HTTP request methods.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method.
    Get,
    /// HTTP POST method.
    Post,
    /// HTTP PUT method.
    Put,
    /// HTTP DELETE method.
    Delete,
    /// HTTP PATCH method.
    Patch,
    /// HTTP HEAD method.
    Head,
    /// HTTP OPTIONS method.
    Options,
    /// Any other method, such as WebDAV's `PROPFIND`.
    Other(reqwest::Method),
}

impl HttpMethod {
    /// Convert to reqwest method.
    pub(crate) fn to_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
            Self::Patch => reqwest::Method::PATCH,
            Self::Head => reqwest::Method::HEAD,
            Self::Options => reqwest::Method::OPTIONS,
            Self::Other(method) => method.clone(),
        }
    }

    /// The method name as sent on the wire.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
            Self::Patch => "PATCH",
            Self::Head => "HEAD",
            Self::Options => "OPTIONS",
            Self::Other(method) => method.as_str(),
        }
    }

    /// Whether a request body from the options is attached for this method.
    ///
    /// GET, DELETE and HEAD are always sent without a body.
    pub fn carries_body(&self) -> bool {
        !matches!(self, Self::Get | Self::Delete | Self::Head)
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = FetchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        const ALL: [HttpMethod; 7] = [
            HttpMethod::Get,
            HttpMethod::Post,
            HttpMethod::Put,
            HttpMethod::Delete,
            HttpMethod::Patch,
            HttpMethod::Head,
            HttpMethod::Options,
        ];

        let name = s.trim();
        if let Some(method) = ALL
            .into_iter()
            .find(|method| method.as_str().eq_ignore_ascii_case(name))
        {
            return Ok(method);
        }

        // Extension methods are case-sensitive and kept as written.
        reqwest::Method::from_bytes(name.as_bytes())
            .map(Self::Other)
            .map_err(|_| FetchError::InvalidMethod(s.to_string()))
    }
}

/// A fully resolved request handed to a [`Transport`](super::Transport).
///
/// Body precedence and header overrides have already been applied; the
/// transport sends exactly what it is given.
#[derive(Clone, Debug)]
pub struct TransportRequest {
    /// The HTTP method.
    pub method: HttpMethod,
    /// The request URL.
    pub url: url::Url,
    /// Final request headers.
    pub headers: http::HeaderMap,
    /// Upload body, if any.
    pub body: Option<Bytes>,
}

impl TransportRequest {
    /// Create a bodyless request with no headers.
    pub fn new(method: HttpMethod, url: url::Url) -> Self {
        Self {
            method,
            url,
            headers: http::HeaderMap::new(),
            body: None,
        }
    }

    /// Get a header value as a string.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Size of the upload body in bytes.
    pub fn body_len(&self) -> u64 {
        self.body.as_ref().map_or(0, |body| body.len() as u64)
    }
}
