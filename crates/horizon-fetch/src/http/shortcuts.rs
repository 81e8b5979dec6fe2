//! Free functions bound to a shared default client.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;

use super::client::FetchClient;
use super::multipart::MultipartForm;
use super::options::FetchOptions;
use super::request::HttpMethod;
use super::response::FetchResponse;
use crate::error::Result;

static DEFAULT_CLIENT: OnceLock<FetchClient> = OnceLock::new();

/// The shared client used by the free functions in this module.
///
/// Built with default configuration on first use.
pub fn default_client() -> &'static FetchClient {
    DEFAULT_CLIENT.get_or_init(FetchClient::new)
}

/// Send a GET request with the default client.
pub async fn get(url: impl AsRef<str>, options: Option<FetchOptions>) -> Result<FetchResponse> {
    default_client().get(url, options).await
}

/// Send a DELETE request with the default client.
pub async fn delete(url: impl AsRef<str>, options: Option<FetchOptions>) -> Result<FetchResponse> {
    default_client().delete(url, options).await
}

/// Send a POST request with a JSON body with the default client.
pub async fn post(
    url: impl AsRef<str>,
    json_body: impl Into<String>,
    options: Option<FetchOptions>,
) -> Result<FetchResponse> {
    default_client().post(url, json_body, options).await
}

/// Send a PUT request with a JSON body with the default client.
pub async fn put(
    url: impl AsRef<str>,
    json_body: impl Into<String>,
    options: Option<FetchOptions>,
) -> Result<FetchResponse> {
    default_client().put(url, json_body, options).await
}

/// POST a multipart form with the default client.
pub async fn upload(
    url: impl AsRef<str>,
    form: MultipartForm,
    options: Option<FetchOptions>,
) -> Result<FetchResponse> {
    default_client().upload(url, form, options).await
}

/// GET and decode the body as JSON with the default client.
pub async fn get_json<T: DeserializeOwned>(
    url: impl AsRef<str>,
    options: Option<FetchOptions>,
) -> Result<T> {
    default_client().get_json(url, options).await
}

/// POST a JSON body and decode the response as JSON with the default client.
pub async fn post_json<T: DeserializeOwned>(
    url: impl AsRef<str>,
    json_body: impl Into<String>,
    options: Option<FetchOptions>,
) -> Result<T> {
    default_client().post_json(url, json_body, options).await
}

/// Execute a request with the default client.
pub async fn execute(
    method: HttpMethod,
    url: impl AsRef<str>,
    options: Option<FetchOptions>,
) -> Result<FetchResponse> {
    default_client().execute(method, url, options).await
}

/// Execute a request with the default client and decode the body as JSON.
pub async fn execute_json<T: DeserializeOwned>(
    method: HttpMethod,
    url: impl AsRef<str>,
    options: Option<FetchOptions>,
) -> Result<T> {
    default_client().execute_json(method, url, options).await
}
