//! Single-request HTTP fetch for Horizon applications.
//!
//! Each call issues one independent request, reports upload and download
//! progress while it is in flight, and returns a uniform [`FetchResponse`].
//!
//! # Making requests
//!
//! ```ignore
//! use horizon_fetch::{FetchClient, FetchOptions};
//!
//! let client = FetchClient::new();
//!
//! // GET, failing on a non-2xx status
//! let response = client.get("https://api.example.com/todos/1", None).await?;
//! println!("{}", response.text());
//!
//! // POST a pre-encoded JSON body
//! client.post("https://api.example.com/todos", r#"{"title":"x"}"#, None).await?;
//!
//! // Typed decode
//! let todo: Todo = client.get_json("https://api.example.com/todos/1", None).await?;
//! ```
//!
//! The same calls are available as free functions bound to a shared default
//! client, e.g. `horizon_fetch::get(url, None)`.
//!
//! # Error handling
//!
//! By default a failed transfer (connection error or non-2xx status) is
//! returned as [`FetchError::Transport`]. With `throw_on_error(false)` it is
//! reported on the response instead:
//!
//! ```ignore
//! let options = FetchOptions::new().throw_on_error(false);
//! let response = client.get("https://api.example.com/missing", Some(options)).await?;
//! if response.is_error() {
//!     eprintln!("{}: {}", response.status_code(), response.error_message().unwrap_or(""));
//! }
//! ```
//!
//! JSON decode failures in the typed helpers are always returned as
//! [`FetchError::Decode`].
//!
//! # Progress
//!
//! ```ignore
//! let options = FetchOptions::new()
//!     .on_download_progress(|p| progress_bar.set_value(p))
//!     .on_upload_progress(|p| println!("uploaded {:.0}%", p * 100.0));
//! let response = client.upload("https://api.example.com/files", form, Some(options)).await?;
//! ```
//!
//! Callbacks always see `0.0` first and `1.0` last.
//!
//! # Handle ownership
//!
//! A response keeps the [`TransferHandle`] of its transfer. Body text and
//! bytes are copies, so releasing the handle early with
//! [`FetchResponse::release_handle`] never invalidates them; dropping the
//! response releases it otherwise.

mod error;
pub mod http;

pub use error::{FetchError, Result};

// Re-export commonly used types at the crate root
pub use self::http::{
    CancelToken, EncodedForm, FetchClient, FetchClientBuilder, FetchClientConfig, FetchOptions,
    FetchResponse, HttpMethod, MultipartForm, RequestBody, TransferHandle, TransferOutcome,
    TransferProgress, Transport, TransportRequest, default_client, delete, execute, execute_json,
    get, get_json, post, post_json, put, upload,
};
