//! HTTP fetch for Horizon applications.
//!
//! This module provides a single-request HTTP facade with live upload and
//! download progress and a choice between error results and error-flagged
//! responses.
//!
//! # Example
//!
//! ```ignore
//! use horizon_fetch::http::{FetchClient, FetchOptions};
//!
//! let client = FetchClient::new();
//!
//! let response = client
//!     .get(
//!         "https://example.com/image.png",
//!         Some(FetchOptions::new().on_download_progress(|p| println!("{:.0}%", p * 100.0))),
//!     )
//!     .await?;
//! println!("{} bytes", response.raw_bytes().len());
//! ```

mod client;
mod multipart;
mod options;
mod request;
mod response;
mod shortcuts;
mod transport;

pub use client::{FetchClient, FetchClientBuilder, FetchClientConfig};
pub use multipart::{EncodedForm, MultipartForm};
pub use options::{CancelToken, FetchOptions, ProgressCallback, RequestBody};
pub use request::{HttpMethod, TransportRequest};
pub use response::{FetchResponse, TransferProgress};
pub use shortcuts::{
    default_client, delete, execute, execute_json, get, get_json, post, post_json, put, upload,
};
pub use transport::{ReqwestTransport, TransferHandle, TransferOutcome, TransferReporter, Transport};
