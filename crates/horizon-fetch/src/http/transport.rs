//! The transport layer: starting transfers and observing their progress.
//!
//! A [`Transport`] turns a [`TransportRequest`] into a running transfer and
//! hands back a [`TransferHandle`]. The handle is the live resource: it
//! reports upload/download progress while the transfer runs, holds the
//! outcome once it finishes, and aborts the transfer when released.

use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::{Bytes, BytesMut};
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;

use super::request::TransportRequest;
use super::response::TransferProgress;

/// Upload bodies are handed to the connection in chunks of this size.
const UPLOAD_CHUNK_SIZE: usize = 64 * 1024;

const UNKNOWN_TOTAL: u64 = u64::MAX;

/// Something that can start HTTP transfers.
pub trait Transport: Send + Sync {
    /// Start sending `request`.
    ///
    /// Must be called from within a tokio runtime. The returned handle
    /// finishes exactly once, on success or failure.
    fn start(&self, request: TransportRequest) -> TransferHandle;
}

/// The final state of a transfer.
#[derive(Clone, Debug, Default)]
pub struct TransferOutcome {
    /// HTTP status code, `0` if the server was never reached.
    pub status: u16,
    /// Response headers.
    pub headers: http::HeaderMap,
    /// Response body received so far.
    pub body: Bytes,
    /// Failure description; `None` for a clean success.
    pub error: Option<String>,
}

impl TransferOutcome {
    /// An outcome for a transfer that never produced a response.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            error: Some(message.into()),
            ..Self::default()
        }
    }

    /// Check if the transfer was a clean success.
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
struct ProgressCounter {
    transferred: AtomicU64,
    total: AtomicU64,
}

impl ProgressCounter {
    fn new() -> Self {
        Self {
            transferred: AtomicU64::new(0),
            total: AtomicU64::new(UNKNOWN_TOTAL),
        }
    }

    fn snapshot(&self) -> TransferProgress {
        let total = self.total.load(Ordering::Acquire);
        TransferProgress {
            bytes_transferred: self.transferred.load(Ordering::Acquire),
            total_bytes: (total != UNKNOWN_TOTAL).then_some(total),
        }
    }
}

#[derive(Debug)]
struct TransferState {
    upload: ProgressCounter,
    download: ProgressCounter,
    finished: AtomicBool,
    done: Notify,
    outcome: Mutex<Option<TransferOutcome>>,
}

impl TransferState {
    fn new() -> Self {
        Self {
            upload: ProgressCounter::new(),
            download: ProgressCounter::new(),
            finished: AtomicBool::new(false),
            done: Notify::new(),
            outcome: Mutex::new(None),
        }
    }

    fn finish(&self, outcome: TransferOutcome) {
        if self.finished.load(Ordering::Acquire) {
            return;
        }
        *self.outcome.lock() = Some(outcome);
        self.finished.store(true, Ordering::Release);
        self.done.notify_waiters();
    }
}

/// Write side of a transfer, used by [`Transport`] implementations to
/// publish progress.
#[derive(Clone, Debug)]
pub struct TransferReporter {
    state: Arc<TransferState>,
}

impl TransferReporter {
    /// Set the number of bytes that will be uploaded.
    pub fn set_upload_total(&self, total: u64) {
        self.state.upload.total.store(total, Ordering::Release);
    }

    /// Record `bytes` more uploaded.
    pub fn add_uploaded(&self, bytes: u64) {
        self.state.upload.transferred.fetch_add(bytes, Ordering::AcqRel);
    }

    /// Set the number of bytes that will be downloaded, if known.
    pub fn set_download_total(&self, total: Option<u64>) {
        self.state
            .download
            .total
            .store(total.unwrap_or(UNKNOWN_TOTAL), Ordering::Release);
    }

    /// Record `bytes` more downloaded.
    pub fn add_downloaded(&self, bytes: u64) {
        self.state.download.transferred.fetch_add(bytes, Ordering::AcqRel);
    }
}

/// Marks the transfer finished even if its task panics or is aborted.
struct FinishGuard {
    state: Arc<TransferState>,
}

impl FinishGuard {
    fn finish(self, outcome: TransferOutcome) {
        self.state.finish(outcome);
    }
}

impl Drop for FinishGuard {
    fn drop(&mut self) {
        self.state.finish(TransferOutcome::failed("transfer aborted"));
    }
}

/// Handle to an in-flight or finished transfer.
///
/// Dropping the handle releases it: a running transfer is aborted and the
/// buffered body is freed. [`TransferHandle::release`] does the same
/// explicitly.
pub struct TransferHandle {
    state: Arc<TransferState>,
    task: Option<JoinHandle<()>>,
}

impl TransferHandle {
    /// Spawn a transfer on the current tokio runtime.
    ///
    /// `transfer` receives a [`TransferReporter`] for publishing progress and
    /// resolves to the outcome.
    pub fn spawn<F, Fut>(transfer: F) -> Self
    where
        F: FnOnce(TransferReporter) -> Fut,
        Fut: Future<Output = TransferOutcome> + Send + 'static,
    {
        let state = Arc::new(TransferState::new());
        let future = transfer(TransferReporter {
            state: state.clone(),
        });
        let guard = FinishGuard {
            state: state.clone(),
        };
        let task = tokio::spawn(async move {
            let outcome = future.await;
            guard.finish(outcome);
        });
        Self {
            state,
            task: Some(task),
        }
    }

    /// A handle for a transfer that has already finished.
    pub fn ready(outcome: TransferOutcome) -> Self {
        let state = Arc::new(TransferState::new());
        state.finish(outcome);
        Self { state, task: None }
    }

    /// Check if the transfer has finished.
    pub fn is_finished(&self) -> bool {
        self.state.finished.load(Ordering::Acquire)
    }

    /// Wait until the transfer finishes.
    pub async fn finished(&self) {
        loop {
            let notified = self.state.done.notified();
            if self.is_finished() {
                return;
            }
            notified.await;
        }
    }

    /// Current upload progress.
    pub fn upload_progress(&self) -> TransferProgress {
        self.state.upload.snapshot()
    }

    /// Current download progress.
    pub fn download_progress(&self) -> TransferProgress {
        self.state.download.snapshot()
    }

    /// The outcome, once finished and until released.
    pub fn outcome(&self) -> Option<TransferOutcome> {
        self.state.outcome.lock().clone()
    }

    /// Release the transfer now.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for TransferHandle {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state.outcome.lock().take();
    }
}

impl std::fmt::Debug for TransferHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransferHandle")
            .field("finished", &self.is_finished())
            .field("upload", &self.upload_progress())
            .field("download", &self.download_progress())
            .finish()
    }
}

/// The default transport, backed by a `reqwest::Client`.
#[derive(Clone, Debug)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    /// Create a transport sending through `client`.
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Transport for ReqwestTransport {
    fn start(&self, request: TransportRequest) -> TransferHandle {
        let client = self.client.clone();
        TransferHandle::spawn(move |reporter| run_transfer(client, request, reporter))
    }
}

async fn run_transfer(
    client: reqwest::Client,
    request: TransportRequest,
    reporter: TransferReporter,
) -> TransferOutcome {
    let url = request.url.to_string();
    let mut builder = client
        .request(request.method.to_reqwest(), request.url)
        .headers(request.headers.clone());

    match request.body {
        Some(body) => {
            reporter.set_upload_total(body.len() as u64);
            if !request.headers.contains_key(http::header::CONTENT_LENGTH) {
                builder = builder.header(http::header::CONTENT_LENGTH, body.len());
            }
            builder = builder.body(reqwest::Body::wrap_stream(upload_stream(
                body,
                reporter.clone(),
            )));
        }
        None => reporter.set_upload_total(0),
    }

    let mut response = match builder.send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(
                target: "horizon_fetch::http",
                "Request to {} failed: {}",
                url,
                err
            );
            return TransferOutcome::failed(err.to_string());
        }
    };

    let status = response.status();
    let headers = response.headers().clone();
    reporter.set_download_total(response.content_length());

    let mut body = BytesMut::new();
    loop {
        match response.chunk().await {
            Ok(Some(chunk)) => {
                reporter.add_downloaded(chunk.len() as u64);
                body.extend_from_slice(&chunk);
            }
            Ok(None) => break,
            Err(err) => {
                tracing::warn!(
                    target: "horizon_fetch::http",
                    "Reading body from {} failed: {}",
                    url,
                    err
                );
                return TransferOutcome {
                    status: status.as_u16(),
                    headers,
                    body: body.freeze(),
                    error: Some(err.to_string()),
                };
            }
        }
    }

    let error = (!status.is_success()).then(|| format!("HTTP {status}"));
    tracing::debug!(
        target: "horizon_fetch::http",
        "{} -> {} ({} bytes)",
        url,
        status,
        body.len()
    );

    TransferOutcome {
        status: status.as_u16(),
        headers,
        body: body.freeze(),
        error,
    }
}

fn upload_stream(
    body: Bytes,
    reporter: TransferReporter,
) -> impl Stream<Item = std::io::Result<Bytes>> + Send + Sync + 'static {
    let chunks: Vec<Bytes> = (0..body.len())
        .step_by(UPLOAD_CHUNK_SIZE)
        .map(|start| body.slice(start..(start + UPLOAD_CHUNK_SIZE).min(body.len())))
        .collect();

    futures_util::stream::iter(chunks).map(move |chunk| {
        reporter.add_uploaded(chunk.len() as u64);
        Ok::<_, std::io::Error>(chunk)
    })
}
