//! HTTP transfer of release archives.
//!
//! A [`Transfer`] runs two tasks side by side: the streaming download itself
//! and a ticker that samples the byte counters once per interval. The caller
//! drains [`Transfer::next_progress`] until a snapshot with `finished` set
//! arrives, then joins the download with [`Transfer::finish`].
//!
//! ## Features
//!
//! - Streaming downloads, never buffering the whole archive
//! - Deterministic destination under the system temp directory
//! - One terminal snapshot after the transfer ends, successful or not
//!
//! There is no resume and no retry. A failed transfer leaves its temp file
//! behind for the caller to remove.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use futures_util::StreamExt;
use tokio::io::AsyncWriteExt;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::errors::TransferError;

/// Interval between progress snapshots.
pub const PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 600;

/// Marker stored in the total counter while `Content-Length` is unknown.
const UNKNOWN_TOTAL: u64 = u64::MAX;

/// Point-in-time view of a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    /// Bytes written to the temp file so far.
    pub transferred: u64,
    /// Total size from `Content-Length`, if the server sent one.
    pub total: Option<u64>,
    /// Set on the last snapshot of a transfer.
    pub finished: bool,
}

impl ProgressSnapshot {
    /// Percentage complete, `0.0` when the total is unknown.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percent(&self) -> f64 {
        match self.total {
            Some(total) if total > 0 => self.transferred as f64 / total as f64 * 100.0,
            _ => 0.0,
        }
    }
}

/// Byte counters shared between the download and the ticker.
#[derive(Debug)]
struct Counters {
    transferred: AtomicU64,
    total: AtomicU64,
}

impl Counters {
    fn new() -> Self {
        Self {
            transferred: AtomicU64::new(0),
            total: AtomicU64::new(UNKNOWN_TOTAL),
        }
    }

    fn snapshot(&self, finished: bool) -> ProgressSnapshot {
        let total = self.total.load(Ordering::Acquire);
        ProgressSnapshot {
            transferred: self.transferred.load(Ordering::Acquire),
            total: (total != UNKNOWN_TOTAL).then_some(total),
            finished,
        }
    }
}

/// Returns the temp file path used for `url`.
///
/// The path is the system temp directory joined with the URL's last path
/// segment, so repeated runs for the same asset land on the same file.
#[must_use]
pub fn temp_path_for(url: &str) -> PathBuf {
    let filename = url
        .split(['?', '#'])
        .next()
        .unwrap_or(url)
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("go-install-download");
    std::env::temp_dir().join(filename)
}

/// An in-flight download plus its progress ticker.
pub struct Transfer {
    progress: mpsc::Receiver<ProgressSnapshot>,
    download: JoinHandle<Result<PathBuf, TransferError>>,
    ticker: JoinHandle<()>,
}

impl Transfer {
    /// Starts downloading `url` with snapshots every [`PROGRESS_INTERVAL`].
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(client: reqwest::Client, url: &str) -> Self {
        Self::start_with_interval(client, url, PROGRESS_INTERVAL)
    }

    /// Starts downloading `url` with a custom snapshot interval.
    #[must_use]
    pub fn start_with_interval(client: reqwest::Client, url: &str, interval: Duration) -> Self {
        let dest = temp_path_for(url);
        let counters = Arc::new(Counters::new());
        let (done_tx, done_rx) = oneshot::channel();
        let (progress_tx, progress_rx) = mpsc::channel(16);

        tracing::info!("Downloading {url} to {}", dest.display());

        let download = tokio::spawn(download_to(
            client,
            url.to_string(),
            dest,
            Arc::clone(&counters),
            done_tx,
        ));
        let ticker = tokio::spawn(report_progress(counters, interval, progress_tx, done_rx));

        Self {
            progress: progress_rx,
            download,
            ticker,
        }
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the terminal snapshot has been consumed.
    pub async fn next_progress(&mut self) -> Option<ProgressSnapshot> {
        self.progress.recv().await
    }

    /// Waits for both tasks and returns the temp file path.
    ///
    /// # Errors
    ///
    /// Returns the download's [`TransferError`], or [`TransferError::Task`]
    /// if the download task panicked.
    pub async fn finish(self) -> Result<PathBuf, TransferError> {
        let Self {
            progress,
            download,
            ticker,
        } = self;
        drop(progress);

        let result = download.await.map_err(|e| TransferError::Task {
            message: e.to_string(),
        })?;
        let _ = ticker.await;
        result
    }
}

/// Downloads `url` to the temp path, reporting snapshots to `on_progress`.
///
/// # Errors
///
/// Returns an error on connection failure, a non-2xx status, a broken body
/// stream, a short body, or a failed write.
pub async fn fetch(
    url: &str,
    mut on_progress: impl FnMut(&ProgressSnapshot),
) -> Result<PathBuf, TransferError> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
        .build()
        .map_err(|source| TransferError::Request {
            url: url.to_string(),
            source,
        })?;

    let mut transfer = Transfer::start(client, url);
    while let Some(snapshot) = transfer.next_progress().await {
        on_progress(&snapshot);
        if snapshot.finished {
            break;
        }
    }
    transfer.finish().await
}

/// Streams the response body into `dest`.
///
/// `_done` is dropped when this returns, which tells the ticker to emit the
/// terminal snapshot.
async fn download_to(
    client: reqwest::Client,
    url: String,
    dest: PathBuf,
    counters: Arc<Counters>,
    _done: oneshot::Sender<()>,
) -> Result<PathBuf, TransferError> {
    if tokio::fs::try_exists(&dest).await.unwrap_or(false) {
        tracing::warn!("{} already exists and will be overwritten", dest.display());
    }

    let response = client
        .get(&url)
        .send()
        .await
        .map_err(|source| TransferError::Request {
            url: url.clone(),
            source,
        })?;

    if !response.status().is_success() {
        return Err(TransferError::Status {
            url,
            status: response.status().as_u16(),
        });
    }

    let expected = response.content_length();
    if let Some(total) = expected {
        counters.total.store(total, Ordering::Release);
    }

    let mut file = tokio::fs::File::create(&dest)
        .await
        .map_err(|e| TransferError::io(format!("failed to create {}", dest.display()), e))?;

    let mut stream = response.bytes_stream();
    let mut received: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|source| TransferError::Body {
            url: url.clone(),
            source,
        })?;
        file.write_all(&chunk)
            .await
            .map_err(|e| TransferError::io(format!("failed to write {}", dest.display()), e))?;
        received += chunk.len() as u64;
        counters.transferred.store(received, Ordering::Release);
    }

    file.flush()
        .await
        .map_err(|e| TransferError::io(format!("failed to flush {}", dest.display()), e))?;

    if let Some(expected) = expected
        && received < expected
    {
        return Err(TransferError::Truncated {
            url,
            received,
            expected,
        });
    }

    Ok(dest)
}

/// Emits a snapshot per tick until the download signals completion.
async fn report_progress(
    counters: Arc<Counters>,
    interval: Duration,
    tx: mpsc::Sender<ProgressSnapshot>,
    mut done: oneshot::Receiver<()>,
) {
    let mut ticker = tokio::time::interval(interval);
    // The first tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = &mut done => {
                let _ = tx.send(counters.snapshot(true)).await;
                return;
            }
            _ = ticker.tick() => {
                if tx.send(counters.snapshot(false)).await.is_err() {
                    return;
                }
            }
        }
    }
}

/// Renders a snapshot as `Transferred 1.50 MB/3.00 MB (50.00%)`.
#[must_use]
pub fn format_progress(snapshot: &ProgressSnapshot) -> String {
    match snapshot.total {
        Some(total) => format!(
            "Transferred {}/{} ({:.2}%)",
            format_bytes(snapshot.transferred),
            format_bytes(total),
            snapshot.percent()
        ),
        None => format!("Transferred {}", format_bytes(snapshot.transferred)),
    }
}

/// Formats bytes into a human-readable string (KB, MB, GB).
fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    #[allow(clippy::cast_precision_loss)]
    let bytes_f = bytes as f64;

    if bytes_f >= GB {
        format!("{:.2} GB", bytes_f / GB)
    } else if bytes_f >= MB {
        format!("{:.2} MB", bytes_f / MB)
    } else if bytes_f >= KB {
        format!("{:.2} KB", bytes_f / KB)
    } else {
        format!("{bytes} B")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Serves one canned HTTP response and returns the base URL.
    async fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let _ = socket.write_all(&response).await;
            let _ = socket.shutdown().await;
        });
        format!("http://{addr}")
    }

    fn ok_response(body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    #[test]
    fn temp_path_uses_last_segment() {
        let path = temp_path_for("https://go.dev/dl/go1.22.1.linux-amd64.tar.gz");
        assert_eq!(path, std::env::temp_dir().join("go1.22.1.linux-amd64.tar.gz"));
    }

    #[test]
    fn temp_path_ignores_query_and_trailing_slash() {
        assert_eq!(
            temp_path_for("https://example.com/a/file.tar.gz?token=1"),
            std::env::temp_dir().join("file.tar.gz")
        );
        assert_eq!(
            temp_path_for("https://example.com/a/dir/"),
            std::env::temp_dir().join("dir")
        );
    }

    #[test]
    fn percent_handles_unknown_and_zero_total() {
        let snapshot = ProgressSnapshot {
            transferred: 5,
            total: None,
            finished: false,
        };
        assert!(snapshot.percent().abs() < f64::EPSILON);

        let snapshot = ProgressSnapshot {
            transferred: 50,
            total: Some(200),
            finished: false,
        };
        assert!((snapshot.percent() - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn format_progress_with_total() {
        let snapshot = ProgressSnapshot {
            transferred: 512,
            total: Some(1024),
            finished: true,
        };
        assert_eq!(
            format_progress(&snapshot),
            "Transferred 512 B/1.00 KB (50.00%)"
        );
    }

    #[test]
    fn format_progress_without_total() {
        let snapshot = ProgressSnapshot {
            transferred: 3 * 1024 * 1024,
            total: None,
            finished: false,
        };
        assert_eq!(format_progress(&snapshot), "Transferred 3.00 MB");
    }

    #[tokio::test]
    async fn fetch_writes_body_and_ends_with_terminal_snapshot() {
        let body = b"0123456789abcdef".repeat(64);
        let base = serve_once(ok_response(&body)).await;
        let url = format!("{base}/go-install-fetch-ok-{}.tar.gz", std::process::id());

        let mut snapshots = Vec::new();
        let path = fetch(&url, |s| snapshots.push(*s)).await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), body);
        let last = snapshots.last().copied().unwrap();
        assert!(last.finished);
        assert_eq!(last.transferred, body.len() as u64);
        assert_eq!(last.total, Some(body.len() as u64));
        assert_eq!(snapshots.iter().filter(|s| s.finished).count(), 1);

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn non_success_status_is_transfer_error() {
        let base = serve_once(
            b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_vec(),
        )
        .await;
        let url = format!("{base}/go-install-fetch-404-{}.tar.gz", std::process::id());

        let err = fetch(&url, |_| {}).await.unwrap_err();
        assert!(matches!(err, TransferError::Status { status: 404, .. }));
    }

    #[tokio::test]
    async fn short_body_is_transfer_error() {
        let response =
            b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\nConnection: close\r\n\r\nonly ten b".to_vec();
        let base = serve_once(response).await;
        let url = format!("{base}/go-install-fetch-short-{}.tar.gz", std::process::id());

        let err = fetch(&url, |_| {}).await.unwrap_err();
        assert!(
            matches!(
                err,
                TransferError::Body { .. } | TransferError::Truncated { .. }
            ),
            "unexpected error: {err:?}"
        );

        std::fs::remove_file(temp_path_for(&url)).ok();
    }

    #[tokio::test]
    async fn unreachable_server_is_transfer_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let err = fetch(&format!("http://{addr}/go.tar.gz"), |_| {})
            .await
            .unwrap_err();
        assert!(matches!(err, TransferError::Request { .. }));
    }

    #[tokio::test]
    async fn transfer_emits_snapshots_while_draining() {
        let body = vec![7u8; 4096];
        let base = serve_once(ok_response(&body)).await;
        let url = format!("{base}/go-install-transfer-{}.tar.gz", std::process::id());

        let client = reqwest::Client::new();
        let mut transfer = Transfer::start_with_interval(client, &url, Duration::from_millis(5));
        let mut last = None;
        while let Some(snapshot) = transfer.next_progress().await {
            last = Some(snapshot);
            if snapshot.finished {
                break;
            }
        }
        let path = transfer.finish().await.unwrap();

        assert_eq!(last.map(|s| s.finished), Some(true));
        assert_eq!(std::fs::metadata(&path).unwrap().len(), 4096);
        std::fs::remove_file(&path).ok();
    }
}
