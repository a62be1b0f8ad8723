//! Image download with retry, backoff and atomic writes
//!
//! `ImageFetcher` downloads one URL to one file. Each attempt streams the
//! body into a temporary sibling file which is renamed into place only once
//! the body is complete, so an interrupted or failed download never leaves a
//! corrupt image behind. Failures are retried with a fixed `2^k + 1` unit
//! backoff and are reported to callers as values, never as errors.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::ScanClient;
use crate::constants::{files, limits};
use crate::errors::{FetchError, FetchResult};

/// Callback receiving `(bytes_so_far, total_bytes)` while a body streams in
pub type ByteProgressFn = Arc<dyn Fn(u64, u64) + Send + Sync>;

/// Per-call settings for a fetch
#[derive(Clone)]
pub struct FetchOptions {
    /// Total attempts; values below 1 are treated as 1
    pub max_retries: u32,
    /// Time budget for one attempt (connect, headers and body)
    pub timeout_per_attempt: Duration,
    /// Optional byte-level progress callback, called only when the size is known
    pub on_bytes: Option<ByteProgressFn>,
    /// Aborts the fetch, including any backoff sleep
    pub cancel: CancellationToken,
}

impl FetchOptions {
    pub fn new(max_retries: u32, timeout_per_attempt: Duration) -> Self {
        Self {
            max_retries,
            timeout_per_attempt,
            on_bytes: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Attach a byte progress callback
    pub fn with_progress(mut self, on_bytes: ByteProgressFn) -> Self {
        self.on_bytes = Some(on_bytes);
        self
    }

    /// Use the given cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self::new(limits::MAX_RETRIES, limits::ATTEMPT_TIMEOUT)
    }
}

impl fmt::Debug for FetchOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchOptions")
            .field("max_retries", &self.max_retries)
            .field("timeout_per_attempt", &self.timeout_per_attempt)
            .field("on_bytes", &self.on_bytes.is_some())
            .field("cancelled", &self.cancel.is_cancelled())
            .finish()
    }
}

/// What happened during one fetch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FetchReport {
    /// The destination file now holds the complete image
    pub success: bool,
    /// Attempts started
    pub attempts: u32,
    /// Total backoff slept between attempts
    pub backoff: Duration,
    /// The fetch was abandoned because of cancellation
    pub cancelled: bool,
}

impl FetchReport {
    /// Attempts beyond the first
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Delay slept after failed attempt `failed_attempt` (0-indexed)
///
/// Exactly `(2^k + 1)` units: 2, 3, 5, 9, ...
pub fn backoff_delay(failed_attempt: u32, unit: Duration) -> Duration {
    let units = 2_u32.saturating_pow(failed_attempt).saturating_add(1);
    unit.saturating_mul(units)
}

/// Temporary sibling path used while a download is in flight
pub fn temp_path_for(destination: &Path) -> PathBuf {
    let mut name = destination.file_name().unwrap_or_default().to_os_string();
    name.push(files::TEMP_FILE_SUFFIX);
    destination.with_file_name(name)
}

/// Downloads single images with retry and backoff
#[derive(Debug, Clone)]
pub struct ImageFetcher {
    client: Arc<ScanClient>,
    backoff_unit: Duration,
}

impl ImageFetcher {
    /// Create a fetcher using one-second backoff units
    pub fn new(client: Arc<ScanClient>) -> Self {
        Self {
            client,
            backoff_unit: limits::BACKOFF_UNIT,
        }
    }

    /// Override the backoff time unit
    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn backoff_unit(&self) -> Duration {
        self.backoff_unit
    }

    /// Download `url` to `destination`, returning whether it succeeded
    pub async fn fetch(
        &self,
        url: &str,
        destination: &Path,
        max_retries: u32,
        timeout_per_attempt: Duration,
    ) -> bool {
        let options = FetchOptions::new(max_retries, timeout_per_attempt);
        self.fetch_with(url, destination, &options).await.success
    }

    /// Download `url` to `destination` and report how it went
    ///
    /// Parent directories are created as needed. An unparsable URL fails
    /// immediately without retries.
    pub async fn fetch_with(
        &self,
        url: &str,
        destination: &Path,
        options: &FetchOptions,
    ) -> FetchReport {
        let mut report = FetchReport::default();

        let url_text = url.trim();
        let parsed = match Url::parse(url_text) {
            Ok(parsed) => parsed,
            Err(e) => {
                let error = FetchError::InvalidUrl {
                    url: url_text.to_string(),
                    error: e.to_string(),
                };
                warn!("Skipping image: {}", error);
                return report;
            }
        };

        if let Some(parent) = destination.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Could not create directory {}: {}", parent.display(), e);
                return report;
            }
        }

        let temp_path = temp_path_for(destination);
        let attempts = options.max_retries.max(1);

        for attempt in 0..attempts {
            report.attempts = attempt + 1;

            match self
                .run_attempt(&parsed, &temp_path, destination, options)
                .await
            {
                Ok(bytes) => {
                    debug!(
                        "Downloaded {} ({} bytes) to {}",
                        parsed,
                        bytes,
                        destination.display()
                    );
                    report.success = true;
                    return report;
                }
                Err(FetchError::Cancelled) => {
                    discard_temp_file(&temp_path).await;
                    report.cancelled = true;
                    return report;
                }
                Err(e) => {
                    discard_temp_file(&temp_path).await;

                    if attempt + 1 >= attempts {
                        warn!(
                            "Giving up on {} after {} attempts: {}",
                            parsed, attempts, e
                        );
                        break;
                    }

                    let delay = backoff_delay(attempt, self.backoff_unit);
                    warn!(
                        "Download failed (attempt {}/{}): {}. Retrying in {}ms",
                        attempt + 1,
                        attempts,
                        e,
                        delay.as_millis()
                    );

                    tokio::select! {
                        biased;
                        _ = options.cancel.cancelled() => {
                            report.cancelled = true;
                            return report;
                        }
                        _ = tokio::time::sleep(delay) => {
                            report.backoff += delay;
                        }
                    }
                }
            }
        }

        report
    }

    /// One bounded, cancellable attempt ending in an atomic rename
    async fn run_attempt(
        &self,
        url: &Url,
        temp_path: &Path,
        destination: &Path,
        options: &FetchOptions,
    ) -> FetchResult<u64> {
        let seconds = options.timeout_per_attempt.as_secs();
        let attempt = tokio::time::timeout(
            options.timeout_per_attempt,
            self.stream_to_file(url, temp_path, options.on_bytes.as_ref()),
        );

        let written = tokio::select! {
            biased;
            _ = options.cancel.cancelled() => return Err(FetchError::Cancelled),
            outcome = attempt => outcome.map_err(|_| FetchError::Timeout { seconds })??,
        };

        tokio::fs::rename(temp_path, destination)
            .await
            .map_err(|_| FetchError::AtomicOperationFailed {
                temp_path: temp_path.to_path_buf(),
                final_path: destination.to_path_buf(),
            })?;

        Ok(written)
    }

    /// Streams the response body into `temp_path`
    async fn stream_to_file(
        &self,
        url: &Url,
        temp_path: &Path,
        on_bytes: Option<&ByteProgressFn>,
    ) -> FetchResult<u64> {
        let response = self.client.get_response(url).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::ServerError {
                status: status.as_u16(),
            });
        }

        let total = response.content_length().filter(|total| *total > 0);
        let mut file = File::create(temp_path).await?;
        let mut stream = response.bytes_stream();
        let mut written = 0_u64;

        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;

            if let (Some(callback), Some(total)) = (on_bytes, total) {
                callback(written, total);
            }
        }

        file.flush().await?;
        Ok(written)
    }
}

/// Best-effort removal of a leftover temp file
async fn discard_temp_file(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!("Could not remove temp file {}: {}", path.display(), e);
        }
    }
}
