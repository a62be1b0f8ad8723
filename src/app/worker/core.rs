//! Chapter download worker
//!
//! `ChapterWorker` downloads every image of one chapter through a bounded
//! `ImagePool`, counts what arrived, and turns the counts into the chapter's
//! single `DownloadResult`. Individual image failures never stop the
//! chapter; they only lower the downloaded count.

use std::path::Path;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::config::WorkerConfig;
use super::pool::ImagePool;
use crate::app::client::{FetchOptions, FetchReport, ImageFetcher};
use crate::app::models::{
    BatchPosition, Chapter, DownloadProgress, DownloadResult, ImageReference, ProgressStage,
};
use crate::constants::messages;

/// Channel progress events are published on
pub type ProgressSender = mpsc::UnboundedSender<DownloadProgress>;

/// Downloads all images of a chapter
#[derive(Debug, Clone)]
pub struct ChapterWorker {
    /// Fetcher whose backoff unit follows the worker configuration
    fetcher: ImageFetcher,
    /// Worker configuration
    config: WorkerConfig,
    /// Optional progress observer
    progress_tx: Option<ProgressSender>,
    /// Batch-wide cancellation
    cancel: CancellationToken,
}

impl ChapterWorker {
    /// Create a worker; the fetcher adopts the configured backoff unit
    pub fn new(fetcher: ImageFetcher, config: WorkerConfig) -> Self {
        let fetcher = fetcher.with_backoff_unit(config.backoff_unit);
        Self {
            fetcher,
            config,
            progress_tx: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Publish progress events on `progress_tx`
    pub fn with_progress(mut self, progress_tx: ProgressSender) -> Self {
        self.progress_tx = Some(progress_tx);
        self
    }

    /// Stop work when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    /// Download every image of `chapter` into `output_dir`
    ///
    /// Images are saved as `NNN.ext` by ordinal with at most
    /// `max_concurrent_images` downloads in flight. The returned result
    /// applies the 90% success threshold.
    #[instrument(
        name = "chapter",
        skip_all,
        fields(title = %chapter.title, images = image_urls.len())
    )]
    pub async fn download_chapter(
        &self,
        chapter: &Chapter,
        image_urls: &[String],
        output_dir: &Path,
        max_concurrent_images: usize,
        position: BatchPosition,
    ) -> DownloadResult {
        let total = image_urls.len();

        let created = tokio::fs::create_dir_all(output_dir).await;
        if let Err(e) = &created {
            warn!(
                "Could not create chapter directory {}: {}",
                output_dir.display(),
                e
            );
        }

        // Empty chapters take precedence over directory errors
        if total == 0 {
            warn!("No images found for {}", chapter.title);
            return DownloadResult::from_counts(chapter.clone(), 0, 0, output_dir, 0);
        }

        if let Err(e) = created {
            return DownloadResult::failed(
                chapter.clone(),
                0,
                total,
                output_dir,
                format!("Could not create output directory: {}", e),
            );
        }

        if self.cancel.is_cancelled() {
            return DownloadResult::failed(
                chapter.clone(),
                0,
                total,
                output_dir,
                messages::CANCELLED,
            );
        }

        self.emit(
            chapter,
            position,
            0,
            total,
            format!("Downloading {} images...", total),
            ProgressStage::Started,
        );

        let reports = self
            .fetch_all(ImageReference::enumerate(image_urls), output_dir, max_concurrent_images)
            .await;

        let downloaded = reports.iter().flatten().filter(|r| r.success).count();
        let retry_count: u32 = reports.iter().flatten().map(FetchReport::retries).sum();

        let result = if self.cancel.is_cancelled() && downloaded < total {
            DownloadResult {
                retry_count,
                ..DownloadResult::failed(
                    chapter.clone(),
                    downloaded,
                    total,
                    output_dir,
                    messages::CANCELLED,
                )
            }
        } else {
            DownloadResult::from_counts(chapter.clone(), downloaded, total, output_dir, retry_count)
        };

        let mark = if result.success { "✓" } else { "✗" };
        self.emit(
            chapter,
            position,
            downloaded,
            total,
            format!("{} {}/{}", mark, downloaded, total),
            ProgressStage::Finished,
        );

        if result.success {
            info!(
                "Chapter {} complete: {}/{} images ({} retries)",
                chapter.title, downloaded, total, retry_count
            );
        } else {
            warn!(
                "Chapter {} incomplete: {}",
                chapter.title,
                result.error.as_deref().unwrap_or("unknown error")
            );
        }

        result
    }

    /// Runs one fetch per reference on a pool of the given size
    async fn fetch_all(
        &self,
        references: Vec<ImageReference>,
        output_dir: &Path,
        pool_size: usize,
    ) -> Vec<Option<FetchReport>> {
        let fetcher = self.fetcher.clone();
        let options = FetchOptions::new(self.config.max_retries, self.config.timeout_per_attempt)
            .with_cancellation(self.cancel.clone());
        let output_dir = output_dir.to_path_buf();

        ImagePool::new(pool_size)
            .run(references, &self.cancel, move |reference| {
                let fetcher = fetcher.clone();
                let options = options.clone();
                let destination = output_dir.join(reference.file_name());
                async move {
                    let report = fetcher
                        .fetch_with(&reference.url, &destination, &options)
                        .await;
                    debug!(
                        "Image {} -> {} ({} attempts)",
                        reference.ordinal,
                        if report.success { "ok" } else { "failed" },
                        report.attempts
                    );
                    report
                }
            })
            .await
    }

    fn emit(
        &self,
        chapter: &Chapter,
        position: BatchPosition,
        image_current: usize,
        image_total: usize,
        status: String,
        stage: ProgressStage,
    ) {
        let Some(progress_tx) = &self.progress_tx else {
            return;
        };

        let event = DownloadProgress {
            chapter_title: chapter.title.clone(),
            chapter_current: position.current,
            chapter_total: position.total,
            image_current,
            image_total,
            status,
            stage,
        };

        if progress_tx.send(event).is_err() {
            debug!("Progress receiver dropped, event discarded");
        }
    }
}
