//! Download orchestration
//!
//! The coordinator is the control plane of a batch. It asks the resolver for
//! every chapter's image URLs once, then downloads chapters under a chapter
//! concurrency limit, each through a `ChapterWorker` with its own bounded
//! image pool. Results are assembled by input index, so the returned list
//! always matches the input order whatever order chapters finish in.
//!
//! # Architecture
//!
//! - [`config`] - Concurrency limits and the worker configuration
//! - [`stats`] - Batch statistics and the session summary
//! - [`signals`] - Ctrl-C / SIGTERM handling through a cancellation token
//!
//! # Examples
//!
//! ```rust,no_run
//! use manga_fetcher::app::client::ScanClient;
//! use manga_fetcher::app::coordinator::{Coordinator, CoordinatorConfig};
//! use manga_fetcher::app::models::Chapter;
//! use manga_fetcher::app::paths::OutputLayout;
//! use manga_fetcher::app::resolver::StaticResolver;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(ScanClient::new()?);
//! let layout = OutputLayout::new("downloads", "Blue Harbor");
//! let coordinator = Coordinator::new(CoordinatorConfig::default(), client, layout);
//!
//! let chapters = vec![Chapter::new("c1", "Arrival", 1, "")];
//! let resolver = StaticResolver::new()
//!     .with_chapter("c1", vec!["https://cdn.example.org/c1/1.jpg".to_string()]);
//!
//! let results = coordinator.run(&chapters, &resolver, None).await;
//! println!("{} succeeded", results.iter().filter(|r| r.success).count());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod signals;
pub mod stats;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use futures::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Span};

use crate::app::client::{ImageFetcher, ScanClient};
use crate::app::models::{BatchPosition, Chapter, ChapterState, DownloadResult};
use crate::app::paths::{directory_key, OutputLayout};
use crate::app::resolver::ImageUrlResolver;
use crate::app::worker::{ChapterWorker, ProgressSender};
use crate::constants::messages;

pub use config::CoordinatorConfig;
pub use signals::SignalHandler;
pub use stats::{BatchStats, SessionResult};

/// Callback invoked once per chapter as its result is produced
pub type CompletionCallback<'a> = dyn FnMut(&Chapter, &DownloadResult) + Send + 'a;

/// Main coordinator for orchestrating chapter downloads
pub struct Coordinator {
    config: CoordinatorConfig,
    worker: ChapterWorker,
    layout: OutputLayout,
    cancel: CancellationToken,
    span: Span,
}

impl Coordinator {
    /// Create a coordinator writing under `layout`
    pub fn new(config: CoordinatorConfig, client: Arc<ScanClient>, layout: OutputLayout) -> Self {
        let worker = ChapterWorker::new(ImageFetcher::new(client), config.worker_config.clone());

        Self {
            config,
            worker,
            layout,
            cancel: CancellationToken::new(),
            span: Span::current(),
        }
    }

    /// Publish progress events on `progress_tx`
    pub fn with_progress(mut self, progress_tx: ProgressSender) -> Self {
        self.worker = self.worker.with_progress(progress_tx);
        self
    }

    /// Cancel the batch when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.worker = self.worker.with_cancellation(cancel.clone());
        self.cancel = cancel;
        self
    }

    /// Parent span for all batch, chapter and image work
    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn config(&self) -> &CoordinatorConfig {
        &self.config
    }

    pub fn layout(&self) -> &OutputLayout {
        &self.layout
    }

    /// Download every chapter, returning one result per chapter in input order
    ///
    /// `on_complete` is called with each chapter's result as soon as it is
    /// produced: in input order when chapter concurrency is 1, otherwise in
    /// completion order.
    pub async fn run<R>(
        &self,
        chapters: &[Chapter],
        resolver: &R,
        on_complete: Option<&mut CompletionCallback<'_>>,
    ) -> Vec<DownloadResult>
    where
        R: ImageUrlResolver + ?Sized,
    {
        let span = info_span!(parent: &self.span, "batch", chapters = chapters.len());
        self.run_batch(chapters, resolver, on_complete)
            .instrument(span)
            .await
    }

    /// Like [`Coordinator::run`], also timing the batch and computing its statistics
    pub async fn run_session<R>(
        &self,
        chapters: &[Chapter],
        resolver: &R,
        on_complete: Option<&mut CompletionCallback<'_>>,
    ) -> SessionResult
    where
        R: ImageUrlResolver + ?Sized,
    {
        let started_at = Utc::now();
        let started = Instant::now();

        let results = self.run(chapters, resolver, on_complete).await;
        let session = SessionResult::new(results, started_at, started.elapsed());

        info!("Session finished: {}", session.summary());
        session
    }

    async fn run_batch<R>(
        &self,
        chapters: &[Chapter],
        resolver: &R,
        mut on_complete: Option<&mut CompletionCallback<'_>>,
    ) -> Vec<DownloadResult>
    where
        R: ImageUrlResolver + ?Sized,
    {
        let total = chapters.len();
        if total == 0 {
            info!("No chapters to download");
            return Vec::new();
        }

        info!("Resolving image URLs for {} chapters", total);
        let resolved = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            resolved = resolver.resolve_batch(chapters, self.config.url_resolve_concurrency) => Some(resolved),
        };

        let Some(resolved) = resolved else {
            warn!("Cancelled while resolving image URLs");
            return chapters
                .iter()
                .map(|chapter| self.cancelled_result(chapter, 0))
                .collect();
        };

        let jobs = align_resolved(chapters, resolved);
        let shared = shared_directories(chapters);
        debug!("All chapters in state {}", ChapterState::UrlsResolved);

        let mut slots: Vec<Option<DownloadResult>> = vec![None; total];
        let mut stats = BatchStats::default();

        let mut downloads = stream::iter(jobs.into_iter().zip(shared))
            .map(|((index, chapter, urls), shared_with)| async move {
                let result = match shared_with {
                    Some(first) => self.shared_directory_result(&chapter, urls.len(), &first),
                    None => self.process_chapter(index, total, &chapter, &urls).await,
                };
                (index, chapter, result)
            })
            .buffer_unordered(self.config.max_concurrent_chapters.max(1));

        while let Some((index, chapter, result)) = downloads.next().await {
            stats.record(&result);
            debug!(
                "Chapter {} finished as {}",
                chapter.title,
                ChapterState::outcome_of(&result)
            );

            if let Some(callback) = on_complete.as_deref_mut() {
                callback(&chapter, &result);
            }
            debug!("Chapter {} {}", chapter.title, ChapterState::Reported);

            slots[index] = Some(result);
        }

        info!(
            "Download complete: {}/{} successful",
            stats.succeeded, stats.total_chapters
        );

        slots
            .into_iter()
            .zip(chapters)
            .map(|(slot, chapter)| slot.unwrap_or_else(|| self.cancelled_result(chapter, 0)))
            .collect()
    }

    async fn process_chapter(
        &self,
        index: usize,
        total: usize,
        chapter: &Chapter,
        urls: &[String],
    ) -> DownloadResult {
        if self.cancel.is_cancelled() {
            return self.cancelled_result(chapter, urls.len());
        }

        debug!("Chapter {} {}", chapter.title, ChapterState::Downloading);
        let output_dir = self.layout.chapter_dir(&chapter.title);
        self.worker
            .download_chapter(
                chapter,
                urls,
                &output_dir,
                self.config.worker_config.max_concurrent_images,
                BatchPosition::new(index + 1, total),
            )
            .await
    }

    /// Result for a chapter whose directory an earlier chapter already owns
    fn shared_directory_result(
        &self,
        chapter: &Chapter,
        total_images: usize,
        first: &str,
    ) -> DownloadResult {
        warn!(
            "Skipping {}: its output directory belongs to {}",
            chapter.title, first
        );
        DownloadResult::failed(
            chapter.clone(),
            0,
            total_images,
            self.layout.chapter_dir(&chapter.title),
            format!("Output directory shared with {}", first),
        )
    }

    fn cancelled_result(&self, chapter: &Chapter, total_images: usize) -> DownloadResult {
        DownloadResult::failed(
            chapter.clone(),
            0,
            total_images,
            self.layout.chapter_dir(&chapter.title),
            messages::CANCELLED,
        )
    }
}

/// Pair each input chapter with its resolved URLs by position
///
/// Chapters the resolver did not answer for get an empty list; surplus
/// entries are dropped.
fn align_resolved(
    chapters: &[Chapter],
    resolved: Vec<(Chapter, Vec<String>)>,
) -> Vec<(usize, Chapter, Vec<String>)> {
    if resolved.len() != chapters.len() {
        warn!(
            "Resolver returned {} entries for {} chapters",
            resolved.len(),
            chapters.len()
        );
    }

    let mut resolved = resolved.into_iter();
    chapters
        .iter()
        .enumerate()
        .map(|(index, chapter)| {
            let urls = resolved.next().map(|(_, urls)| urls).unwrap_or_default();
            (index, chapter.clone(), urls)
        })
        .collect()
}

/// For each chapter, the title of an earlier chapter with the same directory
fn shared_directories(chapters: &[Chapter]) -> Vec<Option<String>> {
    let mut owners: HashMap<String, usize> = HashMap::new();
    chapters
        .iter()
        .enumerate()
        .map(|(index, chapter)| {
            let owner = *owners
                .entry(directory_key(&chapter.title))
                .or_insert(index);
            (owner != index).then(|| chapters[owner].title.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tempfile::tempdir;

    use crate::app::resolver::StaticResolver;
    use crate::errors::ResolveResult;

    fn chapters(n: usize) -> Vec<Chapter> {
        (1..=n)
            .map(|i| Chapter::new(format!("c{}", i), format!("Chapter {}", i), i, ""))
            .collect()
    }

    fn coordinator(root: &std::path::Path) -> Coordinator {
        let client = Arc::new(ScanClient::new().unwrap());
        Coordinator::new(
            CoordinatorConfig::default(),
            client,
            OutputLayout::new(root, "Blue Harbor"),
        )
    }

    /// Resolver answering for only the first chapter
    struct ShortResolver;

    #[async_trait]
    impl ImageUrlResolver for ShortResolver {
        async fn resolve_chapter(&self, _chapter: &Chapter) -> ResolveResult<Vec<String>> {
            Ok(Vec::new())
        }

        async fn resolve_batch(
            &self,
            chapters: &[Chapter],
            _concurrency: usize,
        ) -> Vec<(Chapter, Vec<String>)> {
            chapters
                .iter()
                .take(1)
                .map(|chapter| (chapter.clone(), Vec::new()))
                .collect()
        }
    }

    #[tokio::test]
    async fn test_empty_batch() {
        let dir = tempdir().unwrap();
        let results = coordinator(dir.path())
            .run(&[], &StaticResolver::new(), None)
            .await;
        assert!(results.is_empty());
    }

    /// Test a short resolver answer still yields one result per chapter
    #[tokio::test]
    async fn test_missing_resolutions_are_padded() {
        let dir = tempdir().unwrap();
        let input = chapters(3);

        let results = coordinator(dir.path())
            .run(&input, &ShortResolver, None)
            .await;

        assert_eq!(results.len(), 3);
        for (result, chapter) in results.iter().zip(&input) {
            assert_eq!(&result.chapter, chapter);
            assert_eq!(result.error.as_deref(), Some("No images found"));
        }
        assert_eq!(
            results[2].output_path,
            dir.path().join("Blue Harbor").join("Chapter 3")
        );
    }

    #[test]
    fn test_align_drops_surplus_entries() {
        let input = chapters(1);
        let resolved = vec![
            (input[0].clone(), vec!["a".to_string()]),
            (Chapter::new("x", "X", 2, ""), vec!["b".to_string()]),
        ];

        let jobs = align_resolved(&input, resolved);
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].2, vec!["a".to_string()]);
    }

    #[test]
    fn test_shared_directories_flag_later_chapters() {
        let input = vec![
            Chapter::new("a", "Chapter 1: Start", 1, ""),
            Chapter::new("b", "Chapter 2", 2, ""),
            Chapter::new("c", "chapter 1 start", 3, ""),
            Chapter::new("d", "Chapter 2", 4, ""),
        ];

        let shared = shared_directories(&input);
        assert_eq!(
            shared,
            vec![
                None,
                None,
                Some("Chapter 1: Start".to_string()),
                Some("Chapter 2".to_string())
            ]
        );
    }

    #[tokio::test]
    async fn test_cancelled_batch_reports_every_chapter() {
        let dir = tempdir().unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let resolver = StaticResolver::new()
            .with_chapter("c1", vec!["https://cdn.example.invalid/1.jpg".to_string()]);
        let mut seen = 0;
        let mut on_complete = |_: &Chapter, _: &DownloadResult| seen += 1;

        let results = coordinator(dir.path())
            .with_cancellation(cancel)
            .run(&chapters(2), &resolver, Some(&mut on_complete))
            .await;

        assert_eq!(results.len(), 2);
        assert!(results.iter().all(|r| r.is_cancelled() && !r.success));
        // resolution was cancelled, so no chapter reached the callback
        assert_eq!(seen, 0);
    }

    #[tokio::test]
    async fn test_session_wraps_results() {
        let dir = tempdir().unwrap();
        let session = coordinator(dir.path())
            .run_session(&chapters(2), &StaticResolver::new(), None)
            .await;

        assert_eq!(session.results.len(), 2);
        assert_eq!(session.stats.total_chapters, 2);
        assert_eq!(session.stats.failed, 2);
        assert!(!session.all_succeeded());
    }
}
