//! Data models for chapters, image references, results and progress
//!
//! These are plain value types: they are built once through their
//! constructors and then only read. `DownloadResult` in particular is the
//! terminal artifact of chapter processing and is never mutated after it is
//! created.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::constants::{files, limits, messages};

/// An ordered unit of content with its own image set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chapter {
    /// Stable identifier
    pub id: String,
    /// Display title, also used for the output directory name
    pub title: String,
    /// 1-based position in the chapter list
    pub index: usize,
    /// Reference the resolver uses to find the chapter's images
    pub source: String,
}

impl Chapter {
    /// Create a new chapter
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        index: usize,
        source: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            index,
            source: source.into(),
        }
    }
}

/// One image's URL plus its 1-based ordinal within the chapter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub url: String,
    pub ordinal: usize,
}

impl ImageReference {
    /// Number an ordered URL list with contiguous ordinals starting at 1
    pub fn enumerate(urls: &[String]) -> Vec<ImageReference> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| ImageReference {
                url: url.clone(),
                ordinal: i + 1,
            })
            .collect()
    }

    /// Output file name: zero-padded ordinal plus the inferred extension
    pub fn file_name(&self) -> String {
        image_file_name(self.ordinal, &self.url)
    }
}

/// Result of downloading one chapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadResult {
    pub chapter: Chapter,
    pub success: bool,
    pub images_downloaded: usize,
    pub total_images: usize,
    pub output_path: PathBuf,
    pub error: Option<String>,
    pub retry_count: u32,
}

impl DownloadResult {
    /// Build a result from final counts, applying the success threshold
    pub fn from_counts(
        chapter: Chapter,
        images_downloaded: usize,
        total_images: usize,
        output_path: impl Into<PathBuf>,
        retry_count: u32,
    ) -> Self {
        let images_downloaded = images_downloaded.min(total_images);
        let success = meets_success_threshold(images_downloaded, total_images);
        let error = if success {
            None
        } else if total_images == 0 {
            Some(messages::NO_IMAGES_FOUND.to_string())
        } else {
            Some(format!("Only {}/{} images", images_downloaded, total_images))
        };

        Self {
            chapter,
            success,
            images_downloaded,
            total_images,
            output_path: output_path.into(),
            error,
            retry_count,
        }
    }

    /// Whether the chapter was abandoned because the batch was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.error.as_deref() == Some(messages::CANCELLED)
    }

    /// Build a failed result with an explicit error description
    pub fn failed(
        chapter: Chapter,
        images_downloaded: usize,
        total_images: usize,
        output_path: impl Into<PathBuf>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            chapter,
            success: false,
            images_downloaded: images_downloaded.min(total_images),
            total_images,
            output_path: output_path.into(),
            error: Some(error.into()),
            retry_count: 0,
        }
    }
}

/// Whether a chapter with these counts counts as successfully downloaded
///
/// True iff `total > 0` and at least 90% of the images arrived. Integer
/// arithmetic keeps the 9-of-10 boundary exact.
pub fn meets_success_threshold(downloaded: usize, total: usize) -> bool {
    total > 0
        && downloaded * limits::SUCCESS_THRESHOLD_DENOMINATOR
            >= total * limits::SUCCESS_THRESHOLD_NUMERATOR
}

/// Which end of a chapter download a progress event marks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressStage {
    Started,
    Finished,
}

/// Progress event emitted to an observer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub chapter_title: String,
    pub chapter_current: usize,
    pub chapter_total: usize,
    pub image_current: usize,
    pub image_total: usize,
    pub status: String,
    pub stage: ProgressStage,
}

/// Position of a chapter within its batch, for progress reporting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPosition {
    /// 1-based position
    pub current: usize,
    pub total: usize,
}

impl BatchPosition {
    pub fn new(current: usize, total: usize) -> Self {
        Self { current, total }
    }

    /// Position for a chapter downloaded on its own
    pub fn single() -> Self {
        Self::new(1, 1)
    }
}

/// Lifecycle of a chapter inside a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChapterState {
    Pending,
    UrlsResolved,
    Downloading,
    Succeeded,
    PartiallyFailed,
    Failed,
    Reported,
}

impl ChapterState {
    /// Terminal download state for a finished result
    pub fn outcome_of(result: &DownloadResult) -> ChapterState {
        if result.success {
            ChapterState::Succeeded
        } else if result.images_downloaded > 0 && !result.is_cancelled() {
            ChapterState::PartiallyFailed
        } else {
            ChapterState::Failed
        }
    }
}

impl fmt::Display for ChapterState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChapterState::Pending => "pending",
            ChapterState::UrlsResolved => "urls-resolved",
            ChapterState::Downloading => "downloading",
            ChapterState::Succeeded => "succeeded",
            ChapterState::PartiallyFailed => "partially-failed",
            ChapterState::Failed => "failed",
            ChapterState::Reported => "reported",
        };
        f.write_str(name)
    }
}

/// Infer an image extension from a URL path
///
/// Returns the first known extension contained in the lower-cased path, or
/// `.jpg` when none match. Query strings and fragments are ignored.
pub fn image_extension(url: &str) -> &'static str {
    let trimmed = url.trim();
    let path = match Url::parse(trimmed) {
        Ok(parsed) => parsed.path().to_lowercase(),
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .to_lowercase(),
    };

    files::IMAGE_EXTENSIONS
        .iter()
        .find(|ext| path.contains(*ext))
        .copied()
        .unwrap_or(files::DEFAULT_IMAGE_EXTENSION)
}

/// File name for the image at `ordinal`, e.g. `007.png`
pub fn image_file_name(ordinal: usize, url: &str) -> String {
    format!(
        "{:0width$}{}",
        ordinal,
        image_extension(url),
        width = files::ORDINAL_WIDTH
    )
}

/// Check whether a path names a file with a known image extension
pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let dotted = format!(".{}", ext.to_lowercase());
            files::IMAGE_EXTENSIONS.contains(&dotted.as_str())
        })
        .unwrap_or(false)
}
