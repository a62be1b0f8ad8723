//! Batch statistics and session results
//!
//! Statistics are derived from finished `DownloadResult`s only; they never
//! feed back into the results themselves.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::app::models::{ChapterState, DownloadResult};

/// Aggregate counts over a batch of chapter results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchStats {
    /// Chapters with a result
    pub total_chapters: usize,
    /// Chapters meeting the success threshold
    pub succeeded: usize,
    /// Chapters where some but too few images arrived
    pub partially_failed: usize,
    /// Chapters where nothing arrived, nothing was listed, or work was cancelled
    pub failed: usize,
    /// Subset of `failed` abandoned because of cancellation
    pub cancelled: usize,
    /// Images saved across all chapters
    pub images_downloaded: usize,
    /// Images listed across all chapters
    pub images_total: usize,
    /// Retry attempts across all chapters
    pub retries: u64,
}

impl BatchStats {
    /// Build statistics from a result list
    pub fn from_results(results: &[DownloadResult]) -> Self {
        let mut stats = Self::default();
        for result in results {
            stats.record(result);
        }
        stats
    }

    /// Count one finished chapter
    pub fn record(&mut self, result: &DownloadResult) {
        self.total_chapters += 1;
        self.images_downloaded += result.images_downloaded;
        self.images_total += result.total_images;
        self.retries += u64::from(result.retry_count);

        match ChapterState::outcome_of(result) {
            ChapterState::Succeeded => self.succeeded += 1,
            ChapterState::PartiallyFailed => self.partially_failed += 1,
            _ => self.failed += 1,
        }

        if result.is_cancelled() {
            self.cancelled += 1;
        }
    }

    /// Chapters that did not meet the threshold
    pub fn unsuccessful(&self) -> usize {
        self.total_chapters - self.succeeded
    }

    pub fn all_succeeded(&self) -> bool {
        self.total_chapters > 0 && self.succeeded == self.total_chapters
    }

    /// Percentage of chapters that succeeded
    pub fn success_rate(&self) -> f64 {
        if self.total_chapters == 0 {
            return 0.0;
        }
        (self.succeeded as f64 / self.total_chapters as f64) * 100.0
    }
}

/// Final result of a download session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResult {
    /// One result per input chapter, in input order
    pub results: Vec<DownloadResult>,
    pub stats: BatchStats,
    /// When the session started
    pub started_at: DateTime<Utc>,
    /// Time taken for the entire session
    pub total_duration: Duration,
}

impl SessionResult {
    pub fn new(
        results: Vec<DownloadResult>,
        started_at: DateTime<Utc>,
        total_duration: Duration,
    ) -> Self {
        let stats = BatchStats::from_results(&results);
        Self {
            results,
            stats,
            started_at,
            total_duration,
        }
    }

    /// Whether every chapter met the success threshold
    pub fn all_succeeded(&self) -> bool {
        self.stats.all_succeeded()
    }

    /// Results that did not meet the threshold
    pub fn failures(&self) -> impl Iterator<Item = &DownloadResult> {
        self.results.iter().filter(|result| !result.success)
    }

    /// Get a summary of the session result
    pub fn summary(&self) -> String {
        let mut summary = format!(
            "{}/{} chapters successful, {}/{} images in {}",
            self.stats.succeeded,
            self.stats.total_chapters,
            self.stats.images_downloaded,
            self.stats.images_total,
            format_duration(self.total_duration)
        );
        if self.stats.retries > 0 {
            summary.push_str(&format!(" ({} retries)", self.stats.retries));
        }
        if self.stats.cancelled > 0 {
            summary.push_str(&format!(", {} cancelled", self.stats.cancelled));
        }
        summary
    }
}

/// Format a duration as human-readable string
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();

    if total_secs < 60 {
        format!("{}s", total_secs)
    } else if total_secs < 3600 {
        format!("{}m{}s", total_secs / 60, total_secs % 60)
    } else {
        format!("{}h{}m", total_secs / 3600, (total_secs % 3600) / 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::models::Chapter;

    fn result(downloaded: usize, total: usize, retries: u32) -> DownloadResult {
        let chapter = Chapter::new("c", "C", 1, "");
        DownloadResult::from_counts(chapter, downloaded, total, "/tmp/c", retries)
    }

    /// Test outcome bucketing
    ///
    /// Every result lands in exactly one of succeeded, partially failed and
    /// failed; cancellation is counted on top of failed.
    #[test]
    fn test_stats_buckets() {
        let cancelled =
            DownloadResult::failed(Chapter::new("x", "X", 4, ""), 2, 10, "/tmp/x", "Cancelled");
        let results = vec![
            result(10, 10, 1),
            result(5, 10, 4),
            result(0, 0, 0),
            cancelled,
        ];

        let stats = BatchStats::from_results(&results);
        assert_eq!(stats.total_chapters, 4);
        assert_eq!(stats.succeeded, 1);
        assert_eq!(stats.partially_failed, 1);
        assert_eq!(stats.failed, 2);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.images_downloaded, 17);
        assert_eq!(stats.images_total, 30);
        assert_eq!(stats.retries, 5);
        assert_eq!(stats.unsuccessful(), 3);
        assert!(!stats.all_succeeded());
        assert_eq!(stats.success_rate(), 25.0);
    }

    #[test]
    fn test_empty_batch_is_not_a_success() {
        let stats = BatchStats::from_results(&[]);
        assert!(!stats.all_succeeded());
        assert_eq!(stats.success_rate(), 0.0);
    }

    #[test]
    fn test_duration_formatting() {
        assert_eq!(format_duration(Duration::from_secs(30)), "30s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1m30s");
        assert_eq!(format_duration(Duration::from_secs(3665)), "1h1m");
    }

    #[test]
    fn test_session_summary() {
        let session = SessionResult::new(
            vec![result(10, 10, 0), result(9, 10, 2)],
            Utc::now(),
            Duration::from_secs(75),
        );

        assert!(session.all_succeeded());
        assert_eq!(session.failures().count(), 0);
        assert_eq!(
            session.summary(),
            "2/2 chapters successful, 19/20 images in 1m15s (2 retries)"
        );
    }
}
