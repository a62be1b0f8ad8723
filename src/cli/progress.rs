//! Real-time progress display for chapter downloads
//!
//! Consumes the `DownloadProgress` events published by the coordinator and
//! renders them with indicatif: one overall bar counting finished chapters,
//! plus a spinner for every chapter currently downloading. When stderr is
//! not a terminal the same events are printed as plain lines instead, and in
//! quiet mode they are drained silently.
//!
//! # Examples
//!
//! ```rust,no_run
//! use manga_fetcher::cli::{ProgressConfig, ProgressDisplay};
//!
//! # async fn example() {
//! let display = ProgressDisplay::new(ProgressConfig::default());
//! let (progress_tx, handle) = display.start(12);
//!
//! // hand `progress_tx` to the coordinator, run the batch, then drop it
//! drop(progress_tx);
//! let summary = handle.finish().await;
//! println!("{} chapters reported", summary.chapters_finished);
//! # }
//! ```

use std::collections::HashMap;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::app::models::{DownloadProgress, ProgressStage};
use crate::app::worker::ProgressSender;

/// Configuration for progress display
#[derive(Debug, Clone)]
pub struct ProgressConfig {
    /// Enable visual progress bars
    pub enable_progress_bars: bool,
    /// Suppress all progress output
    pub quiet: bool,
    /// Maximum width for chapter titles in the display
    pub max_title_width: usize,
    /// Spinner tick interval
    pub tick_interval: Duration,
}

impl Default for ProgressConfig {
    fn default() -> Self {
        Self {
            enable_progress_bars: true,
            quiet: false,
            max_title_width: 40,
            tick_interval: Duration::from_millis(120),
        }
    }
}

/// How progress events are rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayMode {
    /// indicatif bars on stderr
    Bars,
    /// One stderr line per event
    Text,
    /// Events are consumed and discarded
    Silent,
}

/// Counts of the events the display consumed
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DisplaySummary {
    pub chapters_started: usize,
    pub chapters_finished: usize,
}

/// Main progress display manager
pub struct ProgressDisplay {
    config: ProgressConfig,
    mode: DisplayMode,
}

impl ProgressDisplay {
    /// Create a new progress display, picking the mode from the terminal
    pub fn new(config: ProgressConfig) -> Self {
        let is_terminal = atty::is(atty::Stream::Stderr);
        let mode = if config.quiet {
            DisplayMode::Silent
        } else if config.enable_progress_bars && is_terminal {
            DisplayMode::Bars
        } else {
            DisplayMode::Text
        };

        Self { config, mode }
    }

    pub fn mode(&self) -> DisplayMode {
        self.mode
    }

    /// Start consuming events for a batch of `total_chapters`
    ///
    /// The display task runs until every clone of the returned sender has
    /// been dropped.
    pub fn start(self, total_chapters: usize) -> (ProgressSender, ProgressHandle) {
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        debug!(
            "Progress display started in {:?} mode for {} chapters",
            self.mode, total_chapters
        );

        let task = match self.mode {
            DisplayMode::Bars => tokio::spawn(run_bars(self.config, total_chapters, progress_rx)),
            DisplayMode::Text => tokio::spawn(run_text(self.config, progress_rx)),
            DisplayMode::Silent => tokio::spawn(run_silent(progress_rx)),
        };

        (progress_tx, ProgressHandle { task })
    }
}

/// Handle on a running progress display
pub struct ProgressHandle {
    task: JoinHandle<DisplaySummary>,
}

impl ProgressHandle {
    /// Wait for the display to drain its channel and clean up
    pub async fn finish(self) -> DisplaySummary {
        match self.task.await {
            Ok(summary) => summary,
            Err(e) => {
                debug!("Progress display task ended abnormally: {}", e);
                DisplaySummary::default()
            }
        }
    }
}

async fn run_bars(
    config: ProgressConfig,
    total_chapters: usize,
    mut progress_rx: mpsc::UnboundedReceiver<DownloadProgress>,
) -> DisplaySummary {
    let multi = MultiProgress::new();
    let main_pb = multi.add(ProgressBar::new(total_chapters as u64));
    main_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chapters {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("##-"),
    );
    main_pb.enable_steady_tick(config.tick_interval);

    let chapter_style = ProgressStyle::default_spinner()
        .template("  {spinner:.blue} {prefix} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["◐", "◓", "◑", "◒", "●"]);

    let mut active: HashMap<usize, ProgressBar> = HashMap::new();
    let mut summary = DisplaySummary::default();

    while let Some(event) = progress_rx.recv().await {
        let title = truncate_title(&event.chapter_title, config.max_title_width);
        match event.stage {
            ProgressStage::Started => {
                summary.chapters_started += 1;
                let pb = multi.add(ProgressBar::new_spinner());
                pb.set_style(chapter_style.clone());
                pb.set_prefix(title);
                pb.set_message(event.status);
                pb.enable_steady_tick(config.tick_interval);
                active.insert(event.chapter_current, pb);
            }
            ProgressStage::Finished => {
                summary.chapters_finished += 1;
                if let Some(pb) = active.remove(&event.chapter_current) {
                    pb.finish_and_clear();
                    multi.remove(&pb);
                }
                let _ = multi.println(format!("{} {}", title, event.status));
                main_pb.inc(1);
            }
        }
    }

    for pb in active.into_values() {
        pb.finish_and_clear();
    }
    main_pb.finish_with_message("done");
    summary
}

async fn run_text(
    config: ProgressConfig,
    mut progress_rx: mpsc::UnboundedReceiver<DownloadProgress>,
) -> DisplaySummary {
    let mut summary = DisplaySummary::default();

    while let Some(event) = progress_rx.recv().await {
        match event.stage {
            ProgressStage::Started => summary.chapters_started += 1,
            ProgressStage::Finished => summary.chapters_finished += 1,
        }
        eprintln!("{}", text_line(&event, config.max_title_width));
    }

    summary
}

async fn run_silent(mut progress_rx: mpsc::UnboundedReceiver<DownloadProgress>) -> DisplaySummary {
    let mut summary = DisplaySummary::default();
    while let Some(event) = progress_rx.recv().await {
        match event.stage {
            ProgressStage::Started => summary.chapters_started += 1,
            ProgressStage::Finished => summary.chapters_finished += 1,
        }
    }
    summary
}

/// Plain-text rendering of one event, e.g. `[2/5] Chapter 2: ✓ 10/10`
fn text_line(event: &DownloadProgress, max_title_width: usize) -> String {
    format!(
        "[{}/{}] {}: {}",
        event.chapter_current,
        event.chapter_total,
        truncate_title(&event.chapter_title, max_title_width),
        event.status
    )
}

/// Shorten a title to `max_width` characters, marking the cut with `...`
fn truncate_title(title: &str, max_width: usize) -> String {
    if title.chars().count() <= max_width {
        return title.to_string();
    }
    let keep = max_width.saturating_sub(3);
    let mut shortened: String = title.chars().take(keep).collect();
    shortened.push_str("...");
    shortened
}
