//! Chapter download workers
//!
//! A `ChapterWorker` turns one chapter's ordered image URL list into files
//! named by ordinal, using a fixed-size `ImagePool` so that in-flight
//! downloads stay bounded however many images a chapter holds.
//!
//! # Module Organization
//!
//! - [`config`] - Worker configuration with validation and presets
//! - [`pool`] - Fixed-size pool of spawned download tasks
//! - [`core`] - The chapter worker itself
//!
//! # Basic Usage
//!
//! ```rust,no_run
//! use manga_fetcher::app::client::{ImageFetcher, ScanClient};
//! use manga_fetcher::app::models::{BatchPosition, Chapter};
//! use manga_fetcher::app::worker::{ChapterWorker, ConfigPresets};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Arc::new(ScanClient::new()?);
//! let worker = ChapterWorker::new(ImageFetcher::new(client), ConfigPresets::production());
//!
//! let chapter = Chapter::new("c1", "Chapter 1", 1, "inline");
//! let urls = vec!["https://cdn.example.org/c1/1.jpg".to_string()];
//! let result = worker
//!     .download_chapter(&chapter, &urls, Path::new("downloads/c1"), 5, BatchPosition::single())
//!     .await;
//! println!("{}/{} images", result.images_downloaded, result.total_images);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod core;
pub mod pool;

pub use config::{ConfigPresets, WorkerConfig, WorkerConfigBuilder};
pub use self::core::{ChapterWorker, ProgressSender};
pub use pool::ImagePool;
