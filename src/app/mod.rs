//! Core application logic for Manga Fetcher
//!
//! This module contains the download core: the HTTP client and image
//! fetcher, the chapter worker with its bounded image pool, the coordinator
//! that runs a whole batch, plus the data models, manifest loading, URL
//! resolution and CBZ packaging around them.
//!
//! # Examples
//!
//! ```rust,no_run
//! use manga_fetcher::app::{
//!     load_manifest, Coordinator, CoordinatorConfig, ManifestResolver, OutputLayout, ScanClient,
//! };
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let manifest = load_manifest(Path::new("blue-harbor.json")).await?;
//! let client = Arc::new(ScanClient::new()?);
//! let resolver = ManifestResolver::new(client.clone(), &manifest);
//!
//! let layout = OutputLayout::new("downloads", &manifest.title);
//! let coordinator = Coordinator::new(CoordinatorConfig::default(), client, layout);
//!
//! let session = coordinator
//!     .run_session(&manifest.chapters(), &resolver, None)
//!     .await;
//! println!("{}", session.summary());
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod coordinator;
pub mod manifest;
pub mod models;
pub mod package;
pub mod paths;
pub mod resolver;
pub mod worker;

// Re-export main public API
pub use client::{ClientConfig, FetchOptions, FetchReport, ImageFetcher, ScanClient};
pub use coordinator::{
    BatchStats, CompletionCallback, Coordinator, CoordinatorConfig, SessionResult, SignalHandler,
};
pub use manifest::{load_manifest, parse_manifest, validate_manifest, Manifest, ManifestFormat};
pub use models::{
    BatchPosition, Chapter, ChapterState, DownloadProgress, DownloadResult, ImageReference,
    ProgressStage,
};
pub use package::{package_cbz, package_pdf, CleanupReport, PackagedChapter};
pub use paths::{sanitize_filename, OutputLayout};
pub use resolver::{ImageUrlResolver, ManifestResolver, StaticResolver};
pub use worker::{ChapterWorker, ConfigPresets, ImagePool, ProgressSender, WorkerConfig};
