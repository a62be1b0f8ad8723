//! Prelude module for Manga Fetcher Library
//!
//! This module re-exports the most commonly used items from the library,
//! providing a convenient way to import everything needed for typical usage
//! with a single `use manga_fetcher::prelude::*;` statement.
//!
//! # Usage
//!
//! ```rust,no_run
//! use manga_fetcher::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = Arc::new(ScanClient::new()?);
//!     let layout = OutputLayout::new("downloads", "Blue Harbor");
//!     let coordinator = Coordinator::new(CoordinatorConfig::default(), client, layout);
//!
//!     let resolver = StaticResolver::new();
//!     let results = coordinator.run(&[], &resolver, None).await;
//!     assert!(results.is_empty());
//!     Ok(())
//! }
//! ```

// Core result types
pub use crate::errors::{AppError, Result};

// Essential app components that are used in most integrations
pub use crate::app::{
    // Data types
    Chapter,
    // Core orchestration
    ChapterWorker,
    ClientConfig,
    Coordinator,
    CoordinatorConfig,
    DownloadProgress,
    DownloadResult,
    ImageFetcher,
    // Resolution
    ImageUrlResolver,
    ManifestResolver,
    OutputLayout,
    ScanClient,
    SessionResult,
    StaticResolver,
    WorkerConfig,

    // Manifest functions
    load_manifest,
};

// Application configuration
pub use crate::config::AppConfig;

// Commonly used constants
pub use crate::constants::{
    DEFAULT_MAX_CONCURRENT_CHAPTERS, DEFAULT_MAX_CONCURRENT_IMAGES, DEFAULT_RATE_LIMIT_RPS,
    MAX_RETRIES,
};

// Standard library re-exports that are commonly needed
pub use std::path::{Path, PathBuf};
pub use std::sync::Arc;

pub use tokio;
