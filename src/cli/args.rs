//! Command-line argument parsing for Manga Fetcher
//!
//! This module defines the CLI structure using clap derive macros. Flags given
//! here override the matching settings from the configuration file.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{AppConfig, PackageFormat};
use crate::constants::workers;

/// Manga Fetcher - Download manga chapters as ordered image sets
#[derive(Parser, Debug)]
#[command(
    name = "manga_fetcher",
    version,
    about = "Download manga chapter images concurrently",
    long_about = "Downloads every chapter listed in a manifest into its own directory of numbered images.
Features bounded concurrency per chapter and per batch, retries with exponential backoff,
atomic file writes and optional CBZ or PDF packaging."
)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all subcommands
#[derive(Args, Debug)]
pub struct GlobalArgs {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Very verbose logging (debug level)
    #[arg(long, global = true)]
    pub very_verbose: bool,

    /// Quiet mode - suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Configuration file path
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Download every chapter listed in a manifest
    Download(DownloadArgs),

    /// Inspect or create the configuration file
    Config(ConfigArgs),
}

/// Arguments for the download command
#[derive(Args, Debug, Clone)]
pub struct DownloadArgs {
    /// Chapter manifest (JSON, or TOML with a .toml extension)
    #[arg(value_name = "MANIFEST")]
    pub manifest: PathBuf,

    /// Root directory for downloads
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Chapters downloaded at the same time
    #[arg(short, long, value_name = "N")]
    pub chapters: Option<usize>,

    /// Image downloads in flight per chapter
    #[arg(short, long, value_name = "N")]
    pub images: Option<usize>,

    /// Total attempts per image
    #[arg(long, value_name = "N")]
    pub retries: Option<u32>,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Package each successful chapter into a CBZ archive
    #[arg(long, conflicts_with = "pdf")]
    pub cbz: bool,

    /// Render each successful chapter into a PDF
    #[arg(long)]
    pub pdf: bool,

    /// Delete chapter images after packaging (needs a packaging format)
    #[arg(long)]
    pub delete_images: bool,

    /// Dry run - resolve and list chapters without downloading
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for configuration management
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,

        /// Where to write the file (defaults to the user config directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Get the logging level, falling back to `configured` when no flag is set
    pub fn log_level(&self, configured: &str) -> String {
        if self.global.quiet {
            "error".to_string()
        } else if self.global.very_verbose {
            "debug".to_string()
        } else if self.global.verbose {
            "info".to_string()
        } else {
            configured.to_lowercase()
        }
    }
}

impl DownloadArgs {
    /// Reject flag values that can never produce a valid configuration
    pub fn validate(&self) -> Result<(), String> {
        for (flag, value) in [("--chapters", self.chapters), ("--images", self.images)] {
            match value {
                Some(0) => return Err(format!("{} must be greater than 0", flag)),
                Some(n) if n > workers::MAX_WORKER_COUNT => {
                    return Err(format!(
                        "{} must be at most {}",
                        flag,
                        workers::MAX_WORKER_COUNT
                    ))
                }
                _ => {}
            }
        }

        if self.retries == Some(0) {
            return Err("--retries must be greater than 0".to_string());
        }

        if self.timeout == Some(0) {
            return Err("--timeout must be greater than 0".to_string());
        }

        if self.cbz && self.pdf {
            return Err("--cbz and --pdf cannot be combined".to_string());
        }

        Ok(())
    }

    /// Apply the flags on top of a loaded configuration
    pub fn apply_to(&self, config: &mut AppConfig) {
        if let Some(output) = &self.output {
            config.download.download_dir = output.clone();
        }
        if let Some(chapters) = self.chapters {
            config.download.max_concurrent_chapters = chapters;
        }
        if let Some(images) = self.images {
            config.worker.max_concurrent_images = images;
        }
        if let Some(retries) = self.retries {
            config.worker.max_retries = retries;
        }
        if let Some(timeout) = self.timeout {
            config.worker.timeout_secs = timeout;
        }
        if self.cbz {
            config.packaging.format = PackageFormat::Cbz;
        }
        if self.pdf {
            config.packaging.format = PackageFormat::Pdf;
        }
        if self.delete_images {
            config.packaging.delete_images = true;
        }
    }
}
