//! Command-line interface components
//!
//! This module contains CLI-specific code for the Manga Fetcher application,
//! including argument parsing, progress display, and command handlers.

pub mod args;
pub mod commands;
pub mod progress;

pub use args::{Cli, Commands, ConfigAction, ConfigArgs, DownloadArgs, GlobalArgs};
pub use commands::{handle_config, handle_download};
pub use progress::{DisplayMode, DisplaySummary, ProgressConfig, ProgressDisplay, ProgressHandle};
