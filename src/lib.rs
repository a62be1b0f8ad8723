//! Manga Fetcher Library
//!
//! A Rust library for downloading manga chapters as ordered sets of images.
//! Chapters download concurrently under a chapter limit, and each chapter's
//! images download through a bounded pool with retries, exponential backoff
//! and atomic writes. Batch results always come back in input order.

pub mod app;
pub mod cli;
pub mod config;
pub mod constants;
pub mod errors;
pub mod prelude;

// Re-export commonly used types for convenience
pub use errors::{AppError, Result};
