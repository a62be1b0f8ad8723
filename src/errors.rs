//! Error types for Manga Fetcher
//!
//! This module defines error types for all components of the application.
//! Inside the download core, image-level failures never cross a component
//! boundary as errors: they are retried, counted, and reported as values in
//! `DownloadResult`. The types here cover the remaining fallible surfaces
//! (resolution, manifests, configuration, packaging) and the per-attempt
//! errors the fetcher logs before retrying.

use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single image download attempt
#[derive(Error, Debug)]
pub enum FetchError {
    /// HTTP request error
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// I/O error during file operations
    #[error("File I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Attempt exceeded its time budget
    #[error("Download timed out after {seconds} seconds")]
    Timeout { seconds: u64 },

    /// Invalid URL provided
    #[error("Invalid URL: {url} - {error}")]
    InvalidUrl { url: String, error: String },

    /// Server returned error status
    #[error("Server error: HTTP {status}")]
    ServerError { status: u16 },

    /// Rename of the finished temp file failed
    #[error("Atomic file operation failed: could not rename {temp_path} to {final_path}")]
    AtomicOperationFailed {
        temp_path: PathBuf,
        final_path: PathBuf,
    },

    /// Attempt abandoned because the batch was cancelled
    #[error("Download cancelled")]
    Cancelled,

    /// Client could not be configured
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
}

/// Errors resolving a chapter into its image URL list
#[derive(Error, Debug)]
pub enum ResolveError {
    /// HTTP request failed
    #[error("Image list request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Image list endpoint answered with an error status
    #[error("Image list request returned HTTP {status} for {url}")]
    ServerError { url: String, status: u16 },

    /// Chapter has neither inline images nor a usable source reference
    #[error("Chapter '{chapter}' has no image source")]
    MissingSource { chapter: String },

    /// Source reference or list entry is not a valid URL
    #[error("Invalid URL: {url}")]
    InvalidUrl { url: String },

    /// Image list body could not be decoded
    #[error("Malformed image list: {reason}")]
    MalformedList { reason: String },
}

/// Chapter manifest errors
#[derive(Error, Debug)]
pub enum ManifestError {
    /// Manifest file not found
    #[error("Manifest file not found: {path}")]
    NotFound { path: PathBuf },

    /// JSON parsing error
    #[error("JSON parsing error in manifest: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error in manifest: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// I/O error reading manifest
    #[error("I/O error reading manifest: {0}")]
    Io(#[from] std::io::Error),

    /// Manifest title is empty
    #[error("Manifest has no manga title")]
    MissingTitle,

    /// Manifest lists no chapters
    #[error("Manifest lists no chapters")]
    NoChapters,

    /// Two chapters share an identifier
    #[error("Duplicate chapter id in manifest: {id}")]
    DuplicateChapter { id: String },

    /// Two chapter titles map to the same output directory
    #[error("Chapters '{first}' and '{second}' would share an output directory")]
    SharedChapterDirectory { first: String, second: String },
}

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    NotFound { path: PathBuf },

    /// Invalid configuration format
    #[error("Invalid configuration format: {0}")]
    InvalidFormat(#[from] toml::de::Error),

    /// Configuration could not be serialized
    #[error("Could not serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Invalid configuration value
    #[error("Invalid configuration value for {field}: {value}. {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    /// User config directory unavailable
    #[error("Could not determine user config directory")]
    NoConfigDir,
}

/// Chapter archive packaging errors
#[derive(Error, Debug)]
pub enum PackageError {
    /// Chapter directory holds no images
    #[error("No images to package in {path}")]
    NoImages { path: PathBuf },

    /// Archive writer failed
    #[error("Archive error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// An image could not be decoded or re-encoded
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    /// PDF document could not be built
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    /// I/O error while packaging
    #[error("I/O error while packaging: {0}")]
    Io(#[from] std::io::Error),
}

/// Top-level application error that can represent any error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Fetch error
    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Resolution error
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// Manifest error
    #[error(transparent)]
    Manifest(#[from] ManifestError),

    /// Configuration error
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Packaging error
    #[error(transparent)]
    Package(#[from] PackageError),

    /// Generic I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Generic application error with context
    #[error("Application error: {message}")]
    Generic { message: String },
}

impl AppError {
    /// Create a generic application error with a message
    pub fn generic(message: impl Into<String>) -> Self {
        Self::Generic {
            message: message.into(),
        }
    }

    /// Check if the error is recoverable (transient)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AppError::Fetch(FetchError::Timeout { .. })
                | AppError::Fetch(FetchError::Http(_))
                | AppError::Fetch(FetchError::ServerError { .. })
                | AppError::Fetch(FetchError::Io(_))
                | AppError::Fetch(FetchError::AtomicOperationFailed { .. })
                | AppError::Resolve(ResolveError::Http(_))
                | AppError::Resolve(ResolveError::ServerError { .. })
        )
    }

    /// Get error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "fetch",
            AppError::Resolve(_) => "resolve",
            AppError::Manifest(_) => "manifest",
            AppError::Config(_) => "config",
            AppError::Package(_) => "package",
            AppError::Io(_) => "io",
            AppError::Generic { .. } => "generic",
        }
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;

/// Fetch attempt result type alias
pub type FetchResult<T> = std::result::Result<T, FetchError>;

/// Resolution result type alias
pub type ResolveResult<T> = std::result::Result<T, ResolveError>;

/// Manifest result type alias
pub type ManifestResult<T> = std::result::Result<T, ManifestError>;

/// Configuration result type alias
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Packaging result type alias
pub type PackageResult<T> = std::result::Result<T, PackageError>;
