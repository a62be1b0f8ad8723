//! Application constants for Manga Fetcher
//!
//! This module centralizes all constants used throughout the application,
//! organized by functional domain for maintainability and clarity.

use std::time::Duration;

/// Environment variable names
pub mod env {
    /// Overrides the configured download root directory
    pub const DOWNLOAD_DIR: &str = "MANGA_FETCHER_DOWNLOAD_DIR";
}

/// HTTP client configuration constants
pub mod http {
    use super::Duration;

    /// Browser-like user agent; many image hosts reject unknown clients
    pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

    /// Accept header sent with image requests
    pub const ACCEPT_IMAGES: &str = "image/webp,image/apng,image/*,*/*;q=0.8";

    /// Accept-Language header sent with every request
    pub const ACCEPT_LANGUAGE: &str = "en-US,en;q=0.9";

    /// Connection establishment timeout
    pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

    /// Connection pool idle timeout
    pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);

    /// Maximum idle connections per host in pool
    pub const POOL_MAX_PER_HOST: usize = 16;
}

/// Retry, backoff and success policy
pub mod limits {
    use super::Duration;

    /// Default rate limit for outgoing requests (requests per second)
    pub const DEFAULT_RATE_LIMIT_RPS: u32 = 50;

    /// Total attempts per image before giving up
    pub const MAX_RETRIES: u32 = 3;

    /// One backoff time unit; the delay after failed attempt k is (2^k + 1) units
    pub const BACKOFF_UNIT: Duration = Duration::from_secs(1);

    /// Per-attempt timeout covering connect, headers and body
    pub const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(30);

    /// Chapter success threshold numerator (9/10 = 90%)
    pub const SUCCESS_THRESHOLD_NUMERATOR: usize = 9;

    /// Chapter success threshold denominator
    pub const SUCCESS_THRESHOLD_DENOMINATOR: usize = 10;
}

/// File naming constants
pub mod files {
    /// Temporary file suffix for atomic operations
    pub const TEMP_FILE_SUFFIX: &str = ".tmp";

    /// Known image extensions, in match priority order
    pub const IMAGE_EXTENSIONS: [&str; 5] = [".jpg", ".jpeg", ".png", ".webp", ".gif"];

    /// Extension used when the URL names none of the known ones
    pub const DEFAULT_IMAGE_EXTENSION: &str = ".jpg";

    /// Width of the zero-padded ordinal prefix in image file names
    pub const ORDINAL_WIDTH: usize = 3;

    /// Maximum length of a sanitized path component (in characters)
    pub const MAX_NAME_LENGTH: usize = 100;

    /// Characters stripped from path components
    pub const FORBIDDEN_CHARS: [char; 9] = ['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

    /// Replacement for path components that sanitize to nothing
    pub const UNTITLED: &str = "untitled";

    /// Extension given to chapter archives
    pub const CBZ_EXTENSION: &str = "cbz";

    /// Extension given to chapter PDFs
    pub const PDF_EXTENSION: &str = "pdf";

    /// JPEG quality pages are re-encoded at inside a PDF
    pub const PDF_JPEG_QUALITY: u8 = 95;
}

/// Worker and concurrency configuration
pub mod workers {
    /// Default image downloads in flight per chapter
    pub const DEFAULT_MAX_CONCURRENT_IMAGES: usize = 5;

    /// Default chapters processed concurrently
    pub const DEFAULT_MAX_CONCURRENT_CHAPTERS: usize = 3;

    /// Default chapter URL lists resolved concurrently
    pub const DEFAULT_URL_RESOLVE_CONCURRENCY: usize = 3;

    /// Maximum allowed size for any pool
    pub const MAX_WORKER_COUNT: usize = 64;
}

/// User-facing result and progress messages
pub mod messages {
    /// Error recorded for chapters that resolve to no images
    pub const NO_IMAGES_FOUND: &str = "No images found";

    /// Error recorded for chapters interrupted by cancellation
    pub const CANCELLED: &str = "Cancelled";
}

/// Logging constants
pub mod logging {
    /// Default log level
    pub const DEFAULT_LOG_LEVEL: &str = "info";
}

/// Configuration file locations
pub mod config {
    /// Project-local configuration file name
    pub const LOCAL_CONFIG_FILE: &str = "manga-fetcher.toml";

    /// Directory name under the user config directory
    pub const APP_DIR_NAME: &str = "manga-fetcher";

    /// Configuration file name under the application directory
    pub const CONFIG_FILE_NAME: &str = "config.toml";

    /// Download directory used when neither config nor env names one
    pub const DEFAULT_DOWNLOAD_DIR: &str = "downloads";
}

// Re-export commonly used constants for convenience
pub use files::TEMP_FILE_SUFFIX;
pub use http::USER_AGENT;
pub use limits::{DEFAULT_RATE_LIMIT_RPS, MAX_RETRIES};
pub use workers::{DEFAULT_MAX_CONCURRENT_CHAPTERS, DEFAULT_MAX_CONCURRENT_IMAGES};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_ninety_percent() {
        let ratio = limits::SUCCESS_THRESHOLD_NUMERATOR as f64
            / limits::SUCCESS_THRESHOLD_DENOMINATOR as f64;
        assert!((ratio - 0.9).abs() < f64::EPSILON);
    }

    #[test]
    fn test_image_extensions_are_lowercase_and_dotted() {
        for ext in files::IMAGE_EXTENSIONS {
            assert!(ext.starts_with('.'));
            assert_eq!(ext, ext.to_lowercase());
        }
        assert!(files::IMAGE_EXTENSIONS.contains(&files::DEFAULT_IMAGE_EXTENSION));
    }
}
