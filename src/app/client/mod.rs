//! HTTP client implementation for image hosts
//!
//! The module is organized into specialized components:
//! - `config`: HTTP client configuration and building
//! - `http`: rate-limited request primitives
//! - `download`: the image fetcher with retry, backoff and atomic writes

use url::Url;

use crate::errors::{FetchError, FetchResult, ResolveError, ResolveResult};

pub mod config;
pub mod download;
pub mod http;

pub use config::ClientConfig;
pub use download::{backoff_delay, ByteProgressFn, FetchOptions, FetchReport, ImageFetcher};

use http::HttpHandler;

/// Shared HTTP client for image hosts
///
/// Cheap to share behind an `Arc`: the underlying connection pool and rate
/// limiter are used by every fetch and resolution in the process.
#[derive(Debug)]
pub struct ScanClient {
    http_handler: HttpHandler,
}

impl ScanClient {
    /// Creates a client with default configuration
    pub fn new() -> FetchResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Creates a client with custom configuration
    ///
    /// # Errors
    ///
    /// Returns `FetchError` if the HTTP client or rate limiter cannot be built
    pub fn with_config(config: ClientConfig) -> FetchResult<Self> {
        let client = config.build_http_client()?;
        let http_handler = HttpHandler::new(client, config.rate_limit_rps)?;

        tracing::debug!(
            "Created HTTP client ({} req/s, referer: {})",
            config.rate_limit_rps,
            config.referer.as_deref().unwrap_or("none")
        );

        Ok(Self { http_handler })
    }

    /// Sends one rate-limited GET request, returning the raw response
    pub async fn get_response(&self, url: &Url) -> FetchResult<reqwest::Response> {
        self.http_handler.get_response(url).await
    }

    /// Fetches a text document, treating non-success statuses as errors
    pub async fn get_text(&self, url: &Url) -> ResolveResult<String> {
        let response = self
            .http_handler
            .get_response(url)
            .await
            .map_err(|e| match e {
                FetchError::Http(e) => ResolveError::Http(e),
                other => ResolveError::MalformedList {
                    reason: other.to_string(),
                },
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ResolveError::ServerError {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response.text().await?)
    }
}
