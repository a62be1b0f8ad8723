//! Core HTTP operations with rate limiting
//!
//! This module provides the fundamental HTTP request operations shared by
//! the image fetcher and the image-list resolver. Requests pass through a
//! process-wide rate limiter; retries are the caller's concern so that each
//! caller can apply its own policy.

use std::num::NonZeroU32;

use governor::{clock::DefaultClock, state::InMemoryState, state::NotKeyed, Quota, RateLimiter};
use reqwest::Client;
use url::Url;

use crate::errors::{FetchError, FetchResult};

/// HTTP operations handler with rate limiting
#[derive(Debug)]
pub struct HttpHandler {
    client: Client,
    rate_limiter: RateLimiter<NotKeyed, InMemoryState, DefaultClock>,
}

impl HttpHandler {
    /// Creates a new HttpHandler with the given client and rate limiting
    ///
    /// # Errors
    ///
    /// Returns `FetchError::ConfigurationError` if the rate limit is zero
    pub fn new(client: Client, rate_limit_rps: u32) -> FetchResult<Self> {
        let rate_limiter = Self::build_rate_limiter(rate_limit_rps)?;
        Ok(Self {
            client,
            rate_limiter,
        })
    }

    /// Builds the rate limiter with the specified rate limit
    fn build_rate_limiter(
        rate_limit_rps: u32,
    ) -> FetchResult<RateLimiter<NotKeyed, InMemoryState, DefaultClock>> {
        let rps = NonZeroU32::new(rate_limit_rps).ok_or_else(|| {
            FetchError::ConfigurationError("Rate limit must be non-zero".to_string())
        })?;
        Ok(RateLimiter::direct(Quota::per_second(rps)))
    }

    /// Sends a single rate-limited GET request
    ///
    /// The response is returned whatever its status; callers decide which
    /// statuses count as failures.
    pub async fn get_response(&self, url: &Url) -> FetchResult<reqwest::Response> {
        self.rate_limiter.until_ready().await;

        let response = self.client.get(url.as_str()).send().await?;
        tracing::trace!("{} -> HTTP {}", url, response.status());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::client::config::ClientConfig;

    #[tokio::test]
    async fn test_rate_limiter_creation() {
        let rate_limiter = HttpHandler::build_rate_limiter(5).unwrap();
        rate_limiter.until_ready().await;
    }

    #[test]
    fn test_rate_limiter_zero_fails() {
        let result = HttpHandler::build_rate_limiter(0);
        assert!(matches!(result, Err(FetchError::ConfigurationError(_))));
    }

    #[tokio::test]
    async fn test_http_handler_creation() {
        let config = ClientConfig::default();
        let client = config.build_http_client().unwrap();
        assert!(HttpHandler::new(client, 5).is_ok());
    }

    #[tokio::test]
    async fn test_get_response_returns_error_statuses() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.png"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = ClientConfig::default().build_http_client().unwrap();
        let handler = HttpHandler::new(client, 100).unwrap();
        let url = Url::parse(&format!("{}/missing.png", server.uri())).unwrap();

        let response = handler.get_response(&url).await.unwrap();
        assert_eq!(response.status().as_u16(), 404);
    }
}
