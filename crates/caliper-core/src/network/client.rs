//! HTTP client for the Releases API.
//!
//! Thin wrapper around `reqwest` that owns the standard header set
//! (Accept, User-Agent, API version, optional bearer token), the
//! per-attempt timeout, and HTTP status classification.

use crate::config::NetworkConfig;
use crate::error::{CaliperError, Result};
use reqwest::{header, Client, Response, StatusCode};
use std::time::Duration;
use tracing::debug;

/// API client with the standard GitHub-style header set.
pub struct HttpClient {
    client: Client,
    auth_token: Option<String>,
}

impl HttpClient {
    /// Create a client with the default per-attempt timeout.
    pub fn new(auth_token: Option<String>) -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT, auth_token)
    }

    /// Create a client with a custom per-attempt timeout.
    pub fn with_timeout(timeout: Duration, auth_token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| CaliperError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                source: Some(e),
            })?;

        Ok(Self { client, auth_token })
    }

    /// GET an API endpoint with the standard header set.
    ///
    /// Rate-limit rejections become [`CaliperError::RateLimited`] (retryable);
    /// any other status is returned to the caller for classification.
    pub async fn get_api(&self, url: &str) -> Result<Response> {
        let mut request = self
            .client
            .get(url)
            .header(header::ACCEPT, NetworkConfig::ACCEPT_HEADER)
            .header("X-GitHub-Api-Version", NetworkConfig::GITHUB_API_VERSION);

        if let Some(ref token) = self.auth_token {
            request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
        }

        let response = request.send().await.map_err(|e| CaliperError::Network {
            message: format!("GET {} failed: {}", url, e),
            source: Some(e),
        })?;

        self.log_rate_limit(&response);
        self.reject_rate_limited(response, url)
    }

    /// Check if an HTTP status indicates a transient, retryable failure.
    pub fn is_retryable_status(status: StatusCode) -> bool {
        matches!(status.as_u16(), 408 | 429 | 500 | 502 | 503 | 504)
    }

    /// Check if an HTTP status indicates a permanent failure.
    pub fn is_permanent_failure(status: StatusCode) -> bool {
        status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS
    }

    // Internal methods

    fn log_rate_limit(&self, response: &Response) {
        let header_u64 = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok())
        };

        if let (Some(remaining), Some(limit)) =
            (header_u64("X-RateLimit-Remaining"), header_u64("X-RateLimit-Limit"))
        {
            debug!("API rate limit: {}/{}", remaining, limit);
        }
    }

    fn reject_rate_limited(&self, response: Response, url: &str) -> Result<Response> {
        let status = response.status();
        let exhausted_quota = status == StatusCode::FORBIDDEN
            && response
                .headers()
                .get("X-RateLimit-Remaining")
                .and_then(|v| v.to_str().ok())
                == Some("0");

        if status == StatusCode::TOO_MANY_REQUESTS || exhausted_quota {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.parse::<u64>().ok());

            return Err(CaliperError::RateLimited {
                service: extract_domain(url),
                retry_after_secs: retry_after,
            });
        }

        Ok(response)
    }
}

/// Extract the host from a URL for error messages.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| "unknown".to_string())
}
