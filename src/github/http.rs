//! HTTP client for the code-search API
//!
//! Handles token authentication, request pacing and the rate-limit retry.

use std::sync::Arc;
use std::time::Duration;

use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client as ReqwestClient, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, error, instrument, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::github::config::GithubConfig;

/// HTTP client for making requests to the code-search API
///
/// Every request carries `Authorization: token <token>` and the configured
/// user agent. Requests are spaced by the configured interval, shared across
/// clones of the client.
///
/// The API signals exhausted quotas with either 403 or 429. Both are treated
/// as a rate limit: the client waits the fixed configured delay and retries,
/// up to `max_retries` times, before giving up with [`Error::RateLimit`].
#[derive(Clone)]
pub struct HttpClient {
    /// The underlying reqwest client
    client: ReqwestClient,

    /// Base URL for relative request paths
    base_url: String,

    token: String,

    user_agent: String,

    max_retries: u32,

    /// Fixed wait after a rate-limit response
    rate_limit_delay: Duration,

    /// Request pacer (None when pacing is disabled)
    limiter: Option<Arc<DefaultDirectRateLimiter>>,
}

impl HttpClient {
    /// Create a new HTTP client from configuration
    pub fn new(config: &GithubConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        let limiter = Quota::with_period(config.request_interval())
            .map(|quota| Arc::new(RateLimiter::direct(quota)));

        Ok(Self {
            client,
            base_url: config.api_base_url.clone(),
            token: config.token.clone(),
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            rate_limit_delay: config.rate_limit_delay(),
            limiter,
        })
    }

    /// Build an absolute URL for a path relative to the API root
    fn build_url(&self, path: &str) -> Result<Url> {
        let url = format!("{}/{}", self.base_url, path.trim_start_matches('/'));
        Url::parse(&url).map_err(|e| Error::Other(format!("Invalid URL: {}", e)))
    }

    /// GET a path relative to the API root with query parameters
    #[instrument(skip(self, query), level = "debug")]
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.build_url(path)?;
        let request = self.client.get(url).query(query);

        debug!("Sending GET request to {}", path);
        self.execute_request(request).await
    }

    /// GET an absolute URL, such as a download reference from a search result
    #[instrument(skip(self), level = "debug")]
    pub async fn get_url<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let url = Url::parse(url).map_err(|e| Error::Other(format!("Invalid URL: {}", e)))?;
        let request = self.client.get(url);

        debug!("Sending GET request");
        self.execute_request(request).await
    }

    /// Wait until the pacer allows another request
    async fn pace(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }

    /// Execute an HTTP request and handle the response
    async fn execute_request<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let request = request
            .header("Authorization", format!("token {}", self.token))
            .header("User-Agent", &self.user_agent)
            .header("Accept", "application/vnd.github+json");

        let mut attempts = 0;

        loop {
            let request_clone = request
                .try_clone()
                .ok_or_else(|| Error::Other("Failed to clone request for retry".to_string()))?;

            self.pace().await;

            let response = request_clone.send().await?;
            let status = response.status();

            if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
                attempts += 1;
                let response_text = response.text().await?;
                debug!("Rate limit response body: {}", response_text);

                if attempts <= self.max_retries {
                    warn!(
                        "Rate limit reached ({}). Waiting for {} seconds (attempt {}/{})",
                        status.as_u16(),
                        self.rate_limit_delay.as_secs(),
                        attempts,
                        self.max_retries
                    );
                    tokio::time::sleep(self.rate_limit_delay).await;
                    continue;
                }

                error!("Rate limit reached ({}), retries exhausted", status.as_u16());
                return Err(Error::RateLimit {
                    retry_after_secs: self.rate_limit_delay.as_secs(),
                });
            }

            let response_text = response.text().await?;

            if status.is_success() {
                return serde_json::from_str(&response_text).map_err(|e| {
                    error!("Failed to parse response: {}", e);
                    Error::UnexpectedResponse(format!("Failed to parse response: {}", e))
                });
            }

            error!("API error: {} - {}", status, response_text);
            return if status == StatusCode::UNAUTHORIZED {
                Err(Error::Auth("Invalid or missing API token".to_string()))
            } else {
                Err(Error::Api {
                    status_code: status.as_u16(),
                    message: response_text,
                })
            };
        }
    }
}
