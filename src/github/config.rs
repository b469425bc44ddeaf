//! # Code-Search Client Configuration
//!
//! Connection and pacing options for the code-search client, built with the
//! same builder pattern the rest of the crate uses.
//!
//! The defaults mirror the limits of the public search API: 100 results per
//! page, at most 10 pages (the API refuses to go past 1000 results), one
//! request per second, and a 30 second pause when the API reports a rate
//! limit.

use std::time::Duration;

/// Default API root of the code-hosting service
pub const DEFAULT_API_BASE_URL: &str = "https://api.github.com";

/// Default search query: Python files mentioning the module base class
pub const DEFAULT_QUERY: &str = "dspy.Module language:python";

/// Configuration for the code-search client
#[derive(Debug, Clone)]
pub struct GithubConfig {
    /// API root, without a trailing slash
    pub api_base_url: String,

    /// Personal access token sent as `Authorization: token <token>`
    pub token: String,

    /// User agent (the API rejects requests without one)
    pub user_agent: String,

    /// Results requested per search page
    pub per_page: u32,

    /// Maximum number of search pages to request
    pub max_pages: u32,

    /// Minimum spacing between consecutive requests in milliseconds
    pub request_interval_ms: u64,

    /// Fixed wait after a rate-limit response, in seconds
    pub rate_limit_delay_secs: u64,

    /// How many times a rate-limited request is retried
    pub max_retries: u32,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            token: String::new(),
            user_agent: "DSPY Archiver".to_string(),
            per_page: 100,
            max_pages: 10,
            request_interval_ms: 1000,
            rate_limit_delay_secs: 30,
            max_retries: 1,
            timeout_secs: 120,
        }
    }
}

/// Builder for GithubConfig
#[derive(Debug, Default)]
pub struct GithubConfigBuilder {
    config: GithubConfig,
}

impl GithubConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: GithubConfig::default(),
        }
    }

    /// Set the API root
    pub fn api_base_url(mut self, api_base_url: impl Into<String>) -> Self {
        self.config.api_base_url = api_base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the access token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = token.into();
        self
    }

    /// Set the user agent
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the number of results per page
    pub fn per_page(mut self, per_page: u32) -> Self {
        self.config.per_page = per_page;
        self
    }

    /// Set the page cap
    pub fn max_pages(mut self, max_pages: u32) -> Self {
        self.config.max_pages = max_pages;
        self
    }

    /// Set the spacing between requests in milliseconds (0 disables pacing)
    pub fn request_interval_ms(mut self, request_interval_ms: u64) -> Self {
        self.config.request_interval_ms = request_interval_ms;
        self
    }

    /// Set the wait after a rate-limit response
    pub fn rate_limit_delay_secs(mut self, rate_limit_delay_secs: u64) -> Self {
        self.config.rate_limit_delay_secs = rate_limit_delay_secs;
        self
    }

    /// Set the retry count for rate-limited requests
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.max_retries = max_retries;
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    /// Build the configuration
    pub fn build(self) -> GithubConfig {
        self.config
    }
}

impl GithubConfig {
    /// Create a new builder
    pub fn builder() -> GithubConfigBuilder {
        GithubConfigBuilder::new()
    }

    /// Request spacing as a Duration
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    /// Rate-limit wait as a Duration
    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_secs(self.rate_limit_delay_secs)
    }
}
