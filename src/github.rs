//! # Code-Search Client Module
//!
//! Queries the code-search API for files matching a query string and fetches
//! the raw content of each match.
//!
//! ## Key Components
//!
//! - `GithubConfig`: API root, token, paging limits and pacing
//! - `GithubClient`: search and download operations over a shared HTTP client
//! - `CodeFile`: the flattened search record saved between tool runs
//! - `decode_content`: turns a content envelope back into source text
//!
//! All requests are sequential. A request that fails is logged and treated as
//! absent data; rate-limit responses are retried after a fixed delay.

pub mod config;
mod content;
pub mod http;
mod search;

pub use config::{DEFAULT_API_BASE_URL, DEFAULT_QUERY, GithubConfig, GithubConfigBuilder};
pub use content::{ContentEnvelope, decode_content};
pub use search::{CodeFile, Repository, SearchItem, SearchResponse};

use crate::error::Result;
use http::HttpClient;

/// Client for the code-search API
#[derive(Clone)]
pub struct GithubClient {
    http: HttpClient,
    config: GithubConfig,
}

impl GithubClient {
    /// Create a client from configuration
    pub fn new(config: GithubConfig) -> Result<Self> {
        let http = HttpClient::new(&config)?;
        Ok(Self { http, config })
    }

    /// The configuration this client was built with
    pub fn config(&self) -> &GithubConfig {
        &self.config
    }
}
