//! Configuration for the inference endpoint client

use url::Url;

use crate::error::{Error, Result};

/// Default served model name
pub const DEFAULT_MODEL: &str = "ADAS_endpoint";

/// Default completion budget per reply
pub const DEFAULT_MAX_TOKENS: u32 = 256;

/// What part of the conversation is sent with each request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum HistoryMode {
    /// Only the newest user message, wrapped as `{"inputs": [...]}`
    #[default]
    LatestTurn,
    /// Every turn as `{"role", "content"}`
    FullHistory,
}

/// Configuration for [`super::InferenceClient`]
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Serving endpoints root; requests go to `<base_url>/chat/completions`
    pub base_url: String,

    /// Bearer token for the endpoint
    pub token: String,

    /// Served model name
    pub model: String,

    pub max_tokens: u32,

    pub history_mode: HistoryMode,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            token: String::new(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            history_mode: HistoryMode::default(),
            timeout_secs: 120,
        }
    }
}

/// Builder for ChatConfig
#[derive(Debug, Default)]
pub struct ChatConfigBuilder {
    config: ChatConfig,
}

impl ChatConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ChatConfig::default(),
        }
    }

    /// Set the serving endpoints root
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the bearer token
    pub fn token(mut self, token: impl Into<String>) -> Self {
        self.config.token = token.into();
        self
    }

    /// Set the served model name
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    /// Set the completion budget
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// Set the history mode
    pub fn history_mode(mut self, history_mode: HistoryMode) -> Self {
        self.config.history_mode = history_mode;
        self
    }

    /// Set the request timeout
    pub fn timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.config.timeout_secs = timeout_secs;
        self
    }

    /// Build the configuration, checking the endpoint URL
    pub fn build(self) -> Result<ChatConfig> {
        if self.config.base_url.is_empty() {
            return Err(Error::Config("an inference endpoint URL is required".to_string()));
        }
        Url::parse(&self.config.base_url)
            .map_err(|e| Error::Config(format!("Invalid endpoint URL {:?}: {}", self.config.base_url, e)))?;
        Ok(self.config)
    }
}

impl ChatConfig {
    /// Create a new builder
    pub fn builder() -> ChatConfigBuilder {
        ChatConfigBuilder::new()
    }

    /// Full URL of the completions route
    pub fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ChatConfig::builder()
            .base_url("https://example.cloud/serving-endpoints/")
            .build()
            .unwrap();
        assert_eq!(config.model, "ADAS_endpoint");
        assert_eq!(config.max_tokens, 256);
        assert_eq!(config.history_mode, HistoryMode::LatestTurn);
        assert_eq!(
            config.completions_url(),
            "https://example.cloud/serving-endpoints/chat/completions"
        );
    }

    #[test]
    fn test_endpoint_required() {
        assert!(matches!(ChatConfig::builder().build(), Err(Error::Config(_))));
        assert!(matches!(
            ChatConfig::builder().base_url("not a url").build(),
            Err(Error::Config(_))
        ));
    }
}
