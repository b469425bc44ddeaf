//! # Inference Endpoint Chat
//!
//! Client side of the chat front-end: forwards the conversation to a hosted
//! model endpoint that speaks the chat-completions route and returns the
//! reply text.
//!
//! Served module endpoints answer with a `new_module` field holding the
//! generated class; plain chat models answer with the usual
//! `choices[0].message.content`. Both are accepted.

mod client;
mod config;

pub use client::InferenceClient;
pub use config::{ChatConfig, ChatConfigBuilder, DEFAULT_MAX_TOKENS, DEFAULT_MODEL, HistoryMode};

use serde::{Deserialize, Serialize};

/// Role of the user in a conversation
pub const ROLE_USER: &str = "user";

/// Role of the model in a conversation
pub const ROLE_ASSISTANT: &str = "assistant";

/// One turn of a conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    /// A user turn
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }

    /// A model turn
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_ASSISTANT.to_string(),
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == ROLE_USER
    }
}
