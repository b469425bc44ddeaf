//! HTTP client for the inference endpoint

use std::time::Duration;

use reqwest::{Client as ReqwestClient, StatusCode};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, instrument};

use super::{ChatConfig, ChatMessage, HistoryMode};
use crate::error::{Error, Result};

/// Request body for the completions route
#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: Vec<RequestMessage<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum RequestMessage<'a> {
    /// Served-module input shape
    Inputs { inputs: Vec<&'a str> },
    Turn { role: &'a str, content: &'a str },
}

/// Client that sends conversations to a hosted model endpoint
#[derive(Clone)]
pub struct InferenceClient {
    client: ReqwestClient,
    config: ChatConfig,
}

impl InferenceClient {
    /// Create a client from configuration
    pub fn new(config: ChatConfig) -> Result<Self> {
        let client = ReqwestClient::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    fn build_request<'a>(&'a self, history: &'a [ChatMessage]) -> CompletionRequest<'a> {
        let messages = match self.config.history_mode {
            HistoryMode::LatestTurn => {
                let latest = history
                    .iter()
                    .rev()
                    .find(|m| m.is_user())
                    .map_or("", |m| m.content.as_str());
                vec![RequestMessage::Inputs { inputs: vec![latest] }]
            }
            HistoryMode::FullHistory => history
                .iter()
                .map(|m| RequestMessage::Turn {
                    role: &m.role,
                    content: &m.content,
                })
                .collect(),
        };

        CompletionRequest {
            model: &self.config.model,
            max_tokens: self.config.max_tokens,
            messages,
        }
    }

    /// Send the conversation and return the reply text
    #[instrument(skip(self, history), fields(turns = history.len(), model = %self.config.model))]
    pub async fn complete(&self, history: &[ChatMessage]) -> Result<String> {
        let request = self.build_request(history);

        debug!("Sending completion request with {} messages", request.messages.len());
        let response = self
            .client
            .post(self.config.completions_url())
            .bearer_auth(&self.config.token)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let response_text = response.text().await?;

        if !status.is_success() {
            error!("API error: {} - {}", status, response_text);
            return Err(if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                Error::Auth("Invalid endpoint token".to_string())
            } else {
                Error::Api {
                    status_code: status.as_u16(),
                    message: response_text,
                }
            });
        }

        let body: Value = serde_json::from_str(&response_text).map_err(|e| {
            error!("Failed to parse response: {}", e);
            Error::UnexpectedResponse(format!("Failed to parse response: {}", e))
        })?;
        reply_text(&body)
    }
}

/// Pull the reply out of a completion response
fn reply_text(body: &Value) -> Result<String> {
    match body.get("new_module") {
        Some(Value::String(text)) => return Ok(text.clone()),
        Some(Value::Null) | None => {}
        Some(other) => return Ok(serde_json::to_string_pretty(other)?),
    }

    body.pointer("/choices/0/message/content")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| {
            Error::UnexpectedResponse("response has neither new_module nor a message".to_string())
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};
    use serde_json::json;

    fn client(url: String, mode: HistoryMode) -> InferenceClient {
        InferenceClient::new(
            ChatConfig::builder()
                .base_url(url)
                .token("dapi-test")
                .history_mode(mode)
                .build()
                .unwrap(),
        )
        .unwrap()
    }

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("first"),
            ChatMessage::assistant("class A(dspy.Module): pass"),
            ChatMessage::user("a retriever module"),
        ]
    }

    #[tokio::test]
    async fn test_latest_turn_request() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/chat/completions")
            .match_header("authorization", "Bearer dapi-test")
            .match_body(Matcher::Json(json!({
                "model": "ADAS_endpoint",
                "max_tokens": 256,
                "messages": [{ "inputs": ["a retriever module"] }]
            })))
            .with_status(200)
            .with_body("{\"new_module\": \"class Retriever(dspy.Module):\\n    pass\"}")
            .expect(1)
            .create_async()
            .await;

        let reply = client(server.url(), HistoryMode::LatestTurn)
            .complete(&history())
            .await
            .unwrap();
        assert_eq!(reply, "class Retriever(dspy.Module):\n    pass");

        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_full_history_request() {
        let mut server = Server::new_async().await;
        let mock_server = server
            .mock("POST", "/chat/completions")
            .match_body(Matcher::PartialJson(json!({
                "messages": [
                    { "role": "user", "content": "first" },
                    { "role": "assistant", "content": "class A(dspy.Module): pass" },
                    { "role": "user", "content": "a retriever module" }
                ]
            })))
            .with_status(200)
            .with_body(json!({ "choices": [{ "message": { "role": "assistant", "content": "ok" } }] }).to_string())
            .expect(1)
            .create_async()
            .await;

        let reply = client(server.url(), HistoryMode::FullHistory)
            .complete(&history())
            .await
            .unwrap();
        assert_eq!(reply, "ok");

        mock_server.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/chat/completions")
            .with_status(500)
            .with_body("boom")
            .create_async()
            .await;

        let result = client(server.url(), HistoryMode::LatestTurn).complete(&history()).await;
        assert!(matches!(result, Err(Error::Api { status_code: 500, .. })));
    }

    #[tokio::test]
    async fn test_rejected_token() {
        let mut server = Server::new_async().await;
        for status in [401, 403] {
            let mock = server
                .mock("POST", "/chat/completions")
                .with_status(status)
                .with_body("Invalid access token")
                .expect(1)
                .create_async()
                .await;

            let result = client(server.url(), HistoryMode::LatestTurn).complete(&history()).await;
            assert!(matches!(result, Err(Error::Auth(_))), "status {}", status);

            mock.assert_async().await;
            mock.remove_async().await;
        }
    }

    #[test]
    fn test_empty_history_sends_empty_input() {
        let client = client("http://localhost".to_string(), HistoryMode::LatestTurn);
        let body = serde_json::to_value(client.build_request(&[])).unwrap();
        assert_eq!(body["messages"], json!([{ "inputs": [""] }]));
    }

    #[test]
    fn test_reply_text_shapes() {
        assert_eq!(reply_text(&json!({ "new_module": "x" })).unwrap(), "x");
        assert_eq!(
            reply_text(&json!({ "new_module": null, "choices": [{ "message": { "content": "y" } }] })).unwrap(),
            "y"
        );
        assert_eq!(reply_text(&json!({ "new_module": ["a"] })).unwrap(), "[\n  \"a\"\n]");
        assert!(matches!(
            reply_text(&json!({ "predictions": [] })),
            Err(Error::UnexpectedResponse(_))
        ));
    }
}
