//! File content download and decoding

use base64::Engine;
use serde::{Deserialize, Serialize};
use tracing::{error, instrument};

use super::GithubClient;
use crate::error::{Error, Result};

/// Content envelope returned by a download reference
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentEnvelope {
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub path: Option<String>,

    #[serde(default)]
    pub size: Option<u64>,

    /// Encoding of `content`, normally `base64`
    #[serde(default)]
    pub encoding: Option<String>,

    /// Encoded payload, wrapped with newlines by the API
    #[serde(default)]
    pub content: Option<String>,
}

/// Decode the payload of a content envelope into text
///
/// Whitespace inside the payload is ignored.
pub fn decode_content(envelope: &ContentEnvelope) -> Result<String> {
    let encoded = envelope
        .content
        .as_deref()
        .filter(|c| !c.is_empty())
        .ok_or(Error::MissingContent)?;

    let compact: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD.decode(compact)?;
    Ok(String::from_utf8(bytes)?)
}

impl GithubClient {
    /// Fetch the content envelope behind a download reference
    ///
    /// Rate-limit responses are retried by the HTTP client; any remaining
    /// failure is logged and reported as `None`.
    #[instrument(skip(self), level = "debug")]
    pub async fn download_file(&self, download_url: &str) -> Option<ContentEnvelope> {
        match self.http.get_url::<ContentEnvelope>(download_url).await {
            Ok(envelope) => Some(envelope),
            Err(e) => {
                error!("Failed to download the file {}: {}", download_url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::GithubConfig;
    use super::*;
    use mockito::Server;

    fn envelope(content: &str) -> ContentEnvelope {
        ContentEnvelope {
            content: Some(content.to_string()),
            encoding: Some("base64".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_decode_wrapped_payload() {
        // "class A(dspy.Module):\n    pass\n" wrapped mid-token the way the API does
        let text = decode_content(&envelope("Y2xhc3MgQShkc3B5Lk1v\nZHVsZSk6CiAgICBwYXNzCg==\n")).unwrap();
        assert_eq!(text, "class A(dspy.Module):\n    pass\n");
    }

    #[test]
    fn test_decode_missing_content() {
        assert!(matches!(
            decode_content(&ContentEnvelope::default()),
            Err(Error::MissingContent)
        ));
        assert!(matches!(decode_content(&envelope("")), Err(Error::MissingContent)));
    }

    #[test]
    fn test_decode_invalid_payloads() {
        assert!(matches!(decode_content(&envelope("!!!")), Err(Error::Base64(_))));
        // 0xff 0xfe is not UTF-8
        assert!(matches!(decode_content(&envelope("//4=")), Err(Error::Utf8(_))));
    }

    fn client(max_retries: u32) -> GithubClient {
        GithubClient::new(
            GithubConfig::builder()
                .token("test-token")
                .request_interval_ms(0)
                .rate_limit_delay_secs(0)
                .max_retries(max_retries)
                .build(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_download_after_rate_limit() {
        let mut server = Server::new_async().await;
        let limited = server
            .mock("GET", "/repositories/1/contents/a.py")
            .with_status(403)
            .expect(1)
            .create_async()
            .await;
        let ok = server
            .mock("GET", "/repositories/1/contents/a.py")
            .with_status(200)
            .with_body("{\"name\": \"a.py\", \"encoding\": \"base64\", \"content\": \"cGFzcwo=\"}")
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/repositories/1/contents/a.py", server.url());
        let envelope = client(1).download_file(&url).await.unwrap();
        assert_eq!(envelope.name.as_deref(), Some("a.py"));
        assert_eq!(decode_content(&envelope).unwrap(), "pass\n");

        limited.assert_async().await;
        ok.assert_async().await;
    }

    #[tokio::test]
    async fn test_download_not_found_is_none() {
        let mut server = Server::new_async().await;
        let missing = server
            .mock("GET", "/repositories/1/contents/gone.py")
            .with_status(404)
            .expect(1)
            .create_async()
            .await;

        let url = format!("{}/repositories/1/contents/gone.py", server.url());
        assert!(client(1).download_file(&url).await.is_none());

        missing.assert_async().await;
    }
}
