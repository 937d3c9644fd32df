//! Minimal OpenAI-compatible HTTP client shared by the embedder and the
//! answer synthesizer.
//!
//! Sends JSON `POST` requests to `{base_url}/{path}` with a bearer token.
//! Retries are deliberately absent; callers see every failure.

use anyhow::Result;
use serde::Serialize;
use std::time::Duration;

#[derive(Clone)]
pub struct OpenAIClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for OpenAIClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAIClient")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl OpenAIClient {
    /// Build a client whose every request is bounded by `timeout`.
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> reqwest::Result<reqwest::Response> {
        self.http
            .post(self.endpoint(path))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(body)
            .send()
            .await
    }
}

/// Extract `error.message` from an OpenAI error body, or fall back to the
/// raw body text.
pub fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|json| {
            json.get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.trim().to_string())
}

/// First few characters of a secret, for logs.
pub fn redact(secret: &str) -> String {
    let prefix: String = secret.chars().take(6).collect();
    format!("{}********", prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_cleanly() {
        let client =
            OpenAIClient::new("https://api.openai.com/v1/", "sk", Duration::from_secs(1)).unwrap();
        assert_eq!(
            client.endpoint("/embeddings"),
            "https://api.openai.com/v1/embeddings"
        );
        assert_eq!(
            client.endpoint("chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_error_message_from_json() {
        let body =
            r#"{"error":{"message":"Incorrect API key provided","type":"invalid_request_error"}}"#;
        assert_eq!(error_message(body), "Incorrect API key provided");
    }

    #[test]
    fn test_error_message_falls_back_to_body() {
        assert_eq!(error_message("  upstream exploded \n"), "upstream exploded");
    }

    #[test]
    fn test_debug_redacts_key() {
        let client =
            OpenAIClient::new("http://localhost", "sk-abcdefghijkl", Duration::from_secs(1))
                .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("sk-abcdefghijkl"));
        assert!(debug.contains("sk-abc********"));
    }
}
