//! OpenAI embedding provider.
//!
//! Implements the core [`Embedder`] trait against `POST {base_url}/embeddings`.
//!
//! # Failure Mapping
//!
//! | Condition | [`EmbeddingError`] |
//! |-----------|--------------------|
//! | empty input text | `EmptyInput` (no request sent) |
//! | HTTP 401 / 403 | `Auth` |
//! | HTTP 429 | `RateLimited` |
//! | other non-2xx | `Provider { status, message }` |
//! | client timeout | `Timeout` |
//! | connection / transport failure | `Network` |
//! | undecodable body, missing or duplicate `index` | `Malformed` |
//! | vector length ≠ `embedding.dims` | `DimensionMismatch` |
//!
//! Nothing is retried here; the whole request fails on the first error.

use anyhow::Result;
use async_trait::async_trait;
use merchant_insights_core::embedding::{check_dims, Embedder};
use merchant_insights_core::EmbeddingError;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::openai::{error_message, OpenAIClient};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding provider backed by the OpenAI embeddings API.
#[derive(Debug, Clone)]
pub struct OpenAIEmbedder {
    client: OpenAIClient,
    model: String,
    dims: usize,
    timeout: Duration,
}

impl OpenAIEmbedder {
    pub fn new(client: OpenAIClient, model: &str, dims: usize, timeout: Duration) -> Self {
        Self {
            client,
            model: model.to_string(),
            dims,
            timeout,
        }
    }

    /// Create the embedder from `[provider]` and `[embedding]`.
    ///
    /// # Errors
    ///
    /// Returns an error if no API key is configured or the HTTP client
    /// cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?;
        let timeout = Duration::from_secs(config.embedding.timeout_secs);
        let client = OpenAIClient::new(&config.provider.base_url, api_key, timeout)?;
        Ok(Self::new(
            client,
            &config.embedding.model,
            config.embedding.dims,
            timeout,
        ))
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.iter().any(|t| t.is_empty()) {
            return Err(EmbeddingError::EmptyInput);
        }

        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post_json("embeddings", &body)
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(status_error(status, &text));
        }

        let bytes = response.bytes().await.map_err(|e| self.transport_error(e))?;
        let parsed: EmbeddingResponse = serde_json::from_slice(&bytes)
            .map_err(|e| EmbeddingError::Malformed(e.to_string()))?;
        debug!(
            inputs = texts.len(),
            returned = parsed.data.len(),
            "embeddings response"
        );

        let vectors = order_by_index(parsed.data, texts.len())?;
        for vector in &vectors {
            check_dims(vector, self.dims)?;
        }
        Ok(vectors)
    }

    fn transport_error(&self, err: reqwest::Error) -> EmbeddingError {
        if err.is_timeout() {
            EmbeddingError::Timeout(format!("no response within {:?}", self.timeout))
        } else if err.is_decode() {
            EmbeddingError::Malformed(err.to_string())
        } else {
            EmbeddingError::Network(err.to_string())
        }
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    fn dims(&self) -> usize {
        self.dims
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let mut vectors = self.request(&[text.to_string()]).await?;
        vectors
            .pop()
            .ok_or_else(|| EmbeddingError::Malformed("empty data array".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }
}

/// Map a non-success HTTP status to an [`EmbeddingError`].
fn status_error(status: StatusCode, body: &str) -> EmbeddingError {
    let message = error_message(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => EmbeddingError::Auth(message),
        StatusCode::TOO_MANY_REQUESTS => EmbeddingError::RateLimited(message),
        _ => EmbeddingError::Provider {
            status: status.as_u16(),
            message,
        },
    }
}

/// Place each returned vector at its `index`, requiring exactly one vector
/// per input.
fn order_by_index(
    data: Vec<EmbeddingDatum>,
    expected: usize,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if data.len() != expected {
        return Err(EmbeddingError::Malformed(format!(
            "expected {} embeddings, got {}",
            expected,
            data.len()
        )));
    }
    let mut slots: Vec<Option<Vec<f32>>> = vec![None; expected];
    for datum in data {
        let slot = slots.get_mut(datum.index).ok_or_else(|| {
            EmbeddingError::Malformed(format!("embedding index {} out of range", datum.index))
        })?;
        if slot.is_some() {
            return Err(EmbeddingError::Malformed(format!(
                "duplicate embedding index {}",
                datum.index
            )));
        }
        *slot = Some(datum.embedding);
    }
    Ok(slots.into_iter().flatten().collect())
}
