//! Answer synthesis from retrieved context.
//!
//! The retrieved chunk texts are pasted into a single prompt and sent to a
//! chat-completion model. [`AnswerSynthesizer`] is the seam; the server and
//! the `ask` command only depend on the trait.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::Config;
use crate::openai::{error_message, OpenAIClient};

/// Produces a natural-language answer from a question and its context.
///
/// `context` is ordered most relevant first.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    async fn answer(&self, question: &str, context: &[String]) -> Result<String>;
}

/// Build the completion prompt for `question` over `context`.
pub fn build_prompt(question: &str, context: &[String]) -> String {
    format!(
        "Use the below data to answer the user query.\n\nData:\n{}\n\nQuestion: {}\nAnswer:",
        context.join("\n"),
        question
    )
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

/// Synthesizer backed by `POST {base_url}/chat/completions`.
#[derive(Debug, Clone)]
pub struct OpenAIChatSynthesizer {
    client: OpenAIClient,
    model: String,
}

impl OpenAIChatSynthesizer {
    pub fn new(client: OpenAIClient, model: &str) -> Self {
        Self {
            client,
            model: model.to_string(),
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.require_api_key()?;
        let client = OpenAIClient::new(
            &config.provider.base_url,
            api_key,
            Duration::from_secs(config.completion.timeout_secs),
        )?;
        Ok(Self::new(client, &config.completion.model))
    }
}

#[async_trait]
impl AnswerSynthesizer for OpenAIChatSynthesizer {
    async fn answer(&self, question: &str, context: &[String]) -> Result<String> {
        let prompt = build_prompt(question, context);
        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .client
            .post_json("chat/completions", &body)
            .await
            .context("completion request failed")?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            bail!(
                "completion provider returned {}: {}",
                status.as_u16(),
                error_message(&text)
            );
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("malformed completion response")?;
        debug!(model = %self.model, choices = parsed.choices.len(), "completion response");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .map(|s| s.trim().to_string())
            .context("completion response had no message content")
    }
}
