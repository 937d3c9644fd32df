//! In-process doubles for the embedding provider and the synthesizer.

use anyhow::{bail, Result};
use async_trait::async_trait;
use merchant_insights_core::embedding::Embedder;
use merchant_insights_core::EmbeddingError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::synthesize::AnswerSynthesizer;

/// Embeds text as a 0/1 vector over a fixed keyword list.
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    calls: AtomicUsize,
    fail_with: Option<EmbeddingError>,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            calls: AtomicUsize::new(0),
            fail_with: None,
        }
    }

    /// Every call fails with `err`.
    pub fn failing(keywords: &[&'static str], err: EmbeddingError) -> Self {
        Self {
            fail_with: Some(err),
            ..Self::new(keywords)
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keyword"
    }

    fn dims(&self) -> usize {
        self.keywords.len()
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        let lower = text.to_lowercase();
        Ok(self
            .keywords
            .iter()
            .map(|k| if lower.contains(k) { 1.0 } else { 0.0 })
            .collect())
    }
}

/// Records its inputs and answers with the first context line.
#[derive(Default)]
pub struct EchoSynthesizer {
    pub seen: Mutex<Vec<(String, Vec<String>)>>,
    pub fail: bool,
}

#[async_trait]
impl AnswerSynthesizer for EchoSynthesizer {
    async fn answer(&self, question: &str, context: &[String]) -> Result<String> {
        if self.fail {
            bail!("completion provider returned 500: boom");
        }
        if let Ok(mut seen) = self.seen.lock() {
            seen.push((question.to_string(), context.to_vec()));
        }
        Ok(context.first().cloned().unwrap_or_default())
    }
}
