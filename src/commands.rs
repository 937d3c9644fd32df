//! Startup and one-shot CLI commands.
//!
//! Every command that needs the index goes through [`build_pipeline`]:
//! load sources, normalize rows into chunks, embed them, and only then
//! hand out a Ready pipeline. A failure at any step is fatal.

use anyhow::{Context, Result};
use merchant_insights_core::chunk::{chunk_sources, corpus_fingerprint};
use merchant_insights_core::embedding::Embedder;
use merchant_insights_core::models::{Chunk, Hit};
use merchant_insights_core::Pipeline;
use std::time::Instant;
use tracing::info;

use crate::config::Config;
use crate::embedding::OpenAIEmbedder;
use crate::sources::load_sources;
use crate::synthesize::{AnswerSynthesizer, OpenAIChatSynthesizer};

/// Read every configured source and normalize it into chunks.
pub fn load_chunks(config: &Config) -> Result<Vec<Chunk>> {
    let sources = load_sources(&config.sources)?;
    let chunks = chunk_sources(&sources);
    info!(
        sources = sources.len(),
        chunks = chunks.len(),
        "normalized sources"
    );
    Ok(chunks)
}

/// Build a Ready pipeline over the configured sources with `embedder`.
pub async fn build_pipeline<E: Embedder>(config: &Config, embedder: E) -> Result<Pipeline<E>> {
    let chunks = load_chunks(config)?;
    let fingerprint = corpus_fingerprint(&chunks);
    let started = Instant::now();

    let pipeline = Pipeline::new(embedder);
    pipeline
        .build(chunks, config.embedding.batch_size)
        .await
        .context("failed to build the retrieval index")?;

    info!(
        chunks = pipeline.len(),
        model = pipeline.embedder().model_name(),
        corpus = %&fingerprint[..12],
        elapsed_ms = started.elapsed().as_millis() as u64,
        "pipeline ready"
    );
    Ok(pipeline)
}

/// Print normalized chunks without contacting the provider.
pub fn run_chunks(config: &Config, limit: Option<usize>) -> Result<()> {
    let chunks = load_chunks(config)?;
    let shown = limit.unwrap_or(chunks.len()).min(chunks.len());
    for chunk in &chunks[..shown] {
        println!("{}", chunk.text);
    }
    println!();
    println!(
        "{} chunk(s), showing {}. corpus {}",
        chunks.len(),
        shown,
        corpus_fingerprint(&chunks)
    );
    Ok(())
}

/// Print the chunks nearest to `query`, nearest first.
pub async fn run_retrieve(config: &Config, query: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    let pipeline = build_pipeline(config, OpenAIEmbedder::from_config(config)?).await?;
    let hits = pipeline.retrieve_hits(query, k).await?;
    print!("{}", format_hits(&hits));
    Ok(())
}

/// Retrieve context for `question` and print the synthesized answer.
pub async fn run_ask(config: &Config, question: &str, k: Option<usize>) -> Result<()> {
    let k = k.unwrap_or(config.retrieval.top_k);
    let pipeline = build_pipeline(config, OpenAIEmbedder::from_config(config)?).await?;
    let synthesizer = OpenAIChatSynthesizer::from_config(config)?;
    let answer = ask(&pipeline, &synthesizer, question, k).await?;
    println!("{}", answer);
    Ok(())
}

/// Retrieve the top `k` chunks and synthesize an answer from them.
pub async fn ask<E: Embedder, S: AnswerSynthesizer + ?Sized>(
    pipeline: &Pipeline<E>,
    synthesizer: &S,
    question: &str,
    k: usize,
) -> Result<String> {
    let context = pipeline.retrieve(question, k).await?;
    synthesizer.answer(question, &context).await
}

/// One line per hit: rank, distance, text.
pub fn format_hits(hits: &[Hit]) -> String {
    if hits.is_empty() {
        return "No results.\n".to_string();
    }
    hits.iter()
        .enumerate()
        .map(|(i, hit)| format!("{:>3}. [{:.4}] {}\n", i + 1, hit.distance, hit.text))
        .collect()
}
