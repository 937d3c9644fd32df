//! Embedding provider trait and vector utilities.
//!
//! Defines the [`Embedder`] trait that every embedding backend implements.
//! Concrete HTTP providers live in the `merchant-insights` app crate; the
//! core only needs something that turns text into a fixed-length vector.

use async_trait::async_trait;

use crate::error::EmbeddingError;

/// Output dimensionality of `text-embedding-ada-002`.
pub const DEFAULT_DIMS: usize = 1536;

/// A text-to-vector provider.
///
/// Implementations must not retry internally and must never substitute a
/// placeholder vector on failure.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-ada-002"`).
    fn model_name(&self) -> &str;

    /// Returns the embedding vector dimensionality (e.g. `1536`).
    fn dims(&self) -> usize;

    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;

    /// Embed several texts, returning vectors in input order.
    ///
    /// The default calls [`embed`](Embedder::embed) once per text, in order,
    /// stopping at the first failure.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed(text).await?);
        }
        Ok(out)
    }
}

/// Check that `vector` has exactly `expected` components.
pub fn check_dims(vector: &[f32], expected: usize) -> Result<(), EmbeddingError> {
    if vector.len() != expected {
        return Err(EmbeddingError::DimensionMismatch {
            expected,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// Squared Euclidean distance between two vectors of equal length.
///
/// The square root is skipped: it is monotonic, so rankings are identical
/// and the index uses this metric for both build and search.
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len(), "vectors must have same length");
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}
