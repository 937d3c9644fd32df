//! Retrieval pipeline: Building → Ready state machine plus top-k retrieval.
//!
//! A [`Pipeline`] owns an [`Embedder`] and, once built, a [`KnowledgeBase`]
//! (the frozen [`VectorIndex`] and the parallel chunk list).
//!
//! ```text
//!   Pipeline::new ──▶ Building ──build() ok──▶ Ready ──retrieve()──▶ Vec<String>
//!                        │
//!                   build() err: stays Building, nothing queryable
//! ```
//!
//! There is no transition back to Building. After Ready the knowledge base
//! is read-only, so concurrent `retrieve` calls take no locks.
//!
//! # Usage
//!
//! ```ignore
//! let pipeline = Pipeline::new(embedder);
//! pipeline.build(chunks, 1).await?;
//! let context = pipeline.retrieve("Which refunds failed last week?", 5).await?;
//! ```

use std::sync::OnceLock;

use tracing::{debug, info};

use crate::embedding::{check_dims, Embedder};
use crate::error::{EmbeddingError, RetrievalError};
use crate::index::{IndexBuilder, VectorIndex};
use crate::models::{Chunk, Hit};

/// Lifecycle state of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Building,
    Ready,
}

/// The frozen index and its parallel chunk list.
///
/// `index.len() == chunks.len()` and position `i` of the index holds the
/// embedding of `chunks[i]`.
#[derive(Debug)]
pub struct KnowledgeBase {
    index: VectorIndex,
    chunks: Vec<Chunk>,
}

impl KnowledgeBase {
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Embed every chunk in order and freeze the result.
///
/// With `batch_size <= 1` each chunk is embedded with its own provider call.
/// Larger batches are sent through [`Embedder::embed_batch`], which returns
/// vectors in input order. Any failure aborts the whole build; no partial
/// knowledge base is ever returned.
pub async fn build_index<E: Embedder + ?Sized>(
    embedder: &E,
    chunks: Vec<Chunk>,
    batch_size: usize,
) -> Result<KnowledgeBase, RetrievalError> {
    let dims = embedder.dims();
    let mut builder = IndexBuilder::with_capacity(dims, chunks.len());
    let total = chunks.len();

    if batch_size <= 1 {
        for (n, chunk) in chunks.iter().enumerate() {
            let vector = embedder.embed(&chunk.text).await?;
            check_dims(&vector, dims)?;
            builder.add(&vector)?;
            debug!(n = n + 1, total, "embedded chunk");
        }
    } else {
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let vectors = embedder.embed_batch(&texts).await?;
            if vectors.len() != texts.len() {
                return Err(EmbeddingError::Malformed(format!(
                    "expected {} embeddings, got {}",
                    texts.len(),
                    vectors.len()
                ))
                .into());
            }
            for vector in &vectors {
                check_dims(vector, dims)?;
                builder.add(vector)?;
            }
            debug!(n = builder.len(), total, "embedded batch");
        }
    }

    let index = builder.finish();
    debug_assert_eq!(index.len(), chunks.len());
    Ok(KnowledgeBase { index, chunks })
}

/// The retrieval pipeline handle shared by every request handler.
pub struct Pipeline<E: Embedder> {
    embedder: E,
    ready: OnceLock<KnowledgeBase>,
}

impl<E: Embedder> Pipeline<E> {
    /// Create a pipeline in the Building state.
    pub fn new(embedder: E) -> Self {
        Self {
            embedder,
            ready: OnceLock::new(),
        }
    }

    pub fn embedder(&self) -> &E {
        &self.embedder
    }

    pub fn state(&self) -> PipelineState {
        if self.ready.get().is_some() {
            PipelineState::Ready
        } else {
            PipelineState::Building
        }
    }

    pub fn is_ready(&self) -> bool {
        self.state() == PipelineState::Ready
    }

    /// The knowledge base, once Ready.
    pub fn knowledge_base(&self) -> Result<&KnowledgeBase, RetrievalError> {
        self.ready.get().ok_or(RetrievalError::IndexNotReady)
    }

    /// Number of indexed chunks (0 while Building).
    pub fn len(&self) -> usize {
        self.ready.get().map_or(0, KnowledgeBase::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Indexed chunks in position order (empty while Building).
    pub fn chunks(&self) -> &[Chunk] {
        match self.ready.get() {
            Some(kb) => kb.chunks(),
            None => &[],
        }
    }

    /// Embed and index `chunks`, moving the pipeline to Ready.
    ///
    /// On failure the pipeline stays in Building and the error is returned
    /// unchanged. Calling this after Ready fails with
    /// [`RetrievalError::AlreadyBuilt`].
    pub async fn build(&self, chunks: Vec<Chunk>, batch_size: usize) -> Result<(), RetrievalError> {
        if self.is_ready() {
            return Err(RetrievalError::AlreadyBuilt);
        }
        let total = chunks.len();
        info!(
            chunks = total,
            model = self.embedder.model_name(),
            batch_size,
            "building index"
        );

        let kb = build_index(&self.embedder, chunks, batch_size).await?;
        self.ready
            .set(kb)
            .map_err(|_| RetrievalError::AlreadyBuilt)?;

        info!(chunks = total, "index ready");
        Ok(())
    }

    /// Return the texts of the `k` chunks nearest to `query`, nearest first.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self
            .retrieve_hits(query, k)
            .await?
            .into_iter()
            .map(|hit| hit.text)
            .collect())
    }

    /// Like [`retrieve`](Self::retrieve) but keeps positions and distances.
    ///
    /// An empty or whitespace-only query fails before any provider call.
    pub async fn retrieve_hits(&self, query: &str, k: usize) -> Result<Vec<Hit>, RetrievalError> {
        if query.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }
        let kb = self.knowledge_base()?;

        let query_vec = self.embedder.embed(query).await?;
        let neighbors = kb.index.search(&query_vec, k)?;
        debug!(k, returned = neighbors.len(), "retrieved");

        Ok(neighbors
            .into_iter()
            .map(|n| Hit {
                position: n.position,
                distance: n.distance,
                text: kb.chunks[n.position].text.clone(),
            })
            .collect())
    }
}
