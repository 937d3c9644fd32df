//! # Merchant Insights Core
//!
//! The retrieval core for Merchant Insights: record normalization, the
//! embedding trait, an exact L2 vector index, and the Building → Ready
//! retrieval pipeline.
//!
//! This crate contains no tokio, HTTP client, or filesystem I/O. Concrete
//! embedding providers and the serving layer live in the `merchant-insights`
//! app crate.
//!
//! ```text
//! CSV bytes ─decode_source─▶ RecordSource ─chunk_sources─▶ Vec<Chunk>
//!                                                              │
//!                                         Embedder::embed ◀────┤ build
//!                                                              ▼
//! query ─Embedder::embed─▶ VectorIndex::search ─▶ positions ─▶ chunk texts
//! ```

pub mod chunk;
pub mod embedding;
pub mod error;
pub mod index;
pub mod models;
pub mod pipeline;

pub use error::{EmbeddingError, IndexError, RetrievalError, SourceReadError};
pub use pipeline::{Pipeline, PipelineState};
