//! Error taxonomy for the retrieval pipeline.
//!
//! Errors are split by where they can occur so callers can tell
//! fatal-at-startup conditions apart from recoverable query-time ones:
//!
//! | Type | Raised by | Startup | Query time |
//! |------|-----------|---------|------------|
//! | [`SourceReadError`] | record decoding | fatal | n/a |
//! | [`EmbeddingError`] | [`Embedder`](crate::embedding::Embedder) | fatal | surfaced |
//! | [`IndexError`] | [`VectorIndex`](crate::index::VectorIndex) | fatal | surfaced |
//! | [`RetrievalError`] | [`Pipeline`](crate::pipeline::Pipeline) | wraps | wraps |

use thiserror::Error;

/// A record source could not be read or decoded.
#[derive(Debug, Error)]
pub enum SourceReadError {
    /// The underlying file could not be read.
    #[error("failed to read source '{name}': {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The decoded text is not valid CSV (bad quoting, ...).
    #[error("failed to parse source '{name}' as CSV: {source}")]
    Csv {
        name: String,
        #[source]
        source: csv::Error,
    },

    /// A row has more fields than the header declares.
    #[error("source '{name}' line {line} has {found} fields, header declares {expected}")]
    ExtraFields {
        name: String,
        line: u64,
        found: usize,
        expected: usize,
    },

    /// The source has no header row, so it declares no columns.
    #[error("source '{name}' has no header row")]
    Empty { name: String },
}

impl SourceReadError {
    /// Name of the source that failed.
    pub fn source_name(&self) -> &str {
        match self {
            Self::Io { name, .. }
            | Self::Csv { name, .. }
            | Self::ExtraFields { name, .. }
            | Self::Empty { name } => name,
        }
    }
}

/// A call to the external embedding provider failed.
///
/// Providers never substitute a zero vector or a cached value; every
/// failure ends up here.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmbeddingError {
    #[error("embedding input must not be empty")]
    EmptyInput,

    #[error("embedding provider rejected credentials: {0}")]
    Auth(String),

    #[error("embedding provider rate limited the request: {0}")]
    RateLimited(String),

    #[error("embedding request timed out: {0}")]
    Timeout(String),

    #[error("embedding provider unreachable: {0}")]
    Network(String),

    #[error("embedding provider error {status}: {message}")]
    Provider { status: u16, message: String },

    #[error("malformed embedding response: {0}")]
    Malformed(String),

    #[error("embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// The vector index rejected an operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    #[error("vector has {actual} dimensions, index expects {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Any failure surfaced by the retrieval pipeline.
///
/// Inner errors are carried unchanged so callers see the underlying kind.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error(transparent)]
    SourceRead(#[from] SourceReadError),

    #[error(transparent)]
    Embedding(#[from] EmbeddingError),

    #[error(transparent)]
    Index(#[from] IndexError),

    #[error("query must not be empty")]
    EmptyQuery,

    #[error("index is still building")]
    IndexNotReady,

    #[error("index has already been built")]
    AlreadyBuilt,
}

impl RetrievalError {
    /// Whether this error, if raised during startup, must abort the process.
    ///
    /// Everything except a misuse of the query path is fatal while building.
    pub fn is_fatal_at_startup(&self) -> bool {
        !matches!(self, Self::EmptyQuery)
    }

    /// Whether a caller may reasonably retry the same request later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::IndexNotReady
                | Self::Embedding(
                    EmbeddingError::RateLimited(_)
                        | EmbeddingError::Timeout(_)
                        | EmbeddingError::Network(_)
                )
        )
    }
}
