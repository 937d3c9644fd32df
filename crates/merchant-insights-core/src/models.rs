//! Core data types shared by the normalizer, index, and pipeline.

/// One named tabular dataset, loaded once at startup.
///
/// Every row has exactly `columns.len()` cells; [`decode_source`](crate::chunk::decode_source)
/// rejects ragged input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSource {
    /// Display name, used as the chunk prefix (e.g. `data/txn_refunds.csv`).
    pub name: String,
    /// Declared column order.
    pub columns: Vec<String>,
    /// Rows in file order.
    pub rows: Vec<Vec<String>>,
}

impl RecordSource {
    pub fn new(name: impl Into<String>, columns: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A normalized text unit derived from a single row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// Name of the originating [`RecordSource`].
    pub source: String,
    /// Zero-based row number within the source.
    pub row: usize,
    /// `"<source> | <col>: <val> | ..."`.
    pub text: String,
}

/// A retrieved chunk together with its position and distance to the query.
#[derive(Debug, Clone, PartialEq)]
pub struct Hit {
    /// Position in the index (and in the chunk list).
    pub position: usize,
    /// Squared L2 distance to the query vector.
    pub distance: f32,
    /// Chunk text at `position`.
    pub text: String,
}
