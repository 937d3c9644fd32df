//! Exact (flat) L2 vector index.
//!
//! Vectors are stored contiguously in one `Vec<f32>`, row-major, so
//! position `i` occupies `data[i * dims .. (i + 1) * dims]`. Positions are
//! insertion indices and never change.
//!
//! Construction is split in two types so the "append-only, then frozen"
//! lifecycle is enforced by the compiler:
//!
//! - [`IndexBuilder`] accepts vectors and cannot be searched.
//! - [`VectorIndex`] is produced by [`IndexBuilder::finish`], can be
//!   searched, and has no mutating methods.
//!
//! # Search
//!
//! [`VectorIndex::search`] scans every vector, computes the squared L2
//! distance to the query, and keeps the `k` best in a bounded max-heap.
//! Results are ordered nearest first; equal distances are ordered by
//! position (lower first).

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use crate::embedding::squared_l2;
use crate::error::IndexError;

/// A search result: a position and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

impl Ord for Neighbor {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.position.cmp(&other.position))
    }
}

impl PartialOrd for Neighbor {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Neighbor {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Neighbor {}

/// Append-only accumulator for index vectors.
#[derive(Debug)]
pub struct IndexBuilder {
    dims: usize,
    data: Vec<f32>,
}

impl IndexBuilder {
    pub fn new(dims: usize) -> Self {
        Self {
            dims,
            data: Vec::new(),
        }
    }

    pub fn with_capacity(dims: usize, vectors: usize) -> Self {
        Self {
            dims,
            data: Vec::with_capacity(dims * vectors),
        }
    }

    /// Append a vector, returning its position.
    pub fn add(&mut self, vector: &[f32]) -> Result<usize, IndexError> {
        if vector.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: vector.len(),
            });
        }
        let position = self.len();
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn len(&self) -> usize {
        if self.dims == 0 {
            0
        } else {
            self.data.len() / self.dims
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Freeze the builder into a searchable index.
    pub fn finish(self) -> VectorIndex {
        let len = self.len();
        VectorIndex {
            dims: self.dims,
            len,
            data: self.data,
        }
    }
}

/// Immutable, searchable flat L2 index.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dims: usize,
    len: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// The stored vector at `position`, if any.
    pub fn vector(&self, position: usize) -> Option<&[f32]> {
        if position >= self.len {
            return None;
        }
        let start = position * self.dims;
        Some(&self.data[start..start + self.dims])
    }

    /// Return up to `k` nearest positions, nearest first.
    ///
    /// Returns `min(k, len)` results and never pads. An empty index returns
    /// an empty result for any `k`, regardless of the query's length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(IndexError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let k = k.min(self.len);
        // Max-heap on (distance, position): the root is the worst of the
        // current best k, so it is the one evicted.
        let mut best: BinaryHeap<Neighbor> = BinaryHeap::with_capacity(k + 1);

        for (position, stored) in self.data.chunks_exact(self.dims).enumerate() {
            let candidate = Neighbor {
                position,
                distance: squared_l2(query, stored),
            };
            if best.len() < k {
                best.push(candidate);
            } else if let Some(worst) = best.peek() {
                if candidate < *worst {
                    best.pop();
                    best.push(candidate);
                }
            }
        }

        Ok(best.into_sorted_vec())
    }
}
