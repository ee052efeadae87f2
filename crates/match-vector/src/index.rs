//! Vector index trait and types.
//!
//! Defines the interface for id-keyed similarity search over unit vectors.

use serde::{Deserialize, Serialize};

use crate::embedding::Embedding;
use crate::error::VectorError;

/// Result of a vector search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Entity id
    pub id: i64,
    /// Cosine similarity in [-1, 1], higher = more similar
    pub score: f32,
}

impl SearchResult {
    pub fn new(id: i64, score: f32) -> Self {
        Self { id, score }
    }
}

/// Trait for vector indexes.
///
/// Upsert is defined as remove-then-insert: an id appears at most once, and a
/// rejected vector leaves the index unchanged.
pub trait VectorIndex: Send + Sync {
    /// Get the embedding dimension
    fn dimension(&self) -> usize;

    /// Get the number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert or replace the vector for `id`.
    /// Returns the embedding it displaced, if any.
    fn upsert(&mut self, id: i64, vector: &[f32]) -> Result<Option<Embedding>, VectorError>;

    /// Remove a vector by ID. Absent ids are a no-op.
    fn remove(&mut self, id: i64) -> Option<Embedding>;

    /// Search for the k most similar vectors.
    /// Returns results sorted by score descending, ties by ascending id.
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorError>;

    /// Check if a vector ID exists
    fn contains(&self, id: i64) -> bool;
}
