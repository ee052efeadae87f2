//! In-memory exact vector store.
//!
//! Holds an id -> unit-vector map and ranks by brute-force inner product,
//! O(n·D) per query with a bounded heap of size k.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use tracing::debug;

use crate::embedding::Embedding;
use crate::error::VectorError;
use crate::index::{SearchResult, VectorIndex};

/// Exact cosine-similarity store keyed by i64 ids.
#[derive(Debug, Clone)]
pub struct VectorStore {
    dimension: usize,
    entries: HashMap<i64, Embedding>,
}

impl VectorStore {
    /// Create an empty store for vectors of `dimension` components.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            entries: HashMap::new(),
        }
    }

    /// Validate the dimension and normalize.
    pub fn prepare(&self, vector: &[f32]) -> Result<Embedding, VectorError> {
        if vector.len() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        Embedding::normalized(vector.to_vec())
    }

    pub fn get(&self, id: i64) -> Option<&Embedding> {
        self.entries.get(&id)
    }

    /// Every stored `(id, embedding)` pair, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &Embedding)> {
        self.entries.iter().map(|(&id, emb)| (id, emb))
    }

    /// All ids in ascending order.
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.entries.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Put back the entry that an upsert or remove displaced.
    pub fn restore(&mut self, id: i64, prior: Option<Embedding>) {
        match prior {
            Some(embedding) => {
                self.entries.insert(id, embedding);
            }
            None => {
                self.entries.remove(&id);
            }
        }
    }

    /// Insert an already-normalized embedding (snapshot decode path).
    pub(crate) fn insert_normalized(
        &mut self,
        id: i64,
        embedding: Embedding,
    ) -> Result<(), VectorError> {
        if embedding.dimension() != self.dimension {
            return Err(VectorError::DimensionMismatch {
                expected: self.dimension,
                actual: embedding.dimension(),
            });
        }
        self.entries.insert(id, embedding);
        Ok(())
    }
}

impl VectorIndex for VectorStore {
    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn upsert(&mut self, id: i64, vector: &[f32]) -> Result<Option<Embedding>, VectorError> {
        // Validate before touching the map so a bad vector changes nothing.
        let embedding = self.prepare(vector)?;

        let prior = self.entries.remove(&id);
        self.entries.insert(id, embedding);

        debug!(id = id, replaced = prior.is_some(), "Upserted vector");
        Ok(prior)
    }

    fn remove(&mut self, id: i64) -> Option<Embedding> {
        let prior = self.entries.remove(&id);
        if prior.is_some() {
            debug!(id = id, "Removed vector");
        }
        prior
    }

    fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>, VectorError> {
        let query = self.prepare(query)?;

        let k = k.min(self.entries.len());
        if k == 0 {
            return Ok(Vec::new());
        }

        // Min-heap of the k best candidates seen so far.
        let mut heap: BinaryHeap<Reverse<Ranked>> = BinaryHeap::with_capacity(k + 1);
        for (&id, embedding) in &self.entries {
            heap.push(Reverse(Ranked {
                score: query.dot(embedding),
                id,
            }));
            if heap.len() > k {
                heap.pop();
            }
        }

        let mut ranked: Vec<Ranked> = heap.into_iter().map(|Reverse(r)| r).collect();
        ranked.sort_unstable_by(|a, b| b.cmp(a));

        let results: Vec<SearchResult> = ranked
            .into_iter()
            .map(|r| SearchResult::new(r.id, r.score.clamp(-1.0, 1.0)))
            .collect();

        debug!(k = k, found = results.len(), "Search complete");
        Ok(results)
    }

    fn contains(&self, id: i64) -> bool {
        self.entries.contains_key(&id)
    }
}

/// Candidate ordered so that "greater" means a better match: higher score,
/// then lower id.
#[derive(Debug, Clone, Copy)]
struct Ranked {
    score: f32,
    id: i64,
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.score
            .total_cmp(&other.score)
            .then_with(|| other.id.cmp(&self.id))
    }
}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn random_vector(dim: usize) -> Vec<f32> {
        let mut rng = rand::rng();
        (0..dim).map(|_| rng.random_range(-1.0..1.0)).collect()
    }

    #[test]
    fn test_create_store() {
        let store = VectorStore::new(384);
        assert_eq!(store.dimension(), 384);
        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_worked_example() {
        let mut store = VectorStore::new(4);
        store.upsert(1, &[1.0, 0.0, 0.0, 0.0]).unwrap();
        store.upsert(2, &[0.0, 1.0, 0.0, 0.0]).unwrap();

        let results = store.search(&[0.9, 0.1, 0.0, 0.0], 2).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, 1);
        assert!((results[0].score - 0.994).abs() < 0.001);
        assert_eq!(results[1].id, 2);
        assert!((results[1].score - 0.110).abs() < 0.001);
    }

    #[test]
    fn test_upsert_then_self_search() {
        let mut store = VectorStore::new(32);
        for id in 0..20 {
            store.upsert(id, &random_vector(32)).unwrap();
        }
        let v = random_vector(32);
        store.upsert(99, &v).unwrap();

        let results = store.search(&v, 1).unwrap();
        assert_eq!(results[0].id, 99);
        assert!((results[0].score - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_upsert_replaces_existing() {
        let mut store = VectorStore::new(2);
        assert!(store.upsert(5, &[1.0, 0.0]).unwrap().is_none());
        let prior = store.upsert(5, &[0.0, 3.0]).unwrap();

        assert!(prior.is_some());
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(5).unwrap().values(), &[0.0, 1.0]);
    }

    #[test]
    fn test_dimension_mismatch_leaves_store_unchanged() {
        let mut store = VectorStore::new(3);
        store.upsert(1, &[1.0, 0.0, 0.0]).unwrap();

        let result = store.upsert(1, &[1.0, 0.0]);
        assert!(matches!(
            result,
            Err(VectorError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
        assert_eq!(store.get(1).unwrap().values(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn test_zero_vector_leaves_store_unchanged() {
        let mut store = VectorStore::new(2);
        store.upsert(1, &[0.0, 1.0]).unwrap();

        assert!(store.upsert(1, &[0.0, 0.0]).is_err());
        assert!(store.upsert(2, &[0.0, 0.0]).is_err());
        assert_eq!(store.len(), 1);
        assert!(store.contains(1));
    }

    #[test]
    fn test_remove() {
        let mut store = VectorStore::new(2);
        store.upsert(42, &[1.0, 1.0]).unwrap();
        assert!(store.contains(42));

        assert!(store.remove(42).is_some());
        assert!(!store.contains(42));
        assert!(store.remove(42).is_none());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_search_empty_store() {
        let store = VectorStore::new(3);
        let results = store.search(&[1.0, 0.0, 0.0], 10).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_search_rejects_bad_query() {
        let mut store = VectorStore::new(3);
        store.upsert(1, &[1.0, 0.0, 0.0]).unwrap();
        assert!(store.search(&[1.0, 0.0], 1).is_err());
        assert!(store.search(&[0.0, 0.0, 0.0], 1).is_err());
    }

    #[test]
    fn test_search_clamps_k() {
        let mut store = VectorStore::new(8);
        for id in 0..5 {
            store.upsert(id, &random_vector(8)).unwrap();
        }
        assert_eq!(store.search(&random_vector(8), 50).unwrap().len(), 5);
        assert!(store.search(&random_vector(8), 0).unwrap().is_empty());
    }

    #[test]
    fn test_search_sorted_descending() {
        let mut store = VectorStore::new(16);
        for id in 0..50 {
            store.upsert(id, &random_vector(16)).unwrap();
        }
        let results = store.search(&random_vector(16), 10).unwrap();
        assert_eq!(results.len(), 10);
        for pair in results.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[test]
    fn test_ties_broken_by_ascending_id() {
        let mut store = VectorStore::new(2);
        for id in [30, -4, 12, 7] {
            store.upsert(id, &[1.0, 1.0]).unwrap();
        }
        store.upsert(100, &[-1.0, 0.0]).unwrap();

        let results = store.search(&[2.0, 2.0], 3).unwrap();
        let ids: Vec<i64> = results.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![-4, 7, 12]);

        // Same state, same query, same answer.
        assert_eq!(store.search(&[2.0, 2.0], 3).unwrap(), results);
    }

    #[test]
    fn test_heap_matches_full_sort() {
        let mut store = VectorStore::new(12);
        for id in 0..200 {
            store.upsert(id, &random_vector(12)).unwrap();
        }
        let query = random_vector(12);
        let top = store.search(&query, 15).unwrap();

        let q = store.prepare(&query).unwrap();
        let mut all: Vec<(i64, f32)> = store.iter().map(|(id, e)| (id, q.dot(e))).collect();
        all.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

        let expected: Vec<i64> = all.iter().take(15).map(|(id, _)| *id).collect();
        let actual: Vec<i64> = top.iter().map(|r| r.id).collect();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_restore() {
        let mut store = VectorStore::new(2);
        store.upsert(1, &[1.0, 0.0]).unwrap();

        let prior = store.upsert(1, &[0.0, 1.0]).unwrap();
        store.restore(1, prior);
        assert_eq!(store.get(1).unwrap().values(), &[1.0, 0.0]);

        let prior = store.upsert(2, &[0.0, 1.0]).unwrap();
        store.restore(2, prior);
        assert!(!store.contains(2));
        assert_eq!(store.ids(), vec![1]);
    }
}
