//! The semantic retrieval seam and an in-memory vector index.
//!
//! The query engine only ever talks to a [`SemanticRetriever`]; how the
//! query is embedded and how neighbours are found is up to the
//! implementation. [`VectorIndex`] is the brute-force cosine backend the app
//! crate wires behind an embedding provider.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::embedding::cosine_similarity;
use crate::models::{Passage, RetrievalCandidate};

/// Nearest-neighbour search over passage embeddings.
///
/// Results are ordered by similarity, highest first, and are deterministic
/// for a fixed corpus. Fewer than `k` results are returned only when the
/// corpus holds fewer than `k` passages.
#[async_trait]
pub trait SemanticRetriever: Send + Sync {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>>;

    /// Number of passages the retriever can return.
    fn corpus_size(&self) -> usize;
}

/// Immutable brute-force cosine index.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<(Arc<Passage>, Vec<f32>)>,
}

impl VectorIndex {
    pub fn new(entries: Vec<(Arc<Passage>, Vec<f32>)>) -> Self {
        tracing::debug!(vectors = entries.len(), "built vector index");
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` passages most similar to `query_vec`.
    ///
    /// Similarities are clamped to `[0.0, 1.0]` and NaN counts as `0.0`.
    /// Ties keep insertion order.
    pub fn nearest(&self, query_vec: &[f32], k: usize) -> Vec<RetrievalCandidate> {
        let mut scored: Vec<(usize, f64)> = self
            .entries
            .iter()
            .enumerate()
            .map(|(i, (_, v))| {
                let sim = cosine_similarity(query_vec, v);
                let sim = if sim.is_nan() { 0.0 } else { sim.clamp(0.0, 1.0) };
                (i, sim)
            })
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        scored.truncate(k);

        scored
            .into_iter()
            .map(|(i, sim)| RetrievalCandidate::semantic(self.entries[i].0.clone(), sim))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> VectorIndex {
        let p = |id: i64| Arc::new(Passage::new(id, "f.pdf", format!("T{}", id), "", "text", id));
        VectorIndex::new(vec![
            (p(1), vec![1.0, 0.0]),
            (p(2), vec![0.0, 1.0]),
            (p(3), vec![-1.0, 0.0]),
            (p(4), vec![1.0, 1.0]),
        ])
    }

    #[test]
    fn test_nearest_orders_by_similarity() {
        let hits = index().nearest(&[1.0, 0.0], 4);
        let ids: Vec<i64> = hits.iter().map(|c| c.passage.id).collect();
        assert_eq!(ids, vec![1, 4, 2, 3]);
        assert!((hits[0].semantic_score - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_clamps_negative_to_zero() {
        let hits = index().nearest(&[1.0, 0.0], 4);
        assert_eq!(hits[3].passage.id, 3);
        assert_eq!(hits[3].semantic_score, 0.0);
        assert!(hits.iter().all(|c| c.fusion.is_none()));
    }

    #[test]
    fn test_nearest_truncates_and_handles_small_corpus() {
        assert_eq!(index().nearest(&[0.0, 1.0], 2).len(), 2);
        assert_eq!(index().nearest(&[0.0, 1.0], 10).len(), 4);
        assert!(VectorIndex::default().nearest(&[1.0], 5).is_empty());
    }

    #[test]
    fn test_ties_keep_insertion_order() {
        // Zero query vector: every similarity is 0.0.
        let ids: Vec<i64> = index()
            .nearest(&[0.0, 0.0], 4)
            .iter()
            .map(|c| c.passage.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
    }
}
