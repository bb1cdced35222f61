//! Hybrid score fusion of semantic and lexical relevance.
//!
//! # Algorithm
//!
//! 1. Score the query once against the whole [`LexicalIndex`] and look up
//!    each candidate's BM25 score by passage id (absent → `0.0`).
//! 2. Min-max normalize the semantic and the lexical vectors over exactly the
//!    candidate set being fused.
//! 3. `fused = α × semantic + (1 - α) × lexical`.
//! 4. Stable sort by fused score, descending. Equal scores keep input order.

use crate::lexical::LexicalIndex;
use crate::models::{FusionScores, RetrievalCandidate};

/// Default weight of the semantic signal.
pub const DEFAULT_ALPHA: f64 = 0.6;

/// Min-max normalize raw scores to `[0.0, 1.0]`.
///
/// If all scores are equal (including a single score), they are normalized
/// to `1.0`.
pub fn normalize_scores(scores: &[f64]) -> Vec<f64> {
    if scores.is_empty() {
        return Vec::new();
    }

    let s_min = scores.iter().copied().fold(f64::INFINITY, f64::min);
    let s_max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    if s_max == s_min {
        return vec![1.0; scores.len()];
    }
    scores.iter().map(|&s| (s - s_min) / (s_max - s_min)).collect()
}

/// Re-rank semantic candidates by fusing in BM25 scores.
///
/// Every returned candidate carries [`FusionScores`]. An empty list is
/// returned unchanged.
pub fn fuse(
    query: &str,
    candidates: Vec<RetrievalCandidate>,
    index: &LexicalIndex,
    alpha: f64,
) -> Vec<RetrievalCandidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let lexical_by_id = index.score_map(query);
    let lexical: Vec<f64> = candidates
        .iter()
        .map(|c| lexical_by_id.get(&c.passage.id).copied().unwrap_or(0.0))
        .collect();

    fuse_with_lexical(candidates, &lexical, alpha)
}

/// Fuse candidates against precomputed raw lexical scores, one per candidate
/// in input order.
///
/// Missing trailing lexical scores count as `0.0`.
pub fn fuse_with_lexical(
    candidates: Vec<RetrievalCandidate>,
    lexical: &[f64],
    alpha: f64,
) -> Vec<RetrievalCandidate> {
    if candidates.is_empty() {
        return candidates;
    }

    let semantic: Vec<f64> = candidates.iter().map(|c| c.semantic_score).collect();
    let lexical: Vec<f64> = (0..candidates.len())
        .map(|i| lexical.get(i).copied().unwrap_or(0.0))
        .collect();

    let norm_semantic = normalize_scores(&semantic);
    let norm_lexical = normalize_scores(&lexical);

    let mut fused: Vec<RetrievalCandidate> = candidates
        .into_iter()
        .enumerate()
        .map(|(i, mut c)| {
            let s = norm_semantic[i];
            let k = norm_lexical[i];
            c.fusion = Some(FusionScores {
                lexical_score: lexical[i],
                normalized_semantic: s,
                normalized_lexical: k,
                fused: alpha * s + (1.0 - alpha) * k,
            });
            c
        })
        .collect();

    fused.sort_by(|a, b| b.score().total_cmp(&a.score()));

    tracing::debug!(
        candidates = fused.len(),
        alpha,
        top = fused.first().map(|c| c.score()),
        "fused candidate scores"
    );

    fused
}
