//! Query orchestration: baseline vs. hybrid retrieval, then synthesis.
//!
//! | Mode | Pipeline |
//! |------|----------|
//! | [`Mode::Baseline`] | `search(q, k)` → synthesize |
//! | [`Mode::Hybrid`] | `search(q, candidate_k)` → fuse → truncate to `k` → synthesize |
//!
//! Requests are validated into a [`QueryRequest`] before they reach the
//! engine, so the pipeline itself only fails when the retriever does.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::{Context, Result};
use serde::Serialize;
use thiserror::Error;

use crate::answer::{AnswerSynthesizer, DEFAULT_SIMILARITY_THRESHOLD};
use crate::fusion::{fuse, DEFAULT_ALPHA};
use crate::lexical::LexicalIndex;
use crate::models::{Passage, QueryResponse, RetrievalCandidate};
use crate::retriever::SemanticRetriever;

pub const MIN_K: usize = 1;
pub const MAX_K: usize = 50;
pub const DEFAULT_K: usize = 10;
/// Candidate pool size retrieved before fusion.
pub const DEFAULT_CANDIDATE_K: usize = 30;

/// Rejected request input.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    #[error("query cannot be empty")]
    EmptyQuery,
    #[error("unknown mode '{0}': expected 'baseline' or 'hybrid'")]
    UnknownMode(String),
}

/// Retrieval path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Semantic similarity only.
    #[default]
    Baseline,
    /// Semantic pool re-ranked with BM25 fusion.
    Hybrid,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Baseline => "baseline",
            Mode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = QueryError;

    /// Case-insensitive; `reranked` is accepted as an alias for `hybrid`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "baseline" => Ok(Mode::Baseline),
            "hybrid" | "reranked" => Ok(Mode::Hybrid),
            _ => Err(QueryError::UnknownMode(s.to_string())),
        }
    }
}

/// A validated question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryRequest {
    pub query: String,
    pub k: usize,
    pub mode: Mode,
}

impl QueryRequest {
    /// Trim the query, clamp `k` to `[MIN_K, MAX_K]`, and parse the mode.
    pub fn new(query: &str, k: i64, mode: &str) -> Result<Self, QueryError> {
        let query = query.trim();
        if query.is_empty() {
            return Err(QueryError::EmptyQuery);
        }
        let mode = mode.parse::<Mode>()?;
        Ok(Self {
            query: query.to_string(),
            k: clamp_k(k),
            mode,
        })
    }
}

/// Clamp a requested result count into `[MIN_K, MAX_K]`.
pub fn clamp_k(k: i64) -> usize {
    k.clamp(MIN_K as i64, MAX_K as i64) as usize
}

/// Tunables fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrievalParams {
    pub similarity_threshold: f64,
    pub alpha: f64,
    pub candidate_k: usize,
}

impl Default for RetrievalParams {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            alpha: DEFAULT_ALPHA,
            candidate_k: DEFAULT_CANDIDATE_K,
        }
    }
}

/// Shared owner of the current lexical index.
///
/// Readers take a cheap `Arc` snapshot and never observe a half-built index;
/// a rebuild constructs the replacement outside the lock and swaps it in.
#[derive(Debug, Default)]
pub struct LexicalIndexHandle {
    current: RwLock<Arc<LexicalIndex>>,
}

impl LexicalIndexHandle {
    pub fn new(index: LexicalIndex) -> Self {
        Self {
            current: RwLock::new(Arc::new(index)),
        }
    }

    pub fn snapshot(&self) -> Arc<LexicalIndex> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Swap in `index`, returning the one it replaced.
    pub fn replace(&self, index: LexicalIndex) -> Arc<LexicalIndex> {
        let next = Arc::new(index);
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        std::mem::replace(&mut *guard, next)
    }

    /// Build a fresh index over `passages` and swap it in.
    pub fn rebuild(&self, passages: &[Arc<Passage>]) {
        let index = LexicalIndex::from_passages(passages);
        let size = index.len();
        self.replace(index);
        tracing::info!(passages = size, "lexical index rebuilt");
    }
}

/// Sizes reported by health and stats endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStatus {
    pub vector_index_size: usize,
    pub lexical_corpus_size: usize,
}

impl EngineStatus {
    pub fn vector_index_loaded(&self) -> bool {
        self.vector_index_size > 0
    }

    pub fn lexical_index_loaded(&self) -> bool {
        self.lexical_corpus_size > 0
    }
}

/// Wires the retriever, lexical index, fusion, and synthesizer together.
pub struct QueryEngine {
    retriever: Arc<dyn SemanticRetriever>,
    lexical: LexicalIndexHandle,
    synthesizer: AnswerSynthesizer,
    params: RetrievalParams,
}

impl QueryEngine {
    pub fn new(
        retriever: Arc<dyn SemanticRetriever>,
        lexical: LexicalIndex,
        params: RetrievalParams,
    ) -> Self {
        Self {
            retriever,
            lexical: LexicalIndexHandle::new(lexical),
            synthesizer: AnswerSynthesizer::new(params.similarity_threshold),
            params,
        }
    }

    pub fn params(&self) -> RetrievalParams {
        self.params
    }

    pub fn lexical(&self) -> &LexicalIndexHandle {
        &self.lexical
    }

    pub fn status(&self) -> EngineStatus {
        EngineStatus {
            vector_index_size: self.retriever.corpus_size(),
            lexical_corpus_size: self.lexical.snapshot().len(),
        }
    }

    /// Answer one validated request.
    pub async fn ask(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let candidates = self
            .retrieve(&request.query, request.k, request.mode)
            .await?;
        let reranker_used = request.mode == Mode::Hybrid;
        let response = self
            .synthesizer
            .format_response(&request.query, &candidates, reranker_used);

        tracing::info!(
            mode = %request.mode,
            k = request.k,
            contexts = response.contexts.len(),
            answered = response.answer.is_some(),
            "query answered"
        );
        Ok(response)
    }

    /// Ranked candidates for `query`, at most `k` of them.
    pub async fn retrieve(
        &self,
        query: &str,
        k: usize,
        mode: Mode,
    ) -> Result<Vec<RetrievalCandidate>> {
        match mode {
            Mode::Baseline => {
                let hits = self
                    .retriever
                    .search(query, k)
                    .await
                    .context("semantic search failed")?;
                let mut hits = dedup_by_passage(hits);
                hits.truncate(k);
                Ok(hits)
            }
            Mode::Hybrid => {
                let pool = self
                    .retriever
                    .search(query, self.params.candidate_k)
                    .await
                    .context("semantic search failed")?;
                if pool.is_empty() {
                    return Ok(pool);
                }
                let index = self.lexical.snapshot();
                let mut fused = fuse(query, dedup_by_passage(pool), &index, self.params.alpha);
                fused.truncate(k);
                Ok(fused)
            }
        }
    }
}

/// Keep the first candidate seen for each passage id.
fn dedup_by_passage(candidates: Vec<RetrievalCandidate>) -> Vec<RetrievalCandidate> {
    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter(|c| seen.insert(c.passage.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    /// Returns a fixed ranked list, truncated to `k`.
    struct StaticRetriever {
        hits: Vec<(Arc<Passage>, f64)>,
    }

    #[async_trait]
    impl SemanticRetriever for StaticRetriever {
        async fn search(&self, _query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
            Ok(self
                .hits
                .iter()
                .take(k)
                .map(|(p, s)| RetrievalCandidate::semantic(p.clone(), *s))
                .collect())
        }

        fn corpus_size(&self) -> usize {
            self.hits.len()
        }
    }

    struct FailingRetriever;

    #[async_trait]
    impl SemanticRetriever for FailingRetriever {
        async fn search(&self, _query: &str, _k: usize) -> Result<Vec<RetrievalCandidate>> {
            anyhow::bail!("embedding backend unavailable")
        }

        fn corpus_size(&self) -> usize {
            0
        }
    }

    fn passage(id: i64, title: &str, text: &str) -> Arc<Passage> {
        Arc::new(Passage::new(id, "safety.pdf", title, "https://example.org", text, id))
    }

    fn corpus() -> Vec<Arc<Passage>> {
        vec![
            passage(1, "Overview", "Machinery safety covers many topics across industries."),
            passage(2, "ISO 13849-1", "ISO 13849-1 is an international standard for control systems."),
            passage(3, "Guards", "Fixed guards are the simplest protective measure available."),
        ]
    }

    fn engine(hits: Vec<(Arc<Passage>, f64)>, passages: &[Arc<Passage>]) -> QueryEngine {
        QueryEngine::new(
            Arc::new(StaticRetriever { hits }),
            LexicalIndex::from_passages(passages),
            RetrievalParams::default(),
        )
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("baseline".parse::<Mode>(), Ok(Mode::Baseline));
        assert_eq!("HYBRID".parse::<Mode>(), Ok(Mode::Hybrid));
        assert_eq!("reranked".parse::<Mode>(), Ok(Mode::Hybrid));
        assert_eq!(
            "vector".parse::<Mode>(),
            Err(QueryError::UnknownMode("vector".to_string()))
        );
    }

    #[test]
    fn test_request_validation() {
        assert_eq!(QueryRequest::new("   ", 5, "baseline"), Err(QueryError::EmptyQuery));
        let req = QueryRequest::new("  what is iso?  ", 0, "hybrid").expect("valid");
        assert_eq!(req.query, "what is iso?");
        assert_eq!(req.k, 1);
        assert_eq!(req.mode, Mode::Hybrid);
        assert_eq!(QueryRequest::new("q", 500, "baseline").expect("valid").k, 50);
        assert_eq!(QueryRequest::new("q", -3, "baseline").expect("valid").k, 1);
    }

    #[tokio::test]
    async fn test_empty_corpus_abstains_in_both_modes() {
        let engine = engine(Vec::new(), &[]);
        for mode in ["baseline", "hybrid"] {
            let req = QueryRequest::new("anything at all", 10, mode).expect("valid");
            let resp = engine.ask(&req).await.expect("ask");
            assert_eq!(resp.answer, None);
            assert_eq!(resp.reason, "No relevant contexts found");
            assert!(resp.contexts.is_empty());
        }
    }

    #[tokio::test]
    async fn test_baseline_uses_semantic_scores() {
        let c = corpus();
        let engine = engine(vec![(c[0].clone(), 0.65), (c[1].clone(), 0.6)], &c);
        let req = QueryRequest::new("What is ISO 13849-1?", 10, "baseline").expect("valid");
        let resp = engine.ask(&req).await.expect("ask");

        assert!(!resp.reranker_used);
        assert_eq!(resp.answer, None);
        assert_eq!(
            resp.reason,
            "Top result score (0.650) below confidence threshold (0.7)"
        );
        assert_eq!(resp.contexts[0].source, "Overview");
    }

    #[tokio::test]
    async fn test_hybrid_promotes_lexical_match_and_answers() {
        let c = corpus();
        let engine = engine(
            vec![(c[0].clone(), 0.65), (c[1].clone(), 0.64), (c[2].clone(), 0.3)],
            &c,
        );
        let req = QueryRequest::new("What is ISO 13849-1?", 2, "hybrid").expect("valid");
        let resp = engine.ask(&req).await.expect("ask");

        assert!(resp.reranker_used);
        assert_eq!(resp.contexts.len(), 2);
        assert_eq!(resp.contexts[0].source, "ISO 13849-1");
        let answer = resp.answer.expect("answered");
        assert!(answer.contains("ISO 13849-1 is an international standard"));
        assert!(answer.contains("[1] ISO 13849-1"));
    }

    #[tokio::test]
    async fn test_hybrid_draws_from_candidate_pool_then_truncates() {
        let c = corpus();
        let engine = engine(
            vec![(c[0].clone(), 0.9), (c[2].clone(), 0.8), (c[1].clone(), 0.7)],
            &c,
        );
        // k=1 in baseline never sees passage 2; hybrid fuses the whole pool.
        let baseline = engine.retrieve("iso 13849", 1, Mode::Baseline).await.expect("ok");
        assert_eq!(baseline[0].passage.id, 1);

        let hybrid = engine.retrieve("iso 13849", 1, Mode::Hybrid).await.expect("ok");
        assert_eq!(hybrid.len(), 1);
        assert!(hybrid[0].fusion.is_some());
    }

    #[tokio::test]
    async fn test_duplicate_passages_collapse() {
        let c = corpus();
        let engine = engine(vec![(c[1].clone(), 0.9), (c[1].clone(), 0.8), (c[0].clone(), 0.5)], &c);
        for mode in [Mode::Baseline, Mode::Hybrid] {
            let hits = engine.retrieve("iso", 10, mode).await.expect("ok");
            let ids: Vec<i64> = hits.iter().map(|h| h.passage.id).collect();
            assert_eq!(ids.len(), 2, "{:?}", mode);
            assert!(ids.contains(&1) && ids.contains(&2));
        }
    }

    #[tokio::test]
    async fn test_retriever_failure_propagates() {
        let engine = QueryEngine::new(
            Arc::new(FailingRetriever),
            LexicalIndex::empty(),
            RetrievalParams::default(),
        );
        let req = QueryRequest::new("anything", 5, "baseline").expect("valid");
        let err = engine.ask(&req).await.expect_err("must fail");
        assert!(format!("{:#}", err).contains("embedding backend unavailable"));
    }

    #[test]
    fn test_lexical_handle_swap() {
        let c = corpus();
        let handle = LexicalIndexHandle::new(LexicalIndex::empty());
        let before = handle.snapshot();
        handle.rebuild(&c);
        assert!(before.is_empty());
        assert_eq!(handle.snapshot().len(), 3);
        let old = handle.replace(LexicalIndex::empty());
        assert_eq!(old.len(), 3);
    }

    #[test]
    fn test_status_reports_sizes() {
        let c = corpus();
        let engine = engine(vec![(c[0].clone(), 0.5)], &c);
        let status = engine.status();
        assert_eq!(status.vector_index_size, 1);
        assert_eq!(status.lexical_corpus_size, 3);
        assert!(status.vector_index_loaded() && status.lexical_index_loaded());
    }
}
