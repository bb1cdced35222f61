//! Core data models that flow through retrieval, fusion, and synthesis.
//!
//! Passages are created once by the import pipeline and shared as
//! `Arc<Passage>`; every other type here is transient and lives for the
//! duration of a single query.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// An immutable unit of retrievable text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    /// Stable integer identifier assigned by the passage store.
    pub id: i64,
    /// File the passage was chunked from.
    pub source_file: String,
    /// Title of the source document.
    pub title: String,
    /// URL of the source document.
    pub url: String,
    /// Raw passage text.
    pub text: String,
    /// Ordinal position within the source document.
    pub chunk_index: i64,
    /// Whitespace-delimited word count of `text`.
    pub word_count: usize,
}

impl Passage {
    /// Build a passage, deriving `word_count` from the text.
    pub fn new(
        id: i64,
        source_file: impl Into<String>,
        title: impl Into<String>,
        url: impl Into<String>,
        text: impl Into<String>,
        chunk_index: i64,
    ) -> Self {
        let text = text.into();
        let word_count = text.split_whitespace().count();
        Self {
            id,
            source_file: source_file.into(),
            title: title.into(),
            url: url.into(),
            text,
            chunk_index,
            word_count,
        }
    }
}

/// Scores attached to a candidate by the fusion engine.
///
/// All four values are retained so callers can explain a fused ranking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FusionScores {
    /// Raw BM25 score of the passage (0.0 when absent from the index).
    pub lexical_score: f64,
    /// Semantic score after min-max normalization over the candidate set.
    pub normalized_semantic: f64,
    /// Lexical score after min-max normalization over the candidate set.
    pub normalized_lexical: f64,
    /// `alpha * normalized_semantic + (1 - alpha) * normalized_lexical`.
    pub fused: f64,
}

/// The score a candidate is ranked and gated by.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RankingScore {
    /// Hybrid score produced by the fusion engine.
    Fused(f64),
    /// Raw similarity from the semantic retriever; no fusion was run.
    SemanticOnly(f64),
}

impl RankingScore {
    pub fn value(self) -> f64 {
        match self {
            RankingScore::Fused(s) | RankingScore::SemanticOnly(s) => s,
        }
    }

    pub fn is_fused(self) -> bool {
        matches!(self, RankingScore::Fused(_))
    }
}

/// A passage paired with its relevance scores for one query.
#[derive(Debug, Clone)]
pub struct RetrievalCandidate {
    pub passage: Arc<Passage>,
    /// Similarity reported by the semantic retriever (higher is better).
    pub semantic_score: f64,
    /// Present only after the candidate went through fusion.
    pub fusion: Option<FusionScores>,
}

impl RetrievalCandidate {
    /// A candidate straight from the semantic retriever.
    pub fn semantic(passage: Arc<Passage>, semantic_score: f64) -> Self {
        Self {
            passage,
            semantic_score,
            fusion: None,
        }
    }

    /// The fused score when fusion ran, otherwise the semantic score.
    pub fn ranking_score(&self) -> RankingScore {
        match &self.fusion {
            Some(f) => RankingScore::Fused(f.fused),
            None => RankingScore::SemanticOnly(self.semantic_score),
        }
    }

    /// Shorthand for `ranking_score().value()`.
    pub fn score(&self) -> f64 {
        self.ranking_score().value()
    }
}

/// A user-facing excerpt of a passage that contributed to an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
    /// Source document title.
    pub source: String,
    pub url: String,
    /// Ranking score of the contributing candidate.
    pub score: f64,
    /// Passage text truncated to a short preview.
    pub text: String,
}

/// How the synthesizer terminated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Answered,
    NoCandidates,
    BelowThreshold,
    NothingExtracted,
}

/// The result of answer synthesis.
///
/// `reason` is always populated; `answer` is `Some` only when
/// `outcome` is [`Outcome::Answered`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnswerResult {
    pub answer: Option<String>,
    pub reason: String,
    pub outcome: Outcome,
    pub citations: Vec<Citation>,
}

impl AnswerResult {
    pub(crate) fn abstain(outcome: Outcome, reason: impl Into<String>) -> Self {
        Self {
            answer: None,
            reason: reason.into(),
            outcome,
            citations: Vec::new(),
        }
    }

    pub fn is_answered(&self) -> bool {
        self.outcome == Outcome::Answered
    }
}

/// One ranked passage as shown in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextExcerpt {
    pub text: String,
    pub score: f64,
    pub source: String,
    pub url: String,
}

impl From<&RetrievalCandidate> for ContextExcerpt {
    fn from(candidate: &RetrievalCandidate) -> Self {
        Self {
            text: candidate.passage.text.clone(),
            score: candidate.score(),
            source: candidate.passage.title.clone(),
            url: candidate.passage.url.clone(),
        }
    }
}

/// The full response for one question, as served over HTTP and the CLI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: Option<String>,
    pub contexts: Vec<ContextExcerpt>,
    pub reranker_used: bool,
    pub reason: String,
    pub query: String,
}
