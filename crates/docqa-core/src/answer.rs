//! Confidence-gated extractive answer synthesis.
//!
//! The synthesizer never generates text. It either abstains with a
//! diagnostic reason or stitches together query-relevant sentences lifted
//! verbatim from the top-ranked passages, followed by a numbered source list.
//!
//! # States
//!
//! | Outcome | When |
//! |---------|------|
//! | [`Outcome::NoCandidates`] | empty candidate list |
//! | [`Outcome::BelowThreshold`] | top ranking score `< threshold` |
//! | [`Outcome::NothingExtracted`] | no sentence survived extraction |
//! | [`Outcome::Answered`] | otherwise |
//!
//! Only the first [`MAX_CONTEXTS`] candidates are read, and any of them
//! scoring below `SUPPORTING_RATIO × threshold` is skipped. Each contributing
//! passage yields at most [`SENTENCES_PER_CONTEXT`] sentences and exactly one
//! citation. Citations are numbered in the order passages contributed.

use std::collections::HashSet;

use crate::models::{AnswerResult, Citation, ContextExcerpt, Outcome, QueryResponse, RetrievalCandidate};
use crate::text::{split_sentences, token_set};

/// Default confidence gate on the top-ranked score.
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// Number of top candidates considered for extraction.
pub const MAX_CONTEXTS: usize = 3;

/// Supporting candidates must score at least this fraction of the threshold.
pub const SUPPORTING_RATIO: f64 = 0.7;

/// Sentences kept per contributing passage.
pub const SENTENCES_PER_CONTEXT: usize = 2;

/// Sentences of this many characters or fewer are dropped.
pub const MIN_SENTENCE_CHARS: usize = 20;

/// Citation previews are cut to this many characters.
pub const PREVIEW_CHARS: usize = 200;

/// Stateless answer synthesizer configured with a confidence threshold.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnswerSynthesizer {
    threshold: f64,
}

impl Default for AnswerSynthesizer {
    fn default() -> Self {
        Self::new(DEFAULT_SIMILARITY_THRESHOLD)
    }
}

impl AnswerSynthesizer {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Answer `query` from ranked candidates, or abstain with a reason.
    ///
    /// `candidates` must already be ordered best-first.
    pub fn synthesize(&self, query: &str, candidates: &[RetrievalCandidate]) -> AnswerResult {
        let Some(top) = candidates.first() else {
            return AnswerResult::abstain(Outcome::NoCandidates, "No relevant contexts found");
        };

        let top_score = top.score();
        if top_score < self.threshold {
            return AnswerResult::abstain(
                Outcome::BelowThreshold,
                format!(
                    "Top result score ({:.3}) below confidence threshold ({})",
                    top_score, self.threshold
                ),
            );
        }

        let supporting_bar = self.threshold * SUPPORTING_RATIO;
        let mut sentences: Vec<&str> = Vec::new();
        let mut citations: Vec<Citation> = Vec::new();

        for candidate in candidates.iter().take(MAX_CONTEXTS) {
            let score = candidate.score();
            if score < supporting_bar {
                continue;
            }

            let extracted = extract_relevant_sentences(query, &candidate.passage.text);
            if extracted.is_empty() {
                continue;
            }

            sentences.extend(extracted);
            citations.push(Citation {
                source: candidate.passage.title.clone(),
                url: candidate.passage.url.clone(),
                score,
                text: preview(&candidate.passage.text),
            });
        }

        if sentences.is_empty() {
            return AnswerResult::abstain(
                Outcome::NothingExtracted,
                "No relevant information found in contexts",
            );
        }

        let mut answer = dedup_sentences(sentences).join(" ");
        let refs: Vec<String> = citations
            .iter()
            .enumerate()
            .map(|(i, c)| format!("[{}] {}", i + 1, c.source))
            .collect();
        answer.push_str("\n\nSources: ");
        answer.push_str(&refs.join(", "));

        tracing::debug!(
            sources = citations.len(),
            top_score,
            "answer synthesized"
        );

        AnswerResult {
            answer: Some(answer),
            reason: format!(
                "Answer generated from {} sources with top score {:.3}",
                citations.len(),
                top_score
            ),
            outcome: Outcome::Answered,
            citations,
        }
    }

    /// Synthesize and package the full response surface for `query`.
    ///
    /// Every candidate is listed as a context, not only the ones cited.
    pub fn format_response(
        &self,
        query: &str,
        candidates: &[RetrievalCandidate],
        reranker_used: bool,
    ) -> QueryResponse {
        let result = self.synthesize(query, candidates);
        QueryResponse {
            answer: result.answer,
            contexts: candidates.iter().map(ContextExcerpt::from).collect(),
            reranker_used,
            reason: result.reason,
            query: query.to_string(),
        }
    }
}

/// Pick up to [`SENTENCES_PER_CONTEXT`] sentences of `text` sharing the most
/// words with `query`.
///
/// Sentences are ranked by distinct-token overlap (ties keep text order),
/// then the top picks are kept only if they overlap at all and are longer
/// than [`MIN_SENTENCE_CHARS`].
pub fn extract_relevant_sentences<'a>(query: &str, text: &'a str) -> Vec<&'a str> {
    let query_tokens = token_set(query);

    let mut scored: Vec<(&str, usize)> = split_sentences(text)
        .into_iter()
        .map(|s| {
            let overlap = token_set(s).intersection(&query_tokens).count();
            (s, overlap)
        })
        .collect();
    scored.sort_by(|a, b| b.1.cmp(&a.1));

    scored
        .into_iter()
        .take(SENTENCES_PER_CONTEXT)
        .filter(|(s, overlap)| *overlap > 0 && s.chars().count() > MIN_SENTENCE_CHARS)
        .map(|(s, _)| s)
        .collect()
}

/// Drop exact-duplicate sentences, keeping first occurrences in order.
pub fn dedup_sentences<'a, I>(sentences: I) -> Vec<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen = HashSet::new();
    sentences.into_iter().filter(|s| seen.insert(*s)).collect()
}

fn preview(text: &str) -> String {
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
