//! Okapi BM25 lexical scoring over the full passage corpus.
//!
//! A [`LexicalIndex`] is built once from every passage and is read-only
//! afterwards. When the corpus changes, build a new index and swap it in
//! (see [`crate::engine::LexicalIndexHandle`]); there is no incremental
//! update.
//!
//! # Scoring
//!
//! For a query token `t` and passage `d`:
//!
//! ```text
//! idf(t)   = ln((N - n_t + 0.5) / (n_t + 0.5))
//! score(d) = Σ_t idf(t) · f(t,d)·(k1 + 1) / (f(t,d) + k1·(1 - b + b·|d| / avgdl))
//! ```
//!
//! Terms occurring in more than half the corpus get a negative idf; those are
//! replaced by `epsilon × mean idf`, floored at zero so scores are never
//! negative. Query tokens are not deduplicated: a repeated token counts twice.

use std::collections::HashMap;
use std::sync::Arc;

use crate::models::Passage;
use crate::text::tokenize;

/// BM25 tuning constants.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bm25Params {
    pub k1: f64,
    pub b: f64,
    /// Fraction of the mean idf substituted for negative idf values.
    pub epsilon: f64,
}

impl Default for Bm25Params {
    fn default() -> Self {
        Self {
            k1: 1.5,
            b: 0.75,
            epsilon: 0.25,
        }
    }
}

/// Term statistics over a passage corpus.
#[derive(Debug, Clone)]
pub struct LexicalIndex {
    params: Bm25Params,
    ids: Vec<i64>,
    positions: HashMap<i64, usize>,
    term_freqs: Vec<HashMap<String, u32>>,
    doc_lens: Vec<usize>,
    avg_doc_len: f64,
    idf: HashMap<String, f64>,
}

impl LexicalIndex {
    /// An index over no passages. Every query scores empty.
    pub fn empty() -> Self {
        Self::build(std::iter::empty::<(i64, &str)>())
    }

    /// Build an index from `(passage_id, text)` pairs with default parameters.
    pub fn build<'a, I>(docs: I) -> Self
    where
        I: IntoIterator<Item = (i64, &'a str)>,
    {
        Self::with_params(docs, Bm25Params::default())
    }

    /// Build an index over shared passages.
    pub fn from_passages(passages: &[Arc<Passage>]) -> Self {
        Self::build(passages.iter().map(|p| (p.id, p.text.as_str())))
    }

    /// Build an index with explicit BM25 parameters.
    ///
    /// Passage ids are expected to be unique; a repeated id resolves to its
    /// last occurrence on lookup.
    pub fn with_params<'a, I>(docs: I, params: Bm25Params) -> Self
    where
        I: IntoIterator<Item = (i64, &'a str)>,
    {
        let mut ids = Vec::new();
        let mut positions = HashMap::new();
        let mut term_freqs = Vec::new();
        let mut doc_lens = Vec::new();
        let mut doc_counts: HashMap<String, usize> = HashMap::new();

        for (id, text) in docs {
            let tokens = tokenize(text);
            let mut freqs: HashMap<String, u32> = HashMap::new();
            for token in &tokens {
                *freqs.entry(token.clone()).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_counts.entry(term.clone()).or_insert(0) += 1;
            }
            positions.insert(id, ids.len());
            ids.push(id);
            doc_lens.push(tokens.len());
            term_freqs.push(freqs);
        }

        let n = ids.len() as f64;
        let total_len: usize = doc_lens.iter().sum();
        let avg_doc_len = if ids.is_empty() {
            0.0
        } else {
            total_len as f64 / n
        };

        let mut idf = HashMap::with_capacity(doc_counts.len());
        let mut idf_sum = 0.0;
        let mut negative = Vec::new();
        for (term, df) in doc_counts {
            let df = df as f64;
            let value = ((n - df + 0.5) / (df + 0.5)).ln();
            idf_sum += value;
            if value < 0.0 {
                negative.push(term.clone());
            }
            idf.insert(term, value);
        }
        if !idf.is_empty() {
            let floor = (params.epsilon * idf_sum / idf.len() as f64).max(0.0);
            for term in negative {
                idf.insert(term, floor);
            }
        }

        tracing::debug!(
            passages = ids.len(),
            terms = idf.len(),
            avg_doc_len,
            "built lexical index"
        );

        Self {
            params,
            ids,
            positions,
            term_freqs,
            doc_lens,
            avg_doc_len,
            idf,
        }
    }

    /// Number of indexed passages.
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn contains(&self, passage_id: i64) -> bool {
        self.positions.contains_key(&passage_id)
    }

    /// The (possibly floored) idf of a term; `0.0` for unseen terms.
    pub fn idf(&self, term: &str) -> f64 {
        self.idf.get(term).copied().unwrap_or(0.0)
    }

    /// Score every indexed passage against `query`, in index order.
    pub fn scores(&self, query: &str) -> Vec<(i64, f64)> {
        let raw = self.raw_scores(query);
        self.ids.iter().copied().zip(raw).collect()
    }

    /// Score every indexed passage, keyed by passage id.
    pub fn score_map(&self, query: &str) -> HashMap<i64, f64> {
        let raw = self.raw_scores(query);
        self.positions
            .iter()
            .map(|(id, &pos)| (*id, raw[pos]))
            .collect()
    }

    /// Score one passage; `0.0` when the index has never seen `passage_id`.
    pub fn score(&self, query: &str, passage_id: i64) -> f64 {
        match self.positions.get(&passage_id) {
            Some(&pos) => {
                let tokens = tokenize(query);
                self.score_doc(&tokens, pos)
            }
            None => 0.0,
        }
    }

    fn raw_scores(&self, query: &str) -> Vec<f64> {
        let tokens = tokenize(query);
        (0..self.ids.len())
            .map(|pos| self.score_doc(&tokens, pos))
            .collect()
    }

    fn score_doc(&self, query_tokens: &[String], pos: usize) -> f64 {
        if self.avg_doc_len <= 0.0 {
            return 0.0;
        }
        let Bm25Params { k1, b, .. } = self.params;
        let len_norm = 1.0 - b + b * self.doc_lens[pos] as f64 / self.avg_doc_len;
        let freqs = &self.term_freqs[pos];

        query_tokens
            .iter()
            .map(|t| {
                let f = freqs.get(t).copied().unwrap_or(0) as f64;
                if f == 0.0 {
                    return 0.0;
                }
                self.idf(t) * f * (k1 + 1.0) / (f + k1 * len_norm)
            })
            .sum()
    }
}

impl Default for LexicalIndex {
    fn default() -> Self {
        Self::empty()
    }
}
