//! # docqa Core
//!
//! Pure retrieval-and-ranking logic for docqa: passage models, BM25 lexical
//! scoring, hybrid score fusion, confidence-gated answer synthesis, and the
//! query orchestration that wires them together.
//!
//! This crate performs no database, network, or filesystem I/O. The semantic
//! retriever is an opaque oracle behind the [`retriever::SemanticRetriever`]
//! trait; the application crate supplies an embedding-backed implementation.
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Passages, candidates, citations, answer results |
//! | [`text`] | `\w+` tokenization and sentence splitting |
//! | [`lexical`] | BM25 lexical index |
//! | [`fusion`] | Min-max normalization and weighted fusion |
//! | [`answer`] | Confidence gate, sentence extraction, citation assembly |
//! | [`embedding`] | Embedding provider trait and vector utilities |
//! | [`retriever`] | Semantic retriever trait and brute-force vector index |
//! | [`engine`] | Baseline/hybrid dispatch and index ownership |

pub mod answer;
pub mod embedding;
pub mod engine;
pub mod fusion;
pub mod lexical;
pub mod models;
pub mod retriever;
pub mod text;
