//! Embedding-backed semantic retrieval and engine assembly.

use anyhow::{bail, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;
use std::sync::Arc;

use docqa_core::engine::QueryEngine;
use docqa_core::lexical::LexicalIndex;
use docqa_core::models::RetrievalCandidate;
use docqa_core::retriever::{SemanticRetriever, VectorIndex};

use crate::config::{Config, EmbeddingConfig};
use crate::embedding::{self, EmbeddingProvider};
use crate::store;

/// Embeds the query with the configured provider and searches a
/// [`VectorIndex`] built from stored vectors.
pub struct EmbeddingRetriever {
    provider: Box<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
    index: VectorIndex,
}

impl EmbeddingRetriever {
    pub fn new(provider: Box<dyn EmbeddingProvider>, config: EmbeddingConfig, index: VectorIndex) -> Self {
        Self {
            provider,
            config,
            index,
        }
    }

    pub fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}

#[async_trait]
impl SemanticRetriever for EmbeddingRetriever {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievalCandidate>> {
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let query_vec =
            embedding::embed_query(self.provider.as_ref(), &self.config, query).await?;
        Ok(self.index.nearest(&query_vec, k))
    }

    fn corpus_size(&self) -> usize {
        self.index.len()
    }
}

/// A ready query engine plus the facts the server and CLI report about it.
pub struct LoadedEngine {
    pub engine: QueryEngine,
    pub embedding_model: String,
    pub total_passages: usize,
}

/// Load passages and vectors from the store and build both indexes.
///
/// The lexical index covers every passage; the vector index covers those
/// with a current embedding for the configured model.
pub async fn load_engine(config: &Config, pool: &SqlitePool) -> Result<LoadedEngine> {
    let provider = embedding::create_provider(&config.embedding)?;
    let model = provider.model_name().to_string();
    let dims = provider.dims();

    let passages = store::load_passages(pool).await?;
    let mut embedded = store::load_embedded(pool, &model).await?;

    let before = embedded.len();
    embedded.retain(|(_, v)| v.len() == dims);
    if embedded.len() < before {
        tracing::warn!(
            dropped = before - embedded.len(),
            dims,
            "ignoring stored vectors with mismatched dimensions"
        );
    }
    if embedded.len() < passages.len() {
        tracing::warn!(
            embedded = embedded.len(),
            passages = passages.len(),
            "some passages have no current embedding; run `docqa embed pending`"
        );
    }

    let lexical = LexicalIndex::from_passages(&passages);
    let retriever = EmbeddingRetriever::new(provider, config.embedding.clone(), VectorIndex::new(embedded));
    let engine = QueryEngine::new(Arc::new(retriever), lexical, config.retrieval_params());

    tracing::info!(
        passages = passages.len(),
        vectors = engine.status().vector_index_size,
        model = %model,
        "query engine ready"
    );

    Ok(LoadedEngine {
        engine,
        embedding_model: model,
        total_passages: passages.len(),
    })
}

/// Like [`load_engine`], but fails when no passage has an embedding.
pub async fn load_serving_engine(config: &Config, pool: &SqlitePool) -> Result<LoadedEngine> {
    let loaded = load_engine(config, pool).await?;
    if !loaded.engine.status().vector_index_loaded() {
        bail!(
            "No embedded passages found for model '{}'. Run `docqa import` and `docqa embed pending` first.",
            loaded.embedding_model
        );
    }
    Ok(loaded)
}
