//! `embed pending` and `embed rebuild`.
//!
//! A passage needs embedding when it has no vector, its vector came from a
//! different model, or its text hash changed since it was embedded. Batches
//! that fail are logged and counted; they do not abort the run.

use anyhow::Result;
use sqlx::SqlitePool;

use crate::config::Config;
use crate::db;
use crate::embedding::{self, EmbeddingProvider};
use crate::store::{self, PendingPassage};

/// Counts reported at the end of a backfill run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct EmbedSummary {
    pub total: usize,
    pub embedded: usize,
    pub failed: usize,
}

/// Embed passages that are missing or have stale embeddings.
pub async fn run_embed_pending(
    config: &Config,
    limit: Option<usize>,
    batch_size_override: Option<usize>,
    dry_run: bool,
) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = db::connect(config).await?;

    let pending = store::find_pending(&pool, &model_name, limit).await?;

    if dry_run {
        println!("embed pending (dry-run)");
        println!("  model: {}", model_name);
        println!("  passages needing embeddings: {}", pending.len());
        pool.close().await;
        return Ok(());
    }

    if pending.is_empty() {
        println!("embed pending");
        println!("  all passages up to date");
        pool.close().await;
        return Ok(());
    }

    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);
    let summary = embed_batches(config, &pool, provider.as_ref(), &pending, batch_size).await?;

    println!("embed pending");
    println!("  model: {}", model_name);
    println!("  total pending: {}", summary.total);
    println!("  embedded: {}", summary.embedded);
    println!("  failed: {}", summary.failed);

    pool.close().await;
    Ok(())
}

/// Delete every embedding and regenerate all of them.
pub async fn run_embed_rebuild(config: &Config, batch_size_override: Option<usize>) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let model_name = provider.model_name().to_string();
    let pool = db::connect(config).await?;

    let cleared = store::clear_embeddings(&pool).await?;
    println!("embed rebuild: cleared {} existing embeddings", cleared);

    let all = store::find_pending(&pool, &model_name, None).await?;
    if all.is_empty() {
        println!("  no passages to embed");
        pool.close().await;
        return Ok(());
    }

    let batch_size = batch_size_override.unwrap_or(config.embedding.batch_size);
    let summary = embed_batches(config, &pool, provider.as_ref(), &all, batch_size).await?;

    println!("embed rebuild");
    println!("  model: {}", model_name);
    println!("  total passages: {}", summary.total);
    println!("  embedded: {}", summary.embedded);
    println!("  failed: {}", summary.failed);

    pool.close().await;
    Ok(())
}

/// Embed `pending` in batches and store the vectors.
pub async fn embed_batches(
    config: &Config,
    pool: &SqlitePool,
    provider: &dyn EmbeddingProvider,
    pending: &[PendingPassage],
    batch_size: usize,
) -> Result<EmbedSummary> {
    let mut summary = EmbedSummary {
        total: pending.len(),
        ..Default::default()
    };

    for batch in pending.chunks(batch_size.max(1)) {
        let texts: Vec<String> = batch.iter().map(|p| p.text.clone()).collect();

        match embedding::embed_texts(provider, &config.embedding, &texts).await {
            Ok(vectors) => {
                for (item, vec) in batch.iter().zip(vectors.iter()) {
                    let blob = embedding::vec_to_blob(vec);
                    store::upsert_embedding(
                        pool,
                        item.id,
                        provider.model_name(),
                        provider.dims(),
                        &item.text_hash,
                        &blob,
                    )
                    .await?;
                    summary.embedded += 1;
                }
            }
            Err(e) => {
                tracing::warn!(batch = batch.len(), error = %e, "embedding batch failed");
                summary.failed += batch.len();
            }
        }
    }

    tracing::info!(
        total = summary.total,
        embedded = summary.embedded,
        failed = summary.failed,
        "embedding run finished"
    );
    Ok(summary)
}
