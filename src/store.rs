//! SQLite access for passages and their embeddings.

use anyhow::Result;
use sha2::{Digest, Sha256};
use sqlx::{Row, SqlitePool};
use std::sync::Arc;

use docqa_core::embedding::blob_to_vec;
use docqa_core::models::Passage;

/// Passage fields supplied by the importer; the id is assigned by SQLite.
#[derive(Debug, Clone)]
pub struct NewPassage {
    pub source_file: String,
    pub title: String,
    pub url: String,
    pub text: String,
    pub chunk_index: i64,
}

/// A passage whose embedding is missing, stale, or from another model.
#[derive(Debug, Clone)]
pub struct PendingPassage {
    pub id: i64,
    pub text: String,
    pub text_hash: String,
}

/// SHA-256 hex digest of passage text.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Insert or update a passage keyed by `(source_file, chunk_index)`.
///
/// Returns the passage id, which is stable across re-imports.
pub async fn upsert_passage<'e, E>(executor: E, passage: &NewPassage) -> Result<i64>
where
    E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
{
    let word_count = passage.text.split_whitespace().count() as i64;
    let id: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO passages (source_file, title, url, text, chunk_index, word_count, hash)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(source_file, chunk_index) DO UPDATE SET
            title = excluded.title,
            url = excluded.url,
            text = excluded.text,
            word_count = excluded.word_count,
            hash = excluded.hash
        RETURNING id
        "#,
    )
    .bind(&passage.source_file)
    .bind(&passage.title)
    .bind(&passage.url)
    .bind(&passage.text)
    .bind(passage.chunk_index)
    .bind(word_count)
    .bind(hash_text(&passage.text))
    .fetch_one(executor)
    .await?;

    Ok(id)
}

fn row_to_passage(row: &sqlx::sqlite::SqliteRow) -> Passage {
    let word_count: i64 = row.get("word_count");
    Passage {
        id: row.get("id"),
        source_file: row.get("source_file"),
        title: row.get("title"),
        url: row.get("url"),
        text: row.get("text"),
        chunk_index: row.get("chunk_index"),
        word_count: word_count.max(0) as usize,
    }
}

/// Every passage, ordered by id.
pub async fn load_passages(pool: &SqlitePool) -> Result<Vec<Arc<Passage>>> {
    let rows = sqlx::query(
        "SELECT id, source_file, title, url, text, chunk_index, word_count FROM passages ORDER BY id",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.iter().map(|r| Arc::new(row_to_passage(r))).collect())
}

/// Passages with a current embedding for `model`, paired with their vectors.
///
/// Stale vectors (content hash changed since embedding) are excluded.
pub async fn load_embedded(
    pool: &SqlitePool,
    model: &str,
) -> Result<Vec<(Arc<Passage>, Vec<f32>)>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.source_file, p.title, p.url, p.text, p.chunk_index, p.word_count,
               e.vector
        FROM passages p
        JOIN embeddings e ON e.passage_id = p.id
        WHERE e.model = ? AND e.hash = p.hash
        ORDER BY p.id
        "#,
    )
    .bind(model)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| {
            let blob: Vec<u8> = r.get("vector");
            (Arc::new(row_to_passage(r)), blob_to_vec(&blob))
        })
        .collect())
}

/// Passages needing a (re-)embedding under `model`, in id order.
pub async fn find_pending(
    pool: &SqlitePool,
    model: &str,
    limit: Option<usize>,
) -> Result<Vec<PendingPassage>> {
    let limit_val = limit.map(|l| l as i64).unwrap_or(i64::MAX);

    let rows = sqlx::query(
        r#"
        SELECT p.id, p.text, p.hash
        FROM passages p
        LEFT JOIN embeddings e ON e.passage_id = p.id
        WHERE e.passage_id IS NULL OR e.model != ? OR e.hash != p.hash
        ORDER BY p.id
        LIMIT ?
        "#,
    )
    .bind(model)
    .bind(limit_val)
    .fetch_all(pool)
    .await?;

    Ok(rows
        .iter()
        .map(|r| PendingPassage {
            id: r.get("id"),
            text: r.get("text"),
            text_hash: r.get("hash"),
        })
        .collect())
}

pub async fn upsert_embedding(
    pool: &SqlitePool,
    passage_id: i64,
    model: &str,
    dims: usize,
    text_hash: &str,
    blob: &[u8],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    sqlx::query(
        r#"
        INSERT INTO embeddings (passage_id, model, dims, hash, vector, created_at)
        VALUES (?, ?, ?, ?, ?, ?)
        ON CONFLICT(passage_id) DO UPDATE SET
            model = excluded.model,
            dims = excluded.dims,
            hash = excluded.hash,
            vector = excluded.vector,
            created_at = excluded.created_at
        "#,
    )
    .bind(passage_id)
    .bind(model)
    .bind(dims as i64)
    .bind(text_hash)
    .bind(blob)
    .bind(now)
    .execute(pool)
    .await?;

    Ok(())
}

/// Delete every stored vector. Returns the number removed.
pub async fn clear_embeddings(pool: &SqlitePool) -> Result<u64> {
    let done = sqlx::query("DELETE FROM embeddings").execute(pool).await?;
    Ok(done.rows_affected())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_text_is_sha256_hex() {
        assert_eq!(
            hash_text("abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_ne!(hash_text("a"), hash_text("b"));
    }
}
