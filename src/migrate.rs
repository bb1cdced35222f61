//! Idempotent schema creation.
//!
//! | Table | Contents |
//! |-------|----------|
//! | `passages` | Chunked text with source title and URL, unique per `(source_file, chunk_index)` |
//! | `embeddings` | One vector BLOB per passage, tagged with model and content hash |

use anyhow::Result;

use crate::config::Config;
use crate::db;

pub async fn run_migrations(config: &Config) -> Result<()> {
    let pool = db::connect(config).await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS passages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source_file TEXT NOT NULL,
            title TEXT NOT NULL,
            url TEXT NOT NULL DEFAULT '',
            text TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            word_count INTEGER NOT NULL,
            hash TEXT NOT NULL,
            UNIQUE(source_file, chunk_index)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS embeddings (
            passage_id INTEGER PRIMARY KEY,
            model TEXT NOT NULL,
            dims INTEGER NOT NULL,
            hash TEXT NOT NULL,
            vector BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            FOREIGN KEY (passage_id) REFERENCES passages(id)
        )
        "#,
    )
    .execute(&pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_passages_source ON passages(source_file)")
        .execute(&pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_embeddings_model ON embeddings(model)")
        .execute(&pool)
        .await?;

    tracing::info!(path = %config.db.path.display(), "schema up to date");

    pool.close().await;
    Ok(())
}
