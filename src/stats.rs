//! Corpus statistics.
//!
//! Used by `docqa stats` to confirm that imports and embedding runs landed:
//! passage and source counts, embedding coverage for the configured model,
//! and a per-source breakdown.

use anyhow::Result;
use sqlx::{Row, SqlitePool};

use crate::config::Config;
use crate::db;
use crate::embedding;

/// Per-source passage and embedding counts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStats {
    pub source_file: String,
    pub title: String,
    pub passages: i64,
    pub embedded: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusStats {
    pub passages: i64,
    pub sources: i64,
    /// Passages with a current embedding for the configured model.
    pub embedded: i64,
    pub by_source: Vec<SourceStats>,
}

impl CorpusStats {
    pub fn coverage_percent(&self) -> i64 {
        if self.passages > 0 {
            self.embedded * 100 / self.passages
        } else {
            0
        }
    }
}

pub async fn collect_stats(pool: &SqlitePool, model: &str) -> Result<CorpusStats> {
    let passages: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM passages")
        .fetch_one(pool)
        .await?;
    let sources: i64 = sqlx::query_scalar("SELECT COUNT(DISTINCT source_file) FROM passages")
        .fetch_one(pool)
        .await?;
    let embedded: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM embeddings e
        JOIN passages p ON p.id = e.passage_id
        WHERE e.model = ? AND e.hash = p.hash
        "#,
    )
    .bind(model)
    .fetch_one(pool)
    .await?;

    let rows = sqlx::query(
        r#"
        SELECT
            p.source_file,
            MIN(p.title) AS title,
            COUNT(p.id) AS passages,
            COUNT(e.passage_id) AS embedded
        FROM passages p
        LEFT JOIN embeddings e
            ON e.passage_id = p.id AND e.model = ? AND e.hash = p.hash
        GROUP BY p.source_file
        ORDER BY passages DESC, p.source_file
        "#,
    )
    .bind(model)
    .fetch_all(pool)
    .await?;

    let by_source = rows
        .iter()
        .map(|r| SourceStats {
            source_file: r.get("source_file"),
            title: r.get("title"),
            passages: r.get("passages"),
            embedded: r.get("embedded"),
        })
        .collect();

    Ok(CorpusStats {
        passages,
        sources,
        embedded,
        by_source,
    })
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let provider = embedding::create_provider(&config.embedding)?;
    let pool = db::connect(config).await?;
    let stats = collect_stats(&pool, provider.model_name()).await?;
    pool.close().await;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("docqa corpus stats");
    println!("==================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!("  Model:       {}", provider.model_name());
    println!();
    println!("  Sources:     {}", stats.sources);
    println!("  Passages:    {}", stats.passages);
    println!(
        "  Embedded:    {} / {} ({}%)",
        stats.embedded,
        stats.passages,
        stats.coverage_percent()
    );

    if !stats.by_source.is_empty() {
        println!();
        println!("  By source:");
        println!(
            "  {:<32} {:>9} {:>9}   {}",
            "SOURCE", "PASSAGES", "EMBEDDED", "TITLE"
        );
        println!("  {}", "-".repeat(76));
        for s in &stats.by_source {
            println!(
                "  {:<32} {:>9} {:>9}   {}",
                s.source_file, s.passages, s.embedded, s.title
            );
        }
    }
    println!();

    Ok(())
}

fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }

    #[test]
    fn test_coverage_percent() {
        let mut stats = CorpusStats {
            passages: 0,
            sources: 0,
            embedded: 0,
            by_source: Vec::new(),
        };
        assert_eq!(stats.coverage_percent(), 0);
        stats.passages = 8;
        stats.embedded = 6;
        assert_eq!(stats.coverage_percent(), 75);
    }
}
