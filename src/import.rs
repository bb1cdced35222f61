//! Passage import from a chunker's JSON output.
//!
//! The input is a JSON array of records:
//!
//! ```json
//! [
//!   {
//!     "source_file": "iso_13849.pdf",
//!     "title": "ISO 13849-1:2015 - Safety of machinery",
//!     "url": "https://www.iso.org/standard/69883.html",
//!     "text": "ISO 13849-1 is an international standard ...",
//!     "chunk_index": 0
//!   }
//! ]
//! ```
//!
//! Records are upserted by `(source_file, chunk_index)` inside one
//! transaction. Records with blank text are skipped.

use anyhow::{Context, Result};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::path::Path;

use crate::config::Config;
use crate::db;
use crate::store::{self, NewPassage};

#[derive(Debug, Clone, Deserialize)]
pub struct ImportRecord {
    pub source_file: String,
    pub title: String,
    #[serde(default)]
    pub url: String,
    pub text: String,
    pub chunk_index: i64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportSummary {
    pub records: usize,
    pub upserted: usize,
    pub skipped: usize,
}

pub fn parse_records(json: &str) -> Result<Vec<ImportRecord>> {
    serde_json::from_str(json).context("Import file must be a JSON array of passage records")
}

/// Upsert `records` in a single transaction.
pub async fn import_records(pool: &SqlitePool, records: &[ImportRecord]) -> Result<ImportSummary> {
    let mut summary = ImportSummary {
        records: records.len(),
        ..Default::default()
    };

    let mut tx = pool.begin().await?;
    for record in records {
        let text = record.text.trim();
        if text.is_empty() {
            tracing::warn!(
                source_file = %record.source_file,
                chunk_index = record.chunk_index,
                "skipping passage with blank text"
            );
            summary.skipped += 1;
            continue;
        }

        let passage = NewPassage {
            source_file: record.source_file.clone(),
            title: record.title.clone(),
            url: record.url.clone(),
            text: text.to_string(),
            chunk_index: record.chunk_index,
        };
        store::upsert_passage(&mut *tx, &passage).await?;
        summary.upserted += 1;
    }
    tx.commit().await?;

    Ok(summary)
}

pub async fn run_import(config: &Config, path: &Path) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read import file: {}", path.display()))?;
    let records = parse_records(&content)?;

    let pool = db::connect(config).await?;
    let summary = import_records(&pool, &records).await?;
    pool.close().await;

    tracing::info!(
        file = %path.display(),
        upserted = summary.upserted,
        skipped = summary.skipped,
        "import finished"
    );

    println!("import {}", path.display());
    println!("  records: {}", summary.records);
    println!("  upserted passages: {}", summary.upserted);
    println!("  skipped: {}", summary.skipped);
    println!("ok");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_records_defaults_url() {
        let records = parse_records(
            r#"[{"source_file": "a.pdf", "title": "A", "text": "Body.", "chunk_index": 2}]"#,
        )
        .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].url, "");
        assert_eq!(records[0].chunk_index, 2);
    }

    #[test]
    fn test_parse_records_rejects_object() {
        assert!(parse_records(r#"{"source_file": "a.pdf"}"#).is_err());
    }
}
