//! Shared fixtures for vocab-import integration tests

#![allow(dead_code)]

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use vocab_common::config::{AbsentValuePolicy, FieldConfig, VocabularyConfig};
use vocab_common::db::{init_database, insert_vocabulary, Vocabulary};

/// Temporary database with the HERIS vocabulary registered
///
/// Returns (TempDir, SqlitePool, Vocabulary) - TempDir must be kept alive for duration of test
pub async fn create_heris_db() -> Result<(TempDir, SqlitePool, Vocabulary)> {
    let temp_dir = TempDir::new()?;
    let pool = init_database(&temp_dir.path().join("vocabulary.db")).await?;
    let vocabulary = insert_vocabulary(&pool, "HERIS", &["herisid", "title", "note"]).await?;
    Ok((temp_dir, pool, vocabulary))
}

/// Feed folder inside `root` containing one document
pub fn write_feed(root: &Path, name: &str, json: &str) -> Result<PathBuf> {
    let folder = root.join("feeds");
    std::fs::create_dir_all(&folder)?;
    let path = folder.join(name);
    std::fs::write(&path, json)?;
    Ok(path)
}

/// `herisid` (identifier) and `title` mapping for the HERIS vocabulary
pub fn heris_settings(absent_values: AbsentValuePolicy) -> VocabularyConfig {
    VocabularyConfig {
        name: "HERIS".to_string(),
        absent_values,
        language: None,
        allow_missing_identifier: false,
        fields: vec![
            FieldConfig {
                field_name: "herisid".to_string(),
                json_path: "$.HERIS-ID".to_string(),
                identifier: true,
            },
            FieldConfig {
                field_name: "title".to_string(),
                json_path: "$.Titel".to_string(),
                identifier: false,
            },
        ],
    }
}
