//! Vocabulary catalogue queries

use crate::db::models::{FieldDefinition, FieldDefinitionId, Vocabulary, VocabularyId};
use crate::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Register a vocabulary and its field definitions
///
/// Schema management is owned by the vocabulary administration tooling; this
/// is provided for provisioning and tests.
pub async fn insert_vocabulary(
    pool: &SqlitePool,
    name: &str,
    field_names: &[&str],
) -> Result<Vocabulary> {
    if name.trim().is_empty() {
        return Err(Error::InvalidInput("vocabulary name is empty".to_string()));
    }

    let mut tx = pool.begin().await?;

    let vocabulary_id: i64 = sqlx::query_scalar("INSERT INTO vocabularies (name) VALUES (?) RETURNING id")
        .bind(name)
        .fetch_one(&mut *tx)
        .await?;

    let mut definitions = Vec::with_capacity(field_names.len());
    for (position, field_name) in field_names.iter().enumerate() {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO field_definitions (vocabulary_id, name, position) VALUES (?, ?, ?) RETURNING id",
        )
        .bind(vocabulary_id)
        .bind(*field_name)
        .bind(position as i64)
        .fetch_one(&mut *tx)
        .await?;

        definitions.push(FieldDefinition {
            id: FieldDefinitionId(id),
            name: field_name.to_string(),
        });
    }

    tx.commit().await?;

    tracing::info!(vocabulary = name, fields = definitions.len(), "Vocabulary registered");

    Ok(Vocabulary {
        id: VocabularyId(vocabulary_id),
        name: name.to_string(),
        definitions,
    })
}

/// Load a vocabulary and its schema by name
pub async fn load_vocabulary_by_name(pool: &SqlitePool, name: &str) -> Result<Option<Vocabulary>> {
    let vocabulary_id: Option<i64> = sqlx::query_scalar("SELECT id FROM vocabularies WHERE name = ?")
        .bind(name)
        .fetch_optional(pool)
        .await?;

    let Some(vocabulary_id) = vocabulary_id else {
        return Ok(None);
    };

    let rows = sqlx::query(
        r#"
        SELECT id, name
        FROM field_definitions
        WHERE vocabulary_id = ?
        ORDER BY position, id
        "#,
    )
    .bind(vocabulary_id)
    .fetch_all(pool)
    .await?;

    let definitions = rows
        .iter()
        .map(|row| FieldDefinition {
            id: FieldDefinitionId(row.get("id")),
            name: row.get("name"),
        })
        .collect();

    Ok(Some(Vocabulary {
        id: VocabularyId(vocabulary_id),
        name: name.to_string(),
        definitions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_schema;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        create_schema(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_insert_and_load_vocabulary() {
        let pool = memory_pool().await;

        let created = insert_vocabulary(&pool, "HERIS", &["herisid", "title", "type"])
            .await
            .unwrap();

        let loaded = load_vocabulary_by_name(&pool, "HERIS")
            .await
            .unwrap()
            .expect("vocabulary not found");

        assert_eq!(loaded, created);
        let names: Vec<&str> = loaded.definitions.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["herisid", "title", "type"]);
        assert_eq!(loaded.definition_by_name("title").map(|d| d.id), Some(created.definitions[1].id));
    }

    #[tokio::test]
    async fn test_unknown_vocabulary_is_none() {
        let pool = memory_pool().await;
        assert!(load_vocabulary_by_name(&pool, "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_vocabulary_name_rejected() {
        let pool = memory_pool().await;
        insert_vocabulary(&pool, "HERIS", &["herisid"]).await.unwrap();
        let err = insert_vocabulary(&pool, "HERIS", &["herisid"]).await.unwrap_err();
        assert!(matches!(err, Error::Database(_)));
    }
}
