//! SQLite-backed vocabulary store
//!
//! Uses the schema created by `vocab_common::db::init_database`. A save
//! rewrites the record's complete field set inside one transaction.

use async_trait::async_trait;
use sqlx::{Row, SqlitePool};
use vocab_common::db::{self, FieldDefinitionId, RecordId, Vocabulary, VocabularyId};

use super::{FieldValue, RecordIdentity, RecordStore, VocabularyCatalog, VocabularyRecord};
use crate::error::StoreFault;
use crate::utils::retry_on_lock;

/// Time budget for retrying a save on lock contention
pub const MAX_LOCK_WAIT_MS: u64 = 5000;

/// Record store on the shared vocabulary database
#[derive(Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn load_fields(&self, record_id: i64) -> vocab_common::Result<Vec<(FieldDefinitionId, FieldValue)>> {
        let rows = sqlx::query(
            r#"
            SELECT definition_id, language, value
            FROM field_values
            WHERE record_id = ?
            "#,
        )
        .bind(record_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let language: Option<String> = row.get("language");
                let value: String = row.get("value");
                let field_value = match language {
                    Some(language) => FieldValue::Translation { language, value },
                    None => FieldValue::Plain(value),
                };
                (FieldDefinitionId(row.get("definition_id")), field_value)
            })
            .collect())
    }

    /// One save attempt; `Ok(None)` when an existing record has vanished
    async fn save_once(&self, record: &VocabularyRecord) -> vocab_common::Result<Option<RecordId>> {
        let mut tx = self.pool.begin().await?;

        let record_id: i64 = match record.identity() {
            RecordIdentity::New => {
                sqlx::query_scalar("INSERT INTO records (vocabulary_id) VALUES (?) RETURNING id")
                    .bind(record.vocabulary_id().0)
                    .fetch_one(&mut *tx)
                    .await?
            }
            RecordIdentity::Existing(id) => {
                let result = sqlx::query(
                    "UPDATE records SET updated_at = CURRENT_TIMESTAMP WHERE id = ? AND vocabulary_id = ?",
                )
                .bind(id.0)
                .bind(record.vocabulary_id().0)
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Ok(None);
                }
                id.0
            }
        };

        sqlx::query("DELETE FROM field_values WHERE record_id = ?")
            .bind(record_id)
            .execute(&mut *tx)
            .await?;

        for (definition_id, value) in record.fields() {
            sqlx::query(
                "INSERT INTO field_values (record_id, definition_id, language, value) VALUES (?, ?, ?, ?)",
            )
            .bind(record_id)
            .bind(definition_id.0)
            .bind(value.language())
            .bind(value.text())
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        Ok(Some(RecordId(record_id)))
    }
}

#[async_trait]
impl VocabularyCatalog for SqliteRecordStore {
    async fn find_vocabulary(&self, name: &str) -> Result<Option<Vocabulary>, StoreFault> {
        Ok(db::load_vocabulary_by_name(&self.pool, name).await?)
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn find_records(
        &self,
        vocabulary_id: VocabularyId,
        field: FieldDefinitionId,
        value: &str,
    ) -> Result<Vec<VocabularyRecord>, StoreFault> {
        let ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT DISTINCT r.id
            FROM records r
            JOIN field_values v ON v.record_id = r.id
            WHERE r.vocabulary_id = ? AND v.definition_id = ? AND v.value = ?
            ORDER BY r.id
            "#,
        )
        .bind(vocabulary_id.0)
        .bind(field.0)
        .bind(value)
        .fetch_all(&self.pool)
        .await?;

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            let fields = self.load_fields(id).await?;
            records.push(VocabularyRecord::existing(RecordId(id), vocabulary_id, fields));
        }

        Ok(records)
    }

    async fn create_empty_record(&self, vocabulary_id: VocabularyId) -> Result<VocabularyRecord, StoreFault> {
        Ok(VocabularyRecord::new(vocabulary_id))
    }

    async fn save(&self, record: &VocabularyRecord) -> Result<RecordId, StoreFault> {
        let saved = retry_on_lock("save vocabulary record", MAX_LOCK_WAIT_MS, || self.save_once(record)).await?;

        match (saved, record.identity()) {
            (Some(id), _) => Ok(id),
            (None, RecordIdentity::Existing(id)) => Err(StoreFault::RecordNotFound(id)),
            (None, RecordIdentity::New) => Err(StoreFault::Unavailable("insert returned no row".to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn store_with_vocabulary() -> (SqliteRecordStore, Vocabulary) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("Failed to create in-memory database");
        db::create_schema(&pool).await.unwrap();
        let vocab = db::insert_vocabulary(&pool, "HERIS", &["herisid", "title"]).await.unwrap();
        (SqliteRecordStore::new(pool), vocab)
    }

    #[tokio::test]
    async fn test_save_new_record_and_find_it() {
        let (store, vocab) = store_with_vocabulary().await;
        let herisid = vocab.definitions[0].id;
        let title = vocab.definitions[1].id;

        let mut record = store.create_empty_record(vocab.id).await.unwrap();
        record.set_field(herisid, FieldValue::new("112518", None));
        record.set_field(title, FieldValue::new("X", Some("ger")));
        let id = store.save(&record).await.unwrap();

        let found = store.find_records(vocab.id, herisid, "112518").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), Some(id));
        assert_eq!(found[0].field(title), Some(&FieldValue::new("X", Some("ger"))));
    }

    #[tokio::test]
    async fn test_save_existing_rewrites_field_set() {
        let (store, vocab) = store_with_vocabulary().await;
        let herisid = vocab.definitions[0].id;
        let title = vocab.definitions[1].id;

        let mut record = VocabularyRecord::new(vocab.id);
        record.set_field(herisid, FieldValue::new("1", None));
        record.set_field(title, FieldValue::new("OLD", None));
        let id = store.save(&record).await.unwrap();

        let mut existing = store.find_records(vocab.id, herisid, "1").await.unwrap().remove(0);
        existing.remove_field(title);
        assert_eq!(store.save(&existing).await.unwrap(), id);

        let reloaded = store.find_records(vocab.id, herisid, "1").await.unwrap().remove(0);
        assert_eq!(reloaded.field_count(), 1);
        assert_eq!(reloaded.text(title), None);
    }

    #[tokio::test]
    async fn test_find_ignores_other_vocabularies() {
        let (store, vocab) = store_with_vocabulary().await;
        let other = db::insert_vocabulary(store.pool(), "Other", &["herisid"]).await.unwrap();

        let mut record = VocabularyRecord::new(other.id);
        record.set_field(other.definitions[0].id, FieldValue::new("112518", None));
        store.save(&record).await.unwrap();

        let found = store
            .find_records(vocab.id, vocab.definitions[0].id, "112518")
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_save_missing_existing_record_is_not_found() {
        let (store, vocab) = store_with_vocabulary().await;
        let record = VocabularyRecord::existing(RecordId(404), vocab.id, Vec::new());
        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, StoreFault::RecordNotFound(RecordId(404))));
    }

    #[tokio::test]
    async fn test_catalog_lookup() {
        let (store, vocab) = store_with_vocabulary().await;
        assert_eq!(store.find_vocabulary("HERIS").await.unwrap(), Some(vocab));
        assert_eq!(store.find_vocabulary("nope").await.unwrap(), None);
    }
}
