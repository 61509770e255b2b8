//! In-memory vocabulary store used by unit tests

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard};
use vocab_common::db::{FieldDefinition, FieldDefinitionId, RecordId, Vocabulary, VocabularyId};

use super::{FieldValue, RecordIdentity, RecordStore, VocabularyCatalog, VocabularyRecord};
use crate::error::StoreFault;

#[derive(Default)]
struct Inner {
    vocabularies: Vec<Vocabulary>,
    records: BTreeMap<RecordId, VocabularyRecord>,
    next_vocabulary_id: i64,
    next_definition_id: i64,
    next_record_id: i64,
    save_count: usize,
    fail_saves: bool,
}

/// Store keeping vocabularies and records in process memory
#[derive(Default)]
pub struct InMemoryStore {
    inner: Mutex<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn inner(&self) -> MutexGuard<'_, Inner> {
        // A panicked test thread must not wedge the store for the others
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register a vocabulary with the given field names
    pub fn add_vocabulary(&self, name: &str, field_names: &[&str]) -> Vocabulary {
        let mut inner = self.inner();
        inner.next_vocabulary_id += 1;
        let id = VocabularyId(inner.next_vocabulary_id);

        let mut definitions = Vec::with_capacity(field_names.len());
        for field_name in field_names {
            inner.next_definition_id += 1;
            definitions.push(FieldDefinition {
                id: FieldDefinitionId(inner.next_definition_id),
                name: field_name.to_string(),
            });
        }

        let vocabulary = Vocabulary {
            id,
            name: name.to_string(),
            definitions,
        };
        inner.vocabularies.push(vocabulary.clone());
        vocabulary
    }

    /// Insert a persisted record directly, bypassing `save`
    pub fn insert_record(&self, vocabulary_id: VocabularyId, fields: &[(FieldDefinitionId, &str)]) -> RecordId {
        let mut inner = self.inner();
        inner.next_record_id += 1;
        let id = RecordId(inner.next_record_id);
        let record = VocabularyRecord::existing(
            id,
            vocabulary_id,
            fields
                .iter()
                .map(|(definition, value)| (*definition, FieldValue::Plain(value.to_string()))),
        );
        inner.records.insert(id, record);
        id
    }

    pub fn record(&self, id: RecordId) -> Option<VocabularyRecord> {
        self.inner().records.get(&id).cloned()
    }

    /// All records of a vocabulary in id order
    pub fn records(&self, vocabulary_id: VocabularyId) -> Vec<VocabularyRecord> {
        self.inner()
            .records
            .values()
            .filter(|r| r.vocabulary_id() == vocabulary_id)
            .cloned()
            .collect()
    }

    /// Number of successful `save` calls
    pub fn save_count(&self) -> usize {
        self.inner().save_count
    }

    /// Make every subsequent `save` fail with [`StoreFault::Unavailable`]
    pub fn fail_saves(&self, fail: bool) {
        self.inner().fail_saves = fail;
    }
}

#[async_trait]
impl VocabularyCatalog for InMemoryStore {
    async fn find_vocabulary(&self, name: &str) -> Result<Option<Vocabulary>, StoreFault> {
        Ok(self.inner().vocabularies.iter().find(|v| v.name == name).cloned())
    }
}

#[async_trait]
impl RecordStore for InMemoryStore {
    async fn find_records(
        &self,
        vocabulary_id: VocabularyId,
        field: FieldDefinitionId,
        value: &str,
    ) -> Result<Vec<VocabularyRecord>, StoreFault> {
        Ok(self
            .inner()
            .records
            .values()
            .filter(|r| r.vocabulary_id() == vocabulary_id && r.text(field) == Some(value))
            .cloned()
            .collect())
    }

    async fn create_empty_record(&self, vocabulary_id: VocabularyId) -> Result<VocabularyRecord, StoreFault> {
        Ok(VocabularyRecord::new(vocabulary_id))
    }

    async fn save(&self, record: &VocabularyRecord) -> Result<RecordId, StoreFault> {
        let mut inner = self.inner();
        if inner.fail_saves {
            return Err(StoreFault::Unavailable("saves disabled".to_string()));
        }

        let id = match record.identity() {
            RecordIdentity::Existing(id) => {
                if !inner.records.contains_key(&id) {
                    return Err(StoreFault::RecordNotFound(id));
                }
                id
            }
            RecordIdentity::New => {
                inner.next_record_id += 1;
                RecordId(inner.next_record_id)
            }
        };

        let mut stored = record.clone();
        stored.mark_persisted(id);
        inner.records.insert(id, stored);
        inner.save_count += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_records_matches_exact_value_only() {
        let store = InMemoryStore::new();
        let vocab = store.add_vocabulary("HERIS", &["herisid"]);
        let field = vocab.definitions[0].id;
        store.insert_record(vocab.id, &[(field, "112518")]);
        store.insert_record(vocab.id, &[(field, "1125180")]);

        let found = store.find_records(vocab.id, field, "112518").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].text(field), Some("112518"));
    }

    #[tokio::test]
    async fn test_save_new_assigns_id_and_existing_keeps_it() {
        let store = InMemoryStore::new();
        let vocab = store.add_vocabulary("HERIS", &["herisid"]);

        let record = store.create_empty_record(vocab.id).await.unwrap();
        let id = store.save(&record).await.unwrap();
        let stored = store.record(id).unwrap();
        assert_eq!(stored.id(), Some(id));

        let again = store.save(&stored).await.unwrap();
        assert_eq!(again, id);
        assert_eq!(store.records(vocab.id).len(), 1);
        assert_eq!(store.save_count(), 2);
    }

    #[tokio::test]
    async fn test_save_unknown_existing_record_fails() {
        let store = InMemoryStore::new();
        let record = VocabularyRecord::existing(RecordId(99), VocabularyId(1), Vec::new());
        let err = store.save(&record).await.unwrap_err();
        assert!(matches!(err, StoreFault::RecordNotFound(RecordId(99))));
    }

    #[tokio::test]
    async fn test_fail_saves_injects_fault() {
        let store = InMemoryStore::new();
        store.fail_saves(true);
        let err = store.save(&VocabularyRecord::new(VocabularyId(1))).await.unwrap_err();
        assert!(matches!(err, StoreFault::Unavailable(_)));
        assert_eq!(store.save_count(), 0);
    }
}
