//! Vocabulary record model and record store interface
//!
//! The import engine talks to persistence through two narrow traits:
//! [`VocabularyCatalog`] for the one-time schema lookup and [`RecordStore`] for
//! the per-element find / create / save cycle. Any backend that can search by
//! one field value and save a record satisfies them.

#[cfg(test)]
pub mod memory;
pub mod sqlite;

#[cfg(test)]
pub use memory::InMemoryStore;
pub use sqlite::SqliteRecordStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use vocab_common::db::{FieldDefinitionId, RecordId, Vocabulary, VocabularyId};

use crate::error::StoreFault;

/// Whether a record already has a persisted identity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordIdentity {
    New,
    Existing(RecordId),
}

/// Value stored for one field of a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Plain(String),
    /// Language-tagged value for stores that require translations
    Translation { language: String, value: String },
}

impl FieldValue {
    /// Build a value, tagged with `language` when one is given
    pub fn new(value: impl Into<String>, language: Option<&str>) -> Self {
        match language {
            Some(language) => FieldValue::Translation {
                language: language.to_string(),
                value: value.into(),
            },
            None => FieldValue::Plain(value.into()),
        }
    }

    pub fn text(&self) -> &str {
        match self {
            FieldValue::Plain(value) | FieldValue::Translation { value, .. } => value,
        }
    }

    pub fn language(&self) -> Option<&str> {
        match self {
            FieldValue::Plain(_) => None,
            FieldValue::Translation { language, .. } => Some(language),
        }
    }
}

/// A vocabulary record, new or fetched from the store
///
/// Holds at most one value per field definition; setting a field replaces
/// whatever was there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VocabularyRecord {
    identity: RecordIdentity,
    vocabulary_id: VocabularyId,
    fields: BTreeMap<FieldDefinitionId, FieldValue>,
}

impl VocabularyRecord {
    /// Unpersisted record with no fields
    pub fn new(vocabulary_id: VocabularyId) -> Self {
        Self {
            identity: RecordIdentity::New,
            vocabulary_id,
            fields: BTreeMap::new(),
        }
    }

    /// Record loaded from a store
    pub fn existing(
        id: RecordId,
        vocabulary_id: VocabularyId,
        fields: impl IntoIterator<Item = (FieldDefinitionId, FieldValue)>,
    ) -> Self {
        Self {
            identity: RecordIdentity::Existing(id),
            vocabulary_id,
            fields: fields.into_iter().collect(),
        }
    }

    pub fn identity(&self) -> RecordIdentity {
        self.identity
    }

    pub fn id(&self) -> Option<RecordId> {
        match self.identity {
            RecordIdentity::New => None,
            RecordIdentity::Existing(id) => Some(id),
        }
    }

    pub fn is_new(&self) -> bool {
        self.identity == RecordIdentity::New
    }

    pub fn vocabulary_id(&self) -> VocabularyId {
        self.vocabulary_id
    }

    pub fn field(&self, definition_id: FieldDefinitionId) -> Option<&FieldValue> {
        self.fields.get(&definition_id)
    }

    /// Text of a field, if set
    pub fn text(&self, definition_id: FieldDefinitionId) -> Option<&str> {
        self.field(definition_id).map(FieldValue::text)
    }

    /// Set a field, returning the replaced value
    pub fn set_field(&mut self, definition_id: FieldDefinitionId, value: FieldValue) -> Option<FieldValue> {
        self.fields.insert(definition_id, value)
    }

    /// Remove a field, returning the removed value
    pub fn remove_field(&mut self, definition_id: FieldDefinitionId) -> Option<FieldValue> {
        self.fields.remove(&definition_id)
    }

    /// Fields in definition id order
    pub fn fields(&self) -> impl Iterator<Item = (FieldDefinitionId, &FieldValue)> {
        self.fields.iter().map(|(id, value)| (*id, value))
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// Bind a new record to the id assigned by the store
    pub fn mark_persisted(&mut self, id: RecordId) {
        self.identity = RecordIdentity::Existing(id);
    }
}

/// Schema lookup
#[async_trait]
pub trait VocabularyCatalog: Send + Sync {
    /// Find a vocabulary and its field definitions by name
    async fn find_vocabulary(&self, name: &str) -> Result<Option<Vocabulary>, StoreFault>;
}

/// Record persistence
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Records of `vocabulary_id` whose `field` holds exactly `value`
    async fn find_records(
        &self,
        vocabulary_id: VocabularyId,
        field: FieldDefinitionId,
        value: &str,
    ) -> Result<Vec<VocabularyRecord>, StoreFault>;

    /// Unpersisted placeholder record for `vocabulary_id`
    async fn create_empty_record(&self, vocabulary_id: VocabularyId) -> Result<VocabularyRecord, StoreFault>;

    /// Persist the record's full field set, returning its id
    ///
    /// Fields missing from `record` are removed from the stored record.
    async fn save(&self, record: &VocabularyRecord) -> Result<RecordId, StoreFault>;
}
