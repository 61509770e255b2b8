//! Field mapping and schema resolution
//!
//! A [`FieldMapping`] is the ordered list of `(field name, JSON path, identifier?)`
//! entries from configuration. Before a batch runs it is resolved once against
//! the vocabulary schema into a [`ResolvedMapping`], which carries field
//! definition ids instead of names so no per-record name lookups are needed.

use tracing::warn;
use vocab_common::config::VocabularyConfig;
use vocab_common::db::{FieldDefinitionId, Vocabulary, VocabularyId};

use crate::error::ConfigurationFault;
use crate::json_path::JsonPath;

/// One configured mapping entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappingEntry {
    pub field_name: String,
    pub path: JsonPath,
    pub identifier: bool,
}

impl MappingEntry {
    /// Parse an entry; fails when the path expression is invalid
    pub fn new(
        field_name: impl Into<String>,
        path: &str,
        identifier: bool,
    ) -> Result<Self, ConfigurationFault> {
        let field_name = field_name.into();
        let path = JsonPath::parse(path).map_err(|source| ConfigurationFault::InvalidPath {
            field: field_name.clone(),
            source,
        })?;
        Ok(Self {
            field_name,
            path,
            identifier,
        })
    }
}

/// Validated, ordered field mapping
#[derive(Debug, Clone)]
pub struct FieldMapping {
    entries: Vec<MappingEntry>,
}

impl FieldMapping {
    /// Validate a list of entries
    ///
    /// Rejects an empty mapping, blank field names and more than one identifier
    /// entry. A mapping without identifier is only accepted when
    /// `allow_missing_identifier` is set.
    pub fn new(
        entries: Vec<MappingEntry>,
        allow_missing_identifier: bool,
    ) -> Result<Self, ConfigurationFault> {
        if entries.is_empty() {
            return Err(ConfigurationFault::EmptyMapping);
        }

        if let Some(index) = entries.iter().position(|e| e.field_name.trim().is_empty()) {
            return Err(ConfigurationFault::BlankFieldName(index));
        }

        let identifiers: Vec<String> = entries
            .iter()
            .filter(|e| e.identifier)
            .map(|e| e.field_name.clone())
            .collect();

        match identifiers.len() {
            0 if !allow_missing_identifier => return Err(ConfigurationFault::MissingIdentifier),
            0 => warn!("No identifier field configured: every element will create a new record"),
            1 => {}
            _ => return Err(ConfigurationFault::MultipleIdentifiers(identifiers)),
        }

        Ok(Self { entries })
    }

    /// Build from the `[vocabulary]` configuration section
    pub fn from_config(config: &VocabularyConfig) -> Result<Self, ConfigurationFault> {
        let entries = config
            .fields
            .iter()
            .map(|f| MappingEntry::new(f.field_name.clone(), &f.json_path, f.identifier))
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(entries, config.allow_missing_identifier)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    /// Resolve field names to definition ids of `vocabulary`
    ///
    /// Entries whose field name is not part of the schema are dropped with a
    /// warning. The identifier entry must resolve.
    pub fn resolve(&self, vocabulary: &Vocabulary) -> Result<ResolvedMapping, ConfigurationFault> {
        let mut fields = Vec::with_capacity(self.entries.len());
        let mut unresolved = Vec::new();
        let mut identifier = None;

        for entry in &self.entries {
            // First definition wins when a schema repeats a name
            match vocabulary.definition_by_name(&entry.field_name) {
                Some(definition) => {
                    let field = ResolvedField {
                        definition_id: definition.id,
                        field_name: entry.field_name.clone(),
                        path: entry.path.clone(),
                    };
                    if entry.identifier {
                        identifier = Some(field.clone());
                    }
                    fields.push(field);
                }
                None if entry.identifier => {
                    return Err(ConfigurationFault::IdentifierNotInSchema {
                        field: entry.field_name.clone(),
                        vocabulary: vocabulary.name.clone(),
                    });
                }
                None => {
                    warn!(
                        field = %entry.field_name,
                        vocabulary = %vocabulary.name,
                        "Mapped field has no definition in vocabulary schema, ignoring"
                    );
                    unresolved.push(entry.field_name.clone());
                }
            }
        }

        Ok(ResolvedMapping {
            vocabulary_id: vocabulary.id,
            vocabulary_name: vocabulary.name.clone(),
            fields,
            identifier,
            unresolved,
        })
    }
}

/// Mapping entry bound to a field definition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedField {
    pub definition_id: FieldDefinitionId,
    pub field_name: String,
    pub path: JsonPath,
}

/// Mapping resolved against one vocabulary schema
#[derive(Debug, Clone)]
pub struct ResolvedMapping {
    vocabulary_id: VocabularyId,
    vocabulary_name: String,
    fields: Vec<ResolvedField>,
    identifier: Option<ResolvedField>,
    unresolved: Vec<String>,
}

impl ResolvedMapping {
    pub fn vocabulary_id(&self) -> VocabularyId {
        self.vocabulary_id
    }

    pub fn vocabulary_name(&self) -> &str {
        &self.vocabulary_name
    }

    /// Resolved fields in mapping order, identifier included
    pub fn fields(&self) -> &[ResolvedField] {
        &self.fields
    }

    pub fn identifier(&self) -> Option<&ResolvedField> {
        self.identifier.as_ref()
    }

    /// False when the mapping has no identifier and cannot match existing records
    pub fn is_deduplicating(&self) -> bool {
        self.identifier.is_some()
    }

    /// Field names skipped because the schema has no such definition
    pub fn unresolved(&self) -> &[String] {
        &self.unresolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vocab_common::db::FieldDefinition;

    fn vocabulary() -> Vocabulary {
        Vocabulary {
            id: VocabularyId(7),
            name: "HERIS".to_string(),
            definitions: vec![
                FieldDefinition { id: FieldDefinitionId(1), name: "herisid".into() },
                FieldDefinition { id: FieldDefinitionId(2), name: "title".into() },
            ],
        }
    }

    fn entry(name: &str, path: &str, identifier: bool) -> MappingEntry {
        MappingEntry::new(name, path, identifier).unwrap()
    }

    #[test]
    fn test_resolve_binds_definition_ids_in_order() {
        let mapping = FieldMapping::new(
            vec![entry("title", "$.Titel", false), entry("herisid", "$.HERIS-ID", true)],
            false,
        )
        .unwrap();

        let resolved = mapping.resolve(&vocabulary()).unwrap();
        let ids: Vec<i64> = resolved.fields().iter().map(|f| f.definition_id.0).collect();
        assert_eq!(ids, vec![2, 1]);
        assert_eq!(resolved.identifier().map(|f| f.definition_id), Some(FieldDefinitionId(1)));
        assert_eq!(resolved.vocabulary_id(), VocabularyId(7));
        assert!(resolved.is_deduplicating());
    }

    #[test]
    fn test_unknown_field_is_skipped_not_fatal() {
        let mapping = FieldMapping::new(
            vec![entry("herisid", "$.HERIS-ID", true), entry("architect", "$.Architekt", false)],
            false,
        )
        .unwrap();

        let resolved = mapping.resolve(&vocabulary()).unwrap();
        assert_eq!(resolved.fields().len(), 1);
        assert_eq!(resolved.unresolved(), &["architect".to_string()]);
    }

    #[test]
    fn test_identifier_missing_from_schema_is_fatal() {
        let mapping = FieldMapping::new(vec![entry("objektid", "$.ID", true)], false).unwrap();
        let err = mapping.resolve(&vocabulary()).unwrap_err();
        assert!(matches!(err, ConfigurationFault::IdentifierNotInSchema { ref field, .. } if field == "objektid"));
    }

    #[test]
    fn test_empty_mapping_rejected() {
        assert!(matches!(FieldMapping::new(vec![], true), Err(ConfigurationFault::EmptyMapping)));
    }

    #[test]
    fn test_two_identifiers_rejected() {
        let err = FieldMapping::new(
            vec![entry("herisid", "$.HERIS-ID", true), entry("title", "$.Titel", true)],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigurationFault::MultipleIdentifiers(ref f) if f.len() == 2));
    }

    #[test]
    fn test_missing_identifier_requires_opt_in() {
        let entries = vec![entry("title", "$.Titel", false)];
        assert!(matches!(
            FieldMapping::new(entries.clone(), false),
            Err(ConfigurationFault::MissingIdentifier)
        ));

        let mapping = FieldMapping::new(entries, true).unwrap();
        assert!(!mapping.resolve(&vocabulary()).unwrap().is_deduplicating());
    }

    #[test]
    fn test_blank_field_name_rejected() {
        let err = FieldMapping::new(vec![entry("herisid", "$.a", true), entry("  ", "$.b", false)], false)
            .unwrap_err();
        assert!(matches!(err, ConfigurationFault::BlankFieldName(1)));
    }

    #[test]
    fn test_invalid_path_names_the_field() {
        let err = MappingEntry::new("title", "Titel", false).unwrap_err();
        assert!(matches!(err, ConfigurationFault::InvalidPath { ref field, .. } if field == "title"));
    }
}
