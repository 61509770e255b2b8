//! Record building: applies a resolved mapping to one source object
//!
//! Every mapped field is authoritative from the latest source snapshot. A
//! scalar value replaces whatever the record held for that field; fields not
//! in the mapping are never touched. What an absent or non-scalar value does
//! is decided by [`AbsentValuePolicy`].

use serde_json::Value;
use tracing::warn;
use vocab_common::config::AbsentValuePolicy;
use vocab_common::db::FieldDefinitionId;

use crate::error::FieldFault;
use crate::json_path::Extracted;
use crate::mapping::ResolvedMapping;
use crate::store::{FieldValue, VocabularyRecord};

/// Per-element summary of what the builder did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    /// Fields set from a source value
    pub written: usize,
    /// Fields removed or blanked because the source had no usable value
    pub cleared: usize,
    /// Fields left untouched because the source had no usable value
    pub kept: usize,
    /// Fields whose path resolved to an array or object; these also count
    /// as cleared or kept under the absent-value policy
    pub field_faults: Vec<FieldFault>,
}

/// Applies a [`ResolvedMapping`] to records
#[derive(Debug, Clone)]
pub struct RecordBuilder<'a> {
    mapping: &'a ResolvedMapping,
    absent_values: AbsentValuePolicy,
    language: Option<String>,
}

impl<'a> RecordBuilder<'a> {
    pub fn new(mapping: &'a ResolvedMapping) -> Self {
        Self {
            mapping,
            absent_values: AbsentValuePolicy::default(),
            language: None,
        }
    }

    pub fn with_absent_values(mut self, policy: AbsentValuePolicy) -> Self {
        self.absent_values = policy;
        self
    }

    /// Store values as translations tagged with `language`
    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.language = language.filter(|l| !l.trim().is_empty());
        self
    }

    /// Apply the mapping to `target` using values from `source`
    ///
    /// Idempotent: building twice from the same source gives the same field set.
    pub fn build(&self, target: &mut VocabularyRecord, source: &Value) -> BuildSummary {
        let mut summary = BuildSummary::default();
        let language = self.language.as_deref();

        for field in self.mapping.fields() {
            match field.path.extract(source) {
                Extracted::Scalar(value) => {
                    target.set_field(field.definition_id, FieldValue::new(value, language));
                    summary.written += 1;
                }
                Extracted::Absent => self.apply_absent(target, field.definition_id, &mut summary),
                Extracted::NonScalar => {
                    // No usable value: same treatment as a missing one, but reported
                    warn!(
                        field = %field.field_name,
                        path = %field.path,
                        policy = ?self.absent_values,
                        "Mapped path resolved to a non-scalar value"
                    );
                    summary.field_faults.push(FieldFault {
                        field: field.field_name.clone(),
                        path: field.path.to_string(),
                    });
                    self.apply_absent(target, field.definition_id, &mut summary);
                }
            }
        }

        summary
    }

    fn apply_absent(&self, target: &mut VocabularyRecord, definition_id: FieldDefinitionId, summary: &mut BuildSummary) {
        match self.absent_values {
            AbsentValuePolicy::Keep => summary.kept += 1,
            AbsentValuePolicy::Clear => {
                target.remove_field(definition_id);
                summary.cleared += 1;
            }
            AbsentValuePolicy::WriteEmpty => {
                target.set_field(definition_id, FieldValue::new("", self.language.as_deref()));
                summary.cleared += 1;
            }
        }
    }
}
