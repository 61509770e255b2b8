//! Import run results
//!
//! Issues are categorized by severity:
//! - `Warning`: one field not updated (element still saved), or a mapping
//!   entry that cannot take effect for the whole run
//! - `Skip`: element not imported, import continues
//! - `Failure`: record could not be persisted

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::driver::{ElementReport, ElementStatus};
use crate::error::ElementFault;
use crate::mapping::ResolvedMapping;

/// Issue severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum IssueSeverity {
    Warning,
    Skip,
    Failure,
}

/// One problem encountered during a run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportIssue {
    /// Position of the element in the source document, `None` for run-wide issues
    pub element: Option<usize>,

    /// Identifier value, when one could be extracted
    pub identifier: Option<String>,

    /// Issue code (e.g., "MISSING_IDENTIFIER", "AMBIGUOUS_MATCH")
    pub code: String,

    /// Human-readable message
    pub message: String,

    pub severity: IssueSeverity,
}

impl ImportIssue {
    fn new(
        element: Option<usize>,
        identifier: Option<String>,
        code: &str,
        message: String,
        severity: IssueSeverity,
    ) -> Self {
        Self {
            element,
            identifier,
            code: code.to_string(),
            message,
            severity,
        }
    }
}

/// Summary of one import run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub run_id: Uuid,
    pub vocabulary: String,
    /// Document the run imported
    pub source: Option<PathBuf>,
    pub dry_run: bool,

    /// Elements found in the document
    pub total_elements: usize,
    pub created: usize,
    pub updated: usize,
    pub skipped: usize,
    /// Elements whose record could not be persisted
    pub failed: usize,

    pub issues: Vec<ImportIssue>,

    /// Source document removed after the run
    pub source_deleted: bool,

    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

impl ImportReport {
    /// Empty report for a run that is starting now
    pub fn new(run_id: Uuid, vocabulary: impl Into<String>, source: Option<PathBuf>, dry_run: bool) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            vocabulary: vocabulary.into(),
            source,
            dry_run,
            total_elements: 0,
            created: 0,
            updated: 0,
            skipped: 0,
            failed: 0,
            issues: Vec::new(),
            source_deleted: false,
            started_at: now,
            ended_at: now,
        }
    }

    /// Record mapping entries that cannot take effect in this run
    pub fn record_mapping(&mut self, mapping: &ResolvedMapping) {
        for field in mapping.unresolved() {
            self.issues.push(ImportIssue::new(
                None,
                None,
                "UNMAPPED_FIELD",
                format!(
                    "Field \"{}\" has no definition in vocabulary \"{}\" and is not imported",
                    field,
                    mapping.vocabulary_name()
                ),
                IssueSeverity::Warning,
            ));
        }

        if !mapping.is_deduplicating() {
            self.issues.push(ImportIssue::new(
                None,
                None,
                "NO_IDENTIFIER",
                "No identifier field configured, every element creates a new record".to_string(),
                IssueSeverity::Warning,
            ));
        }
    }

    /// Fold per-element outcomes into the counters and issue list
    pub fn record_elements(&mut self, elements: &[ElementReport]) {
        self.total_elements += elements.len();

        for report in elements {
            for fault in &report.field_faults {
                self.issues.push(ImportIssue::new(
                    Some(report.element),
                    report.identifier.clone(),
                    "NON_SCALAR_VALUE",
                    fault.to_string(),
                    IssueSeverity::Warning,
                ));
            }

            match &report.status {
                ElementStatus::Created(_) | ElementStatus::WouldCreate => self.created += 1,
                ElementStatus::Updated(_) | ElementStatus::WouldUpdate(_) => self.updated += 1,
                ElementStatus::Skipped(fault) => {
                    self.skipped += 1;
                    self.issues.push(ImportIssue::new(
                        Some(report.element),
                        report.identifier.clone(),
                        skip_code(fault),
                        fault.to_string(),
                        IssueSeverity::Skip,
                    ));
                }
                ElementStatus::Failed { fault, .. } => {
                    self.failed += 1;
                    self.issues.push(ImportIssue::new(
                        Some(report.element),
                        report.identifier.clone(),
                        "STORE_ERROR",
                        fault.to_string(),
                        IssueSeverity::Failure,
                    ));
                }
            }
        }
    }

    /// Mark the run finished
    pub fn finish(&mut self) {
        self.ended_at = Utc::now();
    }

    /// Count issues by severity
    pub fn count_by_severity(&self, severity: IssueSeverity) -> usize {
        self.issues.iter().filter(|i| i.severity == severity).count()
    }

    /// True when every element that should have been saved was saved
    pub fn fully_persisted(&self) -> bool {
        self.failed == 0
    }
}

fn skip_code(fault: &ElementFault) -> &'static str {
    match fault {
        ElementFault::MissingIdentifier { .. } => "MISSING_IDENTIFIER",
        ElementFault::NonScalarIdentifier { .. } => "NON_SCALAR_IDENTIFIER",
        ElementFault::Ambiguous { .. } => "AMBIGUOUS_MATCH",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FieldFault, StoreFault};
    use crate::mapping::{FieldMapping, MappingEntry};
    use vocab_common::db::{FieldDefinition, FieldDefinitionId, RecordId, Vocabulary, VocabularyId};

    #[test]
    fn test_record_elements_counts_and_issues() {
        let mut report = ImportReport::new(Uuid::new_v4(), "HERIS", None, false);
        let elements = vec![
            ElementReport {
                element: 0,
                identifier: Some("1".into()),
                status: ElementStatus::Created(RecordId(1)),
                field_faults: vec![FieldFault { field: "title".into(), path: "$.Titel".into() }],
            },
            ElementReport {
                element: 1,
                identifier: Some("2".into()),
                status: ElementStatus::Skipped(ElementFault::Ambiguous { identifier: "2".into(), count: 2 }),
                field_faults: Vec::new(),
            },
            ElementReport {
                element: 2,
                identifier: Some("3".into()),
                status: ElementStatus::Failed { record: None, fault: StoreFault::Unavailable("down".into()) },
                field_faults: Vec::new(),
            },
        ];

        report.record_elements(&elements);

        assert_eq!(report.total_elements, 3);
        assert_eq!((report.created, report.updated, report.skipped, report.failed), (1, 0, 1, 1));
        assert_eq!(report.count_by_severity(IssueSeverity::Warning), 1);
        assert_eq!(report.count_by_severity(IssueSeverity::Skip), 1);
        assert_eq!(report.issues[1].code, "AMBIGUOUS_MATCH");
        assert_eq!(report.issues[1].element, Some(1));
        assert!(!report.fully_persisted());
    }

    fn heris_vocabulary() -> Vocabulary {
        Vocabulary {
            id: VocabularyId(1),
            name: "HERIS".into(),
            definitions: vec![
                FieldDefinition { id: FieldDefinitionId(1), name: "herisid".into() },
                FieldDefinition { id: FieldDefinitionId(2), name: "title".into() },
            ],
        }
    }

    #[test]
    fn test_unmapped_fields_become_run_warnings() {
        let mapping = FieldMapping::new(
            vec![
                MappingEntry::new("herisid", "$.HERIS-ID", true).unwrap(),
                MappingEntry::new("architect", "$.Architekt", false).unwrap(),
            ],
            false,
        )
        .unwrap()
        .resolve(&heris_vocabulary())
        .unwrap();

        let mut report = ImportReport::new(Uuid::new_v4(), "HERIS", None, false);
        report.record_mapping(&mapping);

        assert_eq!(report.issues.len(), 1);
        let issue = &report.issues[0];
        assert_eq!(issue.code, "UNMAPPED_FIELD");
        assert_eq!(issue.element, None);
        assert_eq!(issue.severity, IssueSeverity::Warning);
        assert!(issue.message.contains("architect"));
        assert!(report.fully_persisted());
    }

    #[test]
    fn test_mapping_without_identifier_is_reported() {
        let mapping = FieldMapping::new(vec![MappingEntry::new("title", "$.Titel", false).unwrap()], true)
            .unwrap()
            .resolve(&heris_vocabulary())
            .unwrap();

        let mut report = ImportReport::new(Uuid::new_v4(), "HERIS", None, false);
        report.record_mapping(&mapping);

        let codes: Vec<&str> = report.issues.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["NO_IDENTIFIER"]);
    }

    #[test]
    fn test_complete_mapping_adds_no_issues() {
        let mapping = FieldMapping::new(
            vec![
                MappingEntry::new("herisid", "$.HERIS-ID", true).unwrap(),
                MappingEntry::new("title", "$.Titel", false).unwrap(),
            ],
            false,
        )
        .unwrap()
        .resolve(&heris_vocabulary())
        .unwrap();

        let mut report = ImportReport::new(Uuid::new_v4(), "HERIS", None, false);
        report.record_mapping(&mapping);
        assert!(report.issues.is_empty());
    }
}
