//! Batch driver: runs every source element through match, build and save
//!
//! Elements are processed one at a time in source order and each record is
//! saved before the next element is matched, so two elements carrying the
//! same identifier update one record instead of creating two. A fault in one
//! element never stops the batch.

use serde_json::Value;
use tracing::{debug, error, warn};
use uuid::Uuid;
use vocab_common::config::AbsentValuePolicy;
use vocab_common::db::RecordId;
use vocab_common::events::{EventBus, ImportEvent, SkipReason};

use crate::builder::RecordBuilder;
use crate::error::{ElementFault, FieldFault, StoreFault};
use crate::json_path::Extracted;
use crate::mapping::ResolvedMapping;
use crate::matcher::{MatchOutcome, RecordMatcher};
use crate::store::{RecordStore, VocabularyRecord};

/// What happened to one element
#[derive(Debug)]
pub enum ElementStatus {
    Created(RecordId),
    Updated(RecordId),
    /// Dry run: a new record would have been created
    WouldCreate,
    /// Dry run: this record would have been updated
    WouldUpdate(RecordId),
    /// Element not imported (identifier problem or ambiguous match)
    Skipped(ElementFault),
    /// Store query or save failed; the built record is kept when there is one
    Failed {
        record: Option<VocabularyRecord>,
        fault: StoreFault,
    },
}

/// Outcome of one element of the batch
#[derive(Debug)]
pub struct ElementReport {
    /// Position in the source document
    pub element: usize,
    pub identifier: Option<String>,
    pub status: ElementStatus,
    pub field_faults: Vec<FieldFault>,
}

impl ElementReport {
    fn new(element: usize, identifier: Option<String>, status: ElementStatus) -> Self {
        Self {
            element,
            identifier,
            status,
            field_faults: Vec::new(),
        }
    }
}

/// Drives a batch of source elements into the record store
pub struct BatchDriver<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    mapping: &'a ResolvedMapping,
    builder: RecordBuilder<'a>,
    persist: bool,
    events: Option<(&'a EventBus, Uuid)>,
}

impl<'a, S: RecordStore + ?Sized> BatchDriver<'a, S> {
    pub fn new(store: &'a S, mapping: &'a ResolvedMapping) -> Self {
        Self {
            store,
            mapping,
            builder: RecordBuilder::new(mapping),
            persist: true,
            events: None,
        }
    }

    pub fn with_absent_values(mut self, policy: AbsentValuePolicy) -> Self {
        self.builder = self.builder.with_absent_values(policy);
        self
    }

    pub fn with_language(mut self, language: Option<String>) -> Self {
        self.builder = self.builder.with_language(language);
        self
    }

    /// Build records without saving them
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.persist = !dry_run;
        self
    }

    /// Publish per-element events for `run_id`
    pub fn with_events(mut self, bus: &'a EventBus, run_id: Uuid) -> Self {
        self.events = Some((bus, run_id));
        self
    }

    /// Process every element in order
    pub async fn process(&self, elements: &[Value]) -> Vec<ElementReport> {
        let mut reports = Vec::with_capacity(elements.len());
        for (index, element) in elements.iter().enumerate() {
            let report = self.process_element(index, element).await;
            self.publish(&report);
            reports.push(report);
        }
        reports
    }

    /// Extract-Identifier → Match → Build → Persist for one element
    pub async fn process_element(&self, index: usize, element: &Value) -> ElementReport {
        let identifier = match self.extract_identifier(element) {
            Ok(identifier) => identifier,
            Err(fault) => {
                warn!(element = index, "Skipping element: {}", fault);
                return ElementReport::new(index, None, ElementStatus::Skipped(fault));
            }
        };

        let outcome = match &identifier {
            Some(value) => RecordMatcher::new(self.store, self.mapping).match_identifier(value).await,
            None => Ok(MatchOutcome::New),
        };

        let mut record = match outcome {
            Ok(MatchOutcome::Existing(record)) => record,
            Ok(MatchOutcome::New) => match self.store.create_empty_record(self.mapping.vocabulary_id()).await {
                Ok(record) => record,
                Err(fault) => return self.failed(index, identifier, None, fault),
            },
            Ok(MatchOutcome::Ambiguous(count)) => {
                let fault = ElementFault::Ambiguous {
                    identifier: identifier.clone().unwrap_or_default(),
                    count,
                };
                warn!(element = index, identifier = ?identifier, "Skipping element: {}", fault);
                return ElementReport::new(index, identifier, ElementStatus::Skipped(fault));
            }
            Err(fault) => return self.failed(index, identifier, None, fault),
        };

        let summary = self.builder.build(&mut record, element);
        debug!(
            element = index,
            identifier = ?identifier,
            written = summary.written,
            cleared = summary.cleared,
            kept = summary.kept,
            "Record built"
        );

        let status = if !self.persist {
            match record.id() {
                Some(id) => ElementStatus::WouldUpdate(id),
                None => ElementStatus::WouldCreate,
            }
        } else {
            match self.store.save(&record).await {
                Ok(id) if record.is_new() => ElementStatus::Created(id),
                Ok(id) => ElementStatus::Updated(id),
                Err(fault) => return self.failed(index, identifier, Some(record), fault),
            }
        };

        ElementReport {
            element: index,
            identifier,
            status,
            field_faults: summary.field_faults,
        }
    }

    fn extract_identifier(&self, element: &Value) -> Result<Option<String>, ElementFault> {
        let Some(field) = self.mapping.identifier() else {
            return Ok(None);
        };

        match field.path.extract(element) {
            Extracted::Scalar(value) if !value.trim().is_empty() => Ok(Some(value)),
            Extracted::Scalar(_) | Extracted::Absent => Err(ElementFault::MissingIdentifier {
                path: field.path.to_string(),
            }),
            Extracted::NonScalar => Err(ElementFault::NonScalarIdentifier {
                path: field.path.to_string(),
            }),
        }
    }

    fn failed(
        &self,
        index: usize,
        identifier: Option<String>,
        record: Option<VocabularyRecord>,
        fault: StoreFault,
    ) -> ElementReport {
        error!(element = index, identifier = ?identifier, "Record store failure: {}", fault);
        ElementReport::new(index, identifier, ElementStatus::Failed { record, fault })
    }

    fn publish(&self, report: &ElementReport) {
        let Some((bus, run_id)) = self.events else {
            return;
        };

        let event = match &report.status {
            ElementStatus::Created(id) | ElementStatus::Updated(id) => ImportEvent::RecordSaved {
                run_id,
                element: report.element,
                identifier: report.identifier.clone(),
                record_id: id.0,
                created: matches!(report.status, ElementStatus::Created(_)),
            },
            ElementStatus::Skipped(fault) => ImportEvent::ElementSkipped {
                run_id,
                element: report.element,
                identifier: report.identifier.clone(),
                reason: match fault {
                    ElementFault::Ambiguous { .. } => SkipReason::AmbiguousMatch,
                    ElementFault::MissingIdentifier { .. } | ElementFault::NonScalarIdentifier { .. } => {
                        SkipReason::MissingIdentifier
                    }
                },
                message: fault.to_string(),
            },
            ElementStatus::Failed { fault, .. } => ImportEvent::ElementSkipped {
                run_id,
                element: report.element,
                identifier: report.identifier.clone(),
                reason: SkipReason::StoreFailure,
                message: fault.to_string(),
            },
            ElementStatus::WouldCreate | ElementStatus::WouldUpdate(_) => return,
        };

        bus.emit_lossy(event);
    }
}
