//! Import job: one full run from source document to saved records
//!
//! **Workflow:**
//! 1. Resolve the field mapping against the target vocabulary
//! 2. Fetch the newest source document (nothing found → no-op)
//! 3. Decode the document into elements
//! 4. Drive every element through match, build and save
//! 5. Delete the source document if every record was persisted

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;
use vocab_common::config::VocabularyConfig;
use vocab_common::events::{EventBus, ImportEvent};

use crate::driver::BatchDriver;
use crate::error::{ConfigurationFault, JobResult};
use crate::mapping::{FieldMapping, ResolvedMapping};
use crate::report::ImportReport;
use crate::source::{decode_elements, DocumentSource};
use crate::store::{RecordStore, VocabularyCatalog};

/// One configured import run
pub struct ImportJob<'a, S, D>
where
    S: VocabularyCatalog + RecordStore + ?Sized,
    D: DocumentSource + ?Sized,
{
    store: &'a S,
    source: &'a D,
    settings: &'a VocabularyConfig,
    events: Option<&'a EventBus>,
    dry_run: bool,
}

impl<'a, S, D> ImportJob<'a, S, D>
where
    S: VocabularyCatalog + RecordStore + ?Sized,
    D: DocumentSource + ?Sized,
{
    pub fn new(store: &'a S, source: &'a D, settings: &'a VocabularyConfig) -> Self {
        Self {
            store,
            source,
            settings,
            events: None,
            dry_run: false,
        }
    }

    /// Broadcast run progress on `bus`
    pub fn with_events(mut self, bus: &'a EventBus) -> Self {
        self.events = Some(bus);
        self
    }

    /// Build records without saving them or deleting the source
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Validate the mapping and resolve it against the vocabulary schema
    pub async fn prepare(&self) -> JobResult<ResolvedMapping> {
        let mapping = FieldMapping::from_config(self.settings)?;

        let vocabulary = self
            .store
            .find_vocabulary(&self.settings.name)
            .await?
            .ok_or_else(|| ConfigurationFault::VocabularyNotFound(self.settings.name.clone()))?;

        let resolved = mapping.resolve(&vocabulary)?;
        info!(
            vocabulary = %vocabulary.name,
            fields = resolved.fields().len(),
            identifier = resolved.identifier().map(|f| f.field_name.as_str()).unwrap_or("<none>"),
            "Field mapping resolved"
        );
        Ok(resolved)
    }

    /// Execute the run
    ///
    /// Returns `Ok(None)` when the source had no document. Skipped and failed
    /// elements do not fail the run; they are listed in the report.
    pub async fn run(&self) -> JobResult<Option<ImportReport>> {
        let mapping = self.prepare().await?;

        let Some(document) = self.source.fetch_latest_document().await? else {
            info!(vocabulary = %mapping.vocabulary_name(), "No source document available, nothing to import");
            return Ok(None);
        };

        let elements = decode_elements(&document.bytes)?;

        let run_id = Uuid::new_v4();
        let mut report = ImportReport::new(
            run_id,
            mapping.vocabulary_name(),
            Some(document.location.clone()),
            self.dry_run,
        );
        report.record_mapping(&mapping);

        info!(
            %run_id,
            file = %document.location.display(),
            elements = elements.len(),
            dry_run = self.dry_run,
            "Import run started"
        );
        self.emit(ImportEvent::RunStarted {
            run_id,
            vocabulary: mapping.vocabulary_name().to_string(),
            element_count: elements.len(),
            timestamp: report.started_at,
        });

        let mut driver = BatchDriver::new(self.store, &mapping)
            .with_absent_values(self.settings.absent_values)
            .with_language(self.settings.language.clone())
            .dry_run(self.dry_run);
        if let Some(bus) = self.events {
            driver = driver.with_events(bus, run_id);
        }

        let outcomes = driver.process(&elements).await;
        report.record_elements(&outcomes);

        if self.dry_run {
            info!(%run_id, "Dry run, source document kept");
        } else if report.fully_persisted() {
            match self.source.delete_source_document(&document).await {
                Ok(()) => {
                    report.source_deleted = true;
                    info!(file = %document.location.display(), "Deleted imported source document");
                }
                Err(e) => warn!(
                    file = %document.location.display(),
                    "Failed to delete source document: {}", e
                ),
            }
        } else {
            warn!(
                %run_id,
                failed = report.failed,
                "Records not persisted, source document kept for retry"
            );
        }

        report.finish();
        self.emit(ImportEvent::RunCompleted {
            run_id,
            created: report.created,
            updated: report.updated,
            skipped: report.skipped,
            failed: report.failed,
            timestamp: Utc::now(),
        });

        info!(
            %run_id,
            created = report.created,
            updated = report.updated,
            skipped = report.skipped,
            failed = report.failed,
            duration_ms = (report.ended_at - report.started_at).num_milliseconds(),
            "Import run completed"
        );

        Ok(Some(report))
    }

    fn emit(&self, event: ImportEvent) {
        if let Some(bus) = self.events {
            bus.emit_lossy(event);
        }
    }
}
