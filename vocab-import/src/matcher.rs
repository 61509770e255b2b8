//! Record matching by identifier value

use tracing::debug;

use crate::error::StoreFault;
use crate::mapping::ResolvedMapping;
use crate::store::{RecordStore, VocabularyRecord};

/// Result of looking up one identifier value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    /// No record carries the identifier; a new one must be created
    New,
    /// Exactly one record carries the identifier
    Existing(VocabularyRecord),
    /// Several records carry the identifier; none is picked
    Ambiguous(usize),
}

/// Looks up existing records for an identifier value
pub struct RecordMatcher<'a, S: RecordStore + ?Sized> {
    store: &'a S,
    mapping: &'a ResolvedMapping,
}

impl<'a, S: RecordStore + ?Sized> RecordMatcher<'a, S> {
    pub fn new(store: &'a S, mapping: &'a ResolvedMapping) -> Self {
        Self { store, mapping }
    }

    /// Decide create vs update for `identifier`
    ///
    /// Without an identifier field in the mapping every element is [`MatchOutcome::New`].
    /// More than one exact match is [`MatchOutcome::Ambiguous`].
    pub async fn match_identifier(&self, identifier: &str) -> Result<MatchOutcome, StoreFault> {
        let Some(field) = self.mapping.identifier() else {
            return Ok(MatchOutcome::New);
        };

        let candidates = self
            .store
            .find_records(self.mapping.vocabulary_id(), field.definition_id, identifier)
            .await?;

        // Backends with tokenized search may return near misses
        let returned = candidates.len();
        let mut matches: Vec<VocabularyRecord> = candidates
            .into_iter()
            .filter(|r| r.text(field.definition_id) == Some(identifier))
            .collect();
        if matches.len() != returned {
            debug!(
                identifier,
                returned,
                exact = matches.len(),
                "Discarded non-exact search hits"
            );
        }

        match matches.len() {
            0 => {
                debug!(identifier, "No existing record, creating new one");
                Ok(MatchOutcome::New)
            }
            1 => {
                let record = matches.remove(0);
                debug!(identifier, record_id = ?record.id(), "Found existing record");
                Ok(MatchOutcome::Existing(record))
            }
            count => Ok(MatchOutcome::Ambiguous(count)),
        }
    }
}
