//! Error types for vocab-import
//!
//! Faults are grouped by how far they propagate:
//! - [`ConfigurationFault`]: fatal, raised before any element is processed
//! - [`SourceFault`]: fatal to the run (document missing, unreadable, malformed)
//! - [`ElementFault`]: skips one element, the batch continues
//! - [`FieldFault`]: affects one field of one element, the element is still saved
//! - [`StoreFault`]: record store failure, reported per element, never dropped silently

use std::path::PathBuf;
use thiserror::Error;
use vocab_common::db::RecordId;

use crate::json_path::PathError;

/// Invalid mapping or target vocabulary
#[derive(Debug, Error)]
pub enum ConfigurationFault {
    #[error("Vocabulary \"{0}\" does not exist")]
    VocabularyNotFound(String),

    #[error("Field mapping is empty")]
    EmptyMapping,

    #[error("Mapping entry #{0} has a blank field name")]
    BlankFieldName(usize),

    #[error("Mapping entry \"{field}\" has an invalid JSON path: {source}")]
    InvalidPath {
        field: String,
        #[source]
        source: PathError,
    },

    #[error("More than one identifier field configured: {}", .0.join(", "))]
    MultipleIdentifiers(Vec<String>),

    #[error("No identifier field configured; set allow_missing_identifier to import without deduplication")]
    MissingIdentifier,

    #[error("Field \"{field}\" does not exist in vocabulary \"{vocabulary}\"")]
    IdentifierNotInSchema { field: String, vocabulary: String },
}

/// Problem with the source document as a whole
#[derive(Debug, Error)]
pub enum SourceFault {
    #[error("Source folder {0} does not exist or is not a directory")]
    FolderUnavailable(PathBuf),

    #[error("Failed to read source document {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed JSON document: {0}")]
    MalformedJson(#[from] serde_json::Error),

    #[error("Document top-level value is {0}, expected an array or object")]
    UnexpectedShape(&'static str),

    #[error("SFTP retrieval from {host} failed: {message}")]
    Remote { host: String, message: String },

    #[error("Failed to store downloaded document {path}: {source}")]
    Download {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Record store failure
#[derive(Debug, Error)]
pub enum StoreFault {
    #[error("Record {0} not found in store")]
    RecordNotFound(RecordId),

    #[error("Record store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Backend(#[from] vocab_common::Error),
}

impl From<sqlx::Error> for StoreFault {
    fn from(err: sqlx::Error) -> Self {
        StoreFault::Backend(vocab_common::Error::Database(err))
    }
}

/// Failure isolated to one element of the batch
#[derive(Debug, Error)]
pub enum ElementFault {
    #[error("Identifier value absent at {path}")]
    MissingIdentifier { path: String },

    #[error("Identifier at {path} is not a scalar value")]
    NonScalarIdentifier { path: String },

    #[error("Identifier \"{identifier}\" matches {count} existing records")]
    Ambiguous { identifier: String, count: usize },
}

/// Mapped path resolved to an array or object
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Field \"{field}\" at {path} resolved to a non-scalar value")]
pub struct FieldFault {
    pub field: String,
    pub path: String,
}

/// Errors that abort a whole import run
#[derive(Debug, Error)]
pub enum JobError {
    #[error("Configuration fault: {0}")]
    Configuration(#[from] ConfigurationFault),

    #[error("Source fault: {0}")]
    Source(#[from] SourceFault),

    #[error("Store fault: {0}")]
    Store(#[from] StoreFault),

    #[error(transparent)]
    Common(#[from] vocab_common::Error),
}

/// Result type for a whole run
pub type JobResult<T> = Result<T, JobError>;
