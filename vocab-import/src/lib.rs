//! vocab-import library interface
//!
//! Imports a JSON feed into a vocabulary record store: every element of the
//! newest source document is mapped through configured JSON paths, matched
//! against existing records by its identifier field, and saved as a new or
//! updated record.

pub mod builder;
pub mod driver;
pub mod error;
pub mod job;
pub mod json_path;
pub mod mapping;
pub mod matcher;
pub mod report;
pub mod source;
pub mod store;
pub mod utils;

pub use crate::error::{ConfigurationFault, ElementFault, FieldFault, JobError, JobResult, SourceFault, StoreFault};
pub use crate::job::ImportJob;
pub use crate::report::{ImportIssue, ImportReport, IssueSeverity};
