//! Newest-file retrieval from a local folder

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::SystemTime;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::{is_json_file, DocumentSource, SourceDocument};
use crate::error::SourceFault;

/// Picks the most recently modified `*.json` file below a folder
pub struct LocalDirectorySource {
    folder: PathBuf,
}

impl LocalDirectorySource {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self { folder: folder.into() }
    }

    /// Newest JSON file by modification time, without reading it
    pub fn find_latest(&self) -> Result<Option<PathBuf>, SourceFault> {
        if !self.folder.is_dir() {
            return Err(SourceFault::FolderUnavailable(self.folder.clone()));
        }

        let mut newest: Option<(SystemTime, PathBuf)> = None;

        for entry in WalkDir::new(&self.folder).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Error accessing entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().is_file() || !is_json_file(entry.path()) {
                continue;
            }

            let modified = match entry.metadata().map(|m| m.modified()) {
                Ok(Ok(modified)) => modified,
                Ok(Err(e)) => {
                    warn!("No modification time for {}: {}", entry.path().display(), e);
                    continue;
                }
                Err(e) => {
                    warn!("Cannot read metadata for {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            let candidate = (modified, entry.into_path());
            newest = match newest {
                Some(current) if current >= candidate => Some(current),
                _ => Some(candidate),
            };
        }

        Ok(newest.map(|(_, path)| path))
    }
}

#[async_trait]
impl DocumentSource for LocalDirectorySource {
    async fn fetch_latest_document(&self) -> Result<Option<SourceDocument>, SourceFault> {
        let Some(path) = self.find_latest()? else {
            debug!(folder = %self.folder.display(), "No JSON file found");
            return Ok(None);
        };

        let bytes = tokio::fs::read(&path)
            .await
            .map_err(|source| SourceFault::Unreadable {
                path: path.clone(),
                source,
            })?;

        info!(file = %path.display(), bytes = bytes.len(), "Selected import file");

        Ok(Some(SourceDocument { location: path, bytes }))
    }

    async fn delete_source_document(&self, document: &SourceDocument) -> std::io::Result<()> {
        tokio::fs::remove_file(&document.location).await
    }
}
