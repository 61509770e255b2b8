//! Source document retrieval and decoding

pub mod local;
pub mod sftp;

pub use local::LocalDirectorySource;
pub use sftp::SftpSource;

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::error::SourceFault;

/// A fetched feed document
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Where the document came from; used for cleanup
    pub location: PathBuf,
    pub bytes: Vec<u8>,
}

/// Retrieval of the newest feed document
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// Newest candidate document, or `None` when there is nothing to import
    async fn fetch_latest_document(&self) -> Result<Option<SourceDocument>, SourceFault>;

    /// Remove a document after a successful import
    async fn delete_source_document(&self, document: &SourceDocument) -> std::io::Result<()>;
}

/// `*.json` by extension, case-insensitive
pub(crate) fn is_json_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}

/// Decode a feed document into its elements (`$.*`)
///
/// A top-level array yields its items; a top-level object yields its values.
pub fn decode_elements(bytes: &[u8]) -> Result<Vec<Value>, SourceFault> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    let document: Value = serde_json::from_slice(bytes)?;

    match document {
        Value::Array(items) => Ok(items),
        Value::Object(map) => Ok(map.into_iter().map(|(_, v)| v).collect()),
        Value::Null => Err(SourceFault::UnexpectedShape("null")),
        Value::Bool(_) => Err(SourceFault::UnexpectedShape("a boolean")),
        Value::Number(_) => Err(SourceFault::UnexpectedShape("a number")),
        Value::String(_) => Err(SourceFault::UnexpectedShape("a string")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_array() {
        let elements = decode_elements(br#"[{"HERIS-ID":"1"},{"HERIS-ID":"2"}]"#).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[1]["HERIS-ID"], "2");
    }

    #[test]
    fn test_decode_object_values_in_document_order() {
        let elements = decode_elements(br#"{"b":{"id":"1"},"a":{"id":"2"}}"#).unwrap();
        assert_eq!(elements.len(), 2);
        assert_eq!(elements[0]["id"], "1");
    }

    #[test]
    fn test_decode_empty_array() {
        assert!(decode_elements(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_decode_strips_byte_order_mark() {
        let elements = decode_elements(b"\xEF\xBB\xBF[{}]").unwrap();
        assert_eq!(elements.len(), 1);
    }

    #[test]
    fn test_malformed_json_is_source_fault() {
        assert!(matches!(decode_elements(b"[{"), Err(SourceFault::MalformedJson(_))));
    }

    #[test]
    fn test_scalar_document_is_source_fault() {
        assert!(matches!(decode_elements(b"42"), Err(SourceFault::UnexpectedShape("a number"))));
    }
}
