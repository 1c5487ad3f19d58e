use axum::body::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Metadata for one stored file. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRecord {
    pub id: Uuid,
    pub stored_name: String,
    pub original_name: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
}

/// A record that has not been inserted yet; the metadata store assigns the id.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub stored_name: String,
    pub original_name: String,
    pub media_type: String,
    pub size_bytes: u64,
    pub storage_path: String,
    pub uploaded_at: DateTime<Utc>,
}

impl NewFileRecord {
    pub fn with_id(self, id: Uuid) -> FileRecord {
        FileRecord {
            id,
            stored_name: self.stored_name,
            original_name: self.original_name,
            media_type: self.media_type,
            size_bytes: self.size_bytes,
            storage_path: self.storage_path,
            uploaded_at: self.uploaded_at,
        }
    }
}

#[derive(Debug)]
pub struct FileUpload {
    pub original_name: Option<String>,
    pub media_type: Option<String>,
    pub size_bytes: u64,
    pub data: Bytes,
}

impl FileUpload {
    pub fn new(original_name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        let data = data.into();
        Self {
            original_name: Some(original_name.into()),
            media_type: Some(media_type.into()),
            size_bytes: data.len() as u64,
            data,
        }
    }
}

/// A record whose blob was present at lookup time.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub record: FileRecord,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Preview {
    /// Full decoded content, served inline.
    Text { media_type: String, content: String },
    /// Raw bytes with an inline disposition.
    Inline { media_type: String, data: Bytes },
    Unavailable,
}

impl Preview {
    pub const UNAVAILABLE_MESSAGE: &'static str = "Preview not available for this file type";
}

#[derive(Debug, Clone)]
pub struct Download {
    pub stored_name: String,
    pub media_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsistencyReport {
    pub records_without_blob: Vec<String>,
    pub blobs_without_record: Vec<String>,
}

impl ConsistencyReport {
    pub fn is_consistent(&self) -> bool {
        self.records_without_blob.is_empty() && self.blobs_without_record.is_empty()
    }
}
