use chrono::Utc;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use super::blob::BlobStore;
use super::models::{ConsistencyReport, Download, FileRecord, FileUpload, NewFileRecord, Preview, ResolvedFile};
use super::repository::FileRepositoryTrait;
use super::validation::FileValidator;
use crate::error::{AppError, Result};

/// Upper bound on collision suffixes tried for a single upload.
pub const MAX_NAME_ATTEMPTS: u32 = 10_000;

const DEFAULT_MEDIA_TYPE: &str = "application/octet-stream";

#[derive(Clone)]
pub struct FileManager {
    repository: Arc<dyn FileRepositoryTrait>,
    blobs: Arc<dyn BlobStore>,
    validator: FileValidator,
}

impl FileManager {
    pub fn new(repository: Arc<dyn FileRepositoryTrait>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            repository,
            blobs,
            validator: FileValidator::new(),
        }
    }

    pub async fn initialize(&self) -> Result<()> {
        self.blobs.ensure_root_exists().await
    }

    pub fn storage_root(&self) -> PathBuf {
        self.blobs.root().to_path_buf()
    }

    pub async fn health_check(&self) -> Result<()> {
        self.repository.health_check().await
    }

    pub async fn upload(&self, upload: FileUpload) -> Result<FileRecord> {
        let original_name = self
            .validator
            .validate_upload(upload.original_name.as_deref())?
            .to_string();

        if upload.size_bytes != upload.data.len() as u64 {
            tracing::debug!(
                "Declared size {} differs from received {} bytes for {}",
                upload.size_bytes,
                upload.data.len(),
                original_name
            );
        }

        let stored_name = self.available_name(&original_name).await?;

        self.blobs.ensure_root_exists().await?;
        let storage_path = self.blobs.write(&stored_name, &upload.data).await?;

        let new_record = NewFileRecord {
            stored_name,
            original_name,
            media_type: upload
                .media_type
                .filter(|media_type| !media_type.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()),
            size_bytes: upload.data.len() as u64,
            storage_path: storage_path.to_string_lossy().into_owned(),
            uploaded_at: Utc::now(),
        };

        let record = self.repository.insert(new_record).await.map_err(|e| {
            tracing::error!(
                "Blob {} was written but its record could not be stored: {}",
                storage_path.display(),
                e
            );
            e
        })?;

        tracing::info!("File uploaded successfully: {}", record.stored_name);
        Ok(record)
    }

    /// First of `name`, `base(1).ext`, `base(2).ext`, ... with no existing record.
    async fn available_name(&self, original_name: &str) -> Result<String> {
        let mut candidate = original_name.to_string();

        for attempt in 1..=MAX_NAME_ATTEMPTS {
            if self.repository.find_by_stored_name(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            candidate = suffixed_name(original_name, attempt);
        }

        Err(AppError::Storage(format!(
            "No free name for {} after {} attempts",
            original_name, MAX_NAME_ATTEMPTS
        )))
    }

    pub async fn list(&self) -> Result<Vec<FileRecord>> {
        self.repository.find_all().await
    }

    pub async fn resolve_for_read(&self, stored_name: &str) -> Result<Option<ResolvedFile>> {
        let record = match self.repository.find_by_stored_name(stored_name).await? {
            Some(record) => record,
            None => return Ok(None),
        };

        let path = PathBuf::from(&record.storage_path);
        if !self.blobs.exists(&path).await? {
            tracing::warn!("Record {} has no blob at {}", stored_name, path.display());
            return Ok(None);
        }

        Ok(Some(ResolvedFile { record, path }))
    }

    async fn effective_media_type(&self, resolved: &ResolvedFile) -> Result<String> {
        Ok(self
            .blobs
            .detect_media_type(&resolved.path)
            .await?
            .unwrap_or_else(|| DEFAULT_MEDIA_TYPE.to_string()))
    }

    pub async fn preview(&self, stored_name: &str) -> Result<Option<Preview>> {
        let resolved = match self.resolve_for_read(stored_name).await? {
            Some(resolved) => resolved,
            None => return Ok(None),
        };

        let media_type = self.effective_media_type(&resolved).await?;

        let preview = if media_type.starts_with("text/") || media_type == "application/json" {
            let data = self.blobs.read(&resolved.path).await?;
            Preview::Text {
                media_type,
                content: String::from_utf8_lossy(&data).into_owned(),
            }
        } else if media_type.starts_with("image/") || media_type == "application/pdf" {
            let data = self.blobs.read(&resolved.path).await?;
            Preview::Inline { media_type, data }
        } else {
            Preview::Unavailable
        };

        Ok(Some(preview))
    }

    pub async fn download(&self, stored_name: &str) -> Result<Option<Download>> {
        let resolved = match self.resolve_for_read(stored_name).await? {
            Some(resolved) => resolved,
            None => return Ok(None),
        };

        let media_type = self.effective_media_type(&resolved).await?;
        let data = self.blobs.read(&resolved.path).await?;

        Ok(Some(Download {
            stored_name: resolved.record.stored_name,
            media_type,
            data,
        }))
    }

    /// Returns `false` when nothing is stored under `stored_name`.
    pub async fn delete(&self, stored_name: &str) -> Result<bool> {
        let record = match self.repository.find_by_stored_name(stored_name).await? {
            Some(record) => record,
            None => return Ok(false),
        };

        self.blobs.delete(&PathBuf::from(&record.storage_path)).await?;
        self.repository.delete(&record).await?;

        tracing::info!("File deleted successfully: {}", stored_name);
        Ok(true)
    }

    /// Lists records without blobs and blobs without records. Repairs nothing.
    pub async fn check_consistency(&self) -> Result<ConsistencyReport> {
        let records = self.repository.find_all().await?;
        let mut report = ConsistencyReport::default();
        let mut known_paths = HashSet::with_capacity(records.len());

        for record in &records {
            let path = PathBuf::from(&record.storage_path);
            if !self.blobs.exists(&path).await? {
                report.records_without_blob.push(record.stored_name.clone());
            }
            known_paths.insert(path);
        }

        for name in self.blobs.list_names().await? {
            if !known_paths.contains(&self.blobs.root().join(&name)) {
                report.blobs_without_record.push(name);
            }
        }

        Ok(report)
    }
}

/// `report.txt` + 2 → `report(2).txt`. A name without a dot gets the suffix appended.
pub fn suffixed_name(original_name: &str, counter: u32) -> String {
    match original_name.rfind('.') {
        Some(idx) => format!("{}({}){}", &original_name[..idx], counter, &original_name[idx..]),
        None => format!("{}({})", original_name, counter),
    }
}
