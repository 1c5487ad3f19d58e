use async_trait::async_trait;
use axum::body::Bytes;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as async_fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{AppError, Result};

/// Byte storage for uploaded files, addressed by path.
#[async_trait]
pub trait BlobStore: Send + Sync {
    fn root(&self) -> &Path;
    async fn ensure_root_exists(&self) -> Result<()>;
    /// Writes `data` under `relative_name`. Fails if the target already exists.
    async fn write(&self, relative_name: &str, data: &[u8]) -> Result<PathBuf>;
    async fn exists(&self, path: &Path) -> Result<bool>;
    async fn read(&self, path: &Path) -> Result<Bytes>;
    /// Removes the blob; a missing blob is not an error.
    async fn delete(&self, path: &Path) -> Result<()>;
    async fn detect_media_type(&self, path: &Path) -> Result<Option<String>>;
    async fn list_names(&self) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    fn root(&self) -> &Path {
        &self.root
    }

    async fn ensure_root_exists(&self) -> Result<()> {
        async_fs::create_dir_all(&self.root).await.map_err(|e| {
            AppError::Storage(format!(
                "Failed to create storage directory {}: {}",
                self.root.display(),
                e
            ))
        })
    }

    async fn write(&self, relative_name: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.root.join(relative_name);

        let mut file = async_fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to create {}: {}", path.display(), e)))?;

        let written = async {
            file.write_all(data).await?;
            file.sync_all().await
        }
        .await;

        if let Err(e) = written {
            drop(file);
            if let Err(cleanup) = async_fs::remove_file(&path).await {
                tracing::warn!("Failed to remove partial blob {}: {}", path.display(), cleanup);
            }
            return Err(AppError::Storage(format!("Failed to write {}: {}", path.display(), e)));
        }

        tracing::debug!("Stored {} bytes at {}", data.len(), path.display());
        Ok(path)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        async_fs::try_exists(path)
            .await
            .map_err(|e| AppError::Storage(format!("Failed to stat {}: {}", path.display(), e)))
    }

    async fn read(&self, path: &Path) -> Result<Bytes> {
        let data = async_fs::read(path).await.map_err(|e| {
            tracing::error!("Failed to read file {}: {}", path.display(), e);
            AppError::Storage(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Ok(Bytes::from(data))
    }

    async fn delete(&self, path: &Path) -> Result<()> {
        match async_fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => {
                tracing::error!("Failed to delete file {}: {}", path.display(), e);
                Err(AppError::Storage(format!("Failed to delete {}: {}", path.display(), e)))
            }
        }
    }

    async fn detect_media_type(&self, path: &Path) -> Result<Option<String>> {
        let mut header = [0u8; 8];
        let read = match async_fs::File::open(path).await {
            Ok(mut file) => file.read(&mut header).await?,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if let Some(media_type) = sniff_magic_bytes(&header[..read]) {
            return Ok(Some(media_type.to_string()));
        }

        Ok(mime_guess::from_path(path)
            .first()
            .map(|mime| mime.essence_str().to_string()))
    }

    async fn list_names(&self) -> Result<Vec<String>> {
        let mut entries = match async_fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_type().await?.is_file() {
                names.push(entry.file_name().to_string_lossy().into_owned());
            }
        }
        names.sort();
        Ok(names)
    }
}

fn sniff_magic_bytes(header: &[u8]) -> Option<&'static str> {
    if header.starts_with(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]) {
        Some("image/png")
    } else if header.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if header.starts_with(b"GIF87a") || header.starts_with(b"GIF89a") {
        Some("image/gif")
    } else if header.starts_with(b"%PDF") {
        Some("application/pdf")
    } else {
        None
    }
}
