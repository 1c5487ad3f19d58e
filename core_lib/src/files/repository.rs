use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::sync::Arc;
use uuid::Uuid;

use super::models::{FileRecord, NewFileRecord};
use crate::error::{AppError, Result};

/// Persistence for file metadata. Each call is atomic on its own; nothing
/// spans more than one call.
#[async_trait]
pub trait FileRepositoryTrait: Send + Sync {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord>;
    async fn find_by_stored_name(&self, stored_name: &str) -> Result<Option<FileRecord>>;
    async fn find_all(&self) -> Result<Vec<FileRecord>>;
    async fn delete(&self, record: &FileRecord) -> Result<()>;
    async fn health_check(&self) -> Result<()>;
}

const SELECT_COLUMNS: &str =
    "SELECT id, stored_name, original_name, media_type, size_bytes, storage_path, uploaded_at FROM file_records";

#[derive(Clone)]
pub struct SqliteFileRepository {
    pool: SqlitePool,
}

impl SqliteFileRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn record_from_row(row: &SqliteRow) -> Result<FileRecord> {
        let id: String = row.try_get("id")?;
        let uploaded_at: String = row.try_get("uploaded_at")?;

        Ok(FileRecord {
            id: Uuid::parse_str(&id)
                .map_err(|e| AppError::Database(format!("Invalid UUID {}: {}", id, e)))?,
            stored_name: row.try_get("stored_name")?,
            original_name: row.try_get("original_name")?,
            media_type: row.try_get("media_type")?,
            size_bytes: row.try_get::<i64, _>("size_bytes")? as u64,
            storage_path: row.try_get("storage_path")?,
            uploaded_at: DateTime::parse_from_rfc3339(&uploaded_at)
                .map_err(|e| AppError::Database(format!("Invalid datetime {}: {}", uploaded_at, e)))?
                .with_timezone(&Utc),
        })
    }
}

#[async_trait]
impl FileRepositoryTrait for SqliteFileRepository {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord> {
        let record = record.with_id(Uuid::new_v4());

        sqlx::query(
            r#"
            INSERT INTO file_records (id, stored_name, original_name, media_type, size_bytes, storage_path, uploaded_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            "#,
        )
        .bind(record.id.to_string())
        .bind(&record.stored_name)
        .bind(&record.original_name)
        .bind(&record.media_type)
        .bind(record.size_bytes as i64)
        .bind(&record.storage_path)
        .bind(record.uploaded_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(record)
    }

    async fn find_by_stored_name(&self, stored_name: &str) -> Result<Option<FileRecord>> {
        let row = sqlx::query(&format!("{} WHERE stored_name = ?1", SELECT_COLUMNS))
            .bind(stored_name)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(Self::record_from_row).transpose()
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>> {
        let rows = sqlx::query(&format!("{} ORDER BY rowid", SELECT_COLUMNS))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(Self::record_from_row).collect()
    }

    async fn delete(&self, record: &FileRecord) -> Result<()> {
        let rows_affected = sqlx::query("DELETE FROM file_records WHERE id = ?1")
            .bind(record.id.to_string())
            .execute(&self.pool)
            .await?
            .rows_affected();

        if rows_affected == 0 {
            tracing::debug!("Record {} was already gone", record.stored_name);
        }

        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT COUNT(*) FROM file_records")
            .fetch_one(&self.pool)
            .await?;
        Ok(())
    }
}

/// Non-durable metadata store. Used when no database is available and in tests.
#[derive(Clone, Default)]
pub struct MemoryFileRepository {
    records: Arc<RwLock<Vec<FileRecord>>>,
}

impl MemoryFileRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FileRepositoryTrait for MemoryFileRepository {
    async fn insert(&self, record: NewFileRecord) -> Result<FileRecord> {
        let mut records = self.records.write();

        if records.iter().any(|r| r.stored_name == record.stored_name) {
            return Err(AppError::Conflict(format!(
                "A file named {} already exists",
                record.stored_name
            )));
        }

        let record = record.with_id(Uuid::new_v4());
        records.push(record.clone());
        Ok(record)
    }

    async fn find_by_stored_name(&self, stored_name: &str) -> Result<Option<FileRecord>> {
        Ok(self
            .records
            .read()
            .iter()
            .find(|r| r.stored_name == stored_name)
            .cloned())
    }

    async fn find_all(&self) -> Result<Vec<FileRecord>> {
        Ok(self.records.read().clone())
    }

    async fn delete(&self, record: &FileRecord) -> Result<()> {
        self.records.write().retain(|r| r.id != record.id);
        Ok(())
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}
