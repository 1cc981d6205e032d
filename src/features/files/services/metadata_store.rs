use async_trait::async_trait;
use sqlx::SqlitePool;
use tracing::{debug, error};

use crate::core::error::{AppError, Result};
use crate::features::files::models::{DownloadCount, FileRecord};

const FILE_COLUMNS: &str =
    "token, storage_key, original_name, size_bytes, downloads, max_downloads, uploaded_at";

/// Durable file records keyed by share token
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a new record. Fails with `Conflict` when the token or storage key is taken.
    async fn create(&self, record: &FileRecord) -> Result<()>;

    async fn get(&self, token: &str) -> Result<Option<FileRecord>>;

    /// Count one download if the record still permits it.
    ///
    /// Check and increment happen in a single statement, so concurrent callers
    /// can never push `downloads` past `max_downloads`. Fails with `NotFound`
    /// for unknown tokens and `Exhausted` when no downloads are left.
    async fn register_download(&self, token: &str) -> Result<DownloadCount>;

    /// Remove a record. Returns whether a row was deleted.
    async fn delete(&self, token: &str) -> Result<bool>;

    /// Bounded records whose counter has reached the limit, oldest first
    async fn list_exhausted(&self, limit: i64) -> Result<Vec<FileRecord>>;
}

/// SQLite-backed metadata store
pub struct SqliteMetadataStore {
    pool: SqlitePool,
}

impl SqliteMetadataStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    async fn create(&self, record: &FileRecord) -> Result<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO files (token, storage_key, original_name, size_bytes, downloads, max_downloads, uploaded_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.token)
        .bind(&record.storage_key)
        .bind(&record.original_name)
        .bind(record.size_bytes)
        .bind(record.downloads)
        .bind(record.max_downloads)
        .bind(record.uploaded_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(token = %record.token, "File record created");
                Ok(())
            }
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AppError::Conflict(conflict_message(e.message(), record)))
            }
            Err(e) => {
                error!("Failed to create file record: {:?}", e);
                Err(AppError::Database(e))
            }
        }
    }

    async fn get(&self, token: &str) -> Result<Option<FileRecord>> {
        let sql = format!("SELECT {} FROM files WHERE token = ?", FILE_COLUMNS);
        let record = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(token)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }

    async fn register_download(&self, token: &str) -> Result<DownloadCount> {
        let updated: Option<(i64, i64)> = sqlx::query_as(
            r#"
            UPDATE files
            SET downloads = downloads + 1
            WHERE token = ?
              AND (max_downloads = -1 OR downloads < max_downloads)
            RETURNING downloads, max_downloads
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| {
            error!("Failed to register download: {:?}", e);
            AppError::Database(e)
        })?;

        match updated {
            Some((downloads, max_downloads)) => Ok(DownloadCount {
                downloads,
                limit_reached: max_downloads != -1 && downloads >= max_downloads,
            }),
            // Nothing matched: either the token is gone or the limit was already used up
            None => match self.get(token).await? {
                Some(_) => Err(AppError::Exhausted(token.to_string())),
                None => Err(AppError::NotFound(token.to_string())),
            },
        }
    }

    async fn delete(&self, token: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM files WHERE token = ?")
            .bind(token)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_exhausted(&self, limit: i64) -> Result<Vec<FileRecord>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM files
            WHERE max_downloads <> -1 AND downloads >= max_downloads
            ORDER BY uploaded_at ASC
            LIMIT ?
            "#,
            FILE_COLUMNS
        );
        let records = sqlx::query_as::<_, FileRecord>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        Ok(records)
    }
}

/// Name the column whose UNIQUE constraint rejected `record`.
///
/// SQLite reports the failing columns only in the message
/// (`UNIQUE constraint failed: files.storage_key`).
fn conflict_message(db_message: &str, record: &FileRecord) -> String {
    if db_message.contains("files.storage_key") {
        format!("Storage key {} already exists", record.storage_key)
    } else {
        format!("Token {} already exists", record.token)
    }
}
