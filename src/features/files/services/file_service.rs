use futures::StreamExt;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{FileRecord, FileState};
use crate::modules::notification::{Notifier, UploadNotice};
use crate::modules::storage::{BlobStore, ByteStream, StorageError, StoredBlob, UploadStream};
use crate::shared::constants::UNLIMITED_DOWNLOADS;
use crate::shared::validation::sanitize_filename;

use super::download_lease::{DownloadLeases, PurgeQueue};
use super::MetadataStore;

/// Runtime settings for the file lifecycle
#[derive(Debug, Clone)]
pub struct FileServiceSettings {
    /// Base URL used to build check links in upload notices
    pub public_base_url: String,
    pub default_max_downloads: i64,
}

/// Blob written during an upload whose record has not been created yet
#[derive(Debug)]
pub struct StagedUpload {
    pub original_name: String,
    pub blob: StoredBlob,
}

/// An authorized download: the record as counted, and its bytes
pub struct Download {
    pub record: FileRecord,
    pub body: ByteStream,
}

/// Reject download limits other than the unlimited sentinel or a positive bound
pub fn validate_max_downloads(max_downloads: i64) -> Result<i64> {
    if max_downloads == UNLIMITED_DOWNLOADS || max_downloads > 0 {
        Ok(max_downloads)
    } else {
        Err(AppError::Validation(
            "max_downloads must be -1 (unlimited) or a positive number".to_string(),
        ))
    }
}

/// Lifecycle of shared files: upload, inspect, download and purge.
///
/// A record moves from active to exhausted when its last permitted download
/// is registered, and is purged (blob first, then record) once that transfer
/// ends. Unlimited records stay active until removed explicitly.
pub struct FileService {
    metadata: Arc<dyn MetadataStore>,
    blobs: Arc<dyn BlobStore>,
    notifier: Notifier,
    purge_queue: PurgeQueue,
    leases: Arc<DownloadLeases>,
    settings: FileServiceSettings,
}

impl FileService {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        blobs: Arc<dyn BlobStore>,
        notifier: Notifier,
        purge_queue: PurgeQueue,
        settings: FileServiceSettings,
    ) -> Self {
        Self {
            metadata,
            blobs,
            notifier,
            purge_queue,
            leases: Arc::new(DownloadLeases::default()),
            settings,
        }
    }

    pub fn default_max_downloads(&self) -> i64 {
        self.settings.default_max_downloads
    }

    pub fn max_upload_size(&self) -> u64 {
        self.blobs.max_size()
    }

    /// Write an uploaded file's bytes without making it visible yet
    pub async fn stage_upload(
        &self,
        filename: &str,
        body: UploadStream<'_>,
        size_hint: Option<u64>,
    ) -> Result<StagedUpload> {
        let original_name = sanitize_filename(filename);
        let blob = self
            .blobs
            .save(&original_name, body, size_hint)
            .await
            .map_err(|e| {
                warn!(filename = %original_name, "Failed to store upload: {}", e);
                AppError::from(e)
            })?;

        debug!(key = %blob.key, size = blob.size, "Upload staged");
        Ok(StagedUpload {
            original_name,
            blob,
        })
    }

    /// Create the record for a staged blob and announce it.
    ///
    /// The blob is deleted again when the record cannot be created.
    pub async fn commit_upload(
        &self,
        staged: StagedUpload,
        max_downloads: i64,
        client_ip: &str,
    ) -> Result<FileRecord> {
        let max_downloads = match validate_max_downloads(max_downloads) {
            Ok(value) => value,
            Err(e) => {
                self.discard_upload(staged).await;
                return Err(e);
            }
        };

        let record = FileRecord::new(
            Uuid::new_v4().to_string(),
            staged.blob.key.clone(),
            staged.original_name.clone(),
            staged.blob.size,
            max_downloads,
        );

        if let Err(e) = self.metadata.create(&record).await {
            self.discard_upload(staged).await;
            return Err(e);
        }

        info!(
            token = %record.token,
            size = staged.blob.size,
            max_downloads,
            "File uploaded"
        );

        self.notifier.notify(UploadNotice {
            token: record.token.clone(),
            stored_name: record.storage_key.clone(),
            original_name: record.original_name.clone(),
            size_bytes: staged.blob.size,
            client_ip: client_ip.to_string(),
            uploaded_at: record.uploaded_at,
            check_url: format!("{}/check/{}", self.settings.public_base_url, record.token),
        });

        Ok(record)
    }

    /// Delete the blob of an upload that will never be committed
    pub async fn discard_upload(&self, staged: StagedUpload) {
        if let Err(e) = self.blobs.delete(&staged.blob.key).await {
            warn!(key = %staged.blob.key, "Failed to discard staged upload: {}", e);
        }
    }

    /// Metadata of a live file. Exhausted files are reported as missing.
    pub async fn inspect(&self, token: &str) -> Result<FileRecord> {
        match self.metadata.get(token).await? {
            Some(record) if record.state() == FileState::Active => Ok(record),
            _ => Err(AppError::NotFound(token.to_string())),
        }
    }

    /// Count a download and hand back the file's bytes.
    ///
    /// When this download uses up the limit, the file is purged as soon as
    /// the returned body is finished or dropped.
    pub async fn authorize_download(&self, token: &str) -> Result<Download> {
        let mut record = self
            .metadata
            .get(token)
            .await?
            .ok_or_else(|| AppError::NotFound(token.to_string()))?;

        if record.is_exhausted() {
            // Left behind by an earlier failed purge
            if !self.leases.is_leased(token) {
                if let Err(e) = self.purge(token, &record.storage_key).await {
                    warn!(token = %token, "Failed to purge exhausted file: {}", e);
                }
            }
            return Err(AppError::Exhausted(token.to_string()));
        }

        let lease = self.leases.acquire(token, self.purge_queue.clone());

        // Open before counting so a missing blob never costs a download
        let mut blob = match self.blobs.open(&record.storage_key).await {
            Ok(stream) => stream,
            Err(StorageError::NotFound(key)) => {
                warn!(token = %token, key = %key, "Blob missing for live record, purging");
                drop(lease);
                if let Err(e) = self.purge(token, &record.storage_key).await {
                    warn!(token = %token, "Failed to purge file with missing blob: {}", e);
                }
                return Err(AppError::NotFound(token.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let count = self.metadata.register_download(token).await?;
        if count.limit_reached {
            lease.purge_on_release(&record.storage_key);
        }
        record.downloads = count.downloads;

        info!(
            token = %token,
            downloads = count.downloads,
            limit_reached = count.limit_reached,
            "Download authorized"
        );

        let body: ByteStream = Box::pin(async_stream::stream! {
            let _lease = lease;
            while let Some(chunk) = blob.next().await {
                yield chunk;
            }
        });

        Ok(Download { record, body })
    }

    /// Explicitly delete a file and its record
    pub async fn remove(&self, token: &str) -> Result<()> {
        let record = self
            .metadata
            .get(token)
            .await?
            .ok_or_else(|| AppError::NotFound(token.to_string()))?;

        self.purge(token, &record.storage_key).await?;
        info!(token = %token, "File removed on request");
        Ok(())
    }

    /// Delete the blob, then the record
    pub async fn purge(&self, token: &str, storage_key: &str) -> Result<()> {
        self.blobs.delete(storage_key).await?;
        self.metadata.delete(token).await?;
        info!(token = %token, "File purged");
        Ok(())
    }

    /// Purge exhausted records that no transfer is still reading
    pub async fn sweep_exhausted(&self, batch_size: i64) -> Result<usize> {
        let records = self.metadata.list_exhausted(batch_size).await?;
        let mut purged = 0;

        for record in records {
            if self.leases.is_leased(&record.token) {
                debug!(token = %record.token, "Skipping exhausted file still being sent");
                continue;
            }
            match self.purge(&record.token, &record.storage_key).await {
                Ok(()) => purged += 1,
                Err(e) => warn!(token = %record.token, "Sweep failed to purge file: {}", e),
            }
        }

        Ok(purged)
    }
}
