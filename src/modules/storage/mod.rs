//! Blob storage for uploaded file bytes
//!
//! Blobs are written once under a generated key, streamed back for downloads,
//! and deleted when their share token is purged.

mod error;
mod filesystem;

pub use error::{StorageError, StorageResult};
pub use filesystem::FilesystemBlobStore;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::Stream;
use std::pin::Pin;

/// Stream of blob chunks handed to a downloader.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Stream of upload chunks as they arrive from the client.
pub type UploadStream<'a> = BoxStream<'a, std::io::Result<Bytes>>;

/// Location and size of a blob that has been durably written
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub key: String,
    pub size: u64,
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Persist `body` under a freshly generated key derived from `name`.
    ///
    /// Fails with `CapacityExceeded` when `size_hint` or the streamed byte count
    /// goes over the configured ceiling; nothing is left behind in that case.
    /// The data is synced to disk before this returns.
    async fn save(
        &self,
        name: &str,
        body: UploadStream<'_>,
        size_hint: Option<u64>,
    ) -> StorageResult<StoredBlob>;

    /// Open a blob for streaming. The underlying handle is acquired before returning.
    async fn open(&self, key: &str) -> StorageResult<ByteStream>;

    /// Remove a blob. Succeeds if it is already gone.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Largest blob `save` accepts, in bytes.
    fn max_size(&self) -> u64;
}
