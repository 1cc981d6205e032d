//! Local filesystem blob store.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures::StreamExt;
use std::path::{Component, Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{BlobStore, ByteStream, StorageError, StorageResult, StoredBlob, UploadStream};

/// Chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Longest name suffix kept in a key, in bytes. Keeps `.<key>.tmp` under the
/// common 255-byte file name limit.
const KEY_NAME_MAX_BYTES: usize = 128;

/// Blob store rooted at a single local directory.
pub struct FilesystemBlobStore {
    root: PathBuf,
    max_size: u64,
}

impl FilesystemBlobStore {
    /// Create the store, creating `root` if it does not exist.
    pub async fn new(root: impl AsRef<Path>, max_size: u64) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root).await?;
        Ok(Self { root, max_size })
    }

    #[cfg(test)]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build the storage key for a new blob: `<uuid>_<timestamp>_<name>`.
    ///
    /// The name part is cut to [`KEY_NAME_MAX_BYTES`] on a char boundary.
    fn generate_key(name: &str) -> String {
        format!(
            "{}_{}_{}",
            Uuid::new_v4(),
            Utc::now().format("%Y%m%d_%H%M%S"),
            truncate_on_char_boundary(name, KEY_NAME_MAX_BYTES)
        )
    }

    /// Resolve a key to a path directly under the root.
    ///
    /// Keys are flat file names; anything with separators or relative
    /// components is rejected.
    fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }

        let mut components = Path::new(key).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(_)), None) => Ok(self.root.join(key)),
            _ => Err(StorageError::InvalidKey(key.to_string())),
        }
    }

    async fn write_temp(
        &self,
        temp_path: &Path,
        mut body: UploadStream<'_>,
    ) -> StorageResult<u64> {
        let mut file = fs::File::create(temp_path).await?;
        let mut written: u64 = 0;

        while let Some(chunk) = body.next().await {
            let chunk = chunk?;
            written += chunk.len() as u64;
            if written > self.max_size {
                return Err(StorageError::CapacityExceeded {
                    size: written,
                    limit: self.max_size,
                });
            }
            file.write_all(&chunk).await?;
        }

        file.sync_all().await?;
        Ok(written)
    }

    #[cfg(unix)]
    async fn sync_root(&self) -> StorageResult<()> {
        fs::File::open(&self.root).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_root(&self) -> StorageResult<()> {
        Ok(())
    }
}

fn truncate_on_char_boundary(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

#[async_trait]
impl BlobStore for FilesystemBlobStore {
    #[instrument(skip(self, body), fields(backend = "filesystem"))]
    async fn save(
        &self,
        name: &str,
        body: UploadStream<'_>,
        size_hint: Option<u64>,
    ) -> StorageResult<StoredBlob> {
        if let Some(size) = size_hint {
            if size > self.max_size {
                return Err(StorageError::CapacityExceeded {
                    size,
                    limit: self.max_size,
                });
            }
        }

        let key = Self::generate_key(name);
        let path = self.key_path(&key)?;
        let temp_path = self.root.join(format!(".{}.tmp", key));

        // Write to a temp file, fsync, then rename so a partial blob is never visible
        let size = match self.write_temp(&temp_path, body).await {
            Ok(size) => size,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        warn!(path = %temp_path.display(), "Failed to remove temp blob: {}", cleanup);
                    }
                }
                return Err(e);
            }
        };

        fs::rename(&temp_path, &path).await?;
        self.sync_root().await?;

        debug!(key = %key, size, "Blob saved");
        Ok(StoredBlob { key, size })
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn open(&self, key: &str) -> StorageResult<ByteStream> {
        let path = self.key_path(key)?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(key.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem"))]
    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::Io(e)),
        }
    }

    fn max_size(&self) -> u64 {
        self.max_size
    }
}
