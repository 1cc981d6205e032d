use bytes::Bytes;
use futures::{stream, StreamExt};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::{mpsc, watch};

use crate::core::database;
use crate::features::files::models::FileRecord;
use crate::features::files::services::{
    FileService, FileServiceSettings, MetadataStore, PurgeJob, PurgeQueue, SqliteMetadataStore,
};
use crate::modules::notification::testing::RecordingSink;
use crate::modules::notification::{Notifier, NotifierWorker, UploadNotice};
use crate::modules::storage::{ByteStream, FilesystemBlobStore, UploadStream};

pub const TEST_BASE_URL: &str = "http://files.test";

pub async fn memory_metadata_store() -> SqliteMetadataStore {
    let pool = database::create_memory_pool().await.unwrap();
    database::run_migrations(&pool).await.unwrap();
    SqliteMetadataStore::new(pool)
}

/// Single-chunk upload body
pub fn body_of(data: &[u8]) -> UploadStream<'static> {
    let chunk = Bytes::copy_from_slice(data);
    stream::iter(vec![Ok::<_, std::io::Error>(chunk)]).boxed()
}

pub async fn read_body(mut body: ByteStream) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(chunk) = body.next().await {
        out.extend_from_slice(&chunk.unwrap());
    }
    out
}

/// A file service wired to a temp directory and an in-memory database.
///
/// Purge jobs and upload notices are queued but not processed until the test
/// asks for it.
pub struct TestContext {
    pub service: Arc<FileService>,
    pub blobs: Arc<FilesystemBlobStore>,
    pub metadata: Arc<dyn MetadataStore>,
    pub purge_queue: PurgeQueue,
    pub purge_rx: mpsc::UnboundedReceiver<PurgeJob>,
    sink: Arc<RecordingSink>,
    notifier_worker: Option<NotifierWorker>,
    _dir: TempDir,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::build(1024 * 1024, None).await
    }

    pub async fn with_max_upload_size(max_size: u64) -> Self {
        Self::build(max_size, None).await
    }

    pub async fn with_metadata(metadata: Arc<dyn MetadataStore>) -> Self {
        Self::build(1024 * 1024, Some(metadata)).await
    }

    async fn build(max_size: u64, metadata: Option<Arc<dyn MetadataStore>>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let blobs = Arc::new(
            FilesystemBlobStore::new(dir.path().join("uploads"), max_size)
                .await
                .unwrap(),
        );
        let metadata = match metadata {
            Some(metadata) => metadata,
            None => Arc::new(memory_metadata_store().await),
        };
        let sink = Arc::new(RecordingSink::default());
        let (notifier, notifier_worker) = Notifier::new(16, sink.clone());
        let (purge_queue, purge_rx) = PurgeQueue::new();

        let service = Arc::new(FileService::new(
            Arc::clone(&metadata),
            blobs.clone(),
            notifier,
            purge_queue.clone(),
            FileServiceSettings {
                public_base_url: TEST_BASE_URL.to_string(),
                default_max_downloads: 5,
            },
        ));

        Self {
            service,
            blobs,
            metadata,
            purge_queue,
            purge_rx,
            sink,
            notifier_worker: Some(notifier_worker),
            _dir: dir,
        }
    }

    pub async fn upload(&self, name: &str, data: &[u8], max_downloads: i64) -> FileRecord {
        let staged = self
            .service
            .stage_upload(name, body_of(data), None)
            .await
            .unwrap();
        self.service
            .commit_upload(staged, max_downloads, "127.0.0.1")
            .await
            .unwrap()
    }

    /// Run every purge queued so far
    pub async fn run_pending_purges(&mut self) {
        while let Ok(job) = self.purge_rx.try_recv() {
            self.service
                .purge(&job.token, &job.storage_key)
                .await
                .unwrap();
        }
    }

    /// Hand the purge receiver to a worker under test
    pub fn take_purge_rx(&mut self) -> mpsc::UnboundedReceiver<PurgeJob> {
        let (_, closed) = mpsc::unbounded_channel();
        std::mem::replace(&mut self.purge_rx, closed)
    }

    /// Deliver queued notices and return everything delivered
    pub async fn flush_notices(&mut self) -> Vec<UploadNotice> {
        if let Some(worker) = self.notifier_worker.take() {
            let (shutdown_tx, shutdown_rx) = watch::channel(false);
            shutdown_tx.send(true).unwrap();
            worker.run(shutdown_rx).await;
        }
        self.sink.delivered.lock().unwrap().clone()
    }

    pub fn blob_keys(&self) -> Vec<String> {
        list_dir(self.blobs.root())
    }
}

fn list_dir(root: &Path) -> Vec<String> {
    std::fs::read_dir(root)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
        .collect()
}
