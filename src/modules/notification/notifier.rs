use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use super::{NotificationSink, UploadNotice};

/// Handle used by request handlers to enqueue upload notices.
///
/// Enqueueing never waits: when the queue is full the notice is dropped
/// with a warning.
#[derive(Clone)]
pub struct Notifier {
    tx: mpsc::Sender<UploadNotice>,
}

/// Background task delivering queued notices to a sink
pub struct NotifierWorker {
    rx: mpsc::Receiver<UploadNotice>,
    sink: Arc<dyn NotificationSink>,
}

impl Notifier {
    pub fn new(capacity: usize, sink: Arc<dyn NotificationSink>) -> (Self, NotifierWorker) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, NotifierWorker { rx, sink })
    }

    pub fn notify(&self, notice: UploadNotice) {
        match self.tx.try_send(notice) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(notice)) => {
                warn!(token = %notice.token, "Notification queue full, dropping upload notice");
            }
            Err(mpsc::error::TrySendError::Closed(notice)) => {
                warn!(token = %notice.token, "Notifier stopped, dropping upload notice");
            }
        }
    }
}

impl NotifierWorker {
    /// Deliver notices until shutdown is signalled, then flush what is already queued.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!(sink = self.sink.name(), "Starting notification worker");

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(notice) => self.deliver(notice).await,
                    None => break,
                },
                _ = shutdown.changed() => {
                    self.drain().await;
                    break;
                }
            }
        }

        info!("Notification worker stopped");
    }

    async fn drain(&mut self) {
        let mut flushed = 0usize;
        while let Ok(notice) = self.rx.try_recv() {
            self.deliver(notice).await;
            flushed += 1;
        }
        if flushed > 0 {
            info!(flushed, "Flushed queued upload notices on shutdown");
        }
    }

    async fn deliver(&self, notice: UploadNotice) {
        match self.sink.deliver(&notice).await {
            Ok(()) => debug!(token = %notice.token, sink = self.sink.name(), "Upload notice delivered"),
            Err(e) => warn!(
                token = %notice.token,
                sink = self.sink.name(),
                "Failed to deliver upload notice: {}",
                e
            ),
        }
    }
}
