use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{interval, MissedTickBehavior};

use crate::core::config::PurgeConfig;
use crate::features::files::services::{FileService, PurgeJob, PurgeQueue};

/// Background worker that deletes exhausted files.
///
/// Jobs arrive when the final permitted download of a file ends. A periodic
/// sweep catches records whose purge was lost, e.g. across a restart.
pub struct PurgeWorker {
    service: Arc<FileService>,
    queue: PurgeQueue,
    rx: mpsc::UnboundedReceiver<PurgeJob>,
    config: PurgeConfig,
}

impl PurgeWorker {
    pub fn new(
        service: Arc<FileService>,
        queue: PurgeQueue,
        rx: mpsc::UnboundedReceiver<PurgeJob>,
        config: PurgeConfig,
    ) -> Self {
        Self {
            service,
            queue,
            rx,
            config,
        }
    }

    /// Run until shutdown is signalled, then finish the jobs already queued
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        tracing::info!(
            "Starting purge worker (sweep every {:?})",
            self.config.sweep_interval
        );

        let mut sweep = interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                received = self.rx.recv() => match received {
                    Some(job) => self.process(job).await,
                    None => break,
                },
                _ = sweep.tick() => self.sweep().await,
                _ = shutdown.changed() => {
                    self.drain().await;
                    break;
                }
            }
        }

        tracing::info!("Purge worker stopped");
    }

    async fn process(&self, job: PurgeJob) {
        let Err(e) = self.service.purge(&job.token, &job.storage_key).await else {
            return;
        };

        if job.attempt >= self.config.max_attempts {
            tracing::error!(
                "Giving up purging {} after {} attempts: {:?}",
                job.token,
                job.attempt,
                e
            );
            return;
        }

        let delay = self.config.retry_delay * job.attempt;
        tracing::warn!(
            "Purge of {} failed (attempt {}), retrying in {:?}: {:?}",
            job.token,
            job.attempt,
            delay,
            e
        );

        let queue = self.queue.clone();
        let job = job.retry();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            queue.enqueue(job);
        });
    }

    async fn sweep(&self) {
        match self.service.sweep_exhausted(self.config.sweep_batch_size).await {
            Ok(0) => {}
            Ok(purged) => tracing::info!("Sweep purged {} exhausted files", purged),
            Err(e) => tracing::error!("Error sweeping exhausted files: {:?}", e),
        }
    }

    async fn drain(&mut self) {
        while let Ok(job) = self.rx.try_recv() {
            if let Err(e) = self.service.purge(&job.token, &job.storage_key).await {
                tracing::warn!("Purge of {} failed during shutdown: {:?}", job.token, e);
            }
        }
    }
}
