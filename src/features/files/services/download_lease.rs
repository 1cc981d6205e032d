use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tracing::{debug, warn};

/// Request to delete an exhausted file's blob and record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PurgeJob {
    pub token: String,
    pub storage_key: String,
    pub attempt: u32,
}

impl PurgeJob {
    pub fn new(token: impl Into<String>, storage_key: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            storage_key: storage_key.into(),
            attempt: 1,
        }
    }

    pub fn retry(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }
}

/// Sending half of the purge worker's queue
#[derive(Clone)]
pub struct PurgeQueue {
    tx: mpsc::UnboundedSender<PurgeJob>,
}

impl PurgeQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PurgeJob>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn enqueue(&self, job: PurgeJob) {
        if let Err(e) = self.tx.send(job) {
            // The periodic sweep picks up whatever the worker never saw
            warn!(token = %e.0.token, "Purge worker stopped, leaving record for the sweep");
        }
    }
}

/// Tracks downloads that are still streaming, per token.
///
/// The sweep and the defensive purge skip leased tokens, and a purge requested
/// by one transfer is only queued once the last transfer of that token ends.
#[derive(Default)]
pub struct DownloadLeases {
    active: Mutex<HashMap<String, LeaseEntry>>,
}

#[derive(Default)]
struct LeaseEntry {
    count: usize,
    purge_key: Option<String>,
}

impl DownloadLeases {
    pub fn acquire(self: &Arc<Self>, token: &str, queue: PurgeQueue) -> DownloadLease {
        {
            let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
            active.entry(token.to_string()).or_default().count += 1;
        }

        DownloadLease {
            token: token.to_string(),
            leases: Arc::clone(self),
            queue,
        }
    }

    pub fn is_leased(&self, token: &str) -> bool {
        let active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.contains_key(token)
    }

    fn mark_purge(&self, token: &str, storage_key: &str) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(entry) = active.get_mut(token) {
            entry.purge_key = Some(storage_key.to_string());
        }
    }

    /// Drop one lease; returns the purge to run if this was the last one.
    fn release(&self, token: &str) -> Option<PurgeJob> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        let entry = active.get_mut(token)?;
        entry.count -= 1;
        if entry.count > 0 {
            return None;
        }

        active
            .remove(token)
            .and_then(|entry| entry.purge_key)
            .map(|key| PurgeJob::new(token, key))
    }
}

/// Held for the lifetime of a download body.
///
/// Dropping it, whether the transfer finished or the client went away,
/// releases the lease and hands any pending purge to the worker.
pub struct DownloadLease {
    token: String,
    leases: Arc<DownloadLeases>,
    queue: PurgeQueue,
}

impl DownloadLease {
    /// Purge the file once every transfer of this token is over
    pub fn purge_on_release(&self, storage_key: &str) {
        self.leases.mark_purge(&self.token, storage_key);
    }
}

impl Drop for DownloadLease {
    fn drop(&mut self) {
        if let Some(job) = self.leases.release(&self.token) {
            debug!(token = %job.token, "Last transfer finished, scheduling purge");
            self.queue.enqueue(job);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lease_counts_overlapping_downloads() {
        let leases = Arc::new(DownloadLeases::default());
        let (queue, _rx) = PurgeQueue::new();

        let first = leases.acquire("t", queue.clone());
        let second = leases.acquire("t", queue);
        assert!(leases.is_leased("t"));

        drop(first);
        assert!(leases.is_leased("t"));
        drop(second);
        assert!(!leases.is_leased("t"));
    }

    #[test]
    fn test_release_enqueues_pending_purge() {
        let leases = Arc::new(DownloadLeases::default());
        let (queue, mut rx) = PurgeQueue::new();

        let lease = leases.acquire("t", queue.clone());
        lease.purge_on_release("key");
        assert!(rx.try_recv().is_err());

        drop(lease);
        assert_eq!(rx.try_recv().unwrap(), PurgeJob::new("t", "key"));

        drop(leases.acquire("t", queue));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_purge_waits_for_last_transfer() {
        let leases = Arc::new(DownloadLeases::default());
        let (queue, mut rx) = PurgeQueue::new();

        let slow = leases.acquire("t", queue.clone());
        let last = leases.acquire("t", queue);
        last.purge_on_release("key");

        drop(last);
        assert!(rx.try_recv().is_err());
        assert!(leases.is_leased("t"));

        drop(slow);
        assert_eq!(rx.try_recv().unwrap().storage_key, "key");
    }

    #[test]
    fn test_retry_bumps_attempt() {
        let job = PurgeJob::new("t", "k").retry().retry();
        assert_eq!(job.attempt, 3);
        assert_eq!(job.token, "t");
    }

    #[test]
    fn test_enqueue_after_worker_gone_is_harmless() {
        let (queue, rx) = PurgeQueue::new();
        drop(rx);

        queue.enqueue(PurgeJob::new("t", "k"));
    }
}
