//! Upload notification side channel
//!
//! Request handlers enqueue an [`UploadNotice`] on a bounded queue; a single
//! worker drains it into a [`NotificationSink`]. Delivery failures are logged
//! and never reach the uploader.

mod notifier;
mod sinks;

pub use notifier::{Notifier, NotifierWorker};
pub use sinks::{LogSink, WebhookSink};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;

const BYTES_PER_GB: f64 = 1024.0 * 1024.0 * 1024.0;

/// Errors raised while delivering a notice.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("sink rejected notice with status {0}")]
    Rejected(u16),
}

/// Facts about a freshly uploaded file
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct UploadNotice {
    pub token: String,
    pub stored_name: String,
    pub original_name: String,
    pub size_bytes: u64,
    pub client_ip: String,
    pub uploaded_at: DateTime<Utc>,
    pub check_url: String,
}

impl UploadNotice {
    pub fn subject(&self) -> &'static str {
        "File Uploaded"
    }

    /// Human-readable body, suitable for an email or chat message
    pub fn body(&self) -> String {
        format!(
            "A file has been uploaded:\n\
             Name: {}\n\
             Size: {:.2} GB\n\
             UUID: {}\n\
             Client IP: {}\n\
             Upload Date: {}\n\
             \n\
             Download Link: {}\n",
            self.stored_name,
            self.size_bytes as f64 / BYTES_PER_GB,
            self.token,
            self.client_ip,
            self.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
            self.check_url
        )
    }
}

/// Destination for upload notices
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notice: &UploadNotice) -> Result<(), NotificationError>;

    fn name(&self) -> &'static str;
}
