use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use sqlx::FromRow;
use std::fmt;

use crate::shared::constants::UNLIMITED_DOWNLOADS;

/// Database model for a shared file
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct FileRecord {
    pub token: String,
    pub storage_key: String,
    pub original_name: String,
    pub size_bytes: i64,
    pub downloads: i64,
    pub max_downloads: i64,
    pub uploaded_at: DateTime<Utc>,
}

/// Lifecycle state of a record that still exists.
///
/// A purged token has no record at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileState {
    Active,
    Exhausted,
}

/// Downloads left before a record is purged
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Remaining {
    Unlimited,
    Count(i64),
}

/// Result of an atomic download registration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DownloadCount {
    pub downloads: i64,
    pub limit_reached: bool,
}

impl FileRecord {
    pub fn new(
        token: String,
        storage_key: String,
        original_name: String,
        size_bytes: u64,
        max_downloads: i64,
    ) -> Self {
        Self {
            token,
            storage_key,
            original_name,
            size_bytes: i64::try_from(size_bytes).unwrap_or(i64::MAX),
            downloads: 0,
            max_downloads,
            uploaded_at: Utc::now(),
        }
    }

    pub fn is_unlimited(&self) -> bool {
        self.max_downloads == UNLIMITED_DOWNLOADS
    }

    pub fn state(&self) -> FileState {
        if !self.is_unlimited() && self.downloads >= self.max_downloads {
            FileState::Exhausted
        } else {
            FileState::Active
        }
    }

    pub fn is_exhausted(&self) -> bool {
        self.state() == FileState::Exhausted
    }

    pub fn remaining(&self) -> Remaining {
        if self.is_unlimited() {
            Remaining::Unlimited
        } else {
            Remaining::Count((self.max_downloads - self.downloads).max(0))
        }
    }
}

impl fmt::Display for Remaining {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Remaining::Unlimited => f.write_str("unlimited"),
            Remaining::Count(n) => write!(f, "{}", n),
        }
    }
}

impl Serialize for Remaining {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Remaining::Unlimited => serializer.serialize_str("unlimited"),
            Remaining::Count(n) => serializer.serialize_i64(*n),
        }
    }
}
