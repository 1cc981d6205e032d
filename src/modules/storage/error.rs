use thiserror::Error;

/// Blob store operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("blob not found: {0}")]
    NotFound(String),

    #[error("blob of {size} bytes exceeds the {limit} byte limit")]
    CapacityExceeded { size: u64, limit: u64 },

    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for blob store operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
