/// Sentinel stored in `max_downloads` for files without a download limit
pub const UNLIMITED_DOWNLOADS: i64 = -1;

/// Download limit applied when an upload does not specify one
pub const DEFAULT_MAX_DOWNLOADS: i64 = 5;

/// Default per-file upload ceiling (10 GiB)
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 10 * 1024 * 1024 * 1024;

/// Multipart field carrying the uploaded files (repeatable)
pub const FILES_FIELD: &str = "files[]";

/// Multipart field carrying the download limit
pub const MAX_DOWNLOADS_FIELD: &str = "max_downloads";

/// Display name used when sanitizing leaves nothing behind
pub const FALLBACK_FILENAME: &str = "unnamed";

// =============================================================================
// RESPONSE MESSAGES
// =============================================================================

pub const MSG_FILE_NOT_FOUND: &str = "File not found";

pub const MSG_FILE_EXHAUSTED: &str = "File has reached maximum downloads and has been deleted";

pub const MSG_FILE_DELETED: &str = "File deleted successfully";

pub const MSG_FILE_UPLOADED: &str = "File uploaded successfully";

pub const MSG_FILE_TOO_LARGE: &str = "File too large";

pub const MSG_NO_FILE_PART: &str = "No file part";
