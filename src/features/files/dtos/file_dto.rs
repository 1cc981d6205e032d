use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::core::error::{AppError, Result};
use crate::features::files::models::{FileRecord, Remaining};
use crate::features::files::services::validate_max_downloads;

/// Upload form for OpenAPI documentation
/// Note: This struct is for Swagger UI documentation only.
/// The actual handler uses axum's Multipart extractor directly.
#[derive(Debug, Deserialize, ToSchema)]
#[allow(dead_code)]
pub struct UploadFilesDto {
    /// Files to share; repeat the field for several files
    #[serde(rename = "files[]")]
    #[schema(format = Binary, content_media_type = "application/octet-stream")]
    pub files: Vec<String>,
    /// Downloads allowed per file, `-1` for unlimited (defaults to 5)
    #[schema(example = "5")]
    pub max_downloads: Option<String>,
}

/// Outcome for one uploaded file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(untagged)]
pub enum UploadResultDto {
    Uploaded {
        /// File name as sent by the client
        filename: String,
        /// Share token for check, download and delete links
        uuid: String,
        message: String,
    },
    Failed {
        filename: String,
        error: String,
    },
}

/// Error body for uploads rejected as a whole
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadErrorDto {
    pub error: String,
}

/// File details shown on the check page
#[derive(Debug, Serialize)]
pub struct FileInfoDto {
    pub token: String,
    pub filename: String,
    pub downloads: i64,
    pub remaining: Remaining,
    pub size_bytes: i64,
    pub size: String,
    pub uploaded_at: DateTime<Utc>,
}

impl From<FileRecord> for FileInfoDto {
    fn from(record: FileRecord) -> Self {
        Self {
            remaining: record.remaining(),
            size: format_size(record.size_bytes.max(0) as u64),
            token: record.token,
            filename: record.original_name,
            downloads: record.downloads,
            size_bytes: record.size_bytes,
            uploaded_at: record.uploaded_at,
        }
    }
}

/// Parse the `max_downloads` form value, falling back to `default` when absent
pub fn parse_max_downloads(raw: Option<&str>, default: i64) -> Result<i64> {
    let value = match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(text) => text.parse::<i64>().map_err(|_| {
            AppError::Validation("max_downloads must be an integer".to_string())
        })?,
        None => default,
    };
    validate_max_downloads(value)
}

/// Human-readable size in binary units
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    if bytes < 1024 {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    format!("{:.2} {}", size, UNITS[unit])
}
