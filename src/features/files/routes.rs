use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;

use crate::features::files::handlers::{delete_file, download_file, upload_files};
use crate::features::files::services::FileService;

/// Create routes for the files feature
pub fn routes(file_service: Arc<FileService>, max_request_body_size: usize) -> Router {
    Router::new()
        .route(
            "/upload",
            // Per-file limits are enforced while streaming; this caps the whole form
            post(upload_files).layer(DefaultBodyLimit::max(max_request_body_size)),
        )
        .route("/download/{token}", get(download_file))
        .route("/delete/{token}", get(delete_file))
        .with_state(file_service)
}
