use axum::{routing::get, Router};
use std::sync::Arc;

use crate::features::files::FileService;
use crate::features::pages::handlers::{check_file, home, submit_check};

/// Create routes for the browser-facing pages
pub fn routes(file_service: Arc<FileService>) -> Router {
    Router::new()
        .route("/", get(home).post(submit_check))
        .route("/check/{token}", get(check_file))
        .with_state(file_service)
}
