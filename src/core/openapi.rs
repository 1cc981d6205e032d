use utoipa::{Modify, OpenApi};

use crate::features::files::{dtos as files_dtos, handlers as files_handlers};
use crate::features::pages::handlers as pages_handlers;

#[derive(OpenApi)]
#[openapi(
    paths(
        // Files
        files_handlers::upload_files,
        files_handlers::download_file,
        files_handlers::delete_file,
        // Pages
        pages_handlers::check_file,
    ),
    components(
        schemas(
            files_dtos::UploadFilesDto,
            files_dtos::UploadResultDto,
            files_dtos::UploadErrorDto,
        )
    ),
    tags(
        (name = "files", description = "Upload, check, download and delete shared files"),
    ),
    info(
        title = "Filedrop API",
        version = "0.1.0",
        description = "Upload files and share them for a limited number of downloads",
    )
)]
pub struct ApiDoc;

/// Modifier to override OpenAPI info from config
pub struct SwaggerInfoModifier {
    pub title: String,
    pub version: String,
    pub description: String,
}

impl Modify for SwaggerInfoModifier {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        openapi.info.title = self.title.clone();
        openapi.info.version = self.version.clone();
        openapi.info.description = Some(self.description.clone());
    }
}
