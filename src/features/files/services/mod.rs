mod download_lease;
mod file_service;
mod metadata_store;

pub use download_lease::{PurgeJob, PurgeQueue};
pub use file_service::{
    validate_max_downloads, FileService, FileServiceSettings, StagedUpload,
};
pub use metadata_store::{MetadataStore, SqliteMetadataStore};
