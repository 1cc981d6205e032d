mod file;

pub use file::{DownloadCount, FileRecord, FileState, Remaining};
