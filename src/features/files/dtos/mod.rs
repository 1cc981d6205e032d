mod file_dto;

pub use file_dto::{
    format_size, parse_max_downloads, FileInfoDto, UploadErrorDto, UploadFilesDto,
    UploadResultDto,
};
