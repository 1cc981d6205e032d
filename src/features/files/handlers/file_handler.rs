use axum::{
    body::Body,
    extract::{multipart::MultipartError, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{StreamExt, TryStreamExt};
use std::sync::Arc;
use tracing::debug;

use crate::core::error::{AppError, Result};
use crate::core::extractor::ClientIp;
use crate::features::files::dtos::{
    parse_max_downloads, UploadErrorDto, UploadFilesDto, UploadResultDto,
};
use crate::features::files::services::{FileService, StagedUpload};
use crate::shared::constants::{
    FILES_FIELD, MAX_DOWNLOADS_FIELD, MSG_FILE_DELETED, MSG_FILE_TOO_LARGE, MSG_FILE_UPLOADED,
    MSG_NO_FILE_PART,
};
use crate::shared::validation::is_valid_token;

/// A file part as it came off the wire, stored or not
struct ReceivedFile {
    filename: String,
    staged: Result<StagedUpload>,
}

fn multipart_error(e: MultipartError) -> AppError {
    debug!("Failed to read multipart data: {}", e);
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::CapacityExceeded(e.body_text())
    } else {
        AppError::BadRequest(format!("Failed to read multipart data: {}", e))
    }
}

/// Read every form field, storing file parts as they stream in.
///
/// Files are written before `max_downloads` is known, since the client may
/// send that field last.
async fn read_upload_form(
    service: &FileService,
    multipart: &mut Multipart,
    received: &mut Vec<ReceivedFile>,
    max_downloads: &mut Option<String>,
) -> Result<()> {
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let field_name = field.name().unwrap_or("").to_string();

        match field_name.as_str() {
            FILES_FIELD => {
                let filename = field.file_name().unwrap_or("").to_string();
                if filename.is_empty() {
                    debug!("Skipping file part without a filename");
                    continue;
                }

                let body = field.map_err(std::io::Error::other).boxed();
                let staged = service.stage_upload(&filename, body, None).await;
                received.push(ReceivedFile { filename, staged });
            }
            MAX_DOWNLOADS_FIELD => {
                *max_downloads = Some(field.text().await.map_err(multipart_error)?);
            }
            _ => {
                // Ignore unknown fields
                debug!("Ignoring unknown field: {}", field_name);
            }
        }
    }

    Ok(())
}

async fn discard_all(service: &FileService, received: Vec<ReceivedFile>) {
    for file in received {
        if let Ok(staged) = file.staged {
            service.discard_upload(staged).await;
        }
    }
}

fn upload_error_message(err: &AppError) -> String {
    match err {
        AppError::CapacityExceeded(_) => MSG_FILE_TOO_LARGE.to_string(),
        AppError::Conflict(_) => "Share token collision, please retry".to_string(),
        _ => "Failed to store file".to_string(),
    }
}

/// `attachment` disposition with an ASCII fallback and the exact UTF-8 name
fn content_disposition(filename: &str) -> String {
    let fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        fallback,
        urlencoding::encode(filename)
    )
}

/// Upload files
///
/// Accepts multipart/form-data with:
/// - `files[]`: one or more files (required)
/// - `max_downloads`: downloads allowed per file, `-1` for unlimited (optional, defaults to 5)
///
/// Every file gets its own entry in the response; a file that could not be
/// stored is reported without failing the others.
#[utoipa::path(
    post,
    path = "/upload",
    tag = "files",
    request_body(
        content = UploadFilesDto,
        content_type = "multipart/form-data",
        description = "Files to share and an optional download limit",
    ),
    responses(
        (status = 200, description = "Per-file upload results", body = Vec<UploadResultDto>),
        (status = 400, description = "No file part, or invalid max_downloads", body = UploadErrorDto),
        (status = 413, description = "Request body too large")
    )
)]
pub async fn upload_files(
    State(service): State<Arc<FileService>>,
    ClientIp(client_ip): ClientIp,
    mut multipart: Multipart,
) -> Result<Response> {
    let mut received = Vec::new();
    let mut max_downloads_field = None;

    if let Err(e) =
        read_upload_form(&service, &mut multipart, &mut received, &mut max_downloads_field).await
    {
        discard_all(&service, received).await;
        return Err(e);
    }

    if received.is_empty() {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(UploadErrorDto {
                error: MSG_NO_FILE_PART.to_string(),
            }),
        )
            .into_response());
    }

    let max_downloads = match parse_max_downloads(
        max_downloads_field.as_deref(),
        service.default_max_downloads(),
    ) {
        Ok(value) => value,
        Err(e) => {
            discard_all(&service, received).await;
            return Err(e);
        }
    };

    let mut results = Vec::with_capacity(received.len());
    for ReceivedFile { filename, staged } in received {
        let committed = match staged {
            Ok(staged) => service.commit_upload(staged, max_downloads, &client_ip).await,
            Err(e) => Err(e),
        };

        results.push(match committed {
            Ok(record) => UploadResultDto::Uploaded {
                filename,
                uuid: record.token,
                message: MSG_FILE_UPLOADED.to_string(),
            },
            Err(e) => UploadResultDto::Failed {
                error: upload_error_message(&e),
                filename,
            },
        });
    }

    Ok(Json(results).into_response())
}

/// Download a file
///
/// Counts one download. The file is deleted once its last permitted
/// download has been sent.
#[utoipa::path(
    get,
    path = "/download/{token}",
    tag = "files",
    params(
        ("token" = String, Path, description = "Share token")
    ),
    responses(
        (status = 200, description = "File contents", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown token, or download limit reached")
    )
)]
pub async fn download_file(
    State(service): State<Arc<FileService>>,
    Path(token): Path<String>,
) -> Result<Response> {
    if !is_valid_token(&token) {
        return Err(AppError::NotFound(token));
    }

    let download = service.authorize_download(&token).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "application/octet-stream")
        .header(header::CONTENT_LENGTH, download.record.size_bytes)
        .header(
            header::CONTENT_DISPOSITION,
            content_disposition(&download.record.original_name),
        )
        .body(Body::from_stream(download.body))
        .map_err(|e| AppError::Internal(format!("Failed to build download response: {}", e)))
}

/// Delete a file
#[utoipa::path(
    get,
    path = "/delete/{token}",
    tag = "files",
    params(
        ("token" = String, Path, description = "Share token")
    ),
    responses(
        (status = 200, description = "File deleted", body = String),
        (status = 404, description = "File not found")
    )
)]
pub async fn delete_file(
    State(service): State<Arc<FileService>>,
    Path(token): Path<String>,
) -> Result<&'static str> {
    if !is_valid_token(&token) {
        return Err(AppError::NotFound(token));
    }

    service.remove(&token).await?;
    Ok(MSG_FILE_DELETED)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::files::routes::routes;
    use crate::shared::constants::MSG_FILE_NOT_FOUND;
    use crate::shared::test_helpers::TestContext;
    use axum_test::multipart::{MultipartForm, Part};
    use axum_test::TestServer;

    fn server(ctx: &TestContext) -> TestServer {
        TestServer::new(routes(Arc::clone(&ctx.service), 64 * 1024 * 1024)).unwrap()
    }

    fn file_part(data: &[u8], name: &str) -> Part {
        Part::bytes(data.to_vec()).file_name(name.to_string())
    }

    async fn upload_one(server: &TestServer, name: &str, data: &[u8], max: &str) -> String {
        let form = MultipartForm::new()
            .add_part("files[]", file_part(data, name))
            .add_text("max_downloads", max.to_string());
        let response = server.post("/upload").multipart(form).await;
        response.assert_status_ok();

        match response.json::<Vec<UploadResultDto>>().remove(0) {
            UploadResultDto::Uploaded { uuid, .. } => uuid,
            other => panic!("upload failed: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_upload_then_download_twice() {
        let mut ctx = TestContext::new().await;
        let server = server(&ctx);
        let token = upload_one(&server, "report.pdf", b"12345", "2").await;

        for _ in 0..2 {
            let response = server.get(&format!("/download/{}", token)).await;
            response.assert_status_ok();
            assert_eq!(response.as_bytes().as_ref(), b"12345");
            let disposition = response.header(header::CONTENT_DISPOSITION);
            assert!(disposition.to_str().unwrap().contains("filename=\"report.pdf\""));
        }
        ctx.run_pending_purges().await;

        let response = server.get(&format!("/download/{}", token)).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert!(ctx.service.inspect(&token).await.is_err());
        assert!(ctx.blob_keys().is_empty());
    }

    #[tokio::test]
    async fn test_upload_reports_each_file() {
        let ctx = TestContext::with_max_upload_size(4).await;
        let server = server(&ctx);
        let form = MultipartForm::new()
            .add_part("files[]", file_part(b"abc", "small.txt"))
            .add_part("files[]", file_part(b"too big", "big.bin"));

        let response = server.post("/upload").multipart(form).await;

        response.assert_status_ok();
        let results = response.json::<Vec<UploadResultDto>>();
        assert_eq!(results.len(), 2);
        assert!(matches!(
            &results[0],
            UploadResultDto::Uploaded { filename, message, .. }
                if filename == "small.txt" && message == MSG_FILE_UPLOADED
        ));
        assert_eq!(
            results[1],
            UploadResultDto::Failed {
                filename: "big.bin".to_string(),
                error: MSG_FILE_TOO_LARGE.to_string(),
            }
        );
        assert_eq!(ctx.blob_keys().len(), 1);
    }

    #[tokio::test]
    async fn test_upload_uses_default_limit() {
        let ctx = TestContext::new().await;
        let server = server(&ctx);
        let form = MultipartForm::new().add_part("files[]", file_part(b"x", "a.txt"));

        let response = server.post("/upload").multipart(form).await;

        let token = match response.json::<Vec<UploadResultDto>>().remove(0) {
            UploadResultDto::Uploaded { uuid, .. } => uuid,
            other => panic!("upload failed: {:?}", other),
        };
        let record = ctx.service.inspect(&token).await.unwrap();
        assert_eq!(record.max_downloads, 5);
    }

    #[tokio::test]
    async fn test_limit_after_files_is_applied() {
        let ctx = TestContext::new().await;
        let server = server(&ctx);
        let form = MultipartForm::new()
            .add_part("files[]", file_part(b"x", "a.txt"))
            .add_text("max_downloads", "-1");

        let response = server.post("/upload").multipart(form).await;

        let token = match response.json::<Vec<UploadResultDto>>().remove(0) {
            UploadResultDto::Uploaded { uuid, .. } => uuid,
            other => panic!("upload failed: {:?}", other),
        };
        assert!(ctx.service.inspect(&token).await.unwrap().is_unlimited());
    }

    #[tokio::test]
    async fn test_upload_without_files_is_rejected() {
        let ctx = TestContext::new().await;
        let server = server(&ctx);
        let form = MultipartForm::new().add_text("max_downloads", "3");

        let response = server.post("/upload").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert_eq!(response.json::<UploadErrorDto>().error, MSG_NO_FILE_PART);
    }

    #[tokio::test]
    async fn test_invalid_limit_rejects_and_cleans_up() {
        let ctx = TestContext::new().await;
        let server = server(&ctx);
        let form = MultipartForm::new()
            .add_part("files[]", file_part(b"x", "a.txt"))
            .add_text("max_downloads", "0");

        let response = server.post("/upload").multipart(form).await;

        response.assert_status(StatusCode::BAD_REQUEST);
        assert!(ctx.blob_keys().is_empty());
    }

    #[tokio::test]
    async fn test_delete_then_download_not_found() {
        let ctx = TestContext::new().await;
        let server = server(&ctx);
        let token = upload_one(&server, "a.txt", b"x", "3").await;

        let response = server.get(&format!("/delete/{}", token)).await;
        response.assert_status_ok();
        assert_eq!(response.text(), MSG_FILE_DELETED);

        let response = server.get(&format!("/download/{}", token)).await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.text(), MSG_FILE_NOT_FOUND);

        let response = server.get(&format!("/delete/{}", token)).await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_token_not_found() {
        let ctx = TestContext::new().await;
        let server = server(&ctx);

        server
            .get("/download/not-a-token")
            .await
            .assert_status(StatusCode::NOT_FOUND);
        server
            .get("/delete/not-a-token")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_content_disposition_encodes_unicode() {
        let value = content_disposition("résumé.pdf");
        assert_eq!(
            value,
            "attachment; filename=\"r_sum_.pdf\"; filename*=UTF-8''r%C3%A9sum%C3%A9.pdf"
        );
    }
}
