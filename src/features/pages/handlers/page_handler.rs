use axum::{
    extract::{Path, State},
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use minijinja::context;
use std::sync::Arc;
use validator::Validate;

use crate::core::error::{AppError, Result};
use crate::features::files::dtos::{format_size, FileInfoDto};
use crate::features::files::FileService;
use crate::features::pages::dtos::CheckFileForm;
use crate::shared::templates::render_page;
use crate::shared::validation::is_valid_token;

const MSG_ENTER_FILE_ID: &str = "Please enter a file ID";

fn render_home(service: &FileService, uuid: Option<&str>, error: Option<&str>) -> Result<Html<String>> {
    let html = render_page(
        "home.html",
        context! {
            max_upload_size => format_size(service.max_upload_size()),
            default_max_downloads => service.default_max_downloads(),
            uuid => uuid.unwrap_or_default(),
            error => error,
        },
    )?;
    Ok(Html(html))
}

/// Landing page with the upload and check forms
pub async fn home(State(service): State<Arc<FileService>>) -> Result<Html<String>> {
    render_home(&service, None, None)
}

/// Landing page form submission; redirects to the check page for the entered ID
pub async fn submit_check(
    State(service): State<Arc<FileService>>,
    Form(form): Form<CheckFileForm>,
) -> Result<Response> {
    if let Err(e) = form.validate() {
        let message = e
            .field_errors()
            .values()
            .flat_map(|errors| errors.iter())
            .find_map(|error| error.message.as_ref().map(|m| m.to_string()))
            .unwrap_or_else(|| MSG_ENTER_FILE_ID.to_string());
        return Ok(render_home(&service, form.uuid.as_deref(), Some(&message))?.into_response());
    }

    match form.token() {
        Some(token) => {
            let location = format!("/check/{}", urlencoding::encode(token));
            Ok(Redirect::to(&location).into_response())
        }
        None => Ok(render_home(&service, None, Some(MSG_ENTER_FILE_ID))?.into_response()),
    }
}

/// File details page
#[utoipa::path(
    get,
    path = "/check/{token}",
    tag = "files",
    params(
        ("token" = String, Path, description = "Share token")
    ),
    responses(
        (status = 200, description = "File details page", content_type = "text/html"),
        (status = 404, description = "File not found")
    )
)]
pub async fn check_file(
    State(service): State<Arc<FileService>>,
    Path(token): Path<String>,
) -> Result<Html<String>> {
    if !is_valid_token(&token) {
        return Err(AppError::NotFound(token));
    }

    let file = FileInfoDto::from(service.inspect(&token).await?);
    let uploaded_at = file.uploaded_at.format("%Y-%m-%d %H:%M:%S UTC").to_string();

    let html = render_page(
        "check.html",
        context! {
            file => file,
            uploaded_at => uploaded_at,
        },
    )?;
    Ok(Html(html))
}

#[cfg(test)]
mod tests {
    use crate::features::pages::routes::routes;
    use crate::shared::constants::MSG_FILE_NOT_FOUND;
    use crate::shared::test_helpers::TestContext;
    use axum::http::{header, StatusCode};
    use axum_test::TestServer;
    use std::sync::Arc;

    fn server(ctx: &TestContext) -> TestServer {
        TestServer::new(routes(Arc::clone(&ctx.service))).unwrap()
    }

    #[tokio::test]
    async fn test_home_renders_forms() {
        let ctx = TestContext::new().await;

        let response = server(&ctx).get("/").await;

        response.assert_status_ok();
        let html = response.text();
        assert!(html.contains("name=\"files[]\""));
        assert!(html.contains("value=\"5\""));
    }

    #[tokio::test]
    async fn test_submit_redirects_to_check_page() {
        let ctx = TestContext::new().await;

        let response = server(&ctx)
            .post("/")
            .form(&[("uuid", " abc def ")])
            .await;

        response.assert_status(StatusCode::SEE_OTHER);
        assert_eq!(response.header(header::LOCATION), "/check/abc%20def");
    }

    #[tokio::test]
    async fn test_blank_submit_shows_error() {
        let ctx = TestContext::new().await;

        let response = server(&ctx).post("/").form(&[("uuid", "   ")]).await;

        response.assert_status_ok();
        assert!(response.text().contains("Please enter a file ID"));
    }

    #[tokio::test]
    async fn test_check_page_shows_counts() {
        let ctx = TestContext::new().await;
        let record = ctx.upload("report.pdf", b"12345", 3).await;
        ctx.service.authorize_download(&record.token).await.unwrap();

        let response = server(&ctx).get(&format!("/check/{}", record.token)).await;

        response.assert_status_ok();
        let html = response.text();
        assert!(html.contains("report.pdf"));
        assert!(html.contains("<dt>Downloads</dt><dd>1</dd>"));
        assert!(html.contains("<dt>Remaining</dt><dd>2</dd>"));
        assert!(html.contains("5 B"));
    }

    #[tokio::test]
    async fn test_check_page_unlimited() {
        let ctx = TestContext::new().await;
        let record = ctx.upload("a.txt", b"x", -1).await;

        let response = server(&ctx).get(&format!("/check/{}", record.token)).await;

        assert!(response.text().contains("<dt>Remaining</dt><dd>unlimited</dd>"));
    }

    #[tokio::test]
    async fn test_check_unknown_token() {
        let ctx = TestContext::new().await;
        let server = server(&ctx);

        let response = server
            .get("/check/0b6f1f0e-4a55-4c3e-9a55-2f4d2a9e8c11")
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        assert_eq!(response.text(), MSG_FILE_NOT_FOUND);

        server
            .get("/check/abc%20def")
            .await
            .assert_status(StatusCode::NOT_FOUND);
    }
}
