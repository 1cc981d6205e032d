use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use super::{NotificationError, NotificationSink, UploadNotice};

/// Writes each notice to the log; used when no webhook is configured.
pub struct LogSink;

#[async_trait]
impl NotificationSink for LogSink {
    async fn deliver(&self, notice: &UploadNotice) -> Result<(), NotificationError> {
        info!(
            token = %notice.token,
            stored_name = %notice.stored_name,
            size_bytes = notice.size_bytes,
            client_ip = %notice.client_ip,
            "File uploaded"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

/// Posts each notice as JSON to a configured URL.
pub struct WebhookSink {
    client: Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, NotificationError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    async fn deliver(&self, notice: &UploadNotice) -> Result<(), NotificationError> {
        let payload = json!({
            "subject": notice.subject(),
            "text": notice.body(),
            "upload": notice,
        });

        let response = self.client.post(&self.url).json(&payload).send().await?;

        if !response.status().is_success() {
            return Err(NotificationError::Rejected(response.status().as_u16()));
        }
        Ok(())
    }

    fn name(&self) -> &'static str {
        "webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::notification::testing::notice;
    use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
    use serde_json::Value;
    use tokio::sync::mpsc;

    /// Serve `router` on an ephemeral local port and return its URL
    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{}/hook", addr)
    }

    #[tokio::test]
    async fn test_webhook_posts_notice_as_json() {
        let (tx, mut rx) = mpsc::unbounded_channel::<Value>();
        let router = Router::new()
            .route(
                "/hook",
                post(
                    |State(tx): State<mpsc::UnboundedSender<Value>>, Json(body): Json<Value>| async move {
                        let _ = tx.send(body);
                        StatusCode::NO_CONTENT
                    },
                ),
            )
            .with_state(tx);
        let url = serve(router).await;
        let sink = WebhookSink::new(url, Duration::from_secs(5)).unwrap();
        let notice = notice("abc");

        sink.deliver(&notice).await.unwrap();

        let body = rx.recv().await.unwrap();
        assert_eq!(body["subject"], "File Uploaded");
        let text = body["text"].as_str().unwrap();
        assert!(text.contains("UUID: abc"));
        assert!(text.contains("Download Link: http://localhost:5003/check/abc"));
        assert_eq!(body["upload"]["token"], "abc");
        assert_eq!(body["upload"]["original_name"], "report.pdf");
        assert_eq!(body["upload"]["size_bytes"], 5);
        assert_eq!(body["upload"]["client_ip"], "127.0.0.1");
    }

    #[tokio::test]
    async fn test_webhook_non_success_status_is_rejected() {
        let router = Router::new().route("/hook", post(|| async { StatusCode::SERVICE_UNAVAILABLE }));
        let url = serve(router).await;
        let sink = WebhookSink::new(url, Duration::from_secs(5)).unwrap();

        let err = sink.deliver(&notice("abc")).await.unwrap_err();

        assert!(matches!(err, NotificationError::Rejected(503)));
    }

    #[tokio::test]
    async fn test_webhook_unreachable_is_http_error() {
        // Bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let sink = WebhookSink::new(format!("http://{}/hook", addr), Duration::from_secs(5)).unwrap();

        let err = sink.deliver(&notice("abc")).await.unwrap_err();

        assert!(matches!(err, NotificationError::Http(_)));
    }
}
