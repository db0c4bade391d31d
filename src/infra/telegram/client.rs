use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Request, StatusCode};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::fetch::{BasicClient, HttpClient};
use crate::services::notifier::{ImageSource, Notifier, NotifyError};

pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// Error envelope returned by the Bot API on failures.
#[derive(Deserialize)]
struct ApiReply {
    description: Option<String>,
}

/// Sends messages to one chat through the Telegram Bot API.
pub struct TelegramNotifier<C = BasicClient> {
    http: C,
    requests: reqwest::Client,
    api_base: String,
    bot_token: String,
    chat_id: String,
}

impl TelegramNotifier {
    pub fn new(api_base: &str, bot_token: &str, chat_id: &str) -> reqwest::Result<Self> {
        let basic = BasicClient::with_timeouts(Duration::from_secs(10), Duration::from_secs(60))?;
        Ok(Self::with_client(basic, api_base, bot_token, chat_id))
    }
}

impl<C: HttpClient> TelegramNotifier<C> {
    pub fn with_client(http: C, api_base: &str, bot_token: &str, chat_id: &str) -> Self {
        Self {
            http,
            requests: reqwest::Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token: bot_token.to_string(),
            chat_id: chat_id.to_string(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_base, self.bot_token, method)
    }

    fn text_request(&self, text: &str) -> reqwest::Result<Request> {
        self.requests
            .post(self.method_url("sendMessage"))
            .form(&[("chat_id", self.chat_id.as_str()), ("text", text)])
            .build()
    }

    fn photo_url_request(&self, url: &str, caption: &str) -> reqwest::Result<Request> {
        self.requests
            .post(self.method_url("sendPhoto"))
            .form(&[
                ("chat_id", self.chat_id.as_str()),
                ("photo", url),
                ("caption", caption),
            ])
            .build()
    }

    async fn photo_file_request(&self, path: &Path, caption: &str) -> Result<Request, NotifyError> {
        let bytes = tokio::fs::read(path).await.map_err(|source| NotifyError::Image {
            path: path.to_path_buf(),
            source,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image.png".to_string());

        let form = Form::new()
            .text("chat_id", self.chat_id.clone())
            .text("caption", caption.to_string())
            .part("photo", Part::bytes(bytes).file_name(file_name));

        Ok(self
            .requests
            .post(self.method_url("sendPhoto"))
            .multipart(form)
            .build()?)
    }

    async fn send(&self, method: &'static str, req: Request) -> Result<(), NotifyError> {
        debug!(method, "Calling chat API");
        let resp = self.http.execute(req).await?;
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        check_reply(status, &body)
    }
}

/// Only HTTP 200 counts as delivered.
fn check_reply(status: StatusCode, body: &str) -> Result<(), NotifyError> {
    if status == StatusCode::OK {
        return Ok(());
    }
    let body = serde_json::from_str::<ApiReply>(body)
        .ok()
        .and_then(|r| r.description)
        .unwrap_or_else(|| body.to_string());
    Err(NotifyError::Rejected {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl<C: HttpClient> Notifier for TelegramNotifier<C> {
    async fn send_text(&self, text: &str) -> Result<(), NotifyError> {
        let req = self.text_request(text)?;
        self.send("sendMessage", req).await
    }

    async fn send_image(&self, source: &ImageSource, caption: &str) -> Result<(), NotifyError> {
        let req = match source {
            ImageSource::Url(url) => self.photo_url_request(url, caption)?,
            ImageSource::Path(path) => self.photo_file_request(path, caption).await?,
        };
        self.send("sendPhoto", req).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notifier() -> TelegramNotifier<BasicClient> {
        TelegramNotifier::with_client(BasicClient::new(), "https://chat.local/", "123:abc", "-10042")
    }

    fn body_text(req: &Request) -> String {
        let bytes = req.body().and_then(|b| b.as_bytes()).unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[test]
    fn test_text_request_form() {
        let req = notifier().text_request("feed is stale").unwrap();

        assert_eq!(req.url().as_str(), "https://chat.local/bot123:abc/sendMessage");
        assert_eq!(body_text(&req), "chat_id=-10042&text=feed+is+stale");
    }

    #[test]
    fn test_photo_url_request_form() {
        let req = notifier()
            .photo_url_request("https://img.local/a.png", "weekly")
            .unwrap();

        assert_eq!(req.url().path(), "/bot123:abc/sendPhoto");
        let body = body_text(&req);
        assert!(body.contains("photo=https%3A%2F%2Fimg.local%2Fa.png"));
        assert!(body.contains("caption=weekly"));
    }

    #[tokio::test]
    async fn test_photo_file_missing() {
        let err = notifier()
            .photo_file_request(Path::new("/nonexistent/parking_chart.png"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, NotifyError::Image { .. }));
    }

    #[tokio::test]
    async fn test_transport_error_hides_bot_token() {
        let notifier = TelegramNotifier::with_client(
            BasicClient::new(),
            "http://127.0.0.1:1",
            "123456:SECRET-BOT-TOKEN",
            "-1",
        );

        let err = notifier.send_text("hi").await.unwrap_err();
        assert!(matches!(err, NotifyError::Transport(_)));
        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"));
        assert!(!format!("{err:?}").contains("SECRET-BOT-TOKEN"));

        let err = notifier
            .send_image(&ImageSource::parse("https://img.local/a.png"), "weekly")
            .await
            .unwrap_err();
        assert!(!err.to_string().contains("SECRET-BOT-TOKEN"));
    }

    #[test]
    fn test_check_reply() {
        assert!(check_reply(StatusCode::OK, "{\"ok\":true}").is_ok());

        let err = check_reply(
            StatusCode::BAD_REQUEST,
            "{\"ok\":false,\"error_code\":400,\"description\":\"Bad Request: chat not found\"}",
        )
        .unwrap_err();
        match err {
            NotifyError::Rejected { status, body } => {
                assert_eq!(status, 400);
                assert_eq!(body, "Bad Request: chat not found");
            }
            other => panic!("unexpected error: {other}"),
        }

        // Any non-200 success code still counts as a failure.
        assert!(check_reply(StatusCode::ACCEPTED, "").is_err());
    }
}
