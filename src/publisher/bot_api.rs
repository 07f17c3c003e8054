//! Telegram Bot API publisher.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart;
use serde::Deserialize;
use tracing::debug;

use crate::config::Config;

use super::{with_retry, LinkButton, PublishError, VideoPublisher};

/// Bot API responses wrap the payload in an `ok`/`result` envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    video: Option<FileRef>,
    photo: Option<Vec<PhotoSize>>,
}

#[derive(Debug, Deserialize)]
struct FileRef {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
    file_size: Option<i64>,
}

/// Publisher that uploads through the Telegram Bot API.
#[derive(Clone)]
pub struct BotPublisher {
    http: reqwest::Client,
    api_base: String,
    token: Option<String>,
    public_channel_id: i64,
}

impl BotPublisher {
    /// Create a publisher from configuration. Missing credentials are not an
    /// error here; `is_configured` reports them and publish calls fail with
    /// `PublishError::NotConfigured`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            // Large uploads on slow links; matches the upload deadline the
            // retry policy assumes.
            .timeout(Duration::from_secs(600))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            api_base: "https://api.telegram.org".to_string(),
            token: config.bot_token.clone(),
            public_channel_id: config.public_channel_id,
        }
    }

    /// Override the API origin. Used by tests to point at a local server.
    #[must_use]
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into();
        self
    }

    fn method_url(&self, method: &str) -> Result<String, PublishError> {
        let token = self.token.as_deref().ok_or_else(|| {
            PublishError::NotConfigured("BOT_TOKEN is not set".to_string())
        })?;
        Ok(format!("{}/bot{token}/{method}", self.api_base))
    }

    async fn send_video_once(
        &self,
        url: &str,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        duration: Option<i64>,
        button: Option<&LinkButton>,
    ) -> Result<String, PublishError> {
        let bytes = tokio::fs::read(path).await?;
        debug!(chat_id, file = %path.display(), size = bytes.len(), "Uploading video");

        let filename = file_name_or(path, "video.mp4");
        let part = multipart::Part::bytes(bytes).file_name(filename);

        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .text("supports_streaming", "true")
            .part("video", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        if let Some(duration) = duration {
            form = form.text("duration", duration.to_string());
        }
        if let Some(button) = button {
            form = form.text("reply_markup", reply_markup_json(button));
        }

        let sent = self.execute(url, form).await?;
        sent.video
            .map(|v| v.file_id)
            .ok_or_else(|| PublishError::Api("response carries no video file id".to_string()))
    }

    async fn send_photo_once(
        &self,
        url: &str,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        button: Option<&LinkButton>,
    ) -> Result<String, PublishError> {
        let bytes = tokio::fs::read(path).await?;
        debug!(chat_id, file = %path.display(), size = bytes.len(), "Uploading photo");

        let filename = file_name_or(path, "photo.jpg");
        let part = multipart::Part::bytes(bytes).file_name(filename);

        let mut form = multipart::Form::new()
            .text("chat_id", chat_id.to_string())
            .part("photo", part);
        if let Some(caption) = caption {
            form = form.text("caption", caption.to_string());
        }
        if let Some(button) = button {
            form = form.text("reply_markup", reply_markup_json(button));
        }

        let sent = self.execute(url, form).await?;

        // The API returns every size variant; keep the largest one.
        sent.photo
            .and_then(|sizes| {
                sizes
                    .into_iter()
                    .max_by_key(|p| p.file_size.unwrap_or(0))
                    .map(|p| p.file_id)
            })
            .ok_or_else(|| PublishError::Api("response carries no photo file id".to_string()))
    }

    async fn execute(&self, url: &str, form: multipart::Form) -> Result<SentMessage, PublishError> {
        let response = self
            .http
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let status = response.status();
        let body: ApiResponse<SentMessage> =
            response.json().await.map_err(map_reqwest_error)?;

        if !body.ok {
            return Err(PublishError::Api(
                body.description
                    .unwrap_or_else(|| format!("HTTP {status}")),
            ));
        }

        body.result
            .ok_or_else(|| PublishError::Api("response envelope has no result".to_string()))
    }
}

#[async_trait]
impl VideoPublisher for BotPublisher {
    fn is_configured(&self) -> bool {
        self.token.is_some() && self.public_channel_id != 0
    }

    async fn publish_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        duration: Option<i64>,
        button: Option<&LinkButton>,
    ) -> Result<String, PublishError> {
        let url = self.method_url("sendVideo")?;

        with_retry("sendVideo", || {
            let url = url.clone();
            async move {
                self.send_video_once(&url, chat_id, path, caption, duration, button)
                    .await
            }
        })
        .await
    }

    async fn publish_photo(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        button: Option<&LinkButton>,
    ) -> Result<String, PublishError> {
        let url = self.method_url("sendPhoto")?;

        with_retry("sendPhoto", || {
            let url = url.clone();
            async move {
                self.send_photo_once(&url, chat_id, path, caption, button)
                    .await
            }
        })
        .await
    }
}

fn file_name_or(path: &Path, fallback: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(fallback)
        .to_string()
}

fn reply_markup_json(button: &LinkButton) -> String {
    serde_json::json!({
        "inline_keyboard": [[{ "text": button.text, "url": button.url }]]
    })
    .to_string()
}

fn map_reqwest_error(e: reqwest::Error) -> PublishError {
    if e.is_timeout() {
        PublishError::Timeout
    } else if e.is_decode() {
        PublishError::Api(e.to_string())
    } else {
        PublishError::Network(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_markup_shape() {
        let button = LinkButton {
            text: "VIEW FULL HERE".to_string(),
            url: "https://t.me/somebot?start=post_abc".to_string(),
        };
        let json: serde_json::Value =
            serde_json::from_str(&reply_markup_json(&button)).unwrap();
        assert_eq!(json["inline_keyboard"][0][0]["text"], "VIEW FULL HERE");
        assert_eq!(
            json["inline_keyboard"][0][0]["url"],
            "https://t.me/somebot?start=post_abc"
        );
    }

    #[test]
    fn test_file_name_fallback() {
        assert_eq!(file_name_or(Path::new("/tmp/a.mp4"), "video.mp4"), "a.mp4");
        assert_eq!(file_name_or(Path::new("/"), "video.mp4"), "video.mp4");
    }
}
