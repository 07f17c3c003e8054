//! Publishing seam: the distribution destinations the pipeline writes to.
//!
//! `VideoPublisher` abstracts the Bot API uploader so the pipeline (and its
//! tests) never touch HTTP directly. `with_retry` is the single bounded
//! retry policy for remote publish calls.

pub mod bot_api;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::warn;

/// Total attempts for one publish call (one retry).
const UPLOAD_ATTEMPTS: u32 = 2;

#[derive(Debug, Error)]
pub enum PublishError {
    #[error("publish timed out")]
    Timeout,
    #[error("network error: {0}")]
    Network(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("publisher is not configured: {0}")]
    NotConfigured(String),
    #[error("api error: {0}")]
    Api(String),
}

impl PublishError {
    /// Transient failures are worth one more attempt; everything else is
    /// terminal for the call.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::Timeout | Self::Network(_) | Self::Io(_))
    }
}

/// Inline URL button attached to a published video.
#[derive(Debug, Clone)]
pub struct LinkButton {
    pub text: String,
    pub url: String,
}

/// A destination that accepts media uploads and returns an opaque remote
/// file reference.
#[async_trait]
pub trait VideoPublisher: Send + Sync {
    /// Whether the publisher has everything it needs to upload.
    fn is_configured(&self) -> bool;

    /// Publish a video file to `chat_id`, returning its remote file id.
    async fn publish_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        duration: Option<i64>,
        button: Option<&LinkButton>,
    ) -> Result<String, PublishError>;

    /// Publish a photo file to `chat_id`, returning its remote file id.
    async fn publish_photo(
        &self,
        chat_id: i64,
        path: &Path,
        caption: Option<&str>,
        button: Option<&LinkButton>,
    ) -> Result<String, PublishError>;
}

/// Run a publish operation with bounded retry on transient failures.
///
/// Two attempts total; backoff is `2 × attempt` seconds. Non-transient
/// errors and retry exhaustion propagate to the caller.
pub async fn with_retry<T, F, Fut>(op_name: &str, mut op: F) -> Result<T, PublishError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, PublishError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < UPLOAD_ATTEMPTS && e.is_transient() => {
                let delay = Duration::from_secs(u64::from(2 * attempt));
                warn!(
                    op = op_name,
                    attempt,
                    max_attempts = UPLOAD_ATTEMPTS,
                    delay_secs = delay.as_secs(),
                    "Transient publish failure, retrying: {e}"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[tokio::test(start_paused = true)]
    async fn test_transient_error_gets_two_attempts_then_propagates() {
        let calls = Cell::new(0u32);

        let result: Result<(), PublishError> = with_retry("op", || {
            calls.set(calls.get() + 1);
            async { Err(PublishError::Timeout) }
        })
        .await;

        assert_eq!(calls.get(), 2);
        assert!(matches!(result, Err(PublishError::Timeout)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_transient_error_gets_single_attempt() {
        let calls = Cell::new(0u32);

        let result: Result<(), PublishError> = with_retry("op", || {
            calls.set(calls.get() + 1);
            async { Err(PublishError::Api("bad request".to_string())) }
        })
        .await;

        assert_eq!(calls.get(), 1);
        assert!(matches!(result, Err(PublishError::Api(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_attempt_can_succeed() {
        let calls = Cell::new(0u32);

        let result = with_retry("op", || {
            calls.set(calls.get() + 1);
            let attempt = calls.get();
            async move {
                if attempt == 1 {
                    Err(PublishError::Network("reset".to_string()))
                } else {
                    Ok("file-id")
                }
            }
        })
        .await;

        assert_eq!(calls.get(), 2);
        assert_eq!(result.unwrap(), "file-id");
    }

    #[test]
    fn test_transient_classification() {
        assert!(PublishError::Timeout.is_transient());
        assert!(PublishError::Network(String::new()).is_transient());
        assert!(PublishError::Io(std::io::Error::other("x")).is_transient());
        assert!(!PublishError::Api(String::new()).is_transient());
        assert!(!PublishError::NotConfigured(String::new()).is_transient());
    }
}
