//! Bot API publisher tests against a local mock server.

use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use tg_clip_crawler::config::Config;
use tg_clip_crawler::publisher::bot_api::BotPublisher;
use tg_clip_crawler::publisher::{LinkButton, PublishError, VideoPublisher};

fn publisher_for(server: &MockServer) -> BotPublisher {
    BotPublisher::new(&Config::for_testing()).with_api_base(server.uri())
}

fn write_sample_video(dir: &TempDir) -> std::path::PathBuf {
    let path = dir.path().join("clip.mp4");
    std::fs::write(&path, b"not really mpeg4").expect("write sample");
    path
}

#[tokio::test]
async fn test_publish_video_returns_file_id() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendVideo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ok": true,
            "result": {
                "message_id": 1,
                "video": { "file_id": "remote-file-1" }
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("temp dir");
    let video = write_sample_video(&temp_dir);

    let publisher = publisher_for(&server);
    let file_id = publisher
        .publish_video(
            -1001,
            &video,
            Some("caption"),
            Some(10),
            Some(&LinkButton {
                text: "VIEW FULL HERE".to_string(),
                url: "https://t.me/clipbot?start=post_abc".to_string(),
            }),
        )
        .await
        .expect("publish");

    assert_eq!(file_id, "remote-file-1");
}

#[tokio::test]
async fn test_api_rejection_is_terminal_after_one_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/bottest-token/sendVideo"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "description": "Bad Request: chat not found"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp_dir = TempDir::new().expect("temp dir");
    let video = write_sample_video(&temp_dir);

    let publisher = publisher_for(&server);
    let err = publisher
        .publish_video(-1001, &video, None, None, None)
        .await
        .expect_err("must fail");

    match err {
        PublishError::Api(desc) => assert!(desc.contains("chat not found")),
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_missing_token_fails_without_network() {
    let publisher = BotPublisher::new(&Config {
        bot_token: None,
        ..Config::for_testing()
    });
    assert!(!publisher.is_configured());

    let temp_dir = TempDir::new().expect("temp dir");
    let video = write_sample_video(&temp_dir);

    let err = publisher
        .publish_video(-1001, &video, None, None, None)
        .await
        .expect_err("must fail");
    assert!(matches!(err, PublishError::NotConfigured(_)));
}

#[tokio::test]
async fn test_missing_file_is_transient_io_error() {
    let server = MockServer::start().await;
    let publisher = publisher_for(&server);

    let err = publisher
        .publish_video(
            -1001,
            std::path::Path::new("/nonexistent/clip.mp4"),
            None,
            None,
            None,
        )
        .await
        .expect_err("must fail");
    assert!(matches!(err, PublishError::Io(_)));
}
