//! Integration tests for the storage layer.

use tempfile::TempDir;

use tg_clip_crawler::db::{
    advance_last_message_id, get_full_video_file_id, get_last_message_id, insert_post_with_media,
    list_enabled_sources, list_sources, post_exists_by_origin, set_source_enabled,
    set_source_hidden, upsert_sources, Database, MediaKind, NewMedia, NewPost, PeerType,
    SourceUpsert,
};

async fn setup_db() -> (Database, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let db_path = temp_dir.path().join("test.sqlite");
    let db = Database::new(&db_path)
        .await
        .expect("Failed to create database");
    (db, temp_dir)
}

fn channel(peer_id: i64, title: &str) -> SourceUpsert {
    SourceUpsert {
        peer_type: PeerType::Channel,
        peer_id,
        access_hash: Some(42),
        username: None,
        title: Some(title.to_string()),
    }
}

#[tokio::test]
async fn test_source_upsert_is_keyed_by_peer() {
    let (db, _temp_dir) = setup_db().await;

    upsert_sources(db.pool(), &[channel(100, "Clips"), channel(100, "Clips v2")])
        .await
        .expect("Failed to upsert");

    let sources = list_sources(db.pool(), true).await.expect("Failed to list");
    assert_eq!(sources.len(), 1);
    assert_eq!(sources[0].title.as_deref(), Some("Clips v2"));
}

#[tokio::test]
async fn test_new_sources_start_disabled() {
    let (db, _temp_dir) = setup_db().await;

    upsert_sources(db.pool(), &[channel(100, "Clips")])
        .await
        .expect("Failed to upsert");

    let enabled = list_enabled_sources(db.pool())
        .await
        .expect("Failed to list");
    assert!(enabled.is_empty());
}

#[tokio::test]
async fn test_resync_preserves_operator_flags() {
    let (db, _temp_dir) = setup_db().await;

    upsert_sources(db.pool(), &[channel(100, "Clips")])
        .await
        .expect("Failed to upsert");
    let id = list_sources(db.pool(), true).await.expect("list")[0].id;

    let affected = set_source_enabled(db.pool(), id, true)
        .await
        .expect("Failed to enable");
    assert_eq!(affected, 1);

    // A later sync refreshes metadata but never touches the flags.
    upsert_sources(db.pool(), &[channel(100, "Clips renamed")])
        .await
        .expect("Failed to re-upsert");

    let enabled = list_enabled_sources(db.pool())
        .await
        .expect("Failed to list");
    assert_eq!(enabled.len(), 1);
    assert_eq!(enabled[0].title.as_deref(), Some("Clips renamed"));
}

#[tokio::test]
async fn test_hidden_sources_are_not_crawled() {
    let (db, _temp_dir) = setup_db().await;

    upsert_sources(db.pool(), &[channel(100, "Clips")])
        .await
        .expect("Failed to upsert");
    let id = list_sources(db.pool(), true).await.expect("list")[0].id;

    set_source_enabled(db.pool(), id, true)
        .await
        .expect("Failed to enable");
    set_source_hidden(db.pool(), id, true)
        .await
        .expect("Failed to hide");

    let enabled = list_enabled_sources(db.pool())
        .await
        .expect("Failed to list");
    assert!(enabled.is_empty());
}

#[tokio::test]
async fn test_offset_defaults_to_zero() {
    let (db, _temp_dir) = setup_db().await;

    let last = get_last_message_id(db.pool(), PeerType::Channel, 100)
        .await
        .expect("Failed to get offset");
    assert_eq!(last, 0);
}

#[tokio::test]
async fn test_offset_never_regresses() {
    let (db, _temp_dir) = setup_db().await;

    advance_last_message_id(db.pool(), PeerType::Channel, 100, 50)
        .await
        .expect("Failed to advance");
    advance_last_message_id(db.pool(), PeerType::Channel, 100, 75)
        .await
        .expect("Failed to advance");
    // Replayed or out-of-order write must be a no-op.
    advance_last_message_id(db.pool(), PeerType::Channel, 100, 10)
        .await
        .expect("Failed to advance");

    let last = get_last_message_id(db.pool(), PeerType::Channel, 100)
        .await
        .expect("Failed to get offset");
    assert_eq!(last, 75);
}

#[tokio::test]
async fn test_offsets_are_per_peer() {
    let (db, _temp_dir) = setup_db().await;

    advance_last_message_id(db.pool(), PeerType::Channel, 100, 50)
        .await
        .expect("Failed to advance");
    advance_last_message_id(db.pool(), PeerType::Group, 100, 20)
        .await
        .expect("Failed to advance");

    let channel = get_last_message_id(db.pool(), PeerType::Channel, 100)
        .await
        .expect("get");
    let group = get_last_message_id(db.pool(), PeerType::Group, 100)
        .await
        .expect("get");
    assert_eq!(channel, 50);
    assert_eq!(group, 20);
}

fn sample_post(post_uid: &str, chat_id: i64, message_id: i64) -> NewPost {
    NewPost {
        post_uid: post_uid.to_string(),
        chat_id,
        message_id,
        title: Some("Clips".to_string()),
        original_content: Some("caption".to_string()),
        content: Some("VIEW FULL HERE".to_string()),
    }
}

#[tokio::test]
async fn test_post_exists_by_origin() {
    let (db, _temp_dir) = setup_db().await;

    assert!(!post_exists_by_origin(db.pool(), 100, 7)
        .await
        .expect("check"));

    insert_post_with_media(db.pool(), &sample_post("uid1", 100, 7), &[])
        .await
        .expect("Failed to insert post");

    assert!(post_exists_by_origin(db.pool(), 100, 7).await.expect("check"));
    assert!(!post_exists_by_origin(db.pool(), 100, 8)
        .await
        .expect("check"));
    assert!(!post_exists_by_origin(db.pool(), 101, 7)
        .await
        .expect("check"));
}

#[tokio::test]
async fn test_insert_post_with_media_rows() {
    let (db, _temp_dir) = setup_db().await;

    let media = vec![
        NewMedia {
            media_type: MediaKind::Video,
            file_id: Some("demo-file".to_string()),
            duration: Some(18),
            file_size: None,
            sort_order: 0,
        },
        NewMedia {
            media_type: MediaKind::VideoFull,
            file_id: Some("full-file".to_string()),
            duration: Some(60),
            file_size: Some(1024),
            sort_order: 1,
        },
    ];

    let post_id = insert_post_with_media(db.pool(), &sample_post("uid1", 100, 7), &media)
        .await
        .expect("Failed to insert post");
    assert!(post_id > 0);

    let full = get_full_video_file_id(db.pool(), "uid1")
        .await
        .expect("Failed to fetch full video");
    assert_eq!(full.as_deref(), Some("full-file"));
}

#[tokio::test]
async fn test_duplicate_origin_is_rejected() {
    let (db, _temp_dir) = setup_db().await;

    insert_post_with_media(db.pool(), &sample_post("uid1", 100, 7), &[])
        .await
        .expect("Failed to insert post");

    let duplicate = insert_post_with_media(db.pool(), &sample_post("uid2", 100, 7), &[]).await;
    assert!(duplicate.is_err());
}

#[tokio::test]
async fn test_full_video_lookup_misses() {
    let (db, _temp_dir) = setup_db().await;

    insert_post_with_media(
        db.pool(),
        &sample_post("uid1", 100, 7),
        &[NewMedia {
            media_type: MediaKind::Video,
            file_id: Some("demo-file".to_string()),
            duration: Some(18),
            file_size: None,
            sort_order: 0,
        }],
    )
    .await
    .expect("Failed to insert post");

    // Post exists but carries no full-length rendition.
    let full = get_full_video_file_id(db.pool(), "uid1")
        .await
        .expect("Failed to fetch");
    assert!(full.is_none());

    // Unknown uid.
    let missing = get_full_video_file_id(db.pool(), "nope")
        .await
        .expect("Failed to fetch");
    assert!(missing.is_none());
}
