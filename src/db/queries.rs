use anyhow::{Context, Result};
use sqlx::SqlitePool;

use super::models::{CrawlSource, Media, NewMedia, NewPost, PeerType, Post, SourceUpsert};

// ========== Crawl sources ==========

/// Upsert sources discovered during dialog synchronization.
///
/// Metadata fields (access hash, username, title) are refreshed on conflict;
/// the enabled/hidden flags are operator-owned and never touched here. New
/// rows start disabled and unhidden.
pub async fn upsert_sources(pool: &SqlitePool, sources: &[SourceUpsert]) -> Result<()> {
    for source in sources {
        sqlx::query(
            r"
            INSERT INTO crawl_sources (peer_type, peer_id, access_hash, username, title)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (peer_type, peer_id) DO UPDATE SET
                access_hash = excluded.access_hash,
                username = excluded.username,
                title = excluded.title,
                updated_at = datetime('now')
            ",
        )
        .bind(source.peer_type.as_str())
        .bind(source.peer_id)
        .bind(source.access_hash)
        .bind(&source.username)
        .bind(&source.title)
        .execute(pool)
        .await
        .context("Failed to upsert crawl source")?;
    }

    Ok(())
}

/// List sources eligible for crawling (enabled and not hidden).
pub async fn list_enabled_sources(pool: &SqlitePool) -> Result<Vec<CrawlSource>> {
    sqlx::query_as(
        r"
        SELECT * FROM crawl_sources
        WHERE enabled = 1 AND hidden = 0
        ORDER BY id ASC
        ",
    )
    .fetch_all(pool)
    .await
    .context("Failed to list enabled crawl sources")
}

/// List all sources, optionally including hidden ones.
pub async fn list_sources(pool: &SqlitePool, include_hidden: bool) -> Result<Vec<CrawlSource>> {
    sqlx::query_as(
        r"
        SELECT * FROM crawl_sources
        WHERE (? = 1 OR hidden = 0)
        ORDER BY hidden ASC, enabled DESC, title ASC
        ",
    )
    .bind(include_hidden)
    .fetch_all(pool)
    .await
    .context("Failed to list crawl sources")
}

/// Toggle a source's enabled flag. Returns the number of affected rows.
pub async fn set_source_enabled(pool: &SqlitePool, id: i64, enabled: bool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE crawl_sources SET enabled = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(enabled)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to set crawl source enabled flag")?;

    Ok(result.rows_affected())
}

/// Toggle a source's hidden flag. Returns the number of affected rows.
pub async fn set_source_hidden(pool: &SqlitePool, id: i64, hidden: bool) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE crawl_sources SET hidden = ?, updated_at = datetime('now') WHERE id = ?",
    )
    .bind(hidden)
    .bind(id)
    .execute(pool)
    .await
    .context("Failed to set crawl source hidden flag")?;

    Ok(result.rows_affected())
}

// ========== Crawl offsets ==========

/// Get the highest fully-processed message id for a source, 0 if none.
pub async fn get_last_message_id(
    pool: &SqlitePool,
    peer_type: PeerType,
    peer_id: i64,
) -> Result<i64> {
    let row: Option<(i64,)> = sqlx::query_as(
        "SELECT last_message_id FROM crawl_offsets WHERE peer_type = ? AND peer_id = ?",
    )
    .bind(peer_type.as_str())
    .bind(peer_id)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch crawl offset")?;

    Ok(row.map_or(0, |(v,)| v))
}

/// Advance a source's checkpoint. The stored value never decreases: the
/// update only applies when the new value exceeds the current one, so a
/// replayed or out-of-order write cannot regress the offset.
pub async fn advance_last_message_id(
    pool: &SqlitePool,
    peer_type: PeerType,
    peer_id: i64,
    last_message_id: i64,
) -> Result<()> {
    sqlx::query(
        r"
        INSERT INTO crawl_offsets (peer_type, peer_id, last_message_id)
        VALUES (?, ?, ?)
        ON CONFLICT (peer_type, peer_id) DO UPDATE SET
            last_message_id = excluded.last_message_id,
            updated_at = datetime('now')
        WHERE excluded.last_message_id > crawl_offsets.last_message_id
        ",
    )
    .bind(peer_type.as_str())
    .bind(peer_id)
    .bind(last_message_id)
    .execute(pool)
    .await
    .context("Failed to advance crawl offset")?;

    Ok(())
}

// ========== Posts ==========

/// Whether a post already exists for an originating message.
///
/// This is the idempotency gate: it must be consulted before any download or
/// publish work for a message group begins.
pub async fn post_exists_by_origin(
    pool: &SqlitePool,
    chat_id: i64,
    message_id: i64,
) -> Result<bool> {
    let row: Option<(i64,)> =
        sqlx::query_as("SELECT 1 FROM posts WHERE chat_id = ? AND message_id = ?")
            .bind(chat_id)
            .bind(message_id)
            .fetch_optional(pool)
            .await
            .context("Failed to check post existence")?;

    Ok(row.is_some())
}

/// Insert a post together with its media rows in one transaction.
///
/// Returns the new post's row id.
pub async fn insert_post_with_media(
    pool: &SqlitePool,
    post: &NewPost,
    media: &[NewMedia],
) -> Result<i64> {
    let mut tx = pool.begin().await.context("Failed to begin transaction")?;

    let result = sqlx::query(
        r"
        INSERT INTO posts (post_uid, chat_id, message_id, title, original_content, content)
        VALUES (?, ?, ?, ?, ?, ?)
        ",
    )
    .bind(&post.post_uid)
    .bind(post.chat_id)
    .bind(post.message_id)
    .bind(&post.title)
    .bind(&post.original_content)
    .bind(&post.content)
    .execute(&mut *tx)
    .await
    .context("Failed to insert post")?;

    let post_id = result.last_insert_rowid();

    for m in media {
        sqlx::query(
            r"
            INSERT INTO post_media (post_id, media_type, file_id, duration, file_size, sort_order)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(post_id)
        .bind(m.media_type.as_str())
        .bind(&m.file_id)
        .bind(m.duration)
        .bind(m.file_size)
        .bind(m.sort_order)
        .execute(&mut *tx)
        .await
        .context("Failed to insert post media")?;
    }

    tx.commit().await.context("Failed to commit post insert")?;

    Ok(post_id)
}

/// Fetch a post by its originating message, if one was recorded.
pub async fn get_post_by_origin(
    pool: &SqlitePool,
    chat_id: i64,
    message_id: i64,
) -> Result<Option<Post>> {
    sqlx::query_as("SELECT * FROM posts WHERE chat_id = ? AND message_id = ?")
        .bind(chat_id)
        .bind(message_id)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch post by origin")
}

/// List a post's media rows in publish order.
pub async fn list_post_media(pool: &SqlitePool, post_id: i64) -> Result<Vec<Media>> {
    sqlx::query_as(
        "SELECT * FROM post_media WHERE post_id = ? ORDER BY sort_order ASC",
    )
    .bind(post_id)
    .fetch_all(pool)
    .await
    .context("Failed to list post media")
}

/// Remote file reference of a post's full-length video, looked up by the
/// post's deep-link uid. Used by the deep-link retrieval side.
pub async fn get_full_video_file_id(pool: &SqlitePool, post_uid: &str) -> Result<Option<String>> {
    let row: Option<(Option<String>,)> = sqlx::query_as(
        r"
        SELECT m.file_id
        FROM post_media m
        JOIN posts p ON p.id = m.post_id
        WHERE p.post_uid = ?
          AND m.active = 1
          AND m.media_type = 'video_full'
          AND m.file_id IS NOT NULL
        ORDER BY m.sort_order ASC, m.created_at ASC
        LIMIT 1
        ",
    )
    .bind(post_uid)
    .fetch_optional(pool)
    .await
    .context("Failed to fetch full video file id")?;

    Ok(row.and_then(|(v,)| v))
}
