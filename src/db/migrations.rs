use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::debug;

/// Run all pending migrations.
pub async fn run(pool: &SqlitePool) -> Result<()> {
    create_migration_table(pool).await?;
    let current_version = get_schema_version(pool).await?;

    if current_version < 1 {
        debug!("Running migration v1");
        run_migration_v1(pool).await?;
        set_schema_version(pool, 1).await?;
    }

    Ok(())
}

async fn create_migration_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS _schema_version (
            version INTEGER PRIMARY KEY
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create schema version table")?;

    Ok(())
}

async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT version FROM _schema_version LIMIT 1")
        .fetch_optional(pool)
        .await
        .context("Failed to get schema version")?;

    Ok(row.map_or(0, |(v,)| v))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("DELETE FROM _schema_version")
        .execute(pool)
        .await?;
    sqlx::query("INSERT INTO _schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;
    Ok(())
}

async fn run_migration_v1(pool: &SqlitePool) -> Result<()> {
    debug!("Running migration v1: creating initial schema");

    // Crawl sources, one row per remote peer identity
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS crawl_sources (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            peer_type TEXT NOT NULL,
            peer_id INTEGER NOT NULL,
            access_hash INTEGER,
            username TEXT,
            title TEXT,
            enabled INTEGER NOT NULL DEFAULT 0,
            hidden INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (peer_type, peer_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create crawl_sources table")?;

    // Per-source checkpoint of the highest fully-processed message id
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS crawl_offsets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            peer_type TEXT NOT NULL,
            peer_id INTEGER NOT NULL,
            last_message_id INTEGER NOT NULL DEFAULT 0,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (peer_type, peer_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create crawl_offsets table")?;

    // Ingested posts; (chat_id, message_id) is the idempotency key
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS posts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_uid TEXT UNIQUE NOT NULL,
            chat_id INTEGER NOT NULL,
            message_id INTEGER NOT NULL,
            title TEXT,
            original_content TEXT,
            content TEXT,
            view_count INTEGER NOT NULL DEFAULT 0,
            like_count INTEGER NOT NULL DEFAULT 0,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (chat_id, message_id)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create posts table")?;

    // Media rows, ordered within their post by sort_order
    sqlx::query(
        r"
        CREATE TABLE IF NOT EXISTS post_media (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            post_id INTEGER NOT NULL REFERENCES posts(id) ON DELETE CASCADE,
            media_type TEXT NOT NULL,
            file_id TEXT,
            duration INTEGER,
            file_size INTEGER,
            sort_order INTEGER NOT NULL,
            active INTEGER NOT NULL DEFAULT 1,
            created_at TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE (post_id, sort_order)
        )
        ",
    )
    .execute(pool)
    .await
    .context("Failed to create post_media table")?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_post_media_post ON post_media(post_id)")
        .execute(pool)
        .await
        .context("Failed to create post_media index")?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_crawl_sources_enabled ON crawl_sources(enabled, hidden)",
    )
    .execute(pool)
    .await
    .context("Failed to create crawl_sources index")?;

    Ok(())
}
