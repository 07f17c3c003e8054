//! Per-group media pipeline: download attachments, optionally trim a
//! preview, publish, and persist the resulting post.

use anyhow::{Context, Result};
use sqlx::SqlitePool;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::db::{insert_post_with_media, post_exists_by_origin, MediaKind, NewMedia, NewPost};
use crate::ffmpeg::{self, TrimOutcome};
use crate::fs_utils::TempFile;
use crate::platform::{
    classify_attachment, document_extension, AttachmentClass, DocumentInfo, HistoryMessage,
    PeerRef, PlatformClient,
};
use crate::publisher::{LinkButton, VideoPublisher};

const VIEW_FULL_TEXT: &str = "VIEW FULL HERE";

/// Shared collaborators for one group's processing.
pub struct ProcessCtx<'a> {
    pub config: &'a Config,
    pub pool: &'a SqlitePool,
    pub client: &'a dyn PlatformClient,
    pub publisher: &'a dyn VideoPublisher,
    pub peer: &'a PeerRef,
    pub source_title: Option<&'a str>,
}

/// Process one publish unit (album or singleton) end to end.
///
/// Returns the group's maximum message id so the caller can advance its
/// checkpoint, whether or not a post was created. The idempotency check by
/// `(chat_id, first_message_id)` happens before any download or publish
/// work.
pub async fn process_message_group(ctx: &ProcessCtx<'_>, group: &[HistoryMessage]) -> Result<i32> {
    let Some(first) = group.first() else {
        return Ok(0);
    };
    let max_id = group.iter().map(|m| m.id).max().unwrap_or(first.id);

    if post_exists_by_origin(ctx.pool, ctx.peer.peer_id, i64::from(first.id)).await? {
        debug!(
            chat_id = ctx.peer.peer_id,
            message_id = first.id,
            "Post already recorded, skipping group"
        );
        return Ok(max_id);
    }

    let post_uid = Uuid::new_v4().simple().to_string();
    let (deep_link, content) = build_view_full_content(ctx.config.bot_username.as_deref(), &post_uid);

    let mut media: Vec<NewMedia> = Vec::new();

    for message in group {
        let AttachmentClass::Video(doc) = classify_attachment(message.attachment.as_ref()) else {
            continue;
        };

        // Only the group's first published item carries the deep-link button.
        let button = if media.is_empty() {
            deep_link.as_deref().map(|url| LinkButton {
                text: VIEW_FULL_TEXT.to_string(),
                url: url.to_string(),
            })
        } else {
            None
        };

        let sort_base = media.len() as i64;
        match process_video(ctx, message, doc, sort_base, button.as_ref()).await {
            Ok(rows) => media.extend(rows),
            Err(e) => {
                warn!(
                    chat_id = ctx.peer.peer_id,
                    message_id = message.id,
                    error = %e,
                    "Skipping attachment after failed processing"
                );
            }
        }
    }

    if media.is_empty() {
        debug!(
            chat_id = ctx.peer.peer_id,
            message_id = first.id,
            "No publishable media in group"
        );
        return Ok(max_id);
    }

    let post = NewPost {
        post_uid: post_uid.clone(),
        chat_id: ctx.peer.peer_id,
        message_id: i64::from(first.id),
        title: ctx.source_title.map(str::to_string),
        original_content: (!first.text.is_empty()).then(|| first.text.clone()),
        content: Some(content),
    };

    let media_count = media.len();
    insert_post_with_media(ctx.pool, &post, &media)
        .await
        .context("Failed to persist post")?;

    info!(
        chat_id = ctx.peer.peer_id,
        message_id = first.id,
        post_uid = %post_uid,
        media_count,
        "Recorded new post"
    );

    Ok(max_id)
}

/// Deep link plus the call-to-action string stored on the post. Without a
/// bot identity there is nothing to link to, so the text stands alone.
fn build_view_full_content(bot_username: Option<&str>, post_uid: &str) -> (Option<String>, String) {
    match bot_username {
        Some(bot) => {
            let url = format!("https://t.me/{bot}?start=post_{post_uid}");
            let content = format!("{VIEW_FULL_TEXT}: {url}");
            (Some(url), content)
        }
        None => (None, VIEW_FULL_TEXT.to_string()),
    }
}

/// Download one video attachment and publish it, producing its media rows.
///
/// The temp files are scoped to this call and removed on every exit path.
async fn process_video(
    ctx: &ProcessCtx<'_>,
    message: &HistoryMessage,
    doc: &DocumentInfo,
    sort_base: i64,
    button: Option<&LinkButton>,
) -> Result<Vec<NewMedia>> {
    let ext = document_extension(doc);
    let source_file = TempFile::in_dir(&ctx.config.temp_dir, &format!("{}.{ext}", message.id));

    ctx.client
        .download_video(ctx.peer, message.id, source_file.path())
        .await
        .context("Failed to download video")?;

    let duration = match doc.duration {
        Some(d) => Some(d),
        None => match ffmpeg::probe_duration(source_file.path()).await {
            Ok(d) => Some(d),
            Err(e) => {
                debug!(message_id = message.id, error = %e, "Duration unknown");
                None
            }
        },
    };

    let caption = (!message.text.is_empty()).then_some(message.text.as_str());

    if ctx.config.demo_enabled {
        if let Some(full_secs) = duration.filter(|&d| d >= ctx.config.demo_min_full_secs) {
            let demo_secs = ctx.config.demo_seconds.clamp(1, full_secs);
            let demo_file =
                TempFile::in_dir(&ctx.config.temp_dir, &format!("{}_demo.mp4", message.id));

            match ffmpeg::trim_video(
                &ctx.config.ffmpeg_path,
                source_file.path(),
                demo_file.path(),
                demo_secs,
            )
            .await
            {
                TrimOutcome::Trimmed => {
                    return publish_split(
                        ctx, doc, &source_file, &demo_file, full_secs, demo_secs, caption,
                        button, sort_base,
                    )
                    .await;
                }
                TrimOutcome::Failed { reason } => {
                    warn!(
                        message_id = message.id,
                        %reason,
                        "Preview trim failed, publishing full asset"
                    );
                    return publish_untrimmed(
                        ctx,
                        doc,
                        &source_file,
                        duration,
                        caption,
                        button,
                        sort_base,
                    )
                    .await;
                }
            }
        }
    }

    publish_dual_role(ctx, doc, &source_file, duration, caption, button, sort_base).await
}

/// Preview to the public destination, full asset to storage. Two publishes,
/// `video` row first.
#[allow(clippy::too_many_arguments)]
async fn publish_split(
    ctx: &ProcessCtx<'_>,
    doc: &DocumentInfo,
    source_file: &TempFile,
    demo_file: &TempFile,
    full_secs: i64,
    demo_secs: i64,
    caption: Option<&str>,
    button: Option<&LinkButton>,
    sort_base: i64,
) -> Result<Vec<NewMedia>> {
    let demo_file_id = ctx
        .publisher
        .publish_video(
            ctx.config.public_channel_id,
            demo_file.path(),
            caption,
            Some(demo_secs),
            button,
        )
        .await
        .context("Failed to publish preview")?;

    let full_file_id = ctx
        .publisher
        .publish_video(
            ctx.config.storage_channel_or_public(),
            source_file.path(),
            None,
            Some(full_secs),
            None,
        )
        .await
        .context("Failed to publish full asset")?;

    Ok(vec![
        NewMedia {
            media_type: MediaKind::Video,
            file_id: Some(demo_file_id),
            duration: Some(demo_secs),
            file_size: None,
            sort_order: sort_base,
        },
        NewMedia {
            media_type: MediaKind::VideoFull,
            file_id: Some(full_file_id),
            duration: Some(full_secs),
            file_size: doc.file_size,
            sort_order: sort_base + 1,
        },
    ])
}

/// Trim-failure path: full asset to the public destination tagged `video`,
/// plus a `video_full` row. When a distinct storage destination exists the
/// full asset is published there too, otherwise the row reuses the public
/// publish's file reference.
async fn publish_untrimmed(
    ctx: &ProcessCtx<'_>,
    doc: &DocumentInfo,
    source_file: &TempFile,
    duration: Option<i64>,
    caption: Option<&str>,
    button: Option<&LinkButton>,
    sort_base: i64,
) -> Result<Vec<NewMedia>> {
    let public_file_id = ctx
        .publisher
        .publish_video(
            ctx.config.public_channel_id,
            source_file.path(),
            caption,
            duration,
            button,
        )
        .await
        .context("Failed to publish full asset")?;

    let storage = ctx.config.storage_channel_or_public();
    let full_file_id = if storage == ctx.config.public_channel_id {
        public_file_id.clone()
    } else {
        ctx.publisher
            .publish_video(storage, source_file.path(), None, duration, None)
            .await
            .context("Failed to publish full asset to storage")?
    };

    Ok(vec![
        NewMedia {
            media_type: MediaKind::Video,
            file_id: Some(public_file_id),
            duration,
            file_size: doc.file_size,
            sort_order: sort_base,
        },
        NewMedia {
            media_type: MediaKind::VideoFull,
            file_id: Some(full_file_id),
            duration,
            file_size: doc.file_size,
            sort_order: sort_base + 1,
        },
    ])
}

/// Short-video path: a single publish recorded under both tags,
/// `video_full` first.
async fn publish_dual_role(
    ctx: &ProcessCtx<'_>,
    doc: &DocumentInfo,
    source_file: &TempFile,
    duration: Option<i64>,
    caption: Option<&str>,
    button: Option<&LinkButton>,
    sort_base: i64,
) -> Result<Vec<NewMedia>> {
    let file_id = ctx
        .publisher
        .publish_video(
            ctx.config.public_channel_id,
            source_file.path(),
            caption,
            duration,
            button,
        )
        .await
        .context("Failed to publish video")?;

    Ok(vec![
        NewMedia {
            media_type: MediaKind::VideoFull,
            file_id: Some(file_id.clone()),
            duration,
            file_size: doc.file_size,
            sort_order: sort_base,
        },
        NewMedia {
            media_type: MediaKind::Video,
            file_id: Some(file_id),
            duration,
            file_size: doc.file_size,
            sort_order: sort_base + 1,
        },
    ])
}
