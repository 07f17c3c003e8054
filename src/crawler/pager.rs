//! Backward history paging with a monotonic per-source checkpoint.

use anyhow::Result;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::crawler::grouper::group_by_album;
use crate::crawler::processor::{process_message_group, ProcessCtx};
use crate::db::{advance_last_message_id, get_last_message_id, CrawlSource, PeerType};
use crate::platform::{PeerRef, PlatformClient};
use crate::publisher::VideoPublisher;

/// Crawl one source: page backwards through its history, process everything
/// newer than the stored checkpoint, and advance the checkpoint as groups
/// complete.
pub async fn crawl_source(
    config: &Config,
    pool: &SqlitePool,
    client: &dyn PlatformClient,
    publisher: &dyn VideoPublisher,
    source: &CrawlSource,
    cancel: &CancellationToken,
) -> Result<()> {
    let Some(peer_type) = source.peer_type_enum() else {
        warn!(
            source_id = source.id,
            peer_type = %source.peer_type,
            "Unknown peer type, skipping source"
        );
        return Ok(());
    };

    if peer_type == PeerType::Channel && source.access_hash.is_none() {
        warn!(
            source_id = source.id,
            peer_id = source.peer_id,
            "Channel has no access hash yet, skipping source"
        );
        return Ok(());
    }

    let peer = PeerRef {
        peer_type,
        peer_id: source.peer_id,
        access_hash: source.access_hash,
    };
    let ctx = ProcessCtx {
        config,
        pool,
        client,
        publisher,
        peer: &peer,
        source_title: source.title.as_deref(),
    };

    let last_id = get_last_message_id(pool, peer_type, source.peer_id).await?;
    let mut max_seen = last_id;
    let mut offset_id: i32 = 0;
    let mut new_posts_possible = true;

    debug!(
        peer_id = source.peer_id,
        last_message_id = last_id,
        "Crawling source"
    );

    while new_posts_possible {
        if cancel.is_cancelled() {
            debug!(peer_id = source.peer_id, "Cancelled before history fetch");
            break;
        }

        let batch = client
            .fetch_history(&peer, offset_id, config.history_batch_size)
            .await?;
        if batch.is_empty() {
            break;
        }

        // Next page continues below the oldest message of this one.
        let next_offset = batch.iter().map(|m| m.id).min().unwrap_or(0);

        let mut fresh: Vec<_> = batch
            .into_iter()
            .filter(|m| i64::from(m.id) > last_id)
            .collect();
        if fresh.is_empty() {
            // The whole page is at or below the checkpoint; older pages
            // can only be older still.
            break;
        }
        new_posts_possible = i64::from(next_offset) > last_id;

        fresh.sort_by_key(|m| m.id);

        for group in group_by_album(fresh) {
            if cancel.is_cancelled() {
                debug!(peer_id = source.peer_id, "Cancelled before group");
                new_posts_possible = false;
                break;
            }

            let processed_max = i64::from(process_message_group(&ctx, &group).await?);
            if processed_max > max_seen {
                max_seen = processed_max;
                advance_last_message_id(pool, peer_type, source.peer_id, max_seen)
                    .await?;
            }
        }

        offset_id = next_offset;
    }

    if max_seen > last_id {
        info!(
            peer_id = source.peer_id,
            from = last_id,
            to = max_seen,
            "Source checkpoint advanced"
        );
    }

    Ok(())
}
