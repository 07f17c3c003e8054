//! Periodic crawl passes: dialog sync, source iteration, history paging.

pub mod grouper;
pub mod pager;
pub mod processor;

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::db::{list_enabled_sources, upsert_sources, Database, SourceUpsert};
use crate::platform::PlatformClient;
use crate::publisher::VideoPublisher;

pub struct Crawler {
    config: Config,
    db: Database,
    client: Arc<dyn PlatformClient>,
    publisher: Arc<dyn VideoPublisher>,
    cancel: CancellationToken,
}

impl Crawler {
    pub fn new(
        config: Config,
        db: Database,
        client: Arc<dyn PlatformClient>,
        publisher: Arc<dyn VideoPublisher>,
        cancel: CancellationToken,
    ) -> Self {
        Crawler {
            config,
            db,
            client,
            publisher,
            cancel,
        }
    }

    /// Run passes forever, sleeping the configured interval between them.
    /// Pass failures are logged and the loop keeps going; only cancellation
    /// ends it.
    pub async fn run_loop(&self) {
        info!(
            interval_secs = self.config.run_interval.as_secs(),
            "Crawler started"
        );

        loop {
            if let Err(e) = self.run_once().await {
                error!(error = ?e, "Crawl pass failed");
            }

            tokio::select! {
                () = self.cancel.cancelled() => {
                    info!("Crawler stopping");
                    break;
                }
                () = tokio::time::sleep(self.config.run_interval) => {}
            }
        }
    }

    /// One crawl pass: sync dialogs, then crawl each enabled source in turn.
    pub async fn run_once(&self) -> Result<()> {
        if !self.publisher.is_configured() {
            warn!("Publisher is not configured, skipping crawl pass");
            return Ok(());
        }

        // Dialog sync keeps the registry fresh but its failure does not
        // block crawling sources we already know about.
        if let Err(e) = self.sync_dialogs().await {
            warn!(error = ?e, "Dialog synchronization failed");
        }

        let sources = list_enabled_sources(self.db.pool()).await?;
        if sources.is_empty() {
            info!("No enabled sources, nothing to crawl");
            return Ok(());
        }

        debug!(count = sources.len(), "Crawling enabled sources");

        for source in &sources {
            if self.cancel.is_cancelled() {
                info!("Cancelled mid-pass, skipping remaining sources");
                break;
            }

            if let Err(e) = pager::crawl_source(
                &self.config,
                self.db.pool(),
                self.client.as_ref(),
                self.publisher.as_ref(),
                source,
                &self.cancel,
            )
            .await
            {
                warn!(
                    source_id = source.id,
                    peer_id = source.peer_id,
                    error = ?e,
                    "Source crawl failed"
                );
            }
        }

        Ok(())
    }

    /// Refresh the source registry from the platform's visible dialogs.
    /// New rows start disabled; operator flags on known rows are preserved.
    async fn sync_dialogs(&self) -> Result<()> {
        let visible = self
            .client
            .fetch_all_visible_sources()
            .await
            .context("Failed to fetch visible dialogs")?;

        let mut seen = HashSet::new();
        let upserts: Vec<SourceUpsert> = visible
            .into_iter()
            .filter(|s| seen.insert((s.peer_type, s.peer_id)))
            .map(|s| SourceUpsert {
                peer_type: s.peer_type,
                peer_id: s.peer_id,
                access_hash: s.access_hash,
                username: s.username,
                title: s.title,
            })
            .collect();

        debug!(count = upserts.len(), "Synchronizing dialogs");
        upsert_sources(self.db.pool(), &upserts).await
    }
}
