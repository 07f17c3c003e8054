use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tg_clip_crawler::config::Config;
use tg_clip_crawler::crawler::Crawler;
use tg_clip_crawler::db::Database;
use tg_clip_crawler::fs_utils;
use tg_clip_crawler::platform::mtproto::MtprotoClient;
use tg_clip_crawler::publisher::bot_api::BotPublisher;
use tg_clip_crawler::publisher::VideoPublisher;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    init_tracing()?;

    info!("Starting tg-clip-crawler");

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    info!(
        public_channel_id = config.public_channel_id,
        storage_channel_id = config.storage_channel_id,
        demo_enabled = config.demo_enabled,
        "Configuration loaded"
    );

    fs_utils::ensure_dir(&config.temp_dir)?;
    if let Some(parent) = config.database_path.parent() {
        fs_utils::ensure_dir(parent)?;
    }

    let db = Database::new(&config.database_path)
        .await
        .context("Failed to initialize database")?;

    info!("Database initialized");

    let publisher = Arc::new(BotPublisher::new(&config));
    if !publisher.is_configured() {
        warn!("BOT_TOKEN not set, publishing disabled until configured");
    }

    if !config.mtproto_configured() {
        warn!("TELEGRAM_API_ID/TELEGRAM_API_HASH not set, crawler disabled; waiting for shutdown");
        shutdown_signal().await;
        info!("Shutdown complete");
        return Ok(());
    }

    let client = MtprotoClient::connect(&config)
        .await
        .context("Failed to connect to Telegram")?;

    info!("Telegram client connected");

    let cancel = CancellationToken::new();
    let crawler = Crawler::new(config, db, Arc::new(client), publisher, cancel.clone());

    let crawler_handle = tokio::spawn(async move {
        crawler.run_loop().await;
    });

    shutdown_signal().await;

    info!("Shutting down...");

    cancel.cancel();
    if let Err(e) = crawler_handle.await {
        error!("Crawler task panicked: {e:#}");
    }

    info!("Shutdown complete");

    Ok(())
}

fn init_tracing() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tg_clip_crawler=debug"));

    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
