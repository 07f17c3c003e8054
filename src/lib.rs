//! Telegram clip crawler library.
//!
//! A worker that periodically crawls registered channels and groups for new
//! video posts, trims short previews, republishes them through a bot, and
//! records everything with monotonic per-source checkpoints.

pub mod config;
pub mod crawler;
pub mod db;
pub mod ffmpeg;
pub mod fs_utils;
pub mod platform;
pub mod publisher;
