use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),
    #[error("invalid value for {name}: {message}")]
    InvalidValue { name: String, message: String },
    #[error("failed to parse {name} as integer: {source}")]
    ParseInt {
        name: String,
        #[source]
        source: std::num::ParseIntError,
    },
    #[error("failed to parse {name} as boolean: {value}")]
    ParseBool { name: String, value: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_path: PathBuf,

    // Crawl job
    pub run_interval: Duration,
    pub history_batch_size: usize,
    pub temp_dir: PathBuf,

    // Demo (trimmed preview) generation
    pub demo_enabled: bool,
    pub demo_min_full_secs: i64,
    pub demo_seconds: i64,
    pub ffmpeg_path: String,

    // MTProto (crawling identity)
    pub api_id: i32,
    pub api_hash: Option<String>,
    pub session_path: PathBuf,

    // Bot API (publishing)
    pub bot_token: Option<String>,
    pub public_channel_id: i64,
    pub storage_channel_id: i64,
    pub bot_username: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if environment variables hold invalid values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_path: PathBuf::from(env_or_default("DATABASE_PATH", "./data/crawler.sqlite")),

            run_interval: Duration::from_secs(parse_env_u64("RUN_INTERVAL_SECS", 300)?),
            history_batch_size: parse_env_usize("HISTORY_BATCH_SIZE", 200)?,
            temp_dir: PathBuf::from(env_or_default("TEMP_DIR", "./data/tmp")),

            demo_enabled: parse_env_bool("DEMO_ENABLED", true)?,
            demo_min_full_secs: parse_env_i64("DEMO_MIN_FULL_SECS", 40)?,
            demo_seconds: parse_env_i64("DEMO_SECONDS", 18)?,
            ffmpeg_path: env_or_default("FFMPEG_PATH", "ffmpeg"),

            api_id: parse_env_i32("TELEGRAM_API_ID", 0)?,
            api_hash: optional_env("TELEGRAM_API_HASH"),
            session_path: PathBuf::from(env_or_default(
                "TELEGRAM_SESSION_PATH",
                "./data/mtproto.session",
            )),

            bot_token: optional_env("BOT_TOKEN"),
            public_channel_id: parse_env_i64("PUBLIC_CHANNEL_ID", 0)?,
            storage_channel_id: parse_env_i64("STORAGE_CHANNEL_ID", 0)?,
            bot_username: optional_env("BOT_USERNAME"),
        })
    }

    /// Validate that the configuration is usable.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.history_batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                name: "HISTORY_BATCH_SIZE".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.demo_seconds < 1 {
            return Err(ConfigError::InvalidValue {
                name: "DEMO_SECONDS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.demo_min_full_secs < 1 {
            return Err(ConfigError::InvalidValue {
                name: "DEMO_MIN_FULL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        if self.run_interval < Duration::from_secs(1) {
            return Err(ConfigError::InvalidValue {
                name: "RUN_INTERVAL_SECS".to_string(),
                message: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Whether the MTProto crawling identity is configured.
    #[must_use]
    pub fn mtproto_configured(&self) -> bool {
        self.api_id != 0 && self.api_hash.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// Secondary (full-asset) destination, falling back to the primary one.
    #[must_use]
    pub const fn storage_channel_or_public(&self) -> i64 {
        if self.storage_channel_id != 0 {
            self.storage_channel_id
        } else {
            self.public_channel_id
        }
    }

    /// Configuration for tests with throwaway defaults.
    #[must_use]
    pub fn for_testing() -> Self {
        Self {
            database_path: PathBuf::from("./test-data/crawler.sqlite"),
            run_interval: Duration::from_secs(300),
            history_batch_size: 200,
            temp_dir: std::env::temp_dir(),
            demo_enabled: false,
            demo_min_full_secs: 40,
            demo_seconds: 18,
            ffmpeg_path: "ffmpeg".to_string(),
            api_id: 0,
            api_hash: None,
            session_path: PathBuf::from("./test-data/mtproto.session"),
            bot_token: Some("test-token".to_string()),
            public_channel_id: -1001,
            storage_channel_id: 0,
            bot_username: Some("clipbot".to_string()),
        }
    }
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_i64(name: &str, default: i64) -> Result<i64, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_i32(name: &str, default: i32) -> Result<i32, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_usize(name: &str, default: usize) -> Result<usize, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => val.parse().map_err(|e| ConfigError::ParseInt {
            name: name.to_string(),
            source: e,
        }),
        _ => Ok(default),
    }
}

fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    match std::env::var(name) {
        Ok(val) if !val.is_empty() => match val.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::ParseBool {
                name: name.to_string(),
                value: val,
            }),
        },
        _ => Ok(default),
    }
}
