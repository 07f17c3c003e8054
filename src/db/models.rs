use serde::{Deserialize, Serialize};

/// Kind of remote peer a crawl source points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PeerType {
    Channel,
    Group,
}

impl PeerType {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Group => "group",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "channel" => Some(Self::Channel),
            "group" => Some(Self::Group),
            _ => None,
        }
    }
}

/// Role a media row plays within a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    /// Teaser rendition shown in the public destination.
    Video,
    /// Unshortened original, retrievable through the deep link.
    VideoFull,
}

impl MediaKind {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::VideoFull => "video_full",
        }
    }
}

/// A remote channel/group registered for crawling.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct CrawlSource {
    pub id: i64,
    pub peer_type: String,
    pub peer_id: i64,
    pub access_hash: Option<i64>,
    pub username: Option<String>,
    pub title: Option<String>,
    pub enabled: bool,
    pub hidden: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl CrawlSource {
    #[must_use]
    pub fn peer_type_enum(&self) -> Option<PeerType> {
        PeerType::from_str(&self.peer_type)
    }
}

/// Data for upserting a crawl source during dialog synchronization.
#[derive(Debug, Clone)]
pub struct SourceUpsert {
    pub peer_type: PeerType,
    pub peer_id: i64,
    pub access_hash: Option<i64>,
    pub username: Option<String>,
    pub title: Option<String>,
}

/// An ingested post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Post {
    pub id: i64,
    pub post_uid: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub title: Option<String>,
    pub original_content: Option<String>,
    pub content: Option<String>,
    pub view_count: i64,
    pub like_count: i64,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// A media entry belonging to a post.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Media {
    pub id: i64,
    pub post_id: i64,
    pub media_type: String,
    pub file_id: Option<String>,
    pub duration: Option<i64>,
    pub file_size: Option<i64>,
    pub sort_order: i64,
    pub active: bool,
    pub created_at: String,
}

/// Data for inserting a new post.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub post_uid: String,
    pub chat_id: i64,
    pub message_id: i64,
    pub title: Option<String>,
    pub original_content: Option<String>,
    pub content: Option<String>,
}

/// Data for inserting a new media row alongside its post.
#[derive(Debug, Clone)]
pub struct NewMedia {
    pub media_type: MediaKind,
    pub file_id: Option<String>,
    pub duration: Option<i64>,
    pub file_size: Option<i64>,
    pub sort_order: i64,
}
