//! Capability interface over the remote messaging platform.
//!
//! The crawler only sees this trait and its plain data types; the MTProto
//! implementation lives in [`mtproto`] and carries no pipeline logic.

pub mod mtproto;

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::PeerType;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("not authorized: {0}")]
    NotAuthorized(String),
    #[error("session error: {0}")]
    Session(String),
    #[error("rpc error: {0}")]
    Rpc(String),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Address of a remote peer, as stored in the source registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerRef {
    pub peer_type: PeerType,
    pub peer_id: i64,
    pub access_hash: Option<i64>,
}

/// A dialog visible to the crawling identity.
#[derive(Debug, Clone)]
pub struct SourceInfo {
    pub peer_type: PeerType,
    pub peer_id: i64,
    pub access_hash: Option<i64>,
    pub username: Option<String>,
    pub title: Option<String>,
}

/// Everything the pipeline needs to know about a document attachment.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DocumentInfo {
    pub mime_type: Option<String>,
    /// Whether the platform flagged the document as a video regardless of
    /// its MIME type.
    pub has_video_attribute: bool,
    /// Duration in seconds from platform metadata, when known.
    pub duration: Option<i64>,
    pub file_size: Option<i64>,
}

/// Attachment of a history message.
#[derive(Debug, Clone)]
pub enum Attachment {
    Photo,
    Document(DocumentInfo),
    Other,
}

/// One message from a source's history.
#[derive(Debug, Clone)]
pub struct HistoryMessage {
    pub id: i32,
    /// Non-zero for messages that belong to an album.
    pub grouped_id: Option<i64>,
    pub text: String,
    pub attachment: Option<Attachment>,
}

/// Classification outcome for a message attachment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttachmentClass<'a> {
    /// Photos, non-video documents, stickers and friends.
    Ignored,
    /// A document the pipeline should download and republish.
    Video(&'a DocumentInfo),
}

/// Classify a message attachment into a closed set of outcomes.
///
/// A document qualifies as a video when its MIME type starts with `video/`
/// or the platform attached an explicit video attribute to it.
#[must_use]
pub fn classify_attachment(attachment: Option<&Attachment>) -> AttachmentClass<'_> {
    match attachment {
        Some(Attachment::Document(doc)) if is_video_document(doc) => AttachmentClass::Video(doc),
        _ => AttachmentClass::Ignored,
    }
}

fn is_video_document(doc: &DocumentInfo) -> bool {
    if doc
        .mime_type
        .as_deref()
        .is_some_and(|m| m.to_ascii_lowercase().starts_with("video/"))
    {
        return true;
    }
    doc.has_video_attribute
}

/// File extension to use for a downloaded document, from its MIME subtype.
#[must_use]
pub fn document_extension(doc: &DocumentInfo) -> &str {
    doc.mime_type
        .as_deref()
        .and_then(|m| m.split_once('/'))
        .map_or("mp4", |(_, subtype)| subtype)
}

/// Remote platform operations the crawler consumes.
///
/// `fetch_history` returns messages newest-first, the platform's native
/// order; callers reorder as needed.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// Full list of channels/groups visible to the crawling identity.
    async fn fetch_all_visible_sources(&self) -> Result<Vec<SourceInfo>, PlatformError>;

    /// One page of a peer's history, ending (exclusive) at `offset_id`.
    /// `offset_id` of 0 starts from the most recent message.
    async fn fetch_history(
        &self,
        peer: &PeerRef,
        offset_id: i32,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, PlatformError>;

    /// Download the video attachment of one message to `dest`.
    async fn download_video(
        &self,
        peer: &PeerRef,
        message_id: i32,
        dest: &Path,
    ) -> Result<(), PlatformError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(mime: Option<&str>, video_attr: bool) -> Attachment {
        Attachment::Document(DocumentInfo {
            mime_type: mime.map(ToString::to_string),
            has_video_attribute: video_attr,
            duration: None,
            file_size: None,
        })
    }

    #[test]
    fn test_classify_video_by_mime() {
        let att = doc(Some("video/mp4"), false);
        assert!(matches!(
            classify_attachment(Some(&att)),
            AttachmentClass::Video(_)
        ));
    }

    #[test]
    fn test_classify_video_by_attribute() {
        let att = doc(Some("application/octet-stream"), true);
        assert!(matches!(
            classify_attachment(Some(&att)),
            AttachmentClass::Video(_)
        ));
    }

    #[test]
    fn test_classify_ignores_photos_and_plain_documents() {
        assert_eq!(
            classify_attachment(Some(&Attachment::Photo)),
            AttachmentClass::Ignored
        );
        let pdf = doc(Some("application/pdf"), false);
        assert_eq!(classify_attachment(Some(&pdf)), AttachmentClass::Ignored);
        assert_eq!(classify_attachment(None), AttachmentClass::Ignored);
    }

    #[test]
    fn test_document_extension() {
        let webm = DocumentInfo {
            mime_type: Some("video/webm".to_string()),
            ..DocumentInfo::default()
        };
        assert_eq!(document_extension(&webm), "webm");

        let unknown = DocumentInfo::default();
        assert_eq!(document_extension(&unknown), "mp4");
    }
}
