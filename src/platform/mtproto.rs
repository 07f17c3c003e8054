//! MTProto implementation of [`PlatformClient`] backed by grammers.
//!
//! The worker never performs interactive login: the session file must
//! already be authorized (e.g. provisioned with a one-off login tool).

use std::fmt::Display;
use std::path::Path;

use async_trait::async_trait;
use grammers_client::types::Media;
use grammers_client::{Client, Config as ClientConfig, InitParams};
use grammers_session::{PackedChat, PackedType, Session};
use tracing::{debug, info};

use crate::config::Config;
use crate::db::PeerType;

use super::{
    Attachment, DocumentInfo, HistoryMessage, PeerRef, PlatformClient, PlatformError, SourceInfo,
};

/// Telegram MTProto client for the crawling identity.
pub struct MtprotoClient {
    client: Client,
}

impl MtprotoClient {
    /// Connect using the configured API credentials and session file.
    ///
    /// # Errors
    ///
    /// Returns an error if credentials are missing, the session file cannot
    /// be loaded, the connection fails, or the session is not authorized.
    pub async fn connect(config: &Config) -> Result<Self, PlatformError> {
        let api_hash = config.api_hash.clone().ok_or_else(|| {
            PlatformError::NotAuthorized("TELEGRAM_API_HASH is not set".to_string())
        })?;

        let session = Session::load_file_or_create(&config.session_path).map_err(|e| {
            PlatformError::Session(format!(
                "failed to load session file {}: {e}",
                config.session_path.display()
            ))
        })?;

        let client = Client::connect(ClientConfig {
            session,
            api_id: config.api_id,
            api_hash,
            params: InitParams::default(),
        })
        .await
        .map_err(|e| PlatformError::Session(e.to_string()))?;

        if !client.is_authorized().await.map_err(rpc_err)? {
            return Err(PlatformError::NotAuthorized(format!(
                "session file {} is not logged in; provision an authorized session first",
                config.session_path.display()
            )));
        }

        info!("MTProto client connected");
        Ok(Self { client })
    }
}

fn rpc_err(e: impl Display) -> PlatformError {
    PlatformError::Rpc(e.to_string())
}

/// Rebuild a grammers packed chat from a stored peer address.
///
/// Broadcast channels and megagroups both resolve through the channel input
/// peer, so `Broadcast` covers every access-hash-bearing source.
fn packed_peer(peer: &PeerRef) -> PackedChat {
    match peer.peer_type {
        PeerType::Channel => PackedChat {
            ty: PackedType::Broadcast,
            id: peer.peer_id,
            access_hash: peer.access_hash,
        },
        PeerType::Group => PackedChat {
            ty: PackedType::Chat,
            id: peer.peer_id,
            access_hash: None,
        },
    }
}

fn map_media(media: Option<Media>) -> Option<Attachment> {
    match media? {
        Media::Photo(_) => Some(Attachment::Photo),
        Media::Document(doc) => Some(Attachment::Document(DocumentInfo {
            mime_type: doc.mime_type().map(ToString::to_string),
            // grammers does not surface the video attribute; MIME-based
            // classification plus the ffprobe duration fallback cover it.
            has_video_attribute: false,
            duration: None,
            file_size: Some(doc.size()),
        })),
        _ => Some(Attachment::Other),
    }
}

#[async_trait]
impl PlatformClient for MtprotoClient {
    async fn fetch_all_visible_sources(&self) -> Result<Vec<SourceInfo>, PlatformError> {
        let mut dialogs = self.client.iter_dialogs();
        let mut sources = Vec::new();

        while let Some(dialog) = dialogs.next().await.map_err(rpc_err)? {
            let chat = dialog.chat();
            let packed = chat.pack();

            let peer_type = match packed.ty {
                PackedType::Broadcast | PackedType::Megagroup | PackedType::Gigagroup => {
                    PeerType::Channel
                }
                PackedType::Chat => PeerType::Group,
                _ => continue,
            };

            sources.push(SourceInfo {
                peer_type,
                peer_id: chat.id(),
                access_hash: packed.access_hash,
                username: chat.username().map(ToString::to_string),
                title: Some(chat.name().to_string()).filter(|t| !t.is_empty()),
            });
        }

        debug!(count = sources.len(), "Fetched dialogs");
        Ok(sources)
    }

    async fn fetch_history(
        &self,
        peer: &PeerRef,
        offset_id: i32,
        limit: usize,
    ) -> Result<Vec<HistoryMessage>, PlatformError> {
        let packed = packed_peer(peer);

        let mut iter = self.client.iter_messages(packed).limit(limit);
        if offset_id > 0 {
            iter = iter.offset_id(offset_id);
        }

        let mut messages = Vec::with_capacity(limit);
        while let Some(message) = iter.next().await.map_err(rpc_err)? {
            messages.push(HistoryMessage {
                id: message.id(),
                grouped_id: message.raw.grouped_id,
                text: message.text().to_string(),
                attachment: map_media(message.media()),
            });
            if messages.len() >= limit {
                break;
            }
        }

        Ok(messages)
    }

    async fn download_video(
        &self,
        peer: &PeerRef,
        message_id: i32,
        dest: &Path,
    ) -> Result<(), PlatformError> {
        let packed = packed_peer(peer);

        let found = self
            .client
            .get_messages_by_id(packed, &[message_id])
            .await
            .map_err(rpc_err)?;

        let Some(Some(message)) = found.into_iter().next() else {
            return Err(PlatformError::Rpc(format!(
                "message {message_id} not found in peer {}",
                peer.peer_id
            )));
        };

        debug!(message_id, dest = %dest.display(), "Downloading video attachment");
        let had_media = message.download_media(dest).await?;
        if !had_media {
            return Err(PlatformError::Rpc(format!(
                "message {message_id} carries no downloadable media"
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packed_peer_channel_carries_access_hash() {
        let peer = PeerRef {
            peer_type: PeerType::Channel,
            peer_id: 42,
            access_hash: Some(7),
        };
        let packed = packed_peer(&peer);
        assert_eq!(packed.id, 42);
        assert_eq!(packed.access_hash, Some(7));
    }

    #[test]
    fn test_packed_peer_group_has_no_access_hash() {
        let peer = PeerRef {
            peer_type: PeerType::Group,
            peer_id: 9,
            access_hash: Some(7),
        };
        let packed = packed_peer(&peer);
        assert_eq!(packed.id, 9);
        assert_eq!(packed.access_hash, None);
    }
}
