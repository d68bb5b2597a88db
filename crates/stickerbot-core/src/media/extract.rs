use bytes::{Bytes, BytesMut};
use futures_util::StreamExt;

use crate::{
    errors::Error,
    messaging::{
        port::MessagingPort,
        types::{Attachment, InboundMessage, MediaKind},
    },
    Result,
};

/// Absolute ceiling on a downloaded attachment.
pub const MAX_MEDIA_BYTES: u64 = 10 * 1024 * 1024;

/// Downloaded attachment, ready for transcoding.
#[derive(Clone, Debug)]
pub struct MediaBuffer {
    pub bytes: Bytes,
    pub kind: MediaKind,
    pub mime_type: Option<String>,
}

/// Which attachments a command can use.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MediaFilter {
    Any,
    /// Images only, GIFs included.
    Image,
    /// Videos and GIFs.
    Animated,
}

impl MediaFilter {
    pub fn accepts(self, att: &Attachment) -> bool {
        match self {
            MediaFilter::Any => true,
            MediaFilter::Image => att.kind == MediaKind::Image,
            MediaFilter::Animated => att.is_animated(),
        }
    }
}

/// Pick the attachment a command should act on.
///
/// Priority: direct image, direct video, quoted image, quoted video. Media the
/// filter rejects is skipped, so a usable quoted attachment still wins over an
/// unusable direct one.
pub fn select_attachment(msg: &InboundMessage, filter: MediaFilter) -> Option<&Attachment> {
    let candidates = [
        (&msg.attachments, MediaKind::Image),
        (&msg.attachments, MediaKind::Video),
        (&msg.quoted, MediaKind::Image),
        (&msg.quoted, MediaKind::Video),
    ];
    candidates
        .into_iter()
        .find_map(|(list, kind)| list.iter().find(|a| a.kind == kind && filter.accepts(a)))
}

/// Locate and download the relevant attachment.
///
/// `Ok(None)` means the message carries no usable media; callers answer that
/// with a prompt rather than treating it as a failure.
pub async fn extract_media(
    messenger: &dyn MessagingPort,
    msg: &InboundMessage,
    filter: MediaFilter,
) -> Result<Option<MediaBuffer>> {
    extract_media_with_limit(messenger, msg, filter, MAX_MEDIA_BYTES).await
}

pub async fn extract_media_with_limit(
    messenger: &dyn MessagingPort,
    msg: &InboundMessage,
    filter: MediaFilter,
    limit: u64,
) -> Result<Option<MediaBuffer>> {
    let Some(att) = select_attachment(msg, filter) else {
        return Ok(None);
    };

    if let Some(size) = att.declared_size {
        if size > limit {
            return Err(Error::MediaTooLarge { size, limit });
        }
    }

    let mut stream = messenger.fetch_media(&att.media).await?;
    let mut buf = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        let size = (buf.len() + chunk.len()) as u64;
        if size > limit {
            return Err(Error::MediaTooLarge { size, limit });
        }
        buf.extend_from_slice(&chunk);
    }

    tracing::debug!(kind = ?att.kind, bytes = buf.len(), "media downloaded");

    Ok(Some(MediaBuffer {
        bytes: buf.freeze(),
        kind: att.kind,
        mime_type: att.mime_type.clone(),
    }))
}
