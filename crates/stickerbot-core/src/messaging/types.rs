use bytes::Bytes;

use crate::domain::{ChatId, MessageRef, UserId};

/// Cross-transport inbound message. Immutable once received.
///
/// Transport-specific fields stay in the adapter; media is referenced through
/// an opaque [`MediaRef`] and only downloaded when a handler asks for it.
#[derive(Clone, Debug)]
pub struct InboundMessage {
    pub id: MessageRef,
    pub chat_kind: ChatKind,
    pub sender: UserId,
    pub body: String,
    /// Media carried by the message itself.
    pub attachments: Vec<Attachment>,
    /// Media carried by the message this one replies to.
    pub quoted: Vec<Attachment>,
}

impl InboundMessage {
    pub fn chat_id(&self) -> &ChatId {
        &self.id.chat_id
    }

    pub fn is_group(&self) -> bool {
        self.chat_kind == ChatKind::Group
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatKind {
    Private,
    Group,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Image,
    Video,
}

/// Opaque transport handle used to download an attachment.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct MediaRef(pub String);

#[derive(Clone, Debug)]
pub struct Attachment {
    pub kind: MediaKind,
    pub media: MediaRef,
    pub mime_type: Option<String>,
    /// Size announced by the transport, if any. Never trusted on its own.
    pub declared_size: Option<u64>,
}

impl Attachment {
    /// Videos, and GIFs even when they arrive tagged as images.
    pub fn is_animated(&self) -> bool {
        is_animated_media(self.kind, self.mime_type.as_deref())
    }
}

pub fn is_animated_media(kind: MediaKind, mime_type: Option<&str>) -> bool {
    kind == MediaKind::Video || mime_type == Some("image/gif")
}

/// Group member as reported by the transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Participant {
    pub id: UserId,
    pub is_admin: bool,
}

/// Outgoing reply payload.
#[derive(Clone, Debug)]
pub enum OutgoingPayload {
    Text {
        text: String,
        mentions: Vec<UserId>,
    },
    Sticker {
        bytes: Bytes,
        mime_type: String,
        animated: bool,
    },
    Audio {
        bytes: Bytes,
        mime_type: String,
    },
}

impl OutgoingPayload {
    pub fn text(text: impl Into<String>) -> Self {
        OutgoingPayload::Text {
            text: text.into(),
            mentions: Vec::new(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            OutgoingPayload::Text { .. } => "text",
            OutgoingPayload::Sticker { .. } => "sticker",
            OutgoingPayload::Audio { .. } => "audio",
        }
    }
}

/// Container a transport plays as an animated sticker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AnimatedStickerFormat {
    /// Looping animated WebP.
    WebP,
    /// VP9 WebM video sticker.
    Webm,
}

/// Capabilities / feature flags of a transport implementation.
#[derive(Clone, Copy, Debug)]
pub struct MessagingCapabilities {
    /// `None` when the transport cannot show animated stickers at all.
    pub animated_stickers: Option<AnimatedStickerFormat>,
    pub max_message_len: usize,
}
