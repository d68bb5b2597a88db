//! Telegram `Message` -> transport-neutral `InboundMessage`.

use teloxide::types::Message;

use stickerbot_core::{
    domain::{ChatId, MessageId, MessageRef, UserId},
    messaging::types::{Attachment, ChatKind, InboundMessage, MediaKind, MediaRef},
};

fn attachment(kind: MediaKind, file_id: &str, mime: Option<String>, size: u32) -> Attachment {
    Attachment {
        kind,
        media: MediaRef(file_id.to_string()),
        mime_type: mime,
        declared_size: Some(u64::from(size)),
    }
}

/// Media carried by one message. Stickers and voice notes are not inputs.
pub fn attachments_of(msg: &Message) -> Vec<Attachment> {
    if let Some(photos) = msg.photo() {
        // Sizes are ordered smallest first.
        return photos
            .last()
            .map(|p| {
                vec![attachment(
                    MediaKind::Image,
                    &p.file.id,
                    Some("image/jpeg".to_string()),
                    p.file.size,
                )]
            })
            .unwrap_or_default();
    }
    // Animations also carry a document; check them first.
    if let Some(a) = msg.animation() {
        let mime = a.mime_type.as_ref().map(|m| m.essence_str().to_string());
        return vec![attachment(MediaKind::Video, &a.file.id, mime, a.file.size)];
    }
    if let Some(v) = msg.video() {
        let mime = v.mime_type.as_ref().map(|m| m.essence_str().to_string());
        return vec![attachment(MediaKind::Video, &v.file.id, mime, v.file.size)];
    }
    if let Some(v) = msg.video_note() {
        return vec![attachment(
            MediaKind::Video,
            &v.file.id,
            Some("video/mp4".to_string()),
            v.file.size,
        )];
    }
    if let Some(d) = msg.document() {
        let mime = d.mime_type.as_ref().map(|m| m.essence_str().to_string());
        let kind = match mime.as_deref() {
            Some(m) if m.starts_with("image/") => MediaKind::Image,
            Some(m) if m.starts_with("video/") => MediaKind::Video,
            _ => return Vec::new(),
        };
        return vec![attachment(kind, &d.file.id, mime, d.file.size)];
    }
    Vec::new()
}

/// `None` for messages without a human sender (channel posts, service
/// messages, other bots).
pub fn inbound_from_message(msg: &Message) -> Option<InboundMessage> {
    let from = msg.from()?;
    if from.is_bot {
        return None;
    }

    let chat_id = ChatId(msg.chat.id.0.to_string());
    let chat_kind = if msg.chat.is_group() || msg.chat.is_supergroup() {
        ChatKind::Group
    } else {
        ChatKind::Private
    };

    Some(InboundMessage {
        id: MessageRef {
            chat_id,
            message_id: MessageId(msg.id.0.to_string()),
        },
        chat_kind,
        sender: UserId(from.id.0.to_string()),
        body: msg.text().or_else(|| msg.caption()).unwrap_or("").to_string(),
        attachments: attachments_of(msg),
        quoted: msg.reply_to_message().map(attachments_of).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(v: serde_json::Value) -> Message {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn private_photo_with_caption() {
        let msg = message(serde_json::json!({
            "message_id": 10,
            "date": 1700000000,
            "chat": { "id": 42, "first_name": "Ana", "type": "private" },
            "from": { "id": 42, "is_bot": false, "first_name": "Ana" },
            "caption": "!s cover",
            "photo": [
                { "file_id": "small", "file_unique_id": "s1", "width": 90, "height": 90, "file_size": 1000 },
                { "file_id": "big", "file_unique_id": "b1", "width": 800, "height": 800, "file_size": 90000 }
            ]
        }));

        let inbound = inbound_from_message(&msg).unwrap();
        assert_eq!(inbound.chat_kind, ChatKind::Private);
        assert_eq!(inbound.chat_id().0, "42");
        assert_eq!(inbound.id.message_id.0, "10");
        assert_eq!(inbound.sender.0, "42");
        assert_eq!(inbound.body, "!s cover");
        assert_eq!(inbound.attachments.len(), 1);
        assert_eq!(inbound.attachments[0].media.0, "big");
        assert_eq!(inbound.attachments[0].kind, MediaKind::Image);
        assert_eq!(inbound.attachments[0].declared_size, Some(90000));
        assert!(inbound.quoted.is_empty());
    }

    #[test]
    fn group_reply_exposes_quoted_media() {
        let msg = message(serde_json::json!({
            "message_id": 11,
            "date": 1700000000,
            "chat": { "id": -100123, "title": "Friends", "type": "supergroup" },
            "from": { "id": 7, "is_bot": false, "first_name": "Bo" },
            "text": "!gif",
            "reply_to_message": {
                "message_id": 9,
                "date": 1700000000,
                "chat": { "id": -100123, "title": "Friends", "type": "supergroup" },
                "from": { "id": 8, "is_bot": false, "first_name": "Cy" },
                "video": {
                    "file_id": "vid", "file_unique_id": "v1",
                    "width": 320, "height": 180, "duration": 12,
                    "mime_type": "video/mp4", "file_size": 500000
                }
            }
        }));

        let inbound = inbound_from_message(&msg).unwrap();
        assert!(inbound.is_group());
        assert_eq!(inbound.body, "!gif");
        assert!(inbound.attachments.is_empty());
        assert_eq!(inbound.quoted.len(), 1);
        assert_eq!(inbound.quoted[0].kind, MediaKind::Video);
        assert_eq!(inbound.quoted[0].mime_type.as_deref(), Some("video/mp4"));
    }

    #[test]
    fn bots_are_ignored() {
        let msg = message(serde_json::json!({
            "message_id": 12,
            "date": 1700000000,
            "chat": { "id": 5, "first_name": "B", "type": "private" },
            "from": { "id": 5, "is_bot": true, "first_name": "B" },
            "text": "!menu"
        }));
        assert!(inbound_from_message(&msg).is_none());
    }
}
