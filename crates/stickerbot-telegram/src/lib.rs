//! Telegram adapter (teloxide).
//!
//! This crate implements the `stickerbot-core` MessagingPort over the Telegram
//! Bot API.

use std::collections::HashSet;

use async_trait::async_trait;
use futures_util::StreamExt;

use teloxide::{
    net::Download,
    prelude::*,
    types::{InputFile, ParseMode},
};

use tokio::time::sleep;

pub mod convert;
pub mod router;

use stickerbot_core::{
    domain::{CanonicalId, ChatId, MessageId, MessageRef, UserId},
    errors::Error,
    messaging::{
        port::{MediaStream, MessagingPort},
        types::{
            AnimatedStickerFormat, MediaRef, MessagingCapabilities, OutgoingPayload, Participant,
        },
    },
    Result,
};

#[derive(Clone)]
pub struct TelegramMessenger {
    bot: Bot,
    self_id: UserId,
}

impl TelegramMessenger {
    pub fn new(bot: Bot, self_id: UserId) -> Self {
        Self { bot, self_id }
    }

    pub fn bot(&self) -> Bot {
        self.bot.clone()
    }

    fn tg_chat(chat_id: &ChatId) -> Result<teloxide::types::ChatId> {
        chat_id
            .0
            .parse::<i64>()
            .map(teloxide::types::ChatId)
            .map_err(|_| Error::External(format!("not a telegram chat id: {}", chat_id.0)))
    }

    fn tg_msg_id(message_id: &MessageId) -> Result<teloxide::types::MessageId> {
        message_id
            .0
            .parse::<i32>()
            .map(teloxide::types::MessageId)
            .map_err(|_| Error::External(format!("not a telegram message id: {}", message_id.0)))
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(e) => match e {
                    teloxide::RequestError::RetryAfter(d) if attempts < MAX_RETRIES => {
                        attempts += 1;
                        sleep(d).await;
                        continue;
                    }
                    other => return Err(Self::map_err(other)),
                },
            }
        }
    }
}

pub fn escape_html(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Escape `text` and turn each `@<id>` of a mentioned user into a user link.
///
/// Telegram has no `@id` syntax, so numeric ids need a `tg://user` link to
/// notify anyone.
pub fn render_mentions_html(text: &str, mentions: &[UserId]) -> String {
    let ids: HashSet<String> = mentions
        .iter()
        .filter_map(|m| CanonicalId::parse(&m.0).ok())
        .map(|id| id.user().to_string())
        .collect();

    let render_word = |word: &str| match word.strip_prefix('@') {
        Some(id) if ids.contains(id) => format!(
            "<a href=\"tg://user?id={}\">@{}</a>",
            escape_html(id),
            escape_html(id)
        ),
        _ => escape_html(word),
    };

    text.split('\n')
        .map(|line| line.split(' ').map(&render_word).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n")
}

/// How a sticker payload goes over the Bot API.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StickerUpload {
    Sticker(&'static str),
    Document(&'static str),
}

/// Telegram plays uploaded `.webm` stickers as video stickers but shows an
/// uploaded `.webp` as a still, so animated WebP travels as a file instead.
pub fn sticker_upload(mime_type: &str, animated: bool) -> StickerUpload {
    match (mime_type, animated) {
        ("video/webm", _) => StickerUpload::Sticker("sticker.webm"),
        ("image/webp", false) => StickerUpload::Sticker("sticker.webp"),
        ("image/webp", true) => StickerUpload::Document("sticker.webp"),
        _ => StickerUpload::Document("sticker.bin"),
    }
}

#[async_trait]
impl MessagingPort for TelegramMessenger {
    fn capabilities(&self) -> MessagingCapabilities {
        MessagingCapabilities {
            animated_stickers: Some(AnimatedStickerFormat::Webm),
            max_message_len: 4096,
        }
    }

    fn self_id(&self) -> UserId {
        self.self_id.clone()
    }

    async fn send(
        &self,
        chat_id: &ChatId,
        payload: OutgoingPayload,
        reply_to: Option<&MessageRef>,
    ) -> Result<MessageRef> {
        let chat = Self::tg_chat(chat_id)?;
        let reply = reply_to.map(|r| Self::tg_msg_id(&r.message_id)).transpose()?;

        let sent = match payload {
            OutgoingPayload::Text { text, mentions } if !mentions.is_empty() => {
                let html = render_mentions_html(&text, &mentions);
                self.with_retry(|| {
                    let mut req = self
                        .bot
                        .send_message(chat, html.clone())
                        .parse_mode(ParseMode::Html);
                    if let Some(r) = reply {
                        req = req.reply_to_message_id(r);
                    }
                    req
                })
                .await?
            }
            OutgoingPayload::Text { text, .. } => {
                self.with_retry(|| {
                    let mut req = self.bot.send_message(chat, text.clone());
                    if let Some(r) = reply {
                        req = req.reply_to_message_id(r);
                    }
                    req
                })
                .await?
            }
            OutgoingPayload::Sticker {
                bytes,
                mime_type,
                animated,
            } => match sticker_upload(&mime_type, animated) {
                StickerUpload::Sticker(name) => {
                    let file = InputFile::memory(bytes.to_vec()).file_name(name);
                    self.with_retry(|| {
                        let mut req = self.bot.send_sticker(chat, file.clone());
                        if let Some(r) = reply {
                            req = req.reply_to_message_id(r.0);
                        }
                        req
                    })
                    .await?
                }
                StickerUpload::Document(name) => {
                    tracing::debug!(mime = %mime_type, animated, "sticker sent as a file");
                    let file = InputFile::memory(bytes.to_vec()).file_name(name);
                    self.with_retry(|| {
                        let mut req = self.bot.send_document(chat, file.clone());
                        if let Some(r) = reply {
                            req = req.reply_to_message_id(r);
                        }
                        req
                    })
                    .await?
                }
            },
            OutgoingPayload::Audio { bytes, .. } => {
                let file = InputFile::memory(bytes.to_vec()).file_name("speech.mp3");
                self.with_retry(|| {
                    let mut req = self.bot.send_audio(chat, file.clone());
                    if let Some(r) = reply {
                        req = req.reply_to_message_id(r);
                    }
                    req
                })
                .await?
            }
        };

        Ok(MessageRef {
            chat_id: chat_id.clone(),
            message_id: MessageId(sent.id.0.to_string()),
        })
    }

    /// Telegram only exposes a group's administrators to bots, so the roster
    /// holds admins only.
    async fn fetch_group_roster(&self, chat_id: &ChatId) -> Result<Vec<Participant>> {
        let chat = Self::tg_chat(chat_id)?;
        let admins = self
            .with_retry(|| self.bot.get_chat_administrators(chat))
            .await?;
        Ok(admins
            .into_iter()
            .map(|m| Participant {
                id: UserId(m.user.id.0.to_string()),
                is_admin: true,
            })
            .collect())
    }

    async fn fetch_media(&self, media: &MediaRef) -> Result<MediaStream> {
        let file = self
            .with_retry(|| self.bot.get_file(media.0.clone()))
            .await?;
        let stream = self
            .bot
            .download_file_stream(&file.path)
            .map(|chunk| chunk.map_err(|e| Error::External(format!("telegram download error: {e}"))));
        Ok(Box::pin(stream))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn animated_stickers_upload_as_webm_video_stickers() {
        assert_eq!(
            sticker_upload("video/webm", true),
            StickerUpload::Sticker("sticker.webm")
        );
        assert_eq!(
            sticker_upload("image/webp", false),
            StickerUpload::Sticker("sticker.webp")
        );
        assert_eq!(
            sticker_upload("image/webp", true),
            StickerUpload::Document("sticker.webp")
        );
    }

    #[test]
    fn telegram_asks_for_webm_animation() {
        let tg = TelegramMessenger::new(Bot::new("0:test"), UserId("1".to_string()));
        assert_eq!(
            tg.capabilities().animated_stickers,
            Some(AnimatedStickerFormat::Webm)
        );
    }

    #[test]
    fn html_is_escaped() {
        assert_eq!(escape_html("<b>&\"</b>"), "&lt;b&gt;&amp;&quot;&lt;/b&gt;");
    }

    #[test]
    fn only_whole_mention_words_are_linked() {
        let html = render_mentions_html("@4 @42 @420", &[UserId("4".to_string())]);
        assert_eq!(html, "<a href=\"tg://user?id=4\">@4</a> @42 @420");
    }

    #[test]
    fn mentions_become_user_links() {
        let html = render_mentions_html(
            "Hey <all>\n\n@42\n@77",
            &[UserId("42".to_string()), UserId("77".to_string())],
        );
        assert_eq!(
            html,
            "Hey &lt;all&gt;\n\n<a href=\"tg://user?id=42\">@42</a>\n<a href=\"tg://user?id=77\">@77</a>"
        );
    }
}
