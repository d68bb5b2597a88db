//! Command handlers.
//!
//! Each handler is a short orchestration:
//! - validate command-specific preconditions (media present, group chat, owner)
//! - call the extractor / transcoder / group directory / external collaborator
//! - send exactly one reply
//!
//! Failures are returned, never replied to here; the command router owns the
//! single error reply.

use std::{future::Future, sync::Arc, time::Duration};

use async_trait::async_trait;

use crate::{
    config::Config,
    domain::{CanonicalId, ChatId, MessageRef, UserId},
    errors::Error,
    groups::GroupDirectory,
    media::TempFiles,
    messaging::{
        port::MessagingPort,
        types::{InboundMessage, OutgoingPayload},
    },
    ports::{SpeechSynthesizer, VisionClient},
    sticker::StickerTranscoder,
    Result,
};

pub mod broadcast;
pub mod menu;
pub mod sticker;
pub mod tts;
pub mod vision;

/// Defaults the handlers need from configuration.
#[derive(Clone, Debug)]
pub struct HandlerSettings {
    pub owner: Option<CanonicalId>,
    pub default_translate_lang: String,
    pub default_tts_lang: String,
    pub collaborator_timeout: Duration,
}

impl HandlerSettings {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            owner: cfg.owner_id.clone(),
            default_translate_lang: cfg.default_translate_lang.clone(),
            default_tts_lang: cfg.default_tts_lang.clone(),
            collaborator_timeout: cfg.collaborator_timeout,
        }
    }
}

/// Long-lived services shared by every handler invocation.
pub struct BotServices {
    pub messenger: Arc<dyn MessagingPort>,
    pub groups: GroupDirectory,
    pub transcoder: StickerTranscoder,
    pub temp: TempFiles,
    pub vision: Option<Arc<dyn VisionClient>>,
    pub speech: Option<Arc<dyn SpeechSynthesizer>>,
    pub settings: HandlerSettings,
}

impl BotServices {
    pub fn from_config(
        cfg: &Config,
        messenger: Arc<dyn MessagingPort>,
        vision: Option<Arc<dyn VisionClient>>,
        speech: Option<Arc<dyn SpeechSynthesizer>>,
    ) -> Result<Self> {
        let temp = TempFiles::new(&cfg.temp_dir)?;
        Ok(Self {
            groups: GroupDirectory::new(messenger.clone()),
            transcoder: StickerTranscoder::new(
                cfg.ffmpeg_path.clone(),
                cfg.transcode_timeout,
                temp.clone(),
            ),
            temp,
            messenger,
            vision,
            speech,
            settings: HandlerSettings::from_config(cfg),
        })
    }
}

/// Everything one handler invocation sees.
pub struct CommandContext<'a> {
    pub services: &'a BotServices,
    pub msg: &'a InboundMessage,
    /// Canonical command name (aliases already resolved).
    pub command: &'a str,
    /// Text after the command token, trimmed.
    pub args: &'a str,
}

impl<'a> CommandContext<'a> {
    pub fn chat_id(&self) -> &ChatId {
        self.msg.chat_id()
    }

    pub fn sender(&self) -> &UserId {
        &self.msg.sender
    }

    pub fn messenger(&self) -> &dyn MessagingPort {
        self.services.messenger.as_ref()
    }

    pub async fn reply(&self, payload: OutgoingPayload) -> Result<MessageRef> {
        self.services
            .messenger
            .send(self.chat_id(), payload, Some(&self.msg.id))
            .await
    }

    pub async fn reply_text(&self, text: impl Into<String> + Send) -> Result<MessageRef> {
        self.reply(OutgoingPayload::text(text)).await
    }

    /// Bound an external collaborator call by the configured timeout.
    pub async fn with_timeout<T>(
        &self,
        what: &str,
        fut: impl Future<Output = Result<T>> + Send,
    ) -> Result<T> {
        let limit = self.services.settings.collaborator_timeout;
        match tokio::time::timeout(limit, fut).await {
            Ok(r) => r,
            Err(_) => Err(Error::External(format!(
                "{what} timed out after {}s",
                limit.as_secs()
            ))),
        }
    }
}

#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()>;
}

/// `xx` or `xx-YY` language codes, e.g. `en`, `pt-BR`.
pub fn is_lang_code(s: &str) -> bool {
    let two_letters = |p: &str| p.len() == 2 && p.chars().all(|c| c.is_ascii_alphabetic());
    match s.split_once('-') {
        Some((primary, region)) => two_letters(primary) && two_letters(region),
        None => two_letters(s),
    }
}

/// Split off the first whitespace-delimited word.
pub fn split_first_word(s: &str) -> (&str, &str) {
    let s = s.trim();
    match s.find(char::is_whitespace) {
        Some(i) => (&s[..i], s[i..].trim_start()),
        None => (s, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_codes() {
        for ok in ["en", "pt", "PT", "pt-BR", "zh-CN"] {
            assert!(is_lang_code(ok), "{ok}");
        }
        for bad in [
            "", "e", "english", "pt_BR", "12", "en-", "hello", "the", "fil", "es-419", "zh-Hant",
        ] {
            assert!(!is_lang_code(bad), "{bad}");
        }
    }

    #[test]
    fn first_word_split() {
        assert_eq!(split_first_word("  en  hello world "), ("en", "hello world"));
        assert_eq!(split_first_word("solo"), ("solo", ""));
        assert_eq!(split_first_word(""), ("", ""));
    }
}
