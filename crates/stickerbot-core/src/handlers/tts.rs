use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use super::{split_first_word, CommandContext, CommandHandler};
use crate::{
    errors::Error, messaging::types::OutgoingPayload, ports::SpeechSynthesizer, Result,
};

pub const TTS_MAX_CHARS: usize = 500;
pub const TTS_USAGE: &str = "Usage: !tts [lang] <text>  (e.g. !tts en hello world)";

/// Split `[lang] <text>`.
///
/// The first word is a language only when `resolve` knows it and text
/// follows it; otherwise the whole input is spoken in `default_lang`.
pub fn parse_tts_args<'a>(
    args: &'a str,
    default_lang: &str,
    resolve: impl Fn(&str) -> Option<String>,
) -> Option<(String, &'a str)> {
    let args = args.trim();
    if args.is_empty() {
        return None;
    }
    let (first, rest) = split_first_word(args);
    if !rest.is_empty() {
        if let Some(lang) = resolve(first) {
            return Some((lang, rest));
        }
    }
    Some((default_lang.to_string(), args))
}

/// `!tts [lang] <text>`
pub struct SpeakHandler;

impl SpeakHandler {
    fn synthesizer(ctx: &CommandContext<'_>) -> Result<Arc<dyn SpeechSynthesizer>> {
        ctx.services
            .speech
            .clone()
            .ok_or_else(|| Error::Unconfigured("Text-to-speech".to_string()))
    }
}

#[async_trait]
impl CommandHandler for SpeakHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()> {
        if ctx.args.trim().is_empty() {
            ctx.reply_text(TTS_USAGE).await?;
            return Ok(());
        }
        let speech = Self::synthesizer(ctx)?;

        let default_lang = ctx.services.settings.default_tts_lang.as_str();
        let Some((lang, text)) =
            parse_tts_args(ctx.args, default_lang, |l| speech.resolve_lang(l))
        else {
            ctx.reply_text(TTS_USAGE).await?;
            return Ok(());
        };
        if text.chars().count() > TTS_MAX_CHARS {
            ctx.reply_text(format!(
                "Text is too long for speech (max {TTS_MAX_CHARS} characters)."
            ))
            .await?;
            return Ok(());
        }

        let out = ctx.services.temp.allocate("tts", "mp3");
        ctx.with_timeout("speech synthesis", speech.synthesize(text, &lang, out.path()))
            .await?;
        let audio = tokio::fs::read(out.path()).await?;
        if audio.is_empty() {
            return Err(Error::External("speech synthesis produced no audio".to_string()));
        }

        ctx.reply(OutgoingPayload::Audio {
            bytes: Bytes::from(audio),
            mime_type: speech.mime_type().to_string(),
        })
        .await?;
        Ok(())
    }
}
