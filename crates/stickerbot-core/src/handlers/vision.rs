use std::sync::Arc;

use async_trait::async_trait;

use super::{is_lang_code, split_first_word, CommandContext, CommandHandler};
use crate::{
    errors::Error,
    media::{extract_media, MediaBuffer, MediaFilter},
    ports::VisionClient,
    utils::truncate_text,
    Result,
};

const NEED_IMAGE_OCR: &str = "📷 Send or reply to an image with !ocr.";
const NEED_IMAGE_TRANSLATE: &str = "📷 Send or reply to an image with !imgtr [lang].";
const NO_TEXT: &str = "🔍 No text found in the image.";

const OCR_INSTRUCTION: &str = "Extract all text visible in this image exactly as written, \
preserving line breaks. Reply with the extracted text only. If there is no text, reply with nothing.";

fn translate_instruction(lang: &str) -> String {
    format!(
        "Extract all text visible in this image and translate it into the language with \
         code '{lang}'. Reply with the translation only. If there is no text, reply with nothing."
    )
}

fn vision_client(ctx: &CommandContext<'_>) -> Result<Arc<dyn VisionClient>> {
    ctx.services
        .vision
        .clone()
        .ok_or_else(|| Error::Unconfigured("AI text extraction (OPENAI_API_KEY)".to_string()))
}

/// Declared mime type, else sniffed from the bytes.
fn image_mime(media: &MediaBuffer) -> String {
    if let Some(m) = media.mime_type.as_deref().filter(|m| m.starts_with("image/")) {
        return m.to_string();
    }
    image::guess_format(&media.bytes)
        .map(|f| f.to_mime_type().to_string())
        .unwrap_or_else(|_| "image/jpeg".to_string())
}

/// Download the image, ask the vision backend, reply once with its answer.
async fn run_vision(ctx: &CommandContext<'_>, instruction: &str, prompt: &str) -> Result<()> {
    let vision = vision_client(ctx)?;

    let Some(media) = extract_media(ctx.messenger(), ctx.msg, MediaFilter::Image).await? else {
        ctx.reply_text(prompt).await?;
        return Ok(());
    };

    let mime = image_mime(&media);
    let text = ctx
        .with_timeout(
            "text extraction",
            vision.extract_text(&media.bytes, &mime, instruction),
        )
        .await?;

    let text = text.trim();
    if text.is_empty() {
        ctx.reply_text(NO_TEXT).await?;
        return Ok(());
    }

    let max = ctx.messenger().capabilities().max_message_len.saturating_sub(16);
    ctx.reply_text(truncate_text(text, max)).await?;
    Ok(())
}

/// `!ocr`
pub struct OcrHandler;

#[async_trait]
impl CommandHandler for OcrHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()> {
        run_vision(ctx, OCR_INSTRUCTION, NEED_IMAGE_OCR).await
    }
}

/// `!imgtr [lang]`
pub struct TranslateImageHandler;

impl TranslateImageHandler {
    fn target_lang(ctx: &CommandContext<'_>) -> String {
        let (first, _) = split_first_word(ctx.args);
        if is_lang_code(first) {
            first.to_string()
        } else {
            ctx.services.settings.default_translate_lang.clone()
        }
    }
}

#[async_trait]
impl CommandHandler for TranslateImageHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()> {
        let lang = Self::target_lang(ctx);
        run_vision(ctx, &translate_instruction(&lang), NEED_IMAGE_TRANSLATE).await
    }
}
