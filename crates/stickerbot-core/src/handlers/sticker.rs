use async_trait::async_trait;

use super::{split_first_word, CommandContext, CommandHandler};
use crate::{
    media::{extract_media, MediaFilter},
    messaging::types::{AnimatedStickerFormat, OutgoingPayload},
    sticker::{is_animated_input, FitPolicy, Sticker},
    Result,
};

const NEED_MEDIA: &str = "📷 Send or reply to an image or video with !sticker [cover|contain].";
const NEED_ANIMATION: &str = "🎞️ Send or reply to a video or GIF with !gifsticker [cover|contain].";
const NO_ANIMATED_STICKERS: &str = "🎞️ Animated stickers are not supported in this chat.";

/// Unknown words fall back to the default fit instead of failing the command.
fn fit_from_args(args: &str) -> FitPolicy {
    let (first, _) = split_first_word(args);
    FitPolicy::from_arg(first).unwrap_or_default()
}

fn animated_format(ctx: &CommandContext<'_>) -> Option<AnimatedStickerFormat> {
    ctx.messenger().capabilities().animated_stickers
}

fn sticker_payload(sticker: Sticker) -> OutgoingPayload {
    OutgoingPayload::Sticker {
        bytes: sticker.bytes,
        mime_type: sticker.mime_type.to_string(),
        animated: sticker.animated,
    }
}

/// `!sticker`: any image or video, picking the still or animated path.
pub struct StickerHandler;

#[async_trait]
impl CommandHandler for StickerHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()> {
        let format = animated_format(ctx);
        let filter = if format.is_some() {
            MediaFilter::Any
        } else {
            MediaFilter::Image
        };
        let Some(media) = extract_media(ctx.messenger(), ctx.msg, filter).await? else {
            ctx.reply_text(NEED_MEDIA).await?;
            return Ok(());
        };
        // GIFs pass the image filter but still need an animated container.
        let format = match (format, is_animated_input(&media)) {
            (Some(f), _) => f,
            (None, false) => AnimatedStickerFormat::WebP,
            (None, true) => {
                ctx.reply_text(NO_ANIMATED_STICKERS).await?;
                return Ok(());
            }
        };

        let fit = fit_from_args(ctx.args);
        let sticker = ctx.services.transcoder.transcode(&media, fit, format).await?;
        tracing::debug!(
            bytes = sticker.bytes.len(),
            animated = sticker.animated,
            mime = sticker.mime_type,
            ?fit,
            "sticker ready"
        );
        ctx.reply(sticker_payload(sticker)).await?;
        Ok(())
    }
}

/// `!gifsticker`: animated stickers only.
pub struct GifStickerHandler;

#[async_trait]
impl CommandHandler for GifStickerHandler {
    async fn handle(&self, ctx: &CommandContext<'_>) -> Result<()> {
        let Some(format) = animated_format(ctx) else {
            ctx.reply_text(NO_ANIMATED_STICKERS).await?;
            return Ok(());
        };
        let Some(media) = extract_media(ctx.messenger(), ctx.msg, MediaFilter::Animated).await?
        else {
            ctx.reply_text(NEED_ANIMATION).await?;
            return Ok(());
        };

        let fit = fit_from_args(ctx.args);
        let sticker = ctx
            .services
            .transcoder
            .transcode_video(&media.bytes, fit, format)
            .await?;
        ctx.reply(sticker_payload(sticker)).await?;
        Ok(())
    }
}
