//! Sticker transcoding.
//!
//! Two paths share one output contract: a square sticker no larger than
//! [`StickerSpec::max_bytes`]. Stills are WebP, encoded in-process with the
//! `image` crate. Videos (and GIFs) go through `ffmpeg` into the animated
//! container the transport asks for.
//!
//! An oversized result is an error. There is no re-encode loop at lower
//! quality.

mod animated;
mod still;

use std::{path::PathBuf, time::Duration};

use bytes::Bytes;

use crate::{
    media::{MediaBuffer, TempFiles},
    messaging::types::{is_animated_media, AnimatedStickerFormat},
    Result,
};

pub use animated::ffmpeg_args;

/// Output constraints for every sticker.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StickerSpec {
    pub max_edge: u32,
    pub max_bytes: u64,
    pub max_duration: Duration,
    pub frame_rate: u32,
}

pub const STICKER_SPEC: StickerSpec = StickerSpec {
    max_edge: 512,
    max_bytes: 1024 * 1024,
    max_duration: Duration::from_secs(8),
    frame_rate: 10,
};

/// Telegram caps video stickers at 3 s and 256 KB.
const WEBM_MAX_DURATION: Duration = Duration::from_secs(3);
const WEBM_MAX_BYTES: u64 = 256 * 1024;

impl StickerSpec {
    /// Constraints for one animated container, never looser than `self`.
    pub fn for_format(&self, format: AnimatedStickerFormat) -> StickerSpec {
        match format {
            AnimatedStickerFormat::WebP => *self,
            AnimatedStickerFormat::Webm => StickerSpec {
                max_duration: self.max_duration.min(WEBM_MAX_DURATION),
                max_bytes: self.max_bytes.min(WEBM_MAX_BYTES),
                ..*self
            },
        }
    }
}

pub const STICKER_MIME: &str = "image/webp";
pub const VIDEO_STICKER_MIME: &str = "video/webm";

pub fn animated_mime(format: AnimatedStickerFormat) -> &'static str {
    match format {
        AnimatedStickerFormat::WebP => STICKER_MIME,
        AnimatedStickerFormat::Webm => VIDEO_STICKER_MIME,
    }
}

/// How a non-square input is fitted onto the square canvas.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FitPolicy {
    /// Scale to fill and crop the overflow.
    Cover,
    /// Scale to fit and pad with transparency.
    #[default]
    Contain,
}

impl FitPolicy {
    /// Parse the optional word after `!sticker`.
    pub fn from_arg(arg: &str) -> Option<Self> {
        match arg.trim().to_lowercase().as_str() {
            "cover" | "crop" | "fill" => Some(FitPolicy::Cover),
            "contain" | "fit" => Some(FitPolicy::Contain),
            _ => None,
        }
    }
}

/// Encoded sticker, ready to send.
#[derive(Clone, Debug)]
pub struct Sticker {
    pub bytes: Bytes,
    pub mime_type: &'static str,
    pub animated: bool,
}

#[derive(Clone, Debug)]
pub struct StickerTranscoder {
    spec: StickerSpec,
    ffmpeg: PathBuf,
    timeout: Duration,
    temp: TempFiles,
}

impl StickerTranscoder {
    pub fn new(ffmpeg: impl Into<PathBuf>, timeout: Duration, temp: TempFiles) -> Self {
        Self::with_spec(STICKER_SPEC, ffmpeg, timeout, temp)
    }

    pub fn with_spec(
        spec: StickerSpec,
        ffmpeg: impl Into<PathBuf>,
        timeout: Duration,
        temp: TempFiles,
    ) -> Self {
        Self {
            spec,
            ffmpeg: ffmpeg.into(),
            timeout,
            temp,
        }
    }

    pub fn spec(&self) -> &StickerSpec {
        &self.spec
    }

    /// Convert downloaded media into a sticker, picking the path by kind.
    pub async fn transcode(
        &self,
        media: &MediaBuffer,
        fit: FitPolicy,
        format: AnimatedStickerFormat,
    ) -> Result<Sticker> {
        if is_animated_input(media) {
            return self.transcode_video(&media.bytes, fit, format).await;
        }
        self.transcode_image(media.bytes.clone(), fit).await
    }

    pub async fn transcode_image(&self, input: Bytes, fit: FitPolicy) -> Result<Sticker> {
        let bytes = still::encode_static(input, fit, self.spec).await?;
        Ok(Sticker {
            bytes,
            mime_type: STICKER_MIME,
            animated: false,
        })
    }

    pub async fn transcode_video(
        &self,
        input: &[u8],
        fit: FitPolicy,
        format: AnimatedStickerFormat,
    ) -> Result<Sticker> {
        let bytes = animated::encode_animated(
            &self.ffmpeg,
            self.timeout,
            &self.temp,
            input,
            fit,
            format,
            self.spec.for_format(format),
        )
        .await?;
        Ok(Sticker {
            bytes,
            mime_type: animated_mime(format),
            animated: true,
        })
    }
}

/// GIF documents arrive tagged as images but need the animated path.
pub fn is_animated_input(media: &MediaBuffer) -> bool {
    is_animated_media(media.kind, media.mime_type.as_deref())
}
