use std::{ffi::OsString, path::Path, process::Stdio, time::Duration};

use bytes::Bytes;
use tokio::process::Command;

use crate::{
    errors::Error, media::TempFiles, messaging::types::AnimatedStickerFormat,
    utils::truncate_text, Result,
};

use super::{FitPolicy, StickerSpec};

const STDERR_PREVIEW_CHARS: usize = 300;

/// Video filter chain: frame-rate cap, then the square fit.
fn video_filter(fit: FitPolicy, spec: &StickerSpec) -> String {
    let edge = spec.max_edge;
    let fps = spec.frame_rate;
    match fit {
        FitPolicy::Cover => format!(
            "fps={fps},scale={edge}:{edge}:force_original_aspect_ratio=increase,crop={edge}:{edge}"
        ),
        FitPolicy::Contain => format!(
            "fps={fps},scale={edge}:{edge}:force_original_aspect_ratio=decrease,format=rgba,\
             pad={edge}:{edge}:(ow-iw)/2:(oh-ih)/2:color=black@0.0"
        ),
    }
}

/// Encoder options for each container.
fn codec_args(format: AnimatedStickerFormat) -> &'static [&'static str] {
    match format {
        // `-loop 0` makes the WebP loop forever.
        AnimatedStickerFormat::WebP => &[
            "-c:v",
            "libwebp",
            "-lossless",
            "0",
            "-quality",
            "50",
            "-compression_level",
            "6",
            "-loop",
            "0",
            "-preset",
            "default",
            "-f",
            "webp",
        ],
        // Constant-quality VP9 with an alpha plane.
        AnimatedStickerFormat::Webm => &[
            "-c:v",
            "libvpx-vp9",
            "-pix_fmt",
            "yuva420p",
            "-b:v",
            "0",
            "-crf",
            "40",
            "-deadline",
            "good",
            "-f",
            "webm",
        ],
    }
}

fn output_ext(format: AnimatedStickerFormat) -> &'static str {
    match format {
        AnimatedStickerFormat::WebP => "webp",
        AnimatedStickerFormat::Webm => "webm",
    }
}

/// Full ffmpeg argument list for one animated sticker.
///
/// `-t` sits after `-i` so it limits the output and `-an` drops audio.
pub fn ffmpeg_args(
    input: &Path,
    output: &Path,
    fit: FitPolicy,
    format: AnimatedStickerFormat,
    spec: &StickerSpec,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = ["-hide_banner", "-loglevel", "error", "-y", "-i"]
        .into_iter()
        .map(OsString::from)
        .collect();
    args.push(input.as_os_str().to_owned());
    args.extend(
        [
            "-t".to_string(),
            spec.max_duration.as_secs().to_string(),
            "-an".to_string(),
            "-vf".to_string(),
            video_filter(fit, spec),
        ]
        .into_iter()
        .map(OsString::from),
    );
    args.extend(codec_args(format).iter().map(OsString::from));
    args.push(output.as_os_str().to_owned());
    args
}

pub(super) async fn encode_animated(
    ffmpeg: &Path,
    timeout: Duration,
    temp: &TempFiles,
    input: &[u8],
    fit: FitPolicy,
    format: AnimatedStickerFormat,
    spec: StickerSpec,
) -> Result<Bytes> {
    // Both guards remove their files when this function returns, whichever way.
    let in_path = temp.allocate("sticker_in", "media");
    let out_path = temp.allocate("sticker_out", output_ext(format));

    tokio::fs::write(in_path.path(), input)
        .await
        .map_err(|e| Error::TranscodeFailed(format!("cannot stage input: {e}")))?;

    let mut cmd = Command::new(ffmpeg);
    cmd.args(ffmpeg_args(in_path.path(), out_path.path(), fit, format, &spec))
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(o)) => o,
        Ok(Err(e)) => {
            return Err(Error::TranscodeFailed(format!(
                "failed to run {}: {e}",
                ffmpeg.display()
            )))
        }
        // Dropping the `output()` future kills the child.
        Err(_) => {
            tracing::warn!(timeout_secs = timeout.as_secs(), "ffmpeg timed out");
            return Err(Error::TranscodeFailed(format!(
                "ffmpeg timed out after {}s",
                timeout.as_secs()
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        tracing::warn!(status = %output.status, stderr = %stderr.trim(), "ffmpeg failed");
        return Err(Error::TranscodeFailed(format!(
            "ffmpeg exited with {}: {}",
            output.status,
            truncate_text(stderr.trim(), STDERR_PREVIEW_CHARS)
        )));
    }

    let bytes = tokio::fs::read(out_path.path())
        .await
        .map_err(|e| Error::TranscodeFailed(format!("ffmpeg produced no output: {e}")))?;

    let size = bytes.len() as u64;
    if size > spec.max_bytes {
        return Err(Error::StickerTooLarge {
            size,
            limit: spec.max_bytes,
        });
    }

    Ok(Bytes::from(bytes))
}
