use std::io::Cursor;

use bytes::Bytes;
use image::{imageops, imageops::FilterType, DynamicImage, ImageFormat, Rgba, RgbaImage};

use crate::{errors::Error, Result};

use super::{FitPolicy, StickerSpec};

/// Decode, fit and encode on the blocking pool; decoding large photos is
/// CPU-heavy and must not stall the runtime.
pub(super) async fn encode_static(input: Bytes, fit: FitPolicy, spec: StickerSpec) -> Result<Bytes> {
    tokio::task::spawn_blocking(move || encode_static_blocking(&input, fit, &spec))
        .await
        .map_err(|e| Error::TranscodeFailed(format!("image worker failed: {e}")))?
}

fn encode_static_blocking(input: &[u8], fit: FitPolicy, spec: &StickerSpec) -> Result<Bytes> {
    let img = image::load_from_memory(input)
        .map_err(|e| Error::TranscodeFailed(format!("cannot decode image: {e}")))?;

    let canvas = fit_square(&img, fit, spec.max_edge);

    let mut out = Vec::new();
    DynamicImage::ImageRgba8(canvas)
        .write_to(&mut Cursor::new(&mut out), ImageFormat::WebP)
        .map_err(|e| Error::TranscodeFailed(format!("webp encode failed: {e}")))?;

    let size = out.len() as u64;
    if size > spec.max_bytes {
        return Err(Error::StickerTooLarge {
            size,
            limit: spec.max_bytes,
        });
    }

    Ok(Bytes::from(out))
}

fn fit_square(img: &DynamicImage, fit: FitPolicy, edge: u32) -> RgbaImage {
    match fit {
        FitPolicy::Cover => img.resize_to_fill(edge, edge, FilterType::Lanczos3).to_rgba8(),
        FitPolicy::Contain => {
            let scaled = img.resize(edge, edge, FilterType::Lanczos3).to_rgba8();
            let mut canvas = RgbaImage::from_pixel(edge, edge, Rgba([0, 0, 0, 0]));
            let x = (edge.saturating_sub(scaled.width())) / 2;
            let y = (edge.saturating_sub(scaled.height())) / 2;
            imageops::overlay(&mut canvas, &scaled, i64::from(x), i64::from(y));
            canvas
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sticker::STICKER_SPEC;

    fn png(width: u32, height: u32) -> Bytes {
        let img = RgbaImage::from_pixel(width, height, Rgba([200, 30, 30, 255]));
        let mut out = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .unwrap();
        Bytes::from(out)
    }

    fn decode(bytes: &[u8]) -> RgbaImage {
        image::load_from_memory_with_format(bytes, ImageFormat::WebP)
            .unwrap()
            .to_rgba8()
    }

    #[tokio::test]
    async fn wide_image_is_letterboxed_on_transparent_canvas() {
        let out = encode_static(png(1024, 256), FitPolicy::Contain, STICKER_SPEC)
            .await
            .unwrap();
        assert!(out.len() as u64 <= STICKER_SPEC.max_bytes);

        let img = decode(&out);
        assert_eq!(img.dimensions(), (512, 512));
        // 1024x256 scales to 512x128: top rows are padding, middle is content.
        assert_eq!(img.get_pixel(256, 10)[3], 0);
        assert_eq!(img.get_pixel(256, 256)[3], 255);
    }

    #[tokio::test]
    async fn cover_fills_the_whole_canvas() {
        let out = encode_static(png(300, 900), FitPolicy::Cover, STICKER_SPEC)
            .await
            .unwrap();
        let img = decode(&out);
        assert_eq!(img.dimensions(), (512, 512));
        assert_eq!(img.get_pixel(0, 0)[3], 255);
        assert_eq!(img.get_pixel(511, 511)[3], 255);
    }

    #[tokio::test]
    async fn small_images_are_scaled_up_to_the_square() {
        let out = encode_static(png(16, 16), FitPolicy::Contain, STICKER_SPEC)
            .await
            .unwrap();
        assert_eq!(decode(&out).dimensions(), (512, 512));
    }

    #[tokio::test]
    async fn oversized_output_fails_instead_of_degrading() {
        let tight = StickerSpec {
            max_bytes: 16,
            ..STICKER_SPEC
        };
        let err = encode_static(png(64, 64), FitPolicy::Cover, tight)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::StickerTooLarge { limit: 16, .. }));
    }

    #[tokio::test]
    async fn garbage_input_is_a_transcode_failure() {
        let err = encode_static(Bytes::from_static(b"not an image"), FitPolicy::Cover, STICKER_SPEC)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::TranscodeFailed(_)));
    }
}
