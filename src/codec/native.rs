//! Pure Rust codec built on the `image` crate.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG) | `image::load_from_memory_with_format` |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` |
//! | Encode → AVIF | `image::codecs::avif::AvifEncoder` (rav1e, speed 6) |
//!
//! A source already in the target format is passed through untouched.

use super::{CodecError, CodecPort, Quality};
use crate::naming::extension_of;
use crate::types::Direction;
use image::{DynamicImage, ImageFormat};
use tracing::debug;

/// rav1e speed preset: 6 trades a little size for much faster encodes.
const AVIF_SPEED: u8 = 6;

/// Source extensions with a decoder compiled in.
const DECODABLE: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
];

/// Re-encoding codec. See the [module docs](self) for what it can read.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeCodec {
    quality: Quality,
}

impl NativeCodec {
    pub fn new(quality: Quality) -> Self {
        Self { quality }
    }
}

fn source_format(name: &str) -> Option<ImageFormat> {
    let ext = extension_of(name)?;
    if ext.eq_ignore_ascii_case("avif") {
        return Some(ImageFormat::Avif);
    }
    DECODABLE
        .iter()
        .find(|(candidate, _)| ext.eq_ignore_ascii_case(candidate))
        .map(|(_, fmt)| *fmt)
}

fn target_format(direction: Direction) -> ImageFormat {
    match direction {
        Direction::AvifToJpg => ImageFormat::Jpeg,
        Direction::JpgToAvif => ImageFormat::Avif,
    }
}

fn decode(bytes: &[u8], name: &str, format: ImageFormat) -> Result<DynamicImage, CodecError> {
    if format == ImageFormat::Avif {
        return Err(CodecError::Unsupported(format!(
            "{name}: AVIF decoding is not available in this build"
        )));
    }
    image::load_from_memory_with_format(bytes, format).map_err(|e| CodecError::Decode {
        name: name.to_string(),
        reason: e.to_string(),
    })
}

fn encode(
    img: &DynamicImage,
    name: &str,
    format: ImageFormat,
    quality: Quality,
) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::new();
    let written = match format {
        ImageFormat::Jpeg => {
            // JPEG has no alpha channel
            let rgb = DynamicImage::ImageRgb8(img.to_rgb8());
            let encoder =
                image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, quality.value());
            rgb.write_with_encoder(encoder)
        }
        ImageFormat::Avif => {
            let encoder = image::codecs::avif::AvifEncoder::new_with_speed_quality(
                &mut out,
                AVIF_SPEED,
                quality.value(),
            );
            img.write_with_encoder(encoder)
        }
        other => {
            return Err(CodecError::Unsupported(format!(
                "{name}: cannot encode {other:?}"
            )));
        }
    };
    written.map_err(|e| CodecError::Encode {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    Ok(out)
}

impl CodecPort for NativeCodec {
    fn name(&self) -> &'static str {
        "native"
    }

    fn transform(
        &self,
        bytes: Vec<u8>,
        source_name: &str,
        direction: Direction,
    ) -> Result<Vec<u8>, CodecError> {
        let target = target_format(direction);
        let source = source_format(source_name).ok_or_else(|| {
            CodecError::Unsupported(format!("{source_name}: unrecognized source format"))
        })?;
        if source == target {
            debug!(file = source_name, "already in target format, passing through");
            return Ok(bytes);
        }
        let img = decode(&bytes, source_name, source)?;
        debug!(
            file = source_name,
            width = img.width(),
            height = img.height(),
            ?target,
            "re-encoding"
        );
        encode(&img, source_name, target, self.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x * 16) as u8, (y * 16) as u8, 128])
        }))
    }

    fn png_bytes(img: &DynamicImage) -> Vec<u8> {
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn png_to_jpeg() {
        let codec = NativeCodec::default();
        let out = codec
            .transform(png_bytes(&gradient(16, 8)), "scan.png", Direction::AvifToJpg)
            .unwrap();
        // JPEG SOI marker
        assert_eq!(&out[..2], &[0xFF, 0xD8]);
        let decoded = image::load_from_memory_with_format(&out, ImageFormat::Jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (16, 8));
    }

    #[test]
    fn png_to_avif() {
        let codec = NativeCodec::new(Quality::new(60));
        let out = codec
            .transform(png_bytes(&gradient(16, 16)), "scan.png", Direction::JpgToAvif)
            .unwrap();
        assert_eq!(&out[4..8], b"ftyp");
    }

    #[test]
    fn same_format_passes_through() {
        let codec = NativeCodec::default();
        let out = codec
            .transform(vec![1, 2, 3], "photo.JPEG", Direction::AvifToJpg)
            .unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }

    #[test]
    fn avif_source_needing_decode_is_unsupported() {
        let codec = NativeCodec::default();
        let err = codec
            .transform(vec![0; 8], "a.avif", Direction::AvifToJpg)
            .unwrap_err();
        assert!(matches!(err, CodecError::Unsupported(_)));
    }

    #[test]
    fn garbage_png_fails_to_decode() {
        let codec = NativeCodec::default();
        let err = codec
            .transform(b"not a png".to_vec(), "b.png", Direction::AvifToJpg)
            .unwrap_err();
        assert!(matches!(err, CodecError::Decode { ref name, .. } if name == "b.png"));
    }
}
