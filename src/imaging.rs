//! WebP normalization and thumbnail generation.
//!
//! Decodes an uploaded original, applies its EXIF orientation, bounds its
//! size, and encodes two lossy WebP renditions: the full image and a
//! thumbnail. Both use the same quality setting. The output depends only on
//! the input bytes and [`ImageSettings`].
//!
//! Decoding and encoding are CPU-bound, so [`process_image_blocking`] runs
//! them on tokio's blocking pool.
//!
//! HEIC/HEIF originals are decoded through libheif when the crate is built
//! with the `heif` feature; without it they are rejected with an imaging
//! error.

#[cfg(feature = "heif")]
mod heif;

use std::io::Cursor;
use std::ops::Deref;

use anyhow::{anyhow, Context, Result};
use image::{imageops::FilterType, DynamicImage, ImageDecoder, ImageReader};
use webp::Encoder;

use crate::config::ProcessingConfig;

pub const WEBP_CONTENT_TYPE: &str = "image/webp";
pub const WEBP_EXTENSION: &str = "webp";

/// Parameters for one processing run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSettings {
    /// Lossy WebP quality, 0–100.
    pub quality: f32,
    /// Longest edge of the thumbnail, in pixels.
    pub thumbnail_max_px: u32,
    /// Longest edge of the normalized image; larger originals are downscaled.
    pub max_dimension_px: u32,
}

impl From<&ProcessingConfig> for ImageSettings {
    fn from(config: &ProcessingConfig) -> Self {
        Self {
            quality: config.quality,
            thumbnail_max_px: config.thumbnail_max_px,
            max_dimension_px: config.max_dimension_px,
        }
    }
}

/// Encoded renditions of one upload.
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    pub optimized: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Decode `bytes` and produce the normalized image and its thumbnail.
pub fn process_image(bytes: &[u8], settings: &ImageSettings) -> Result<ProcessedImage> {
    let img = decode_oriented(bytes)?;

    let img = fit_within(img, settings.max_dimension_px, FilterType::Lanczos3);
    let (width, height) = (img.width(), img.height());
    let optimized = encode_webp(&img, settings.quality)?;

    let thumb = fit_within(img, settings.thumbnail_max_px, FilterType::Triangle);
    let thumbnail = encode_webp(&thumb, settings.quality)?;

    Ok(ProcessedImage {
        optimized,
        thumbnail,
        width,
        height,
    })
}

/// [`process_image`] on the blocking thread pool.
pub async fn process_image_blocking(
    bytes: Vec<u8>,
    settings: ImageSettings,
) -> Result<ProcessedImage> {
    tokio::task::spawn_blocking(move || process_image(&bytes, &settings))
        .await
        .context("image processing task panicked")?
}

/// ISO-BMFF major brands written by HEIC/HEIF encoders.
const HEIF_BRANDS: &[&[u8]] = &[
    b"heic", b"heix", b"heim", b"heis", b"hevc", b"hevx", b"hevm", b"hevs", b"mif1", b"msf1",
];

/// True if `bytes` start with an `ftyp` box naming a HEIF brand.
pub fn is_heif(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[4..8] == b"ftyp" && HEIF_BRANDS.contains(&&bytes[8..12])
}

#[cfg(feature = "heif")]
fn decode_heif(bytes: &[u8]) -> Result<DynamicImage> {
    heif::decode(bytes)
}

#[cfg(not(feature = "heif"))]
fn decode_heif(_bytes: &[u8]) -> Result<DynamicImage> {
    Err(anyhow!(
        "HEIC/HEIF input needs folio built with the `heif` feature"
    ))
}

/// Decode and apply the EXIF orientation, if the format carries one.
fn decode_oriented(bytes: &[u8]) -> Result<DynamicImage> {
    if is_heif(bytes) {
        return decode_heif(bytes);
    }
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .context("failed to read image header")?;
    let format = reader.format();
    let mut decoder = reader
        .into_decoder()
        .with_context(|| format!("unsupported or corrupt image (detected {:?})", format))?;
    let orientation = decoder.orientation().context("failed to read orientation")?;
    let mut img = DynamicImage::from_decoder(decoder).context("failed to decode image")?;
    img.apply_orientation(orientation);
    Ok(img)
}

/// Downscale so the longest edge is at most `max_px`, keeping aspect ratio.
/// Images already within bounds are returned unchanged.
fn fit_within(img: DynamicImage, max_px: u32, filter: FilterType) -> DynamicImage {
    if img.width() <= max_px && img.height() <= max_px {
        return img;
    }
    img.resize(max_px, max_px, filter)
}

/// Encode as lossy WebP. The encoder only accepts 8-bit RGB or RGBA.
fn encode_webp(img: &DynamicImage, quality: f32) -> Result<Vec<u8>> {
    let rgb = if img.color().has_alpha() {
        DynamicImage::ImageRgba8(img.to_rgba8())
    } else {
        DynamicImage::ImageRgb8(img.to_rgb8())
    };
    let encoder =
        Encoder::from_image(&rgb).map_err(|reason| anyhow!("WebP encoding: {}", reason))?;

    // `WebPMemory` is !Send; copy it out before crossing an await point.
    Ok(encoder.encode(quality).deref().to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, ImageFormat, Rgb, Rgba};

    fn settings() -> ImageSettings {
        ImageSettings {
            quality: 75.0,
            thumbnail_max_px: 16,
            max_dimension_px: 48,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = ImageBuffer::from_fn(width, height, |x, y| {
            Rgb([(x * 4 % 256) as u8, (y * 4 % 256) as u8, 128])
        });
        let mut buf = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        buf
    }

    fn is_webp(bytes: &[u8]) -> bool {
        bytes.len() > 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP"
    }

    #[test]
    fn test_produces_webp_renditions() {
        let out = process_image(&png_bytes(40, 20), &settings()).unwrap();
        assert!(is_webp(&out.optimized));
        assert!(is_webp(&out.thumbnail));
        assert_eq!((out.width, out.height), (40, 20));

        let thumb = image::load_from_memory(&out.thumbnail).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (16, 8));
    }

    #[test]
    fn test_large_images_are_bounded() {
        let out = process_image(&png_bytes(96, 24), &settings()).unwrap();
        assert_eq!((out.width, out.height), (48, 12));
    }

    #[test]
    fn test_small_images_not_upscaled() {
        let out = process_image(&png_bytes(10, 6), &settings()).unwrap();
        let thumb = image::load_from_memory(&out.thumbnail).unwrap();
        assert_eq!((thumb.width(), thumb.height()), (10, 6));
    }

    #[test]
    fn test_deterministic_output() {
        let input = png_bytes(32, 32);
        let a = process_image(&input, &settings()).unwrap();
        let b = process_image(&input, &settings()).unwrap();
        assert_eq!(a.optimized, b.optimized);
        assert_eq!(a.thumbnail, b.thumbnail);
    }

    #[test]
    fn test_alpha_is_preserved() {
        let img = ImageBuffer::from_pixel(8, 8, Rgba([10u8, 20, 30, 100]));
        let mut buf = Vec::new();
        DynamicImage::ImageRgba8(img)
            .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
            .unwrap();
        let out = process_image(&buf, &settings()).unwrap();
        let decoded = image::load_from_memory(&out.optimized).unwrap();
        assert!(decoded.color().has_alpha());
    }

    #[test]
    fn test_heif_brand_sniffing() {
        assert!(is_heif(b"\0\0\0\x18ftypheic\0\0\0\0mif1heic"));
        assert!(is_heif(b"\0\0\0\x18ftypmif1\0\0\0\0heic"));
        assert!(!is_heif(b"\0\0\0\x18ftypavif\0\0\0\0"));
        assert!(!is_heif(&png_bytes(4, 4)));
        assert!(!is_heif(b"ftyp"));
    }

    #[cfg(not(feature = "heif"))]
    #[test]
    fn test_heif_without_feature_names_the_feature() {
        let err = process_image(b"\0\0\0\x18ftypheic\0\0\0\0mif1heic", &settings())
            .unwrap_err();
        assert!(err.to_string().contains("`heif` feature"));
    }

    #[test]
    fn test_garbage_is_rejected() {
        assert!(process_image(b"definitely not an image", &settings()).is_err());
    }

    #[tokio::test]
    async fn test_blocking_wrapper() {
        let out = process_image_blocking(png_bytes(20, 20), settings())
            .await
            .unwrap();
        assert!(is_webp(&out.optimized));
    }
}
