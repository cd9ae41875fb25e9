//! HEIC/HEIF decoding through libheif.
//!
//! libheif applies the container's rotation and mirror properties while
//! decoding, so the result needs no further orientation fix.

use anyhow::{bail, Context, Result};
use image::{DynamicImage, RgbImage, RgbaImage};
use libheif_rs::{ColorSpace, HeifContext, LibHeif, RgbChroma};

/// Decode the primary image of a HEIF container to 8-bit RGB(A).
pub fn decode(bytes: &[u8]) -> Result<DynamicImage> {
    let ctx = HeifContext::read_from_bytes(bytes).context("failed to read HEIF container")?;
    let handle = ctx
        .primary_image_handle()
        .context("HEIF container has no primary image")?;
    let has_alpha = handle.has_alpha_channel();
    let chroma = if has_alpha {
        RgbChroma::Rgba
    } else {
        RgbChroma::Rgb
    };

    let decoded = LibHeif::new()
        .decode(&handle, ColorSpace::Rgb(chroma), None)
        .context("failed to decode HEIF image")?;
    let planes = decoded.planes();
    let Some(plane) = planes.interleaved else {
        bail!("HEIF image decoded without an interleaved plane");
    };
    if plane.bits_per_pixel != 8 {
        bail!("unsupported HEIF bit depth: {}", plane.bits_per_pixel);
    }

    // Rows are `stride` bytes apart and may carry padding past the pixels.
    let channels = if has_alpha { 4 } else { 3 };
    let row_len = plane.width as usize * channels;
    let mut pixels = Vec::with_capacity(row_len * plane.height as usize);
    for y in 0..plane.height as usize {
        let start = y * plane.stride;
        let row = plane
            .data
            .get(start..start + row_len)
            .context("HEIF plane is shorter than its dimensions")?;
        pixels.extend_from_slice(row);
    }

    let image = if has_alpha {
        RgbaImage::from_raw(plane.width, plane.height, pixels).map(DynamicImage::ImageRgba8)
    } else {
        RgbImage::from_raw(plane.width, plane.height, pixels).map(DynamicImage::ImageRgb8)
    };
    image.context("HEIF pixel buffer does not match its dimensions")
}
