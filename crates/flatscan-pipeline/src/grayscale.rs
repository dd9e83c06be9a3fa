//! Frame construction and luminance conversion.
//!
//! Builds a [`PixelBuffer`] from raw RGBA bytes (the capture contract) or
//! from an encoded image file, and converts it into the single-channel
//! luminance map every later detection stage works on.
//!
//! This is the first step in the pipeline: RGBA in, `GrayImage` out.

use image::{GrayImage, Luma};

use crate::types::{PipelineError, PixelBuffer};

/// Wrap raw row-major RGBA8 bytes as a [`PixelBuffer`].
///
/// # Errors
///
/// Returns [`PipelineError::InvalidBuffer`] if `bytes.len()` is not
/// `width * height * 4`, or if either dimension is zero.
pub fn from_raw_rgba(width: u32, height: u32, bytes: Vec<u8>) -> Result<PixelBuffer, PipelineError> {
    let len = bytes.len();
    let invalid = PipelineError::InvalidBuffer { width, height, len };
    let expected = u64::from(width) * u64::from(height) * 4;
    if width == 0 || height == 0 || len as u64 != expected {
        return Err(invalid);
    }
    PixelBuffer::from_raw(width, height, bytes).ok_or(invalid)
}

/// Decode encoded image bytes (PNG, JPEG, BMP, WebP) into a [`PixelBuffer`].
///
/// # Errors
///
/// Returns [`PipelineError::EmptyInput`] if `bytes` is empty.
/// Returns [`PipelineError::ImageDecode`] if the image format is
/// unrecognized or the data is corrupt.
pub fn decode(bytes: &[u8]) -> Result<PixelBuffer, PipelineError> {
    if bytes.is_empty() {
        return Err(PipelineError::EmptyInput);
    }

    let img = image::load_from_memory(bytes)?;
    Ok(img.to_rgba8())
}

/// Convert an RGBA frame to 8-bit luminance.
///
/// Uses `Y = round(0.299 R + 0.587 G + 0.114 B)`; alpha is ignored.
/// The output has exactly `width * height` samples.
#[must_use = "returns the luminance map"]
pub fn luminance(buffer: &PixelBuffer) -> GrayImage {
    GrayImage::from_fn(buffer.width(), buffer.height(), |x, y| {
        let [r, g, b, _] = buffer.get_pixel(x, y).0;
        Luma([luma(r, g, b)])
    })
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.114f64.mul_add(
        f64::from(b),
        0.299f64.mul_add(f64::from(r), 0.587 * f64::from(g)),
    );
    y.round().clamp(0.0, 255.0) as u8
}
