//! Linear contrast stretch around mid-gray.
//!
//! Each RGB channel becomes `clamp(in · c + 128 · (1 - c), 0, 255)`,
//! rounded to nearest. `c > 1` pushes paper toward white and ink toward
//! black; `c = 1` is the identity. Alpha is never touched.

use image::Rgba;

use crate::types::PixelBuffer;

/// Contrast applied to a freshly rectified camera capture.
pub const LIVE_CAPTURE_CONTRAST: f64 = 1.3;

/// Contrast for the general-purpose document enhancer.
pub const DOCUMENT_CONTRAST: f64 = 1.5;

/// Return a contrast-adjusted copy of `buffer`.
///
/// A non-finite `contrast` returns an unchanged copy.
#[must_use = "returns the enhanced image"]
pub fn enhance(buffer: &PixelBuffer, contrast: f64) -> PixelBuffer {
    let mut out = buffer.clone();
    enhance_in_place(&mut out, contrast);
    out
}

/// Adjust contrast of `buffer` in place.
pub fn enhance_in_place(buffer: &mut PixelBuffer, contrast: f64) {
    if !contrast.is_finite() {
        log::warn!("ignoring non-finite contrast factor {contrast}");
        return;
    }
    let offset = 128.0 * (1.0 - contrast);
    for Rgba([r, g, b, _]) in buffer.pixels_mut() {
        for channel in [r, g, b] {
            *channel = stretch(*channel, contrast, offset);
        }
    }
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn stretch(value: u8, contrast: f64, offset: f64) -> u8 {
    f64::from(value)
        .mul_add(contrast, offset)
        .clamp(0.0, 255.0)
        .round() as u8
}
