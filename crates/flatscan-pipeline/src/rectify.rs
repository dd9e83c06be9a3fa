//! Perspective rectification: warp the document quadrilateral into an
//! upright `out_w × out_h` image.
//!
//! Works backwards from the output: every destination pixel centre is
//! mapped through `H⁻¹` into the source frame and bilinearly sampled
//! there, so every output pixel is written exactly once and there are no
//! holes.

use image::Rgba;

use crate::homography::Homography;
use crate::types::{Dimensions, PipelineError, PixelBuffer, Point, Quadrilateral, ScanConfig};

/// Warp `quad` (TL, TR, BR, BL in absolute source pixels) onto an image
/// of exactly `output` size.
///
/// Source samples that fall outside the frame are clamped to the nearest
/// edge pixel.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidBuffer`] for an empty source,
/// [`PipelineError::InvalidConfig`] for a zero-sized or oversized
/// `output` (see [`ScanConfig::MAX_OUTPUT_SIDE`]), and
/// [`PipelineError::InvalidQuadrilateral`] when the corners are
/// collinear, coincident, or folded.
pub fn rectify(
    source: &PixelBuffer,
    quad: &Quadrilateral,
    output: Dimensions,
) -> Result<PixelBuffer, PipelineError> {
    if source.width() == 0 || source.height() == 0 {
        return Err(PipelineError::InvalidBuffer {
            width: source.width(),
            height: source.height(),
            len: source.as_raw().len(),
        });
    }

    ScanConfig::check_output(output)?;
    let forward = Homography::from_quad_to_rect(quad, output)?;
    let inverse = forward.inverse().ok_or_else(|| {
        PipelineError::InvalidQuadrilateral("homography is not invertible".to_owned())
    })?;

    log::debug!(
        "rectifying {}x{} source into {}x{}",
        source.width(),
        source.height(),
        output.width,
        output.height,
    );

    Ok(PixelBuffer::from_fn(output.width, output.height, |u, v| {
        let centre = Point::new(f64::from(u) + 0.5, f64::from(v) + 0.5);
        inverse
            .apply(centre)
            .map_or(Rgba([0, 0, 0, 0]), |p| sample_bilinear(source, p.x - 0.5, p.y - 0.5))
    }))
}

/// Bilinear sample at continuous index coordinates `(x, y)`, where
/// integer coordinates are pixel centres. Neighbour indices are clamped
/// into the image.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_possible_wrap
)]
fn sample_bilinear(image: &PixelBuffer, x: f64, y: f64) -> Rgba<u8> {
    let max_x = i64::from(image.width()) - 1;
    let max_y = i64::from(image.height()) - 1;

    let x0f = x.floor();
    let y0f = y.floor();
    let fx = (x - x0f).clamp(0.0, 1.0);
    let fy = (y - y0f).clamp(0.0, 1.0);

    // Saturating float-to-int casts keep far-away samples in range.
    let x0 = x0f as i64;
    let y0 = y0f as i64;
    let clamp_x = |v: i64| v.clamp(0, max_x) as u32;
    let clamp_y = |v: i64| v.clamp(0, max_y) as u32;
    let (xa, xb) = (clamp_x(x0), clamp_x(x0.saturating_add(1)));
    let (ya, yb) = (clamp_y(y0), clamp_y(y0.saturating_add(1)));

    let p00 = image.get_pixel(xa, ya).0;
    let p10 = image.get_pixel(xb, ya).0;
    let p01 = image.get_pixel(xa, yb).0;
    let p11 = image.get_pixel(xb, yb).0;

    let mut out = [0u8; 4];
    for (c, value) in out.iter_mut().enumerate() {
        let a = f64::from(p00[c]);
        let b = f64::from(p10[c]);
        let d = f64::from(p01[c]);
        let e = f64::from(p11[c]);
        let upper = (b - a).mul_add(fx, a);
        let lower = (e - d).mul_add(fx, d);
        let v = (lower - upper).mul_add(fy, upper);
        *value = if v.is_finite() {
            v.round().clamp(0.0, 255.0) as u8
        } else {
            0
        };
    }
    Rgba(out)
}
