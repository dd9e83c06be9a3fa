//! Sobel gradient-magnitude edge map.
//!
//! Unlike a Canny detector this keeps the raw magnitude (clamped to
//! `0..=255`) instead of a thinned binary map: the boundary sampler and
//! the confidence scorer each apply their own threshold to it.
//!
//! This is step 3 in the pipeline, between smoothing and boundary
//! sampling.

use image::{GrayImage, Luma};
use imageproc::definitions::Image;
use imageproc::filter::filter_clamped;
use imageproc::kernel;

use crate::blur::{BorderPolicy, zero_border};

/// Compute `min(255, round(sqrt(gx² + gy²)))` with the standard 3×3
/// Sobel kernels.
///
/// ```text
///      -1 0 1          -1 -2 -1
/// gx = -2 0 2     gy =  0  0  0
///      -1 0 1           1  2  1
/// ```
///
/// Output has the same dimensions as the input; the border ring follows
/// `border` exactly as in [`crate::blur::smooth`].
#[must_use = "returns the edge magnitude map"]
pub fn sobel(blurred: &GrayImage, border: BorderPolicy) -> GrayImage {
    let gx: Image<Luma<i16>> = filter_clamped::<_, i32, i16>(blurred, kernel::SOBEL_HORIZONTAL_3X3);
    let gy: Image<Luma<i16>> = filter_clamped::<_, i32, i16>(blurred, kernel::SOBEL_VERTICAL_3X3);

    let (width, height) = blurred.dimensions();
    let mut edges = GrayImage::new(width, height);
    for ((out, h), v) in edges.iter_mut().zip(gx.iter()).zip(gy.iter()) {
        *out = magnitude(*h, *v);
    }
    if border == BorderPolicy::Zero {
        zero_border(&mut edges);
    }
    edges
}

/// Count pixels whose magnitude exceeds `threshold`.
#[must_use]
pub fn count_edge_pixels(edges: &GrayImage, threshold: u8) -> u64 {
    edges
        .as_raw()
        .iter()
        .map(|&v| u64::from(v > threshold))
        .sum()
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn magnitude(gx: i16, gy: i16) -> u8 {
    let m = f64::from(gx).hypot(f64::from(gy));
    m.round().min(255.0) as u8
}
