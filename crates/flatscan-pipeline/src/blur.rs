//! 3×3 smoothing before edge detection.
//!
//! Applies the fixed binomial kernel
//!
//! ```text
//! 1 2 1
//! 2 4 2   / 16
//! 1 2 1
//! ```
//!
//! to the luminance map, suppressing single-pixel noise that would
//! otherwise show up as spurious Sobel responses.
//!
//! The outermost 1-pixel ring has no full neighbourhood. What happens
//! there is a [`BorderPolicy`] shared with [`crate::edge::sobel`]:
//! [`BorderPolicy::Zero`] (the default) leaves the ring at 0, and
//! [`BorderPolicy::Clamp`] computes it by repeating the nearest edge
//! pixel. Zero keeps frame borders from ever producing candidates;
//! Clamp lets a document that touches the frame edge still register.

use image::GrayImage;
use imageproc::filter::filter;
use imageproc::kernel::Kernel;
use serde::{Deserialize, Serialize};

/// The 3×3 binomial kernel, unnormalized (weights sum to 16).
const BINOMIAL_3X3: Kernel<'static, i32> = Kernel::new(&[1, 2, 1, 2, 4, 2, 1, 2, 1], 3, 3);

/// How 3×3 stages treat the outermost pixel ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BorderPolicy {
    /// Border pixels are not computed and stay 0.
    #[default]
    Zero,
    /// Border pixels are computed with clamp-extended neighbours.
    Clamp,
}

/// Smooth a luminance map with the 3×3 binomial kernel.
///
/// Output has the same dimensions as the input. Each computed pixel is
/// the kernel-weighted sum divided by 16, rounded to nearest.
#[must_use = "returns the blurred image"]
pub fn smooth(gray: &GrayImage, border: BorderPolicy) -> GrayImage {
    // `filter` pads by continuity, which is exactly the Clamp policy.
    let mut blurred: GrayImage = filter(gray, BINOMIAL_3X3, |sum: i32| to_u8((sum + 8) / 16));
    if border == BorderPolicy::Zero {
        zero_border(&mut blurred);
    }
    blurred
}

/// Set the outermost 1-pixel ring to 0.
///
/// Images narrower or shorter than 3 pixels are all border.
pub(crate) fn zero_border(image: &mut GrayImage) {
    let (width, height) = image.dimensions();
    for (x, y, pixel) in image.enumerate_pixels_mut() {
        if x == 0 || y == 0 || x + 1 >= width || y + 1 >= height {
            pixel.0[0] = 0;
        }
    }
}

/// Saturating conversion of a kernel result to a pixel value.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub(crate) fn to_u8(value: i32) -> u8 {
    value.clamp(0, 255) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 10x10 image with a sharp black-to-white boundary at x = 5.
    fn sharp_edge_image() -> GrayImage {
        GrayImage::from_fn(10, 10, |x, _y| {
            if x < 5 {
                image::Luma([0])
            } else {
                image::Luma([255])
            }
        })
    }

    fn ring(image: &GrayImage) -> impl Iterator<Item = u8> + '_ {
        let (w, h) = image.dimensions();
        image
            .enumerate_pixels()
            .filter(move |(x, y, _)| *x == 0 || *y == 0 || *x == w - 1 || *y == h - 1)
            .map(|(_, _, p)| p.0[0])
    }

    #[test]
    fn output_dimensions_preserved() {
        let img = GrayImage::new(17, 31);
        for border in [BorderPolicy::Zero, BorderPolicy::Clamp] {
            let blurred = smooth(&img, border);
            assert_eq!(blurred.dimensions(), (17, 31));
        }
    }

    #[test]
    fn zero_policy_leaves_border_ring_black() {
        let img = GrayImage::from_pixel(8, 6, image::Luma([200]));
        let blurred = smooth(&img, BorderPolicy::Zero);
        assert!(ring(&blurred).all(|v| v == 0));
        // Interior of a uniform image is unchanged.
        assert_eq!(blurred.get_pixel(3, 3).0[0], 200);
    }

    #[test]
    fn clamp_policy_keeps_uniform_image_uniform() {
        let img = GrayImage::from_pixel(8, 6, image::Luma([200]));
        let blurred = smooth(&img, BorderPolicy::Clamp);
        assert!(blurred.pixels().all(|p| p.0[0] == 200));
    }

    #[test]
    fn blur_smooths_sharp_edge() {
        let blurred = smooth(&sharp_edge_image(), BorderPolicy::Zero);
        // Horizontal weights 1:2:1 over (0, 0, 255) and (0, 255, 255).
        assert_eq!(blurred.get_pixel(4, 5).0[0], 64);
        assert_eq!(blurred.get_pixel(5, 5).0[0], 191);
        assert_eq!(blurred.get_pixel(2, 5).0[0], 0);
        assert_eq!(blurred.get_pixel(7, 5).0[0], 255);
    }

    #[test]
    fn tiny_images_do_not_panic() {
        for (w, h) in [(0, 0), (1, 1), (2, 1), (1, 3), (2, 2)] {
            let img = GrayImage::from_pixel(w, h, image::Luma([90]));
            let zero = smooth(&img, BorderPolicy::Zero);
            let clamp = smooth(&img, BorderPolicy::Clamp);
            assert_eq!(zero.dimensions(), (w, h));
            assert!(zero.pixels().all(|p| p.0[0] == 0));
            assert!(clamp.pixels().all(|p| p.0[0] == 90));
        }
    }

    #[test]
    fn clamp_policy_blends_at_the_frame_edge() {
        let blurred = smooth(&sharp_edge_image(), BorderPolicy::Clamp);
        // Row 0 repeats itself upwards, so the 1:2:1 split is unchanged.
        assert_eq!(blurred.get_pixel(4, 0).0[0], 64);
        assert_eq!(blurred.get_pixel(5, 0).0[0], 191);
        assert_eq!(blurred.get_pixel(0, 9).0[0], 0);
        assert_eq!(blurred.get_pixel(9, 9).0[0], 255);
    }

    #[test]
    fn rounding_is_to_nearest() {
        // A single bright pixel: weight 4/16 of 10 is 2.5, which rounds up.
        let mut img = GrayImage::new(5, 5);
        img.put_pixel(2, 2, image::Luma([10]));
        let blurred = smooth(&img, BorderPolicy::Zero);
        assert_eq!(blurred.get_pixel(2, 2).0[0], 3);
        // Edge neighbours: 2/16 of 10 is 1.25.
        assert_eq!(blurred.get_pixel(1, 2).0[0], 1);
        // Diagonal neighbours: 1/16 of 10 is 0.625.
        assert_eq!(blurred.get_pixel(1, 1).0[0], 1);
    }

    #[test]
    fn to_u8_saturates() {
        assert_eq!(to_u8(-3), 0);
        assert_eq!(to_u8(128), 128);
        assert_eq!(to_u8(999), 255);
    }
}
