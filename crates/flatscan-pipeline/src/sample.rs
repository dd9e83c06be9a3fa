//! Boundary candidate sampling on a sparse grid.
//!
//! Rather than tracing contours through the whole edge map, the sampler
//! visits one pixel every `step` pixels in each axis and keeps those
//! whose edge magnitude exceeds a threshold. The resulting point cloud
//! feeds the convex hull; its size is bounded by `(w / step) * (h / step)`
//! regardless of how busy the scene is.

use image::GrayImage;

use crate::types::Point;

/// Collect grid points whose edge magnitude exceeds `threshold`.
///
/// Visits `y = step, 2·step, …` while `y < height - step` (and likewise
/// for `x`), so a `step`-wide margin around the frame is never sampled.
/// Output is in row-major grid order. A `step` of 0 is treated as 1.
#[must_use]
pub fn sample_boundary(edges: &GrayImage, threshold: u8, step: u32) -> Vec<Point> {
    let step = step.max(1);
    let (width, height) = edges.dimensions();
    let x_end = width.saturating_sub(step);
    let y_end = height.saturating_sub(step);

    let mut candidates = Vec::new();
    let mut y = step;
    while y < y_end {
        let mut x = step;
        while x < x_end {
            if edges.get_pixel(x, y).0[0] > threshold {
                candidates.push(Point::new(f64::from(x), f64::from(y)));
            }
            x += step;
        }
        y += step;
    }
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn all_black_yields_nothing() {
        let edges = GrayImage::new(100, 100);
        assert!(sample_boundary(&edges, 50, 10).is_empty());
    }

    #[test]
    fn all_white_yields_full_interior_grid() {
        let edges = GrayImage::from_pixel(100, 100, image::Luma([255]));
        let points = sample_boundary(&edges, 50, 10);
        // x and y each take 10, 20, ..., 80.
        assert_eq!(points.len(), 64);
        assert_eq!(points[0], Point::new(10.0, 10.0));
        assert_eq!(points[63], Point::new(80.0, 80.0));
    }

    #[test]
    fn threshold_is_strict() {
        let edges = GrayImage::from_pixel(40, 40, image::Luma([50]));
        assert!(sample_boundary(&edges, 50, 10).is_empty());
        assert_eq!(sample_boundary(&edges, 49, 10).len(), 4);
    }

    #[test]
    fn points_are_row_major_on_grid() {
        let mut edges = GrayImage::new(100, 100);
        edges.put_pixel(30, 20, image::Luma([200]));
        edges.put_pixel(20, 30, image::Luma([200]));
        edges.put_pixel(25, 25, image::Luma([200])); // off-grid
        let points = sample_boundary(&edges, 50, 10);
        assert_eq!(points, vec![Point::new(30.0, 20.0), Point::new(20.0, 30.0)]);
    }

    #[test]
    fn step_larger_than_image_yields_nothing() {
        let edges = GrayImage::from_pixel(15, 15, image::Luma([255]));
        assert!(sample_boundary(&edges, 0, 10).is_empty());
    }

    #[test]
    fn zero_step_samples_every_interior_pixel() {
        let edges = GrayImage::from_pixel(4, 3, image::Luma([255]));
        let points = sample_boundary(&edges, 0, 0);
        // step 1: x in 1..3, y in 1..2
        assert_eq!(points.len(), 2);
    }
}
