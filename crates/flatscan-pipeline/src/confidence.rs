//! Heuristic confidence that a quadrilateral is the document boundary.
//!
//! Two pieces of evidence are combined:
//!
//! - **Area** (weight 0.4): a plausible document covers more than 10%
//!   and less than 90% of the frame.
//! - **Edge density** (weight 0.6): the fraction of points sampled along
//!   the four sides that sit on a strong edge.
//!
//! The score says nothing about what the caller does with it; that policy
//! lives in [`ConfidenceThresholds::decide`].

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PipelineError, Quadrilateral};

/// Weight of the area-plausibility term.
pub const AREA_WEIGHT: f64 = 0.4;

/// Weight of the edge-density term.
pub const EDGE_WEIGHT: f64 = 0.6;

/// Samples taken along each side, endpoints included.
pub const SAMPLES_PER_SIDE: u32 = 21;

/// Lower bound (exclusive) of the plausible area ratio.
const MIN_AREA_RATIO: f64 = 0.1;

/// Upper bound (exclusive) of the plausible area ratio.
const MAX_AREA_RATIO: f64 = 0.9;

/// Score `quad` against the edge map it was detected in.
///
/// Samples whose rounded pixel falls outside the frame are not counted
/// toward either side of the density ratio. The result is always in
/// `[0, 1]`, including for zero-area or non-finite quadrilaterals.
#[must_use]
pub fn score(quad: &Quadrilateral, edges: &GrayImage, edge_threshold: u8) -> f64 {
    let total = area_term(quad, Dimensions::of(edges)) + edge_term(quad, edges, edge_threshold);
    if total.is_finite() {
        total.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn area_term(quad: &Quadrilateral, frame: Dimensions) -> f64 {
    if frame.is_empty() {
        return 0.0;
    }
    #[allow(clippy::cast_precision_loss)]
    let ratio = quad.area() / frame.pixel_count() as f64;
    if ratio > MIN_AREA_RATIO && ratio < MAX_AREA_RATIO {
        AREA_WEIGHT
    } else {
        0.0
    }
}

fn edge_term(quad: &Quadrilateral, edges: &GrayImage, threshold: u8) -> f64 {
    let (width, height) = edges.dimensions();
    let mut sampled = 0u32;
    let mut matched = 0u32;

    for (start, end) in quad.edges() {
        for i in 0..SAMPLES_PER_SIDE {
            let t = f64::from(i) / f64::from(SAMPLES_PER_SIDE - 1);
            let x = (end.x - start.x).mul_add(t, start.x).round();
            let y = (end.y - start.y).mul_add(t, start.y).round();
            if !(x >= 0.0 && y >= 0.0 && x < f64::from(width) && y < f64::from(height)) {
                continue;
            }
            sampled += 1;
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
            let value = edges.get_pixel(x as u32, y as u32).0[0];
            if value > threshold {
                matched += 1;
            }
        }
    }

    if sampled == 0 {
        0.0
    } else {
        f64::from(matched) / f64::from(sampled) * EDGE_WEIGHT
    }
}

/// What the caller should do with a detection of a given confidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Confident enough to use without asking.
    AutoApply,
    /// Worth showing, but the user should review the corners.
    Review,
    /// Too weak to offer; use the default centered quadrilateral.
    Fallback,
}

/// Confidence cut-offs used by [`ConfidenceThresholds::decide`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfidenceThresholds {
    /// Minimum (exclusive) confidence to offer the detection at all.
    pub offer: f64,
    /// Minimum (exclusive) confidence to apply it without review.
    pub auto_apply: f64,
}

impl ConfidenceThresholds {
    /// Default offer floor.
    pub const DEFAULT_OFFER: f64 = 0.3;
    /// Default auto-apply floor.
    pub const DEFAULT_AUTO_APPLY: f64 = 0.5;

    /// Classify a confidence value.
    #[must_use]
    pub fn decide(&self, confidence: f64) -> Decision {
        if confidence > self.auto_apply {
            Decision::AutoApply
        } else if confidence > self.offer {
            Decision::Review
        } else {
            Decision::Fallback
        }
    }

    /// Check that both thresholds are in `[0, 1]` and `offer <= auto_apply`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] otherwise.
    pub fn validate(&self) -> Result<(), PipelineError> {
        let in_range = |v: f64| (0.0..=1.0).contains(&v);
        if !in_range(self.offer) || !in_range(self.auto_apply) || self.offer > self.auto_apply {
            return Err(PipelineError::InvalidConfig(format!(
                "confidence thresholds must satisfy 0 <= offer <= auto_apply <= 1, got offer={} auto_apply={}",
                self.offer, self.auto_apply
            )));
        }
        Ok(())
    }
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            offer: Self::DEFAULT_OFFER,
            auto_apply: Self::DEFAULT_AUTO_APPLY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn rect(x0: f64, y0: f64, x1: f64, y1: f64) -> Quadrilateral {
        Quadrilateral::new([
            Point::new(x0, y0),
            Point::new(x1, y0),
            Point::new(x1, y1),
            Point::new(x0, y1),
        ])
    }

    /// 100x100 edge map with a 1-pixel bright outline of `rect(20,20,80,80)`.
    fn outlined_edges() -> GrayImage {
        GrayImage::from_fn(100, 100, |x, y| {
            let on_x = (x == 20 || x == 80) && (20..=80).contains(&y);
            let on_y = (y == 20 || y == 80) && (20..=80).contains(&x);
            image::Luma([if on_x || on_y { 255 } else { 0 }])
        })
    }

    #[test]
    fn perfect_outline_scores_one() {
        let confidence = score(&rect(20.0, 20.0, 80.0, 80.0), &outlined_edges(), 50);
        assert!((confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn no_edges_plausible_area_scores_area_term_only() {
        let edges = GrayImage::new(100, 100);
        let confidence = score(&rect(20.0, 20.0, 80.0, 80.0), &edges, 50);
        assert!((confidence - AREA_WEIGHT).abs() < 1e-12);
    }

    #[test]
    fn full_frame_quad_loses_area_term() {
        let edges = GrayImage::from_pixel(100, 100, image::Luma([255]));
        // ratio = 99*99 / 10000 = 0.98
        let confidence = score(&rect(0.0, 0.0, 99.0, 99.0), &edges, 50);
        assert!((confidence - EDGE_WEIGHT).abs() < 1e-12);
    }

    #[test]
    fn zero_area_quad_is_bounded() {
        let quad = Quadrilateral::new([Point::new(50.0, 50.0); 4]);
        let edges = GrayImage::from_pixel(100, 100, image::Luma([255]));
        let confidence = score(&quad, &edges, 50);
        assert!((confidence - EDGE_WEIGHT).abs() < 1e-12);
        assert!((0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn out_of_bounds_samples_are_skipped() {
        // Right half of the quad lies outside a 100x100 frame; every
        // in-bounds sample is on an edge.
        let edges = GrayImage::from_pixel(100, 100, image::Luma([255]));
        let confidence = score(&rect(50.0, 10.0, 150.0, 90.0), &edges, 50);
        assert!((confidence - 1.0).abs() < 1e-12);
    }

    #[test]
    fn non_finite_quad_scores_zero_without_panicking() {
        let quad = Quadrilateral::new([
            Point::new(f64::NAN, 0.0),
            Point::new(10.0, f64::INFINITY),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
        ]);
        let confidence = score(&quad, &outlined_edges(), 50);
        assert!((0.0..=1.0).contains(&confidence));
    }

    #[test]
    fn empty_edge_map_scores_zero() {
        let confidence = score(&rect(0.0, 0.0, 10.0, 10.0), &GrayImage::new(0, 0), 50);
        assert!(confidence.abs() < f64::EPSILON);
    }

    #[test]
    fn decide_uses_strict_thresholds() {
        let thresholds = ConfidenceThresholds::default();
        assert_eq!(thresholds.decide(0.9), Decision::AutoApply);
        assert_eq!(thresholds.decide(0.5), Decision::Review);
        assert_eq!(thresholds.decide(0.31), Decision::Review);
        assert_eq!(thresholds.decide(0.3), Decision::Fallback);
        assert_eq!(thresholds.decide(0.0), Decision::Fallback);
    }

    #[test]
    fn inverted_thresholds_are_invalid() {
        let thresholds = ConfidenceThresholds {
            offer: 0.7,
            auto_apply: 0.5,
        };
        assert!(thresholds.validate().is_err());
        assert!(ConfidenceThresholds::default().validate().is_ok());
    }
}
