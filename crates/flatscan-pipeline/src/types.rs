//! Shared types for the flatscan document pipeline.
//!
//! Two coordinate spaces are in play and each has its own type:
//! [`Point`] is *absolute* (pixels in the captured frame) and
//! [`RelativePoint`] is *relative* (normalized to `[0, 1]²`, used only by
//! the interactive correction overlay). Converting between them always
//! goes through an explicit method that takes the frame [`Dimensions`].

use serde::{Deserialize, Serialize};

use crate::blur::BorderPolicy;
use crate::confidence::{ConfidenceThresholds, Decision};
use crate::correction::CorrectionError;
use crate::quad::QuadFitKind;

/// Re-export `GrayImage` so downstream crates can reference
/// intermediate raster data without depending on `image` directly.
pub use image::GrayImage;

/// Re-export `RgbaImage` so downstream crates can reference the
/// captured frame without depending on `image` directly.
pub use image::RgbaImage;

/// A captured still frame: `width × height` RGBA8 pixels, row-major.
///
/// Every pipeline stage borrows one buffer and produces a new one; no
/// stage mutates its input.
pub type PixelBuffer = RgbaImage;

/// A 2D point in absolute image coordinates (pixels).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal position (pixels from left edge).
    pub x: f64,
    /// Vertical position (pixels from top edge).
    pub y: f64,
}

impl Point {
    /// Create a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Squared Euclidean distance to another point.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        dx.mul_add(dx, dy * dy)
    }

    /// Euclidean distance to another point.
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        self.distance_squared(other).sqrt()
    }

    /// Whether both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Convert to relative space for a frame of the given size.
    ///
    /// A zero-sized axis maps to `0.0` rather than dividing by zero.
    #[must_use]
    pub fn to_relative(self, frame: Dimensions) -> RelativePoint {
        let scale = |value: f64, extent: u32| {
            if extent == 0 {
                0.0
            } else {
                value / f64::from(extent)
            }
        };
        RelativePoint::new(scale(self.x, frame.width), scale(self.y, frame.height))
    }
}

/// A 2D point in relative coordinates: `(0, 0)` is the top-left corner
/// of the frame and `(1, 1)` the bottom-right.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RelativePoint {
    /// Horizontal position as a fraction of frame width.
    pub x: f64,
    /// Vertical position as a fraction of frame height.
    pub y: f64,
}

impl RelativePoint {
    /// Create a new relative point. No clamping is applied.
    #[must_use]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Clamp both coordinates into `[0, 1]`.
    #[must_use]
    pub const fn clamped(self) -> Self {
        Self {
            x: self.x.clamp(0.0, 1.0),
            y: self.y.clamp(0.0, 1.0),
        }
    }

    /// Whether both coordinates are finite.
    #[must_use]
    pub const fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    /// Convert to absolute pixel space: `relative * (width, height)`.
    #[must_use]
    pub fn to_absolute(self, frame: Dimensions) -> Point {
        Point::new(
            self.x * f64::from(frame.width),
            self.y * f64::from(frame.height),
        )
    }
}

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Create a new set of dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Dimensions of an existing image buffer.
    #[must_use]
    pub fn of<P: image::Pixel>(image: &image::ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        Self {
            width: image.width(),
            height: image.height(),
        }
    }

    /// Total pixel count (`width * height`).
    #[must_use]
    pub const fn pixel_count(self) -> u64 {
        self.width as u64 * self.height as u64
    }

    /// Whether either axis is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Four corners in absolute space, ordered top-left, top-right,
/// bottom-right, bottom-left.
///
/// Backed by a fixed-size array, so a quadrilateral can never hold three
/// or five corners. The constructor keeps the given order; use
/// [`crate::quad::order_corners`] to canonicalize an unordered set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quadrilateral([Point; 4]);

impl Quadrilateral {
    /// Create a quadrilateral from corners already in TL, TR, BR, BL order.
    #[must_use]
    pub const fn new(corners: [Point; 4]) -> Self {
        Self(corners)
    }

    /// The default quadrilateral: centered in the frame, covering
    /// `fraction` of each axis.
    ///
    /// With `fraction = 0.8` the corners sit at 10% / 90% of the width
    /// and height.
    #[must_use]
    pub fn centered(frame: Dimensions, fraction: f64) -> Self {
        let w = f64::from(frame.width);
        let h = f64::from(frame.height);
        let fraction = fraction.clamp(0.0, 1.0);
        // Unfused so that whole-pixel margins (0.8 of 1000) come out exact.
        #[allow(clippy::suboptimal_flops)]
        let (left, top) = ((w - w * fraction) / 2.0, (h - h * fraction) / 2.0);
        let (right, bottom) = (w - left, h - top);
        Self([
            Point::new(left, top),
            Point::new(right, top),
            Point::new(right, bottom),
            Point::new(left, bottom),
        ])
    }

    /// The corners in TL, TR, BR, BL order.
    #[must_use]
    pub const fn corners(&self) -> &[Point; 4] {
        &self.0
    }

    /// Top-left corner.
    #[must_use]
    pub const fn top_left(&self) -> Point {
        self.0[0]
    }

    /// Top-right corner.
    #[must_use]
    pub const fn top_right(&self) -> Point {
        self.0[1]
    }

    /// Bottom-right corner.
    #[must_use]
    pub const fn bottom_right(&self) -> Point {
        self.0[2]
    }

    /// Bottom-left corner.
    #[must_use]
    pub const fn bottom_left(&self) -> Point {
        self.0[3]
    }

    /// The four sides as `(start, end)` pairs, closing back to the first
    /// corner.
    pub fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        (0..4).map(|i| (self.0[i], self.0[(i + 1) % 4]))
    }

    /// Polygon area via the shoelace formula (always non-negative).
    ///
    /// Self-intersecting quadrilaterals report the absolute value of the
    /// signed sum, which may be smaller than the visual area.
    #[must_use]
    pub fn area(&self) -> f64 {
        let twice: f64 = self
            .edges()
            .map(|(a, b)| a.x.mul_add(b.y, -(b.x * a.y)))
            .sum();
        twice.abs() / 2.0
    }

    /// Axis-aligned bounding box as `(min, max)` corners.
    #[must_use]
    pub fn bounding_box(&self) -> (Point, Point) {
        let min_x = self.0.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
        let min_y = self.0.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
        let max_x = self.0.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
        let max_y = self.0.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
        (Point::new(min_x, min_y), Point::new(max_x, max_y))
    }

    /// Convert every corner to relative space.
    #[must_use]
    pub fn to_relative(&self, frame: Dimensions) -> [RelativePoint; 4] {
        self.0.map(|p| p.to_relative(frame))
    }

    /// Build a quadrilateral from relative corners (TL, TR, BR, BL).
    #[must_use]
    pub fn from_relative(corners: &[RelativePoint; 4], frame: Dimensions) -> Self {
        Self(corners.map(|p| p.to_absolute(frame)))
    }
}

/// A document boundary found in one captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectedDocument {
    /// Corners in absolute space, TL, TR, BR, BL.
    pub corners: Quadrilateral,
    /// Heuristic score in `[0, 1]`.
    pub confidence: f64,
}

/// The corners to present for review, after applying the confidence
/// policy.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Proposal {
    /// Detected corners, or the centered default when detection failed
    /// or was too weak to offer.
    pub corners: Quadrilateral,
    /// Detection confidence; `None` when nothing was detected.
    pub confidence: Option<f64>,
    /// What the caller should do with `corners`.
    pub decision: Decision,
}

/// Configuration for document detection (stages 1 through 7).
///
/// Every parameter has a default; see the `DEFAULT_*` associated
/// constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Edge magnitude a grid cell must exceed to become a boundary
    /// candidate.
    pub edge_threshold: u8,

    /// Grid stride (pixels) of the boundary sampler. Larger values mean
    /// fewer candidates and a cheaper hull.
    pub sample_step: u32,

    /// Edge magnitude a sample along a quadrilateral side must exceed to
    /// count toward edge density in the confidence score.
    pub density_threshold: u8,

    /// How blur and Sobel treat the outermost pixel ring.
    pub border: BorderPolicy,

    /// How a hull with more than four points is reduced to four corners.
    pub quad_fit: QuadFitKind,

    /// Confidence cut-offs for offering and auto-applying a detection.
    pub thresholds: ConfidenceThresholds,

    /// Fraction of each axis covered by the fallback quadrilateral.
    pub fallback_fraction: f64,
}

impl DetectionConfig {
    /// Default sampler threshold.
    pub const DEFAULT_EDGE_THRESHOLD: u8 = 50;
    /// Default sampler stride in pixels.
    pub const DEFAULT_SAMPLE_STEP: u32 = 10;
    /// Default confidence edge-density threshold.
    pub const DEFAULT_DENSITY_THRESHOLD: u8 = 50;
    /// Default fallback quadrilateral coverage.
    pub const DEFAULT_FALLBACK_FRACTION: f64 = 0.8;

    /// Check the configuration for values the pipeline cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] when `sample_step` is
    /// zero, `fallback_fraction` is outside `(0, 1]`, or the confidence
    /// thresholds are not ordered within `[0, 1]`.
    pub fn validate(&self) -> Result<(), PipelineError> {
        if self.sample_step == 0 {
            return Err(PipelineError::InvalidConfig(
                "sample_step must be at least 1".to_owned(),
            ));
        }
        if !(self.fallback_fraction > 0.0 && self.fallback_fraction <= 1.0) {
            return Err(PipelineError::InvalidConfig(format!(
                "fallback_fraction must be in (0, 1], got {}",
                self.fallback_fraction
            )));
        }
        self.thresholds.validate()
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            edge_threshold: Self::DEFAULT_EDGE_THRESHOLD,
            sample_step: Self::DEFAULT_SAMPLE_STEP,
            density_threshold: Self::DEFAULT_DENSITY_THRESHOLD,
            border: BorderPolicy::default(),
            quad_fit: QuadFitKind::default(),
            thresholds: ConfidenceThresholds::default(),
            fallback_fraction: Self::DEFAULT_FALLBACK_FRACTION,
        }
    }
}

/// Configuration for rectification and enhancement (stages 9 and 10).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanConfig {
    /// Size of the rectified output image.
    pub output: Dimensions,
    /// Contrast factor for the enhancer; `None` skips enhancement.
    pub contrast: Option<f64>,
}

impl ScanConfig {
    /// Default output size (portrait, roughly A4 proportions).
    pub const DEFAULT_OUTPUT: Dimensions = Dimensions::new(800, 1100);

    /// Largest accepted output side, in pixels.
    pub const MAX_OUTPUT_SIDE: u32 = 16_384;

    /// Check the configuration for values the rectifier cannot use.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] for a zero-sized output,
    /// an output side above [`Self::MAX_OUTPUT_SIDE`], or a non-finite
    /// contrast factor.
    pub fn validate(&self) -> Result<(), PipelineError> {
        Self::check_output(self.output)?;
        if let Some(contrast) = self.contrast
            && !contrast.is_finite()
        {
            return Err(PipelineError::InvalidConfig(format!(
                "contrast must be finite, got {contrast}"
            )));
        }
        Ok(())
    }

    /// Reject an output size that is empty or larger than
    /// [`Self::MAX_OUTPUT_SIDE`] on either side.
    pub(crate) fn check_output(output: Dimensions) -> Result<(), PipelineError> {
        if output.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "output size must be non-zero, got {}x{}",
                output.width, output.height
            )));
        }
        if output.width > Self::MAX_OUTPUT_SIDE || output.height > Self::MAX_OUTPUT_SIDE {
            return Err(PipelineError::InvalidConfig(format!(
                "output size {}x{} exceeds {} pixels per side",
                output.width,
                output.height,
                Self::MAX_OUTPUT_SIDE
            )));
        }
        Ok(())
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            output: Self::DEFAULT_OUTPUT,
            contrast: Some(crate::enhance::LIVE_CAPTURE_CONTRAST),
        }
    }
}

/// Errors that can occur during detection, correction, or rectification.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode an encoded input image.
    #[error("failed to decode image: {0}")]
    ImageDecode(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Raw pixel data does not match the declared dimensions, or the
    /// buffer has no pixels.
    #[error("invalid pixel buffer: {width}x{height} with {len} bytes")]
    InvalidBuffer {
        /// Declared width.
        width: u32,
        /// Declared height.
        height: u32,
        /// Number of bytes supplied.
        len: usize,
    },

    /// Configuration is invalid.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The boundary sampler found too few points to build a hull.
    #[error("no document found: only {found} boundary candidates")]
    InsufficientCandidates {
        /// Number of candidates the sampler produced.
        found: usize,
    },

    /// The convex hull has fewer than four points.
    #[error("no document found: convex hull has only {hull_points} points")]
    DegenerateHull {
        /// Number of points on the hull.
        hull_points: usize,
    },

    /// The quadrilateral cannot be rectified (collinear, coincident or
    /// self-intersecting corners).
    #[error("invalid quadrilateral: {0}")]
    InvalidQuadrilateral(String),

    /// An interactive correction operation was not valid in the current
    /// state.
    #[error(transparent)]
    Correction(#[from] CorrectionError),

    /// The background detection thread could not be started.
    #[error("failed to start detection worker: {0}")]
    WorkerSpawn(#[from] std::io::Error),

    /// The background detection thread stopped without a result.
    #[error("detection worker stopped without reporting a result")]
    WorkerDisconnected,

    /// The caller's deadline passed before detection finished.
    #[error("detection did not finish before the deadline")]
    DetectionTimedOut,
}

impl PipelineError {
    /// Whether this error means "no document in the frame", which the
    /// caller should answer with the default centered quadrilateral.
    #[must_use]
    pub const fn is_no_document(&self) -> bool {
        matches!(
            self,
            Self::InsufficientCandidates { .. } | Self::DegenerateHull { .. }
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // --- Point tests ---

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn point_to_relative_and_back() {
        let frame = Dimensions::new(200, 100);
        let rel = Point::new(50.0, 75.0).to_relative(frame);
        assert!((rel.x - 0.25).abs() < f64::EPSILON);
        assert!((rel.y - 0.75).abs() < f64::EPSILON);
        assert_eq!(rel.to_absolute(frame), Point::new(50.0, 75.0));
    }

    #[test]
    fn to_relative_on_empty_frame_is_zero() {
        let rel = Point::new(10.0, 10.0).to_relative(Dimensions::new(0, 0));
        assert_eq!(rel, RelativePoint::new(0.0, 0.0));
    }

    #[test]
    fn relative_point_clamps_into_unit_square() {
        let p = RelativePoint::new(-0.5, 1.7).clamped();
        assert_eq!(p, RelativePoint::new(0.0, 1.0));
    }

    // --- Quadrilateral tests ---

    #[test]
    fn centered_quad_covers_eighty_percent() {
        let quad = Quadrilateral::centered(Dimensions::new(1000, 500), 0.8);
        assert_eq!(quad.top_left(), Point::new(100.0, 50.0));
        assert_eq!(quad.top_right(), Point::new(900.0, 50.0));
        assert_eq!(quad.bottom_right(), Point::new(900.0, 450.0));
        assert_eq!(quad.bottom_left(), Point::new(100.0, 450.0));
    }

    #[test]
    fn shoelace_area_of_rectangle() {
        let quad = Quadrilateral::new([
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 5.0),
            Point::new(0.0, 5.0),
        ]);
        assert!((quad.area() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn shoelace_area_of_collinear_corners_is_zero() {
        let quad = Quadrilateral::new([
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(20.0, 0.0),
            Point::new(30.0, 0.0),
        ]);
        assert!(quad.area().abs() < f64::EPSILON);
    }

    #[test]
    fn edges_close_the_loop() {
        let quad = Quadrilateral::centered(Dimensions::new(10, 10), 1.0);
        let edges: Vec<_> = quad.edges().collect();
        assert_eq!(edges.len(), 4);
        assert_eq!(edges[3].1, quad.top_left());
    }

    #[test]
    fn bounding_box_spans_corners() {
        let quad = Quadrilateral::new([
            Point::new(12.0, 3.0),
            Point::new(40.0, 8.0),
            Point::new(35.0, 30.0),
            Point::new(5.0, 25.0),
        ]);
        let (min, max) = quad.bounding_box();
        assert_eq!(min, Point::new(5.0, 3.0));
        assert_eq!(max, Point::new(40.0, 30.0));
    }

    // --- Config tests ---

    #[test]
    fn detection_config_defaults() {
        let config = DetectionConfig::default();
        assert_eq!(config.edge_threshold, 50);
        assert_eq!(config.sample_step, 10);
        assert_eq!(config.density_threshold, 50);
        assert_eq!(config.border, BorderPolicy::Zero);
        assert_eq!(config.quad_fit, QuadFitKind::BoundingBox);
        assert!((config.fallback_fraction - 0.8).abs() < f64::EPSILON);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn zero_step_is_invalid() {
        let config = DetectionConfig {
            sample_step: 0,
            ..DetectionConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn fallback_fraction_out_of_range_is_invalid() {
        for fraction in [0.0, 1.5, f64::NAN] {
            let config = DetectionConfig {
                fallback_fraction: fraction,
                ..DetectionConfig::default()
            };
            assert!(config.validate().is_err(), "fraction {fraction} accepted");
        }
    }

    #[test]
    fn scan_config_rejects_zero_output() {
        let config = ScanConfig {
            output: Dimensions::new(0, 1100),
            ..ScanConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(PipelineError::InvalidConfig(_))
        ));
    }

    #[test]
    fn scan_config_rejects_oversized_output() {
        for output in [Dimensions::new(100_000, 100_000), Dimensions::new(800, 16_385)] {
            let config = ScanConfig {
                output,
                ..ScanConfig::default()
            };
            assert!(matches!(
                config.validate(),
                Err(PipelineError::InvalidConfig(_))
            ));
        }
        let largest = ScanConfig {
            output: Dimensions::new(ScanConfig::MAX_OUTPUT_SIDE, ScanConfig::MAX_OUTPUT_SIDE),
            ..ScanConfig::default()
        };
        assert!(largest.validate().is_ok());
    }

    #[test]
    fn centered_quad_margins_are_whole_pixels() {
        let quad = Quadrilateral::centered(Dimensions::new(640, 480), 0.8);
        assert_eq!(quad.top_left(), Point::new(64.0, 48.0));
        assert_eq!(quad.bottom_right(), Point::new(576.0, 432.0));
    }

    #[test]
    fn partial_config_json_fills_defaults() {
        let config: DetectionConfig =
            serde_json::from_str(r#"{"sample_step": 5, "quad_fit": "MinAreaRect"}"#).unwrap();
        assert_eq!(config.sample_step, 5);
        assert_eq!(config.quad_fit, QuadFitKind::MinAreaRect);
        assert_eq!(config.edge_threshold, DetectionConfig::DEFAULT_EDGE_THRESHOLD);
    }

    #[test]
    fn detected_document_serializes_corners_in_order() {
        let doc = DetectedDocument {
            corners: Quadrilateral::centered(Dimensions::new(10, 10), 0.8),
            confidence: 0.75,
        };
        let json = serde_json::to_string(&doc).unwrap();
        let back: DetectedDocument = serde_json::from_str(&json).unwrap();
        assert_eq!(doc, back);
    }

    // --- PipelineError tests ---

    #[test]
    fn error_display_messages() {
        assert_eq!(
            PipelineError::InsufficientCandidates { found: 2 }.to_string(),
            "no document found: only 2 boundary candidates",
        );
        assert_eq!(
            PipelineError::EmptyInput.to_string(),
            "input image data is empty",
        );
    }

    #[test]
    fn no_document_errors_are_flagged() {
        assert!(PipelineError::InsufficientCandidates { found: 0 }.is_no_document());
        assert!(PipelineError::DegenerateHull { hull_points: 3 }.is_no_document());
        assert!(!PipelineError::InvalidQuadrilateral("x".into()).is_no_document());
    }
}
