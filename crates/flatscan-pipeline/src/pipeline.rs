//! Incremental detection: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! Unlike [`crate::detect`] which runs detection in one call,
//! [`DetectionPipeline`] lets the caller drive execution one step at a
//! time:
//!
//! ```rust
//! # use flatscan_pipeline::{DetectionConfig, DetectionPipeline, PipelineError, PixelBuffer};
//! # fn run(frame: &PixelBuffer) -> Result<(), PipelineError> {
//! let staged = DetectionPipeline::new(frame, DetectionConfig::default())
//!     .grayscale()?
//!     .smooth()
//!     .detect_edges()
//!     .sample()?
//!     .hull()?
//!     .approximate()?
//!     .score()
//!     .into_result();
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next pipeline state
//! (or `Result` for fallible stages), carrying all previously computed
//! intermediates. Making the order a property of the types means stages
//! cannot be skipped or reordered.
//!
//! # Memory
//!
//! From [`EdgesDetected`] onward three full-frame gray maps are retained
//! (luminance, blurred, edges). For a 1920×1080 capture that is about
//! 6 MB pinned until [`Scored::into_result`]. Callers that only need the
//! corners should use [`crate::detect`] or the background worker.

use serde::{Deserialize, Serialize};

use crate::confidence::Decision;
use crate::quad::QuadFitter;
use crate::types::{
    DetectedDocument, DetectionConfig, Dimensions, GrayImage, PipelineError, PixelBuffer, Point,
    Quadrilateral,
};

/// Minimum number of boundary candidates needed to attempt a hull.
pub const MIN_CANDIDATES: usize = 3;

/// Every intermediate of one detection run.
#[derive(Debug, Clone)]
pub struct StagedDetection {
    /// Frame size.
    pub dimensions: Dimensions,
    /// Stage 1: luminance map.
    pub grayscale: GrayImage,
    /// Stage 2: smoothed luminance.
    pub blurred: GrayImage,
    /// Stage 3: Sobel magnitude.
    pub edges: GrayImage,
    /// Stage 4: boundary candidates (absolute).
    pub candidates: Vec<Point>,
    /// Stage 5: convex hull of the candidates (absolute).
    pub hull: Vec<Point>,
    /// Stages 6 and 7: ordered corners and confidence.
    pub document: DetectedDocument,
    /// What the configured thresholds say to do with the document.
    pub decision: Decision,
}

/// Serializable summary of a [`StagedDetection`] without the rasters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionReport {
    /// Frame size.
    pub dimensions: Dimensions,
    /// Number of boundary candidates.
    pub candidate_count: usize,
    /// Hull vertices (absolute).
    pub hull: Vec<Point>,
    /// Detected corners and confidence.
    pub document: DetectedDocument,
    /// Threshold decision.
    pub decision: Decision,
}

impl From<&StagedDetection> for DetectionReport {
    fn from(staged: &StagedDetection) -> Self {
        Self {
            dimensions: staged.dimensions,
            candidate_count: staged.candidates.len(),
            hull: staged.hull.clone(),
            document: staged.document,
            decision: staged.decision,
        }
    }
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`grayscale`](Self::grayscale) to begin.
#[must_use = "pipeline stages are consumed by advancing; call .grayscale() to continue"]
pub struct Pending<'a> {
    config: DetectionConfig,
    source: &'a PixelBuffer,
}

impl Pending<'_> {
    /// The captured frame.
    #[must_use]
    pub const fn source(&self) -> &PixelBuffer {
        self.source
    }

    /// Validate the configuration and convert the frame to luminance.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration
    /// fails [`DetectionConfig::validate`].
    pub fn grayscale(self) -> Result<Grayscaled, PipelineError> {
        self.config.validate()?;
        let dimensions = Dimensions::of(self.source);
        let gray = crate::grayscale::luminance(self.source);
        log::debug!("luminance: {}x{}", dimensions.width, dimensions.height);
        Ok(Grayscaled {
            config: self.config,
            dimensions,
            gray,
        })
    }
}

// ───────────────────────── Stage 1: Grayscaled ───────────────────────

/// Pipeline state after luminance conversion.
#[must_use = "pipeline stages are consumed by advancing; call .smooth() to continue"]
pub struct Grayscaled {
    config: DetectionConfig,
    dimensions: Dimensions,
    gray: GrayImage,
}

impl Grayscaled {
    /// The luminance map.
    #[must_use]
    pub const fn grayscale(&self) -> &GrayImage {
        &self.gray
    }

    /// Apply the 3×3 smoothing kernel.
    pub fn smooth(self) -> Smoothed {
        let blurred = crate::blur::smooth(&self.gray, self.config.border);
        log::debug!("smoothed with {:?} border", self.config.border);
        Smoothed {
            config: self.config,
            dimensions: self.dimensions,
            gray: self.gray,
            blurred,
        }
    }
}

// ───────────────────────── Stage 2: Smoothed ─────────────────────────

/// Pipeline state after smoothing.
#[must_use = "pipeline stages are consumed by advancing; call .detect_edges() to continue"]
pub struct Smoothed {
    config: DetectionConfig,
    dimensions: Dimensions,
    gray: GrayImage,
    blurred: GrayImage,
}

impl Smoothed {
    /// The smoothed luminance map.
    #[must_use]
    pub const fn blurred(&self) -> &GrayImage {
        &self.blurred
    }

    /// Compute the Sobel magnitude map.
    pub fn detect_edges(self) -> EdgesDetected {
        let edges = crate::edge::sobel(&self.blurred, self.config.border);
        log::debug!(
            "edges: {} pixels above {}",
            crate::edge::count_edge_pixels(&edges, self.config.edge_threshold),
            self.config.edge_threshold,
        );
        EdgesDetected {
            config: self.config,
            dimensions: self.dimensions,
            gray: self.gray,
            blurred: self.blurred,
            edges,
        }
    }
}

// ───────────────────────── Stage 3: EdgesDetected ────────────────────

/// Pipeline state after edge detection.
#[must_use = "pipeline stages are consumed by advancing; call .sample() to continue"]
pub struct EdgesDetected {
    config: DetectionConfig,
    dimensions: Dimensions,
    gray: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
}

impl EdgesDetected {
    /// The edge magnitude map.
    #[must_use]
    pub const fn edges(&self) -> &GrayImage {
        &self.edges
    }

    /// Sample boundary candidates on the configured grid.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InsufficientCandidates`] when fewer than
    /// [`MIN_CANDIDATES`] points pass the threshold.
    pub fn sample(self) -> Result<Sampled, PipelineError> {
        let candidates = crate::sample::sample_boundary(
            &self.edges,
            self.config.edge_threshold,
            self.config.sample_step,
        );
        log::debug!(
            "sampled {} candidates (step {}, threshold {})",
            candidates.len(),
            self.config.sample_step,
            self.config.edge_threshold,
        );
        if candidates.len() < MIN_CANDIDATES {
            return Err(PipelineError::InsufficientCandidates {
                found: candidates.len(),
            });
        }
        Ok(Sampled {
            config: self.config,
            dimensions: self.dimensions,
            gray: self.gray,
            blurred: self.blurred,
            edges: self.edges,
            candidates,
        })
    }
}

// ───────────────────────── Stage 4: Sampled ──────────────────────────

/// Pipeline state after boundary sampling.
#[must_use = "pipeline stages are consumed by advancing; call .hull() to continue"]
pub struct Sampled {
    config: DetectionConfig,
    dimensions: Dimensions,
    gray: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    candidates: Vec<Point>,
}

impl Sampled {
    /// The boundary candidates (absolute).
    #[must_use]
    pub fn candidates(&self) -> &[Point] {
        &self.candidates
    }

    /// Build the convex hull of the candidates.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateHull`] when the hull has fewer
    /// than four vertices.
    pub fn hull(self) -> Result<HullBuilt, PipelineError> {
        let hull = crate::hull::convex_hull(&self.candidates);
        log::debug!(
            "hull: {} of {} candidates",
            hull.len(),
            self.candidates.len()
        );
        if hull.len() < 4 {
            return Err(PipelineError::DegenerateHull {
                hull_points: hull.len(),
            });
        }
        Ok(HullBuilt {
            config: self.config,
            dimensions: self.dimensions,
            gray: self.gray,
            blurred: self.blurred,
            edges: self.edges,
            candidates: self.candidates,
            hull,
        })
    }
}

// ───────────────────────── Stage 5: HullBuilt ────────────────────────

/// Pipeline state after hull construction.
#[must_use = "pipeline stages are consumed by advancing; call .approximate() to continue"]
pub struct HullBuilt {
    config: DetectionConfig,
    dimensions: Dimensions,
    gray: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    candidates: Vec<Point>,
    hull: Vec<Point>,
}

impl HullBuilt {
    /// The convex hull (absolute).
    #[must_use]
    pub fn hull(&self) -> &[Point] {
        &self.hull
    }

    /// Reduce the hull to four ordered corners with the configured
    /// strategy.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::DegenerateHull`] if the strategy cannot
    /// produce a quadrilateral from the hull.
    pub fn approximate(self) -> Result<Approximated, PipelineError> {
        let quad = self
            .config
            .quad_fit
            .fit(&self.hull)
            .ok_or(PipelineError::DegenerateHull {
                hull_points: self.hull.len(),
            })?;
        log::debug!(
            "{} quad: {:?}",
            self.config.quad_fit.name(),
            quad.corners()
        );
        Ok(Approximated {
            config: self.config,
            dimensions: self.dimensions,
            gray: self.gray,
            blurred: self.blurred,
            edges: self.edges,
            candidates: self.candidates,
            hull: self.hull,
            quad,
        })
    }
}

// ───────────────────────── Stage 6: Approximated ─────────────────────

/// Pipeline state after quadrilateral approximation.
#[must_use = "pipeline stages are consumed by advancing; call .score() to continue"]
pub struct Approximated {
    config: DetectionConfig,
    dimensions: Dimensions,
    gray: GrayImage,
    blurred: GrayImage,
    edges: GrayImage,
    candidates: Vec<Point>,
    hull: Vec<Point>,
    quad: Quadrilateral,
}

impl Approximated {
    /// The ordered corners.
    #[must_use]
    pub const fn quadrilateral(&self) -> &Quadrilateral {
        &self.quad
    }

    /// Score the quadrilateral against the edge map.
    pub fn score(self) -> Scored {
        let confidence =
            crate::confidence::score(&self.quad, &self.edges, self.config.density_threshold);
        let decision = self.config.thresholds.decide(confidence);
        log::debug!("confidence {confidence:.3} -> {decision:?}");
        Scored {
            staged: StagedDetection {
                dimensions: self.dimensions,
                grayscale: self.gray,
                blurred: self.blurred,
                edges: self.edges,
                candidates: self.candidates,
                hull: self.hull,
                document: DetectedDocument {
                    corners: self.quad,
                    confidence,
                },
                decision,
            },
        }
    }
}

// ───────────────────────── Stage 7: Scored ───────────────────────────

/// Terminal pipeline state.
#[must_use = "call .into_result() to take the staged detection"]
pub struct Scored {
    staged: StagedDetection,
}

impl Scored {
    /// The detected document.
    #[must_use]
    pub const fn document(&self) -> &DetectedDocument {
        &self.staged.document
    }

    /// The threshold decision for the document.
    #[must_use]
    pub const fn decision(&self) -> Decision {
        self.staged.decision
    }

    /// Take every intermediate.
    #[must_use]
    pub fn into_result(self) -> StagedDetection {
        self.staged
    }
}

// ───────────────────────── Entry point ───────────────────────────────

/// Entry point for the typestate detection pipeline.
///
/// Each stage method consumes the current state and returns the next,
/// making it a compile-time error to skip stages or call them out of
/// order.
pub struct DetectionPipeline;

impl DetectionPipeline {
    /// Start a detection run over `source`.
    ///
    /// No processing is performed yet.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(source: &PixelBuffer, config: DetectionConfig) -> Pending<'_> {
        Pending { config, source }
    }
}
