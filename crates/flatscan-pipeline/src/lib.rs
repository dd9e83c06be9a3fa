//! flatscan-pipeline: document detection and rectification (sans-IO).
//!
//! Finds the four corners of a paper document in a captured frame and
//! warps it into a flat, contrast-enhanced rectangle:
//! luminance -> smoothing -> Sobel edges -> boundary sampling ->
//! convex hull -> quadrilateral -> confidence, then (after optional
//! interactive correction) homography rectification -> enhancement.
//!
//! This crate has **no I/O dependencies**: it operates on in-memory
//! buffers and returns structured data. Decoding files, encoding output,
//! and reading the clock live in the caller (see `flatscan-cli`).

pub mod blur;
pub mod confidence;
pub mod correction;
pub mod diagnostics;
pub mod edge;
pub mod enhance;
pub mod grayscale;
pub mod homography;
pub mod hull;
pub mod pipeline;
pub mod quad;
pub mod rectify;
pub mod sample;
pub mod types;
pub mod worker;

pub use blur::BorderPolicy;
pub use confidence::{ConfidenceThresholds, Decision};
pub use correction::{Corner, CorrectionError, CorrectionState, DragState};
pub use diagnostics::{Clock, DetectionDiagnostics, detect_with_diagnostics};
pub use homography::Homography;
pub use pipeline::{DetectionPipeline, DetectionReport, StagedDetection};
pub use quad::{QuadFitKind, QuadFitter};
pub use types::{
    DetectedDocument, DetectionConfig, Dimensions, GrayImage, PipelineError, PixelBuffer, Point,
    Proposal, Quadrilateral, RelativePoint, RgbaImage, ScanConfig,
};
pub use worker::{DetectionTask, spawn_detection};

/// Find the document in a captured frame.
///
/// # Pipeline steps
///
/// 1. Luminance conversion
/// 2. 3×3 smoothing
/// 3. Sobel edge magnitude
/// 4. Grid sampling of boundary candidates
/// 5. Convex hull
/// 6. Reduction to four ordered corners
/// 7. Confidence scoring
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid.
/// Returns [`PipelineError::InsufficientCandidates`] or
/// [`PipelineError::DegenerateHull`] when no document can be found; see
/// [`PipelineError::is_no_document`] and [`propose`].
pub fn detect(
    buffer: &PixelBuffer,
    config: &DetectionConfig,
) -> Result<DetectedDocument, PipelineError> {
    detect_staged(buffer, config).map(|staged| staged.document)
}

/// Like [`detect`], but keep every intermediate.
///
/// # Errors
///
/// Same as [`detect`].
pub fn detect_staged(
    buffer: &PixelBuffer,
    config: &DetectionConfig,
) -> Result<StagedDetection, PipelineError> {
    Ok(DetectionPipeline::new(buffer, config.clone())
        .grayscale()?
        .smooth()
        .detect_edges()
        .sample()?
        .hull()?
        .approximate()?
        .score()
        .into_result())
}

/// Detect the document and decide what to show the user.
///
/// When detection finds nothing, or its confidence does not clear the
/// offer threshold, the corners fall back to a centered quadrilateral
/// covering `config.fallback_fraction` of each axis.
///
/// # Errors
///
/// Only configuration errors are returned; "no document" becomes a
/// [`Decision::Fallback`] proposal.
pub fn propose(buffer: &PixelBuffer, config: &DetectionConfig) -> Result<Proposal, PipelineError> {
    propose_from(detect(buffer, config), Dimensions::of(buffer), config)
}

/// Apply the [`propose`] policy to a detection that already ran, for
/// callers that also need the intermediates of [`detect_staged`].
///
/// # Errors
///
/// Errors other than "no document" in `outcome` are returned as is.
pub fn propose_from(
    outcome: Result<DetectedDocument, PipelineError>,
    frame: Dimensions,
    config: &DetectionConfig,
) -> Result<Proposal, PipelineError> {
    let fallback = Quadrilateral::centered(frame, config.fallback_fraction);
    match outcome {
        Ok(document) => {
            let decision = config.thresholds.decide(document.confidence);
            let corners = if decision == Decision::Fallback {
                log::warn!(
                    "detection confidence {:.3} is below the offer threshold; using default corners",
                    document.confidence
                );
                fallback
            } else {
                document.corners
            };
            Ok(Proposal {
                corners,
                confidence: Some(document.confidence),
                decision,
            })
        }
        Err(err) if err.is_no_document() => {
            log::warn!("{err}; using default corners");
            Ok(Proposal {
                corners: fallback,
                confidence: None,
                decision: Decision::Fallback,
            })
        }
        Err(err) => Err(err),
    }
}

/// Rectify `quad` out of `source` and enhance the result.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] if `config` is invalid, and
/// any error from [`rectify::rectify`].
pub fn scan(
    source: &PixelBuffer,
    quad: &Quadrilateral,
    config: &ScanConfig,
) -> Result<PixelBuffer, PipelineError> {
    config.validate()?;
    let mut flat = rectify::rectify(source, quad, config.output)?;
    if let Some(contrast) = config.contrast {
        enhance::enhance_in_place(&mut flat, contrast);
    }
    log::debug!(
        "scanned {}x{} document (contrast {:?})",
        flat.width(),
        flat.height(),
        config.contrast
    );
    Ok(flat)
}
