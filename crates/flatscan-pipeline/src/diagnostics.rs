//! Detection diagnostics: timing, counts, and other metrics for each stage.
//!
//! These diagnostics are permanent instrumentation intended for
//! threshold tuning and parameter experimentation. They are collected by
//! [`detect_with_diagnostics`], which drives the same typestate stages
//! as [`crate::detect_staged`] and times each one.
//!
//! Duration measurements use [`std::time::Duration`]. Timestamps come
//! from a caller-supplied [`Clock`], so this crate never reads the
//! system time itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::blur::BorderPolicy;
use crate::confidence::Decision;
use crate::pipeline::{DetectionPipeline, StagedDetection};
use crate::types::{DetectionConfig, PipelineError, PixelBuffer};

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a `Duration` as fractional seconds (`f64`).
    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    /// Deserialize a `Duration` from fractional seconds (`f64`).
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Source of timestamps for stage timing.
///
/// Native callers wrap `std::time::Instant`; tests use a fake clock.
pub trait Clock {
    /// Opaque timestamp type.
    type Instant;

    /// The current time.
    fn now(&self) -> Self::Instant;

    /// Time elapsed since `since`.
    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Diagnostics collected from a single detection run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionDiagnostics {
    /// Stage 1: luminance conversion.
    pub luminance: StageDiagnostics,
    /// Stage 2: 3×3 smoothing.
    pub smoothing: StageDiagnostics,
    /// Stage 3: Sobel edge detection.
    pub edge_detection: StageDiagnostics,
    /// Stage 4: boundary sampling.
    pub sampling: StageDiagnostics,
    /// Stage 5: convex hull.
    pub hull: StageDiagnostics,
    /// Stage 6: quadrilateral approximation.
    pub quad_fit: StageDiagnostics,
    /// Stage 7: confidence scoring.
    pub scoring: StageDiagnostics,
    /// Total wall-clock duration of the run (seconds).
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    /// Summary across all stages.
    pub summary: DetectionSummary,
}

/// Diagnostics for a single stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    /// Wall-clock duration of this stage (seconds).
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    /// Stage-specific metrics.
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StageMetrics {
    /// Luminance conversion metrics.
    Luminance {
        /// Frame width in pixels.
        width: u32,
        /// Frame height in pixels.
        height: u32,
        /// Total pixel count (`width * height`).
        pixel_count: u64,
    },
    /// Smoothing metrics.
    Smoothing {
        /// Border policy applied to the outer ring.
        border: BorderPolicy,
    },
    /// Edge detection metrics.
    EdgeDetection {
        /// Magnitude a pixel must exceed to count as an edge.
        threshold: u8,
        /// Pixels above `threshold`.
        edge_pixel_count: u64,
        /// Total pixel count for computing edge density.
        total_pixel_count: u64,
    },
    /// Boundary sampling metrics.
    Sampling {
        /// Grid stride in pixels.
        step: u32,
        /// Number of candidates kept.
        candidate_count: usize,
    },
    /// Convex hull metrics.
    Hull {
        /// Candidates fed to the hull.
        input_points: usize,
        /// Vertices on the hull.
        hull_points: usize,
    },
    /// Quadrilateral approximation metrics.
    QuadFit {
        /// Which strategy was used.
        strategy: String,
        /// Shoelace area of the quadrilateral in pixels.
        area: f64,
    },
    /// Confidence scoring metrics.
    Scoring {
        /// Score in `[0, 1]`.
        confidence: f64,
        /// Threshold decision.
        decision: Decision,
    },
}

/// High-level summary for the whole run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionSummary {
    /// Frame width in pixels.
    pub image_width: u32,
    /// Frame height in pixels.
    pub image_height: u32,
    /// Total pixel count.
    pub pixel_count: u64,
    /// Number of boundary candidates.
    pub candidate_count: usize,
    /// Vertices on the hull.
    pub hull_points: usize,
    /// Final confidence.
    pub confidence: f64,
    /// Final decision.
    pub decision: Decision,
}

impl DetectionDiagnostics {
    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Detection Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Image: {}x{} ({} pixels)",
            self.summary.image_width, self.summary.image_height, self.summary.pixel_count,
        ));
        lines.push(format!(
            "Total duration: {:.3}ms",
            duration_ms(self.total_duration),
        ));
        lines.push(String::new());

        lines.push(format!(
            "{:<24} {:>10} {:>10}  {}",
            "Stage", "Duration", "% Total", "Details"
        ));
        lines.push("-".repeat(80));

        let total_ms = duration_ms(self.total_duration);
        let stages = [
            ("Luminance", &self.luminance),
            ("Smoothing", &self.smoothing),
            ("Edge Detection", &self.edge_detection),
            ("Sampling", &self.sampling),
            ("Hull", &self.hull),
            ("Quad Fit", &self.quad_fit),
            ("Scoring", &self.scoring),
        ];

        for (name, diag) in &stages {
            let ms = duration_ms(diag.duration);
            let pct = if total_ms > 0.0 {
                ms / total_ms * 100.0
            } else {
                0.0
            };
            let details = format_metrics(&diag.metrics);
            lines.push(format!("{name:<24} {ms:>8.3}ms {pct:>9.1}%  {details}"));
        }

        lines.push(String::new());
        lines.push(format!(
            "Candidates: {}  |  Hull points: {}  |  Confidence: {:.3} ({:?})",
            self.summary.candidate_count,
            self.summary.hull_points,
            self.summary.confidence,
            self.summary.decision,
        ));

        lines.join("\n")
    }
}

/// Run detection stage by stage, timing each with `clock`.
///
/// # Errors
///
/// Same as [`crate::detect`].
pub fn detect_with_diagnostics<C: Clock>(
    buffer: &PixelBuffer,
    config: &DetectionConfig,
    clock: &C,
) -> Result<(StagedDetection, DetectionDiagnostics), PipelineError> {
    let run_start = clock.now();

    let t = clock.now();
    let stage = DetectionPipeline::new(buffer, config.clone()).grayscale()?;
    let (width, height) = stage.grayscale().dimensions();
    let luminance = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Luminance {
            width,
            height,
            pixel_count: u64::from(width) * u64::from(height),
        },
    };

    let t = clock.now();
    let stage = stage.smooth();
    let smoothing = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Smoothing {
            border: config.border,
        },
    };

    let t = clock.now();
    let stage = stage.detect_edges();
    let edge_detection = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::EdgeDetection {
            threshold: config.edge_threshold,
            edge_pixel_count: crate::edge::count_edge_pixels(stage.edges(), config.edge_threshold),
            total_pixel_count: u64::from(width) * u64::from(height),
        },
    };

    let t = clock.now();
    let stage = stage.sample()?;
    let sampling = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Sampling {
            step: config.sample_step,
            candidate_count: stage.candidates().len(),
        },
    };

    let t = clock.now();
    let input_points = stage.candidates().len();
    let stage = stage.hull()?;
    let hull = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Hull {
            input_points,
            hull_points: stage.hull().len(),
        },
    };

    let t = clock.now();
    let stage = stage.approximate()?;
    let quad_fit = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::QuadFit {
            strategy: config.quad_fit.name().to_owned(),
            area: stage.quadrilateral().area(),
        },
    };

    let t = clock.now();
    let stage = stage.score();
    let scoring = StageDiagnostics {
        duration: clock.elapsed(&t),
        metrics: StageMetrics::Scoring {
            confidence: stage.document().confidence,
            decision: stage.decision(),
        },
    };

    let staged = stage.into_result();
    let diagnostics = DetectionDiagnostics {
        luminance,
        smoothing,
        edge_detection,
        sampling,
        hull,
        quad_fit,
        scoring,
        total_duration: clock.elapsed(&run_start),
        summary: DetectionSummary {
            image_width: width,
            image_height: height,
            pixel_count: u64::from(width) * u64::from(height),
            candidate_count: staged.candidates.len(),
            hull_points: staged.hull.len(),
            confidence: staged.document.confidence,
            decision: staged.decision,
        },
    };
    Ok((staged, diagnostics))
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Luminance { width, height, .. } => format!("{width}x{height}"),
        StageMetrics::Smoothing { border } => format!("border={border:?}"),
        StageMetrics::EdgeDetection {
            threshold,
            edge_pixel_count,
            total_pixel_count,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let density = if *total_pixel_count > 0 {
                *edge_pixel_count as f64 / *total_pixel_count as f64 * 100.0
            } else {
                0.0
            };
            format!("threshold={threshold} edges={edge_pixel_count} ({density:.1}%)")
        }
        StageMetrics::Sampling {
            step,
            candidate_count,
        } => format!("step={step} candidates={candidate_count}"),
        StageMetrics::Hull {
            input_points,
            hull_points,
        } => format!("{input_points} -> {hull_points} pts"),
        StageMetrics::QuadFit { strategy, area } => format!("{strategy} area={area:.0}px²"),
        StageMetrics::Scoring {
            confidence,
            decision,
        } => format!("confidence={confidence:.3} {decision:?}"),
    }
}
