//! flatscan: find, correct, and flatten photographed paper documents.
//!
//! Thin I/O shell around `flatscan-pipeline`: decodes image files, runs
//! detection, prints diagnostics, and writes rectified or annotated
//! images.
//!
//! # Usage
//!
//! ```text
//! flatscan detect photo.jpg --diagnostics --runs 5
//! flatscan scan photo.jpg -o page.png --corners "0.1,0.1 0.9,0.1 0.9,0.9 0.1,0.9"
//! flatscan overlay photo.jpg -o annotated.png --quad-fit min-area-rect
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use flatscan_pipeline::diagnostics::DetectionDiagnostics;
use flatscan_pipeline::{
    BorderPolicy, Clock, CorrectionState, Decision, DetectionConfig, DetectionReport, Dimensions,
    PipelineError, PixelBuffer, QuadFitKind, Quadrilateral, RelativePoint, ScanConfig,
};
use image::Rgba;
use log::LevelFilter;

/// Find, correct, and flatten photographed paper documents.
#[derive(Parser)]
#[command(name = "flatscan", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// More log output (repeat for trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Detect the document and print its corners and confidence.
    Detect(DetectArgs),
    /// Rectify the document into a flat, enhanced image.
    Scan(ScanArgs),
    /// Draw the proposed corners on top of the input image.
    Overlay(OverlayArgs),
}

#[derive(Args)]
struct DetectArgs {
    /// Path to the input image (PNG, JPEG, BMP, WebP).
    image: PathBuf,

    #[command(flatten)]
    detection: DetectionArgs,

    /// Print JSON instead of a human-readable summary.
    #[arg(long)]
    json: bool,

    /// Time every stage and print a diagnostics report.
    #[arg(long)]
    diagnostics: bool,

    /// Number of runs for averaging (implies --diagnostics).
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,
}

#[derive(Args)]
struct ScanArgs {
    /// Path to the input image.
    image: PathBuf,

    /// Where to write the flattened page.
    #[arg(short, long)]
    output: PathBuf,

    /// Corners in relative coordinates, TL TR BR BL, as "x,y x,y x,y x,y".
    ///
    /// When omitted, the detected (or fallback) corners are used.
    #[arg(long)]
    corners: Option<String>,

    /// Output width in pixels.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_OUTPUT.width, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..=u64::from(ScanConfig::MAX_OUTPUT_SIDE)))]
    width: u32,

    /// Output height in pixels.
    #[arg(long, default_value_t = ScanConfig::DEFAULT_OUTPUT.height, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..=u64::from(ScanConfig::MAX_OUTPUT_SIDE)))]
    height: u32,

    /// Contrast factor applied after rectification.
    #[arg(long, default_value_t = flatscan_pipeline::enhance::LIVE_CAPTURE_CONTRAST)]
    contrast: f64,

    /// Skip contrast enhancement.
    #[arg(long, conflicts_with = "contrast")]
    no_contrast: bool,

    #[command(flatten)]
    detection: DetectionArgs,
}

#[derive(Args)]
struct OverlayArgs {
    /// Path to the input image.
    image: PathBuf,

    /// Where to write the annotated image.
    #[arg(short, long)]
    output: PathBuf,

    #[command(flatten)]
    detection: DetectionArgs,
}

/// Detection parameters shared by every subcommand.
#[derive(Args)]
struct DetectionArgs {
    /// Edge magnitude a sampled grid cell must exceed.
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_EDGE_THRESHOLD)]
    threshold: u8,

    /// Boundary sampler stride in pixels.
    #[arg(long, default_value_t = DetectionConfig::DEFAULT_SAMPLE_STEP, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    step: u32,

    /// Border handling for smoothing and Sobel.
    #[arg(long, value_enum, default_value_t = Border::Zero)]
    border: Border,

    /// Hull-to-quadrilateral strategy.
    #[arg(long, value_enum, default_value_t = QuadFit::BoundingBox)]
    quad_fit: QuadFit,

    /// Full detection config as a JSON string.
    ///
    /// When provided, the individual detection flags are ignored.
    #[arg(long, conflicts_with = "config")]
    config_json: Option<String>,

    /// Read the full detection config from a JSON file.
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Border {
    /// Leave the outer ring at zero.
    Zero,
    /// Extend edge pixels outwards.
    Clamp,
}

#[derive(Clone, Copy, ValueEnum)]
enum QuadFit {
    /// Axis-aligned bounding box of the hull.
    BoundingBox,
    /// Minimum-area rotated rectangle of the hull.
    MinAreaRect,
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid --corners value {0:?}: expected four \"x,y\" pairs")]
    Corners(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl DetectionArgs {
    /// Build a [`DetectionConfig`] from the flags, a JSON string, or a
    /// JSON file, in that order of precedence.
    fn config(&self) -> Result<DetectionConfig, CliError> {
        if let Some(ref json) = self.config_json {
            return Ok(serde_json::from_str(json)?);
        }
        if let Some(ref path) = self.config {
            let text = std::fs::read_to_string(path).map_err(|source| CliError::Read {
                path: path.clone(),
                source,
            })?;
            return Ok(serde_json::from_str(&text)?);
        }

        Ok(DetectionConfig {
            edge_threshold: self.threshold,
            sample_step: self.step,
            border: match self.border {
                Border::Zero => BorderPolicy::Zero,
                Border::Clamp => BorderPolicy::Clamp,
            },
            quad_fit: match self.quad_fit {
                QuadFit::BoundingBox => QuadFitKind::BoundingBox,
                QuadFit::MinAreaRect => QuadFitKind::MinAreaRect,
            },
            ..DetectionConfig::default()
        })
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    let result = match &cli.command {
        Command::Detect(args) => run_detect(args),
        Command::Scan(args) => run_scan(args),
        Command::Overlay(args) => run_overlay(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

/// Install `env_logger` at the level chosen by `-v`/`-q`; `RUST_LOG`
/// still overrides it.
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else {
        match verbose {
            0 => LevelFilter::Warn,
            1 => LevelFilter::Info,
            2 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn load_image(path: &Path) -> Result<PixelBuffer, CliError> {
    let bytes = std::fs::read(path).map_err(|source| CliError::Read {
        path: path.to_owned(),
        source,
    })?;
    log::info!("read {} ({} bytes)", path.display(), bytes.len());
    Ok(flatscan_pipeline::grayscale::decode(&bytes)?)
}

/// Write `buffer` as RGB so that formats without alpha (JPEG) work too.
fn save_image(buffer: PixelBuffer, path: &Path) -> Result<(), CliError> {
    image::DynamicImage::ImageRgba8(buffer)
        .to_rgb8()
        .save(path)
        .map_err(|source| CliError::Write {
            path: path.to_owned(),
            source,
        })?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn run_detect(args: &DetectArgs) -> Result<(), CliError> {
    let config = args.detection.config()?;
    let frame = load_image(&args.image)?;
    log::debug!("config: {config:?}");

    if !args.diagnostics && args.runs == 1 {
        let staged = flatscan_pipeline::detect_staged(&frame, &config)?;
        let report = DetectionReport::from(&staged);
        if args.json {
            println!("{}", serde_json::to_string_pretty(&report)?);
        } else {
            print_detection(&report);
        }
        return Ok(());
    }

    let mut all_diagnostics = Vec::with_capacity(args.runs);
    for run in 0..args.runs {
        if args.runs > 1 {
            eprintln!("--- Run {}/{} ---", run + 1, args.runs);
        }
        let (_, diagnostics) =
            flatscan_pipeline::detect_with_diagnostics(&frame, &config, &StdClock)?;
        if args.json {
            println!("{}", serde_json::to_string_pretty(&diagnostics)?);
        } else {
            println!("{}", diagnostics.report());
        }
        all_diagnostics.push(diagnostics);
    }

    if args.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }
    Ok(())
}

fn print_detection(report: &DetectionReport) {
    let names = ["top-left", "top-right", "bottom-right", "bottom-left"];
    println!(
        "Image: {}x{}",
        report.dimensions.width, report.dimensions.height
    );
    println!(
        "Candidates: {}  Hull points: {}",
        report.candidate_count,
        report.hull.len()
    );
    for (name, corner) in names.iter().zip(report.document.corners.corners()) {
        println!("{name:<14} ({:>8.1}, {:>8.1})", corner.x, corner.y);
    }
    println!(
        "Confidence: {:.3} ({:?})",
        report.document.confidence, report.decision
    );
}

fn run_scan(args: &ScanArgs) -> Result<(), CliError> {
    let config = args.detection.config()?;
    let frame = load_image(&args.image)?;
    let dims = Dimensions::of(&frame);

    let quad = match args.corners {
        Some(ref text) => {
            let corners = parse_corners(text)?;
            CorrectionState::new(corners, dims)
                .confirm()
                .map_err(PipelineError::from)?
        }
        None => {
            let proposal = flatscan_pipeline::propose(&frame, &config)?;
            if proposal.decision != Decision::AutoApply {
                log::warn!(
                    "using {:?} corners without review; pass --corners to override",
                    proposal.decision
                );
            }
            proposal.corners
        }
    };

    let scan = ScanConfig {
        output: Dimensions::new(args.width, args.height),
        contrast: (!args.no_contrast).then_some(args.contrast),
    };
    let flat = flatscan_pipeline::scan(&frame, &quad, &scan)?;
    save_image(flat, &args.output)
}

#[allow(clippy::cast_possible_truncation)]
fn run_overlay(args: &OverlayArgs) -> Result<(), CliError> {
    let config = args.detection.config()?;
    let mut frame = load_image(&args.image)?;

    // One staged run feeds both the hull markers and the proposal; a
    // frame with no document has no hull to draw.
    let (hull, outcome) = match flatscan_pipeline::detect_staged(&frame, &config) {
        Ok(staged) => (staged.hull, Ok(staged.document)),
        Err(e) => (Vec::new(), Err(e)),
    };
    let proposal = flatscan_pipeline::propose_from(outcome, Dimensions::of(&frame), &config)?;

    for p in &hull {
        imageproc::drawing::draw_filled_circle_mut(
            &mut frame,
            (p.x.round() as i32, p.y.round() as i32),
            4,
            Rgba([0, 160, 255, 255]),
        );
    }
    let color = match proposal.decision {
        Decision::AutoApply => Rgba([0, 220, 0, 255]),
        Decision::Review => Rgba([255, 200, 0, 255]),
        Decision::Fallback => Rgba([255, 0, 0, 255]),
    };
    draw_quadrilateral(&mut frame, &proposal.corners, color);
    save_image(frame, &args.output)
}

/// Outline `quad` with a three-pixel line.
#[allow(clippy::cast_possible_truncation)]
fn draw_quadrilateral(frame: &mut PixelBuffer, quad: &Quadrilateral, color: Rgba<u8>) {
    for (a, b) in quad.edges() {
        for offset in [-1.0f32, 0.0, 1.0] {
            imageproc::drawing::draw_line_segment_mut(
                frame,
                (a.x as f32 + offset, a.y as f32),
                (b.x as f32 + offset, b.y as f32),
                color,
            );
            imageproc::drawing::draw_line_segment_mut(
                frame,
                (a.x as f32, a.y as f32 + offset),
                (b.x as f32, b.y as f32 + offset),
                color,
            );
        }
    }
}

/// Parse `"x,y x,y x,y x,y"` into four relative corners.
fn parse_corners(text: &str) -> Result<[RelativePoint; 4], CliError> {
    let invalid = || CliError::Corners(text.to_owned());
    let points: Vec<RelativePoint> = text
        .split_whitespace()
        .map(|pair| {
            let (x, y) = pair.split_once(',').ok_or_else(invalid)?;
            let x: f64 = x.trim().parse().map_err(|_| invalid())?;
            let y: f64 = y.trim().parse().map_err(|_| invalid())?;
            if x.is_finite() && y.is_finite() {
                Ok(RelativePoint::new(x, y))
            } else {
                Err(invalid())
            }
        })
        .collect::<Result<_, _>>()?;
    <[RelativePoint; 4]>::try_from(points).map_err(|_| invalid())
}

/// [`Clock`] implementation backed by [`std::time::Instant`].
struct StdClock;

impl Clock for StdClock {
    type Instant = Instant;

    fn now(&self) -> Instant {
        Instant::now()
    }

    fn elapsed(&self, since: &Instant) -> Duration {
        since.elapsed()
    }
}

/// Function pointer type for extracting a stage duration from diagnostics.
type StageExtractor = fn(&DetectionDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[DetectionDiagnostics]) {
    println!();
    println!(
        "Summary ({} runs)\n{}",
        all_diagnostics.len(),
        "=".repeat(60),
    );

    if all_diagnostics.is_empty() {
        println!("Warning: no diagnostics to summarize");
        return;
    }

    let durations: Vec<f64> = all_diagnostics
        .iter()
        .map(|d| d.total_duration.as_secs_f64() * 1000.0)
        .collect();

    let min = durations.iter().copied().reduce(f64::min).unwrap_or(0.0);
    let max = durations.iter().copied().reduce(f64::max).unwrap_or(0.0);
    let mean = durations.iter().sum::<f64>() / durations.len() as f64;

    println!("Total duration: min={min:.3}ms  mean={mean:.3}ms  max={max:.3}ms");

    println!();
    println!("{:<24} {:>12}", "Stage", "Mean (ms)");
    println!("{}", "-".repeat(40));

    let stage_extractors: &[(&str, StageExtractor)] = &[
        ("Luminance", |d| d.luminance.duration),
        ("Smoothing", |d| d.smoothing.duration),
        ("Edge Detection", |d| d.edge_detection.duration),
        ("Sampling", |d| d.sampling.duration),
        ("Hull", |d| d.hull.duration),
        ("Quad Fit", |d| d.quad_fit.duration),
        ("Scoring", |d| d.scoring.duration),
    ];

    for (name, extractor) in stage_extractors {
        let stage_mean = all_diagnostics
            .iter()
            .map(|d| extractor(d).as_secs_f64() * 1000.0)
            .sum::<f64>()
            / all_diagnostics.len() as f64;
        println!("{name:<24} {stage_mean:>10.3}ms");
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn scan_rejects_output_beyond_the_size_limit() {
        let result = Cli::try_parse_from([
            "flatscan", "scan", "in.png", "-o", "out.png", "--width", "100000", "--height", "100000",
        ]);
        assert!(result.is_err());

        let cli = Cli::try_parse_from(["flatscan", "scan", "in.png", "-o", "out.png", "--width", "16384"])
            .unwrap();
        assert!(matches!(
            cli.command,
            Command::Scan(ref args) if args.width == ScanConfig::MAX_OUTPUT_SIDE
        ));
    }

    #[test]
    fn parse_corners_reads_four_pairs() {
        let corners = parse_corners("0.1,0.2 0.9,0.2  0.9,0.8 0.1,0.8").unwrap();
        assert_eq!(corners[0], RelativePoint::new(0.1, 0.2));
        assert_eq!(corners[2], RelativePoint::new(0.9, 0.8));
    }

    #[test]
    fn parse_corners_rejects_wrong_count_and_garbage() {
        assert!(matches!(
            parse_corners("0.1,0.2 0.9,0.2 0.9,0.8"),
            Err(CliError::Corners(_))
        ));
        assert!(parse_corners("0.1;0.2 0.9,0.2 0.9,0.8 0.1,0.8").is_err());
        assert!(parse_corners("a,b 0.9,0.2 0.9,0.8 0.1,0.8").is_err());
        assert!(parse_corners("NaN,0 0.9,0.2 0.9,0.8 0.1,0.8").is_err());
    }

    #[test]
    fn detection_flags_build_config() {
        let args = DetectionArgs {
            threshold: 80,
            step: 4,
            border: Border::Clamp,
            quad_fit: QuadFit::MinAreaRect,
            config_json: None,
            config: None,
        };
        let config = args.config().unwrap();
        assert_eq!(config.edge_threshold, 80);
        assert_eq!(config.sample_step, 4);
        assert_eq!(config.border, BorderPolicy::Clamp);
        assert_eq!(config.quad_fit, QuadFitKind::MinAreaRect);
        assert_eq!(config.thresholds, DetectionConfig::default().thresholds);
    }

    #[test]
    fn config_json_overrides_flags() {
        let args = DetectionArgs {
            threshold: 80,
            step: 4,
            border: Border::Zero,
            quad_fit: QuadFit::BoundingBox,
            config_json: Some(r#"{"edge_threshold": 30}"#.to_owned()),
            config: None,
        };
        let config = args.config().unwrap();
        assert_eq!(config.edge_threshold, 30);
        assert_eq!(config.sample_step, DetectionConfig::DEFAULT_SAMPLE_STEP);
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
