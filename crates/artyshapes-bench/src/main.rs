//! artyshapes: render a segmentation map as flat-colored shape art.
//!
//! Runs the pipeline on a label map (or, with `--posterize`, on a photo
//! that is flattened into one first), printing per-stage diagnostics
//! and optionally writing SVG and PNG output. Useful for:
//!
//! - Comparing color and shape modes on the same map
//! - Tuning the discard threshold and simplification tolerance
//! - Measuring per-stage durations to identify bottlenecks
//!
//! # Usage
//!
//! ```text
//! cargo run --release --bin artyshapes -- [OPTIONS] <MAP_PATH>
//! ```

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use artyshapes_export::{PixmapCanvas, SvgCanvas, SvgMetadata};
use artyshapes_pipeline::diagnostics::{Clock, PipelineDiagnostics};
use artyshapes_pipeline::segmentation::{
    ModelConfig, ModelVariant, Posterize, Quantization, SegmentationModel,
};
use artyshapes_pipeline::{
    ClusterParams, Collaborators, ColorMode, Connectivity, PipelineConfig, Renderer, Rgb,
    RgbaImage, ShapeMode, VibrantExtractor,
};
use clap::{ArgAction, Parser, ValueEnum};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};

/// Turn a segmentation map into flat-colored vector shapes.
///
/// Every connected same-color region of the map becomes one polygon,
/// colored from the source image and drawn largest first.
#[derive(Parser)]
#[command(name = "artyshapes", version)]
struct Cli {
    /// Path to the segmentation map (PNG, JPEG, BMP, WebP).
    map_path: PathBuf,

    /// Image to sample colors from. Defaults to the map itself.
    #[arg(long)]
    source: Option<PathBuf>,

    /// Treat MAP_PATH as a photo and flatten it into this many levels
    /// per channel to produce the map.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u8>::new().range(2..=255))]
    posterize: Option<u8>,

    /// Model family recorded with the segmentation request.
    #[arg(long, default_value_t = ModelVariant::default())]
    model: ModelVariant,

    /// Model weight size in bytes (1, 2, or 4).
    #[arg(long, default_value_t = Quantization::default().bytes())]
    quantization: u8,

    /// Color mode (average, average-perceptual, root, center,
    /// representative, mondrian, cluster, vibrant, muted, segmentation).
    #[arg(long, default_value_t = ColorMode::default())]
    color_mode: ColorMode,

    /// Shape mode (aabb, convex, oabb, concave).
    #[arg(long, default_value_t = ShapeMode::default())]
    shape_mode: ShapeMode,

    /// Drop segments whose bounding box is below this fraction of the
    /// image area (0.0-0.1).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_DISCARD_THRESHOLD)]
    discard_threshold: f64,

    /// RDP simplification tolerance in pixels (0-100).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_SIMPLIFY_TOLERANCE)]
    simplify_tolerance: f64,

    /// Outline width in pixels (0-25).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STROKE_WIDTH)]
    stroke_width: f64,

    /// Outline color as #rrggbb.
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_STROKE_COLOR)]
    stroke_color: Rgb,

    /// Pixel adjacency for labeling.
    #[arg(long, value_enum, default_value_t = Adjacency::Four)]
    connectivity: Adjacency,

    /// Map color whose pixels are left unlabeled, as #rrggbb.
    #[arg(long)]
    background: Option<Rgb>,

    /// Cap the longest side of the working raster.
    #[arg(long, value_parser = clap::builder::RangedU64ValueParser::<u32>::new().range(1..))]
    working_resolution: Option<u32>,

    /// DBSCAN neighborhood radius for the cluster color mode.
    #[arg(long, default_value_t = ClusterParams::DEFAULT_EPS)]
    cluster_eps: u32,

    /// DBSCAN minimum neighborhood size for the cluster color mode.
    #[arg(long, default_value_t = ClusterParams::DEFAULT_MIN_POINTS)]
    cluster_min_points: usize,

    /// Concavity for the concave shape mode (lower is tighter).
    #[arg(long, default_value_t = PipelineConfig::DEFAULT_CONCAVITY)]
    concavity: f64,

    /// Seed for the mondrian color mode. Random when omitted.
    #[arg(long)]
    seed: Option<u64>,

    /// Write SVG output to file.
    #[arg(long)]
    svg: Option<PathBuf>,

    /// Write a rasterized PNG preview to file.
    #[arg(long)]
    png: Option<PathBuf>,

    /// Number of runs for averaging.
    #[arg(long, default_value_t = 1, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    runs: usize,

    /// Output diagnostics as JSON instead of human-readable report.
    #[arg(long)]
    json: bool,

    /// Full pipeline config as a JSON string.
    ///
    /// When provided, all other pipeline parameter flags are ignored.
    /// The JSON must be a valid `PipelineConfig` serialization.
    #[arg(long)]
    config_json: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// Pixel adjacency selection.
#[derive(Clone, Copy, ValueEnum)]
enum Adjacency {
    /// Edge neighbors only.
    #[value(name = "4")]
    Four,
    /// Edge and corner neighbors.
    #[value(name = "8")]
    Eight,
}

/// Build a [`PipelineConfig`] from CLI arguments.
///
/// If `--config-json` is provided, the JSON is parsed directly and all
/// individual parameter flags are ignored.
fn config_from_cli(cli: &Cli) -> Result<PipelineConfig, String> {
    let config = if let Some(ref json) = cli.config_json {
        serde_json::from_str(json).map_err(|e| format!("Error parsing --config-json: {e}"))?
    } else {
        PipelineConfig {
            color_mode: cli.color_mode,
            shape_mode: cli.shape_mode,
            discard_threshold: cli.discard_threshold,
            simplify_tolerance: cli.simplify_tolerance,
            stroke_width: cli.stroke_width,
            stroke_color: cli.stroke_color,
            connectivity: match cli.connectivity {
                Adjacency::Four => Connectivity::Four,
                Adjacency::Eight => Connectivity::Eight,
            },
            background: cli.background,
            working_resolution: cli.working_resolution,
            cluster: ClusterParams {
                eps: cli.cluster_eps,
                min_points: cli.cluster_min_points,
            },
            concavity: cli.concavity,
        }
    };
    config.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

fn read_image(path: &Path) -> Result<RgbaImage, String> {
    let bytes =
        std::fs::read(path).map_err(|e| format!("Error reading {}: {e}", path.display()))?;
    artyshapes_pipeline::raster::decode(&bytes)
        .map_err(|e| format!("Error decoding {}: {e}", path.display()))
}

/// Load the label map and the color source.
fn load_inputs(cli: &Cli) -> Result<(RgbaImage, Option<RgbaImage>), String> {
    let input = read_image(&cli.map_path)?;
    let source = cli.source.as_deref().map(read_image).transpose()?;

    let Some(levels) = cli.posterize else {
        return Ok((input, source));
    };
    let model_config = ModelConfig {
        variant: cli.model,
        quantization: Quantization::try_from(cli.quantization).map_err(|e| e.to_string())?,
    };
    let map = Posterize { levels }
        .segment(&input, &model_config)
        .and_then(artyshapes_pipeline::segmentation::SegmentationMap::into_raster)
        .map_err(|e| format!("Segmentation error: {e}"))?;
    // A posterized photo is its own best color source.
    Ok((map, Some(source.unwrap_or(input))))
}

fn write_output(path: &Path, bytes: &[u8], what: &str) {
    match std::fs::write(path, bytes) {
        Ok(()) => log::info!(
            "{what} written to {} ({} bytes)",
            path.display(),
            bytes.len()
        ),
        Err(e) => log::error!("Error writing {what} to {}: {e}", path.display()),
    }
}

/// Default log filter for a `-v` count. `RUST_LOG` overrides it.
const fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    }
}

fn init_logging(verbose: u8) {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level(verbose)))
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = match config_from_cli(&cli) {
        Ok(c) => c,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let (map, source) = match load_inputs(&cli) {
        Ok(inputs) => inputs,
        Err(msg) => {
            eprintln!("{msg}");
            return ExitCode::FAILURE;
        }
    };

    let dimensions = artyshapes_pipeline::pipeline::working_dimensions(&map, &config);
    if dimensions.is_empty() {
        eprintln!("Render error: canvas not ready yet (map is {}x{})", map.width(), map.height());
        return ExitCode::FAILURE;
    }

    eprintln!(
        "Map: {} ({}x{})",
        cli.map_path.display(),
        map.width(),
        map.height(),
    );
    eprintln!("Config: {config:#?}");
    eprintln!("Runs: {}", cli.runs);
    eprintln!();

    let mut rng: Box<dyn RngCore> = match cli.seed {
        Some(seed) => Box::new(StdRng::seed_from_u64(seed)),
        None => Box::new(rand::rng()),
    };
    let mut collaborators = Collaborators {
        rng: &mut *rng,
        extractor: &VibrantExtractor,
    };

    let title = cli
        .map_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("artyshapes");

    let mut all_diagnostics = Vec::with_capacity(cli.runs);

    for run in 0..cli.runs {
        if cli.runs > 1 {
            log::info!("--- Run {}/{} ---", run + 1, cli.runs);
        }

        let mut canvas = SvgCanvas::new(dimensions).with_title(title);
        match artyshapes_pipeline::diagnostics::render_with_diagnostics(
            &map,
            source.as_ref(),
            &config,
            &mut collaborators,
            &mut canvas,
            &StdClock,
        ) {
            Ok((_, diagnostics)) => {
                if cli.json {
                    match serde_json::to_string_pretty(&diagnostics) {
                        Ok(json) => println!("{json}"),
                        Err(e) => {
                            eprintln!("Error serializing diagnostics: {e}");
                            return ExitCode::FAILURE;
                        }
                    }
                } else {
                    println!("{}", diagnostics.report());
                }

                // Write output on the first run only.
                if run == 0 {
                    if let Some(ref svg_path) = cli.svg {
                        let config_json = serde_json::to_string(&config).ok();
                        let desc = format!("{config:#?}");
                        let metadata = SvgMetadata {
                            title: Some(title),
                            description: Some(&desc),
                            config_json: config_json.as_deref(),
                        };
                        let svg =
                            artyshapes_export::to_svg(canvas.polygons(), dimensions, &metadata);
                        write_output(svg_path, svg.as_bytes(), "SVG");
                    }
                    if let Some(ref png_path) = cli.png {
                        match rasterize(&canvas) {
                            Ok(png) => write_output(png_path, &png, "PNG"),
                            Err(e) => log::error!("Error rendering PNG: {e}"),
                        }
                    }
                }

                all_diagnostics.push(diagnostics);
            }
            Err(e) => {
                eprintln!("Pipeline error: {e}");
                return ExitCode::FAILURE;
            }
        }
        canvas.dispose();

        if cli.runs > 1 {
            eprintln!();
        }
    }

    if cli.runs > 1 {
        print_multi_run_summary(&all_diagnostics);
    }

    ExitCode::SUCCESS
}

/// Replay the drawn polygons onto a raster canvas and encode it.
fn rasterize(canvas: &SvgCanvas) -> Result<Vec<u8>, artyshapes_pipeline::PipelineError> {
    let mut pixmap = PixmapCanvas::new(canvas.dimensions(), None)?;
    for polygon in canvas.polygons() {
        pixmap.add_polygon(polygon);
    }
    pixmap.encode_png()
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
type StageExtractor = fn(&PipelineDiagnostics) -> Duration;

/// Print aggregated statistics across multiple runs.
#[allow(clippy::cast_precision_loss)]
fn print_multi_run_summary(all_diagnostics: &[PipelineDiagnostics]) {
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
        ("Resize", |d| d.resize.duration),
        ("Label", |d| d.label.duration),
        ("Filter", |d| d.filter.duration),
        ("Color", |d| d.color.duration),
        ("Shape", |d| d.shape.duration),
        ("Draw", |d| d.draw.duration),
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
    fn progress_is_visible_without_flags() {
        assert_eq!(log_level(0), "info");
        assert_eq!(log_level(1), "debug");
        assert_eq!(log_level(5), "trace");
    }

    #[test]
    fn write_output_writes_bytes_and_survives_bad_paths() {
        let _ = env_logger::builder().is_test(true).try_init();
        let path = std::env::temp_dir().join(format!("artyshapes-{}.svg", std::process::id()));
        write_output(&path, b"<svg/>", "SVG");
        assert_eq!(std::fs::read(&path).unwrap(), b"<svg/>");
        std::fs::remove_file(&path).unwrap();

        // Logged, not fatal.
        write_output(Path::new("/nonexistent-dir/out.svg"), b"x", "SVG");
    }
}
