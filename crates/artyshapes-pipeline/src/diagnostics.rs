//! Pipeline diagnostics: timing, counts, and other metrics for each stage.
//!
//! [`render_with_diagnostics`] runs the staged pipeline and records a
//! [`StageDiagnostics`] for every step. Timestamps come from a caller
//! supplied [`Clock`], so this crate never reads the system time itself.
//!
//! Durations are serialized as fractional seconds (`f64`) for JSON
//! compatibility, since `std::time::Duration` does not implement serde
//! traits.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::boundary::ShapeMode;
use crate::ccl::Connectivity;
use crate::color::ColorMode;
use crate::config::PipelineConfig;
use crate::pipeline::{Collaborators, Pipeline, RenderSummary};
use crate::render::{CancelToken, Renderer};
use crate::types::{PipelineError, RgbaImage};

/// Source of timestamps for stage timing.
pub trait Clock {
    type Instant;

    fn now(&self) -> Self::Instant;

    fn elapsed(&self, since: &Self::Instant) -> Duration;
}

/// Serde support for `std::time::Duration` as fractional seconds.
mod duration_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        duration.as_secs_f64().serialize(serializer)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(|_| {
            serde::de::Error::custom(
                "duration seconds must be finite, non-negative, and representable as a Duration",
            )
        })
    }
}

/// Diagnostics collected from a single pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineDiagnostics {
    /// Stage 1: validation and resampling onto the working grid.
    pub resize: StageDiagnostics,
    /// Stage 2: connected-component labeling.
    pub label: StageDiagnostics,
    /// Stage 3: area filter and draw-order sort.
    pub filter: StageDiagnostics,
    /// Stage 4: color assignment.
    pub color: StageDiagnostics,
    /// Stage 5: boundary extraction and simplification.
    pub shape: StageDiagnostics,
    /// Stage 6: handing polygons to the renderer.
    pub draw: StageDiagnostics,
    #[serde(with = "duration_serde")]
    pub total_duration: Duration,
    pub summary: PipelineSummary,
}

/// Diagnostics for a single pipeline stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StageDiagnostics {
    #[serde(with = "duration_serde")]
    pub duration: Duration,
    pub metrics: StageMetrics,
}

/// Stage-specific metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StageMetrics {
    Resize {
        native_width: u32,
        native_height: u32,
        width: u32,
        height: u32,
    },
    Label {
        connectivity: Connectivity,
        segment_count: usize,
        /// Pixels that ended up in some segment; background pixels are
        /// not counted.
        labeled_pixels: usize,
    },
    Filter {
        threshold: f64,
        /// Smallest bounding-box area that survives, in square pixels.
        min_area: f64,
        kept: usize,
        discarded: usize,
    },
    Color {
        mode: ColorMode,
        colored: usize,
        skipped: usize,
    },
    Shape {
        mode: ShapeMode,
        tolerance: f64,
        polygon_count: usize,
        vertices_before: usize,
        vertices_after: usize,
    },
    Draw {
        polygon_count: usize,
        vertex_count: usize,
    },
}

/// High-level summary counts for the entire pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSummary {
    pub image_width: u32,
    pub image_height: u32,
    pub pixel_count: u64,
    pub segment_count: usize,
    pub discarded_count: usize,
    pub polygon_count: usize,
    pub vertex_count: usize,
}

impl PipelineSummary {
    fn from_render(summary: &RenderSummary) -> Self {
        Self {
            image_width: summary.dimensions.width,
            image_height: summary.dimensions.height,
            pixel_count: summary.dimensions.area(),
            segment_count: summary.segment_count,
            discarded_count: summary.discarded_count,
            polygon_count: summary.polygon_count,
            vertex_count: summary.vertex_count,
        }
    }
}

impl PipelineDiagnostics {
    fn stages(&self) -> [(&'static str, &StageDiagnostics); 6] {
        [
            ("Resize", &self.resize),
            ("Label", &self.label),
            ("Filter", &self.filter),
            ("Color", &self.color),
            ("Shape", &self.shape),
            ("Draw", &self.draw),
        ]
    }

    /// Format diagnostics as a human-readable report.
    #[must_use]
    pub fn report(&self) -> String {
        let mut lines = Vec::new();

        lines.push(format!("Pipeline Diagnostics Report\n{}", "=".repeat(60)));
        lines.push(format!(
            "Working raster: {}x{} ({} pixels)",
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
        for (name, diag) in self.stages() {
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
            "Segments: {} ({} discarded)  |  Polygons: {}  |  Vertices: {}",
            self.summary.segment_count,
            self.summary.discarded_count,
            self.summary.polygon_count,
            self.summary.vertex_count,
        ));

        lines.join("\n")
    }
}

/// Convert a `Duration` to milliseconds as `f64`.
fn duration_ms(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

/// Format stage metrics into a compact detail string.
fn format_metrics(metrics: &StageMetrics) -> String {
    match metrics {
        StageMetrics::Resize {
            native_width,
            native_height,
            width,
            height,
        } => format!("{native_width}x{native_height} -> {width}x{height}"),
        StageMetrics::Label {
            connectivity,
            segment_count,
            labeled_pixels,
        } => {
            let n = match connectivity {
                Connectivity::Four => 4,
                Connectivity::Eight => 8,
            };
            format!("{n}-connected, {segment_count} segments over {labeled_pixels} px")
        }
        StageMetrics::Filter {
            threshold,
            min_area,
            kept,
            discarded,
        } => format!(
            "threshold={threshold:.3} (min {min_area:.1} px²) kept={kept} discarded={discarded}"
        ),
        StageMetrics::Color {
            mode,
            colored,
            skipped,
        } => format!("{mode} colored={colored} skipped={skipped}"),
        StageMetrics::Shape {
            mode,
            tolerance,
            polygon_count,
            vertices_before,
            vertices_after,
        } => {
            #[allow(clippy::cast_precision_loss)]
            let reduction = if *vertices_before > 0 {
                (1.0 - *vertices_after as f64 / *vertices_before as f64) * 100.0
            } else {
                0.0
            };
            format!(
                "{mode} {polygon_count} polys, tol={tolerance:.2} {vertices_before}->{vertices_after} pts ({reduction:.1}% reduction)"
            )
        }
        StageMetrics::Draw {
            polygon_count,
            vertex_count,
        } => format!("{polygon_count} polys, {vertex_count} pts"),
    }
}

/// Run the pipeline into `renderer`, timing every stage with `clock`.
///
/// # Errors
///
/// Same as [`draw_segments`](crate::draw_segments).
pub fn render_with_diagnostics<C: Clock, R: Renderer + ?Sized>(
    segmentation: &RgbaImage,
    source: Option<&RgbaImage>,
    config: &PipelineConfig,
    collaborators: &mut Collaborators<'_>,
    renderer: &mut R,
    clock: &C,
) -> Result<(RenderSummary, PipelineDiagnostics), PipelineError> {
    let total_start = clock.now();

    let start = clock.now();
    let resized = Pipeline::new(segmentation.clone(), source.cloned(), config.clone()).resize()?;
    let resize = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: resized.metrics(),
    };

    let start = clock.now();
    let labeled = resized.label();
    let label = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: labeled.metrics(),
    };

    let start = clock.now();
    let filtered = labeled.filter();
    let filter = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: filtered.metrics(),
    };

    let start = clock.now();
    let colored = filtered.color(collaborators, &CancelToken::never())?;
    let color = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: colored.metrics(),
    };

    let start = clock.now();
    let shaped = colored.shape();
    let shape = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: shaped.metrics(),
    };

    let start = clock.now();
    let summary = shaped.draw(renderer);
    let draw = StageDiagnostics {
        duration: clock.elapsed(&start),
        metrics: StageMetrics::Draw {
            polygon_count: summary.polygon_count,
            vertex_count: summary.vertex_count,
        },
    };

    let diagnostics = PipelineDiagnostics {
        resize,
        label,
        filter,
        color,
        shape,
        draw,
        total_duration: clock.elapsed(&total_start),
        summary: PipelineSummary::from_render(&summary),
    };
    Ok((summary, diagnostics))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::cell::Cell;

    use image::Rgba;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::color::VibrantExtractor;
    use crate::render::tests::RecordingRenderer;

    /// Advances one millisecond per reading.
    struct StepClock(Cell<u64>);

    impl Clock for StepClock {
        type Instant = u64;

        fn now(&self) -> u64 {
            let t = self.0.get();
            self.0.set(t + 1);
            t
        }

        fn elapsed(&self, since: &u64) -> Duration {
            Duration::from_millis(self.0.get() - since)
        }
    }

    fn run() -> (RenderSummary, PipelineDiagnostics, RecordingRenderer) {
        let map = RgbaImage::from_fn(4, 4, |x, y| {
            if x < 2 && y < 2 {
                Rgba([255, 0, 0, 255])
            } else {
                Rgba([0, 0, 0, 255])
            }
        });
        let mut rng = StdRng::seed_from_u64(3);
        let mut collaborators = Collaborators {
            rng: &mut rng,
            extractor: &VibrantExtractor,
        };
        let mut renderer = RecordingRenderer::default();
        let (summary, diagnostics) = render_with_diagnostics(
            &map,
            None,
            &PipelineConfig::default(),
            &mut collaborators,
            &mut renderer,
            &StepClock(Cell::new(0)),
        )
        .unwrap();
        (summary, diagnostics, renderer)
    }

    #[test]
    fn duration_ms_converts_correctly() {
        let d = Duration::from_millis(1234);
        assert!((duration_ms(d) - 1234.0).abs() < 0.01);
    }

    #[test]
    fn every_stage_is_timed() {
        let (_, diagnostics, _) = run();
        for (name, stage) in diagnostics.stages() {
            assert!(stage.duration > Duration::ZERO, "{name} not timed");
        }
        assert!(diagnostics.total_duration >= diagnostics.draw.duration * 6);
    }

    #[test]
    fn summary_matches_renderer() {
        let (summary, diagnostics, renderer) = run();
        assert_eq!(summary.polygon_count, renderer.polygons.len());
        assert_eq!(diagnostics.summary.segment_count, 2);
        assert_eq!(diagnostics.summary.polygon_count, 2);
        assert_eq!(diagnostics.summary.vertex_count, 8);
        assert_eq!(
            diagnostics.label.metrics,
            StageMetrics::Label {
                connectivity: Connectivity::Four,
                segment_count: 2,
                labeled_pixels: 16,
            }
        );
    }

    #[test]
    fn report_lists_every_stage() {
        let (_, diagnostics, _) = run();
        let report = diagnostics.report();
        for name in ["Resize", "Label", "Filter", "Color", "Shape", "Draw"] {
            assert!(report.contains(name), "missing {name} in report");
        }
        assert!(report.contains("Polygons: 2"));
    }

    #[test]
    fn diagnostics_serialize_durations_as_seconds() {
        let (_, diagnostics, _) = run();
        let json = serde_json::to_value(&diagnostics).unwrap();
        assert!(json["total_duration"].as_f64().unwrap() > 0.0);
        assert_eq!(json["color"]["metrics"]["Color"]["mode"], "average");

        let back: PipelineDiagnostics = serde_json::from_value(json).unwrap();
        assert_eq!(back.total_duration, diagnostics.total_duration);
    }

    #[test]
    fn negative_duration_is_rejected() {
        let json = r#"{"duration": -1.0, "metrics": {"Draw": {"polygon_count": 0, "vertex_count": 0}}}"#;
        assert!(serde_json::from_str::<StageDiagnostics>(json).is_err());
    }
}
