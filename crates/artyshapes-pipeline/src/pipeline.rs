//! Incremental pipeline: advance stage-by-stage, inspecting each
//! intermediate result before continuing.
//!
//! ```rust
//! # use artyshapes_pipeline::{Pipeline, PipelineConfig, PipelineError, VibrantExtractor};
//! # use artyshapes_pipeline::pipeline::Collaborators;
//! # use artyshapes_pipeline::render::CancelToken;
//! # fn run(map: image::RgbaImage) -> Result<(), PipelineError> {
//! let mut rng = rand::rng();
//! let mut collaborators = Collaborators {
//!     rng: &mut rng,
//!     extractor: &VibrantExtractor,
//! };
//! let shaped = Pipeline::new(map, None, PipelineConfig::default())
//!     .resize()?
//!     .label()
//!     .filter()
//!     .color(&mut collaborators, &CancelToken::never())?
//!     .shape();
//! println!("{} polygons", shaped.polygons().len());
//! # Ok(())
//! # }
//! ```
//!
//! Each stage method consumes `self` and returns the next state, so
//! stages cannot be skipped or reordered. Every state keeps the working
//! rasters and the configuration; the segment list is carried from
//! [`Labeled`] onward.

use std::fmt;

use rand::RngCore;

use crate::boundary::BoundaryExtractor;
use crate::color::{self, ColorContext, PaletteExtractor, SegmentColors};
use crate::config::PipelineConfig;
use crate::diagnostics::StageMetrics;
use crate::render::{CancelToken, Renderer};
use crate::segment::Segment;
use crate::types::{Dimensions, PipelineError, RenderablePolygon, RgbaImage};

/// External collaborators used by the color stage.
pub struct Collaborators<'a> {
    /// Randomness for the `mondrian` color mode.
    pub rng: &'a mut dyn RngCore,
    /// Palette extraction for the `vibrant` and `muted` color modes.
    pub extractor: &'a dyn PaletteExtractor,
}

impl fmt::Debug for Collaborators<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

/// What a completed run drew.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct RenderSummary {
    /// Size of the working raster, which is also the canvas size.
    pub dimensions: Dimensions,
    /// Segments found by the labeler.
    pub segment_count: usize,
    /// Segments dropped by the area threshold.
    pub discarded_count: usize,
    /// Polygons handed to the renderer.
    pub polygon_count: usize,
    /// Vertices across all drawn polygons.
    pub vertex_count: usize,
}

/// Size of the working raster for `segmentation` under `config`.
#[must_use]
pub fn working_dimensions(segmentation: &RgbaImage, config: &PipelineConfig) -> Dimensions {
    let native = Dimensions::of(segmentation);
    config
        .working_resolution
        .map_or(native, |cap| crate::raster::fit_within(native, cap))
}

// ───────────────────────── Stage 0: Pending ──────────────────────────

/// Pipeline state before any processing has occurred.
///
/// Call [`resize`](Self::resize) to validate the configuration and
/// produce the working rasters.
#[must_use = "pipeline stages are consumed by advancing — call .resize() to continue"]
pub struct Pending {
    config: PipelineConfig,
    segmentation: RgbaImage,
    source: Option<RgbaImage>,
}

impl Pending {
    #[must_use]
    pub const fn segmentation(&self) -> &RgbaImage {
        &self.segmentation
    }

    /// Validate the configuration and resample both rasters onto the
    /// working grid.
    ///
    /// The segmentation map is capped by `working_resolution`; the
    /// source image, when present, is resampled to exactly the same
    /// grid so that member coordinates address both. Without a source
    /// image the segmentation map doubles as the source.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidConfig`] if the configuration is
    /// out of range.
    pub fn resize(self) -> Result<Resized, PipelineError> {
        self.config.validate()?;
        let native = Dimensions::of(&self.segmentation);
        let dimensions = working_dimensions(&self.segmentation, &self.config);
        let segmentation = crate::raster::resize_nearest(&self.segmentation, dimensions);
        let source = match &self.source {
            Some(source) => crate::raster::resize_nearest(source, dimensions),
            None => segmentation.clone(),
        };
        log::debug!(
            "working raster {}x{} (segmentation {}x{})",
            dimensions.width,
            dimensions.height,
            native.width,
            native.height
        );
        Ok(Resized {
            config: self.config,
            segmentation,
            source,
            native,
            dimensions,
        })
    }
}

// ───────────────────────── Stage 1: Resized ──────────────────────────

/// Both rasters on the working grid. Call [`label`](Self::label) next.
#[must_use = "pipeline stages are consumed by advancing — call .label() to continue"]
pub struct Resized {
    config: PipelineConfig,
    segmentation: RgbaImage,
    source: RgbaImage,
    native: Dimensions,
    dimensions: Dimensions,
}

impl Resized {
    #[must_use]
    pub const fn segmentation(&self) -> &RgbaImage {
        &self.segmentation
    }

    #[must_use]
    pub const fn source(&self) -> &RgbaImage {
        &self.source
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub const fn metrics(&self) -> StageMetrics {
        StageMetrics::Resize {
            native_width: self.native.width,
            native_height: self.native.height,
            width: self.dimensions.width,
            height: self.dimensions.height,
        }
    }

    /// Run connected-component labeling on the segmentation map.
    pub fn label(self) -> Labeled {
        let segments = crate::ccl::label(&self.segmentation, &self.config.label_options());
        Labeled {
            config: self.config,
            segmentation: self.segmentation,
            source: self.source,
            dimensions: self.dimensions,
            segments,
        }
    }
}

// ───────────────────────── Stage 2: Labeled ──────────────────────────

/// Segments found by the labeler, in scan order. Call
/// [`filter`](Self::filter) next.
#[must_use = "pipeline stages are consumed by advancing — call .filter() to continue"]
pub struct Labeled {
    config: PipelineConfig,
    segmentation: RgbaImage,
    source: RgbaImage,
    dimensions: Dimensions,
    segments: Vec<Segment>,
}

impl Labeled {
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Label {
            connectivity: self.config.connectivity,
            segment_count: self.segments.len(),
            labeled_pixels: self.segments.iter().map(Segment::len).sum(),
        }
    }

    /// Drop segments below the area threshold and order the rest by
    /// bounding-box area, largest first.
    ///
    /// A segment is discarded when its bounding-box area is strictly
    /// below `discard_threshold` times the working raster's area. The
    /// sort is stable, so equal areas keep scan order. Drawing in this
    /// order paints large shapes first and smaller ones on top.
    pub fn filter(self) -> Filtered {
        let min_area = min_area(self.config.discard_threshold, self.dimensions);
        let total = self.segments.len();
        #[allow(clippy::cast_precision_loss)]
        let mut kept: Vec<Segment> = self
            .segments
            .into_iter()
            .filter(|s| s.bounds().area() as f64 >= min_area)
            .collect();
        kept.sort_by_key(|s| std::cmp::Reverse(s.bounds().area()));
        let discarded = total - kept.len();
        log::debug!(
            "filter: kept {} of {total} segments (min bbox area {min_area:.1})",
            kept.len()
        );
        Filtered {
            config: self.config,
            segmentation: self.segmentation,
            source: self.source,
            dimensions: self.dimensions,
            segments: kept,
            discarded,
            min_area,
        }
    }
}

#[allow(clippy::cast_precision_loss)]
fn min_area(threshold: f64, dimensions: Dimensions) -> f64 {
    threshold * dimensions.area() as f64
}

// ───────────────────────── Stage 3: Filtered ─────────────────────────

/// Segments to draw, in draw order. Call [`color`](Self::color) next.
#[must_use = "pipeline stages are consumed by advancing — call .color() to continue"]
pub struct Filtered {
    config: PipelineConfig,
    segmentation: RgbaImage,
    source: RgbaImage,
    dimensions: Dimensions,
    segments: Vec<Segment>,
    discarded: usize,
    min_area: f64,
}

impl Filtered {
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub const fn discarded_count(&self) -> usize {
        self.discarded
    }

    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Filter {
            threshold: self.config.discard_threshold,
            min_area: self.min_area,
            kept: self.segments.len(),
            discarded: self.discarded,
        }
    }

    /// Assign one color per segment under the configured color mode.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedColor`] if the palette extractor
    /// returns an unparseable swatch and [`PipelineError::Superseded`] if
    /// `cancel` fires while palettes are being extracted.
    pub fn color(
        self,
        collaborators: &mut Collaborators<'_>,
        cancel: &CancelToken,
    ) -> Result<Colored, PipelineError> {
        let mut ctx = ColorContext {
            source: &self.source,
            cluster: self.config.cluster,
            rng: &mut *collaborators.rng,
            extractor: collaborators.extractor,
            cancel,
        };
        let colors = color::assign(&self.segments, self.config.color_mode, &mut ctx)?;
        Ok(Colored {
            config: self.config,
            segmentation: self.segmentation,
            source: self.source,
            dimensions: self.dimensions,
            segments: self.segments,
            discarded: self.discarded,
            colors,
        })
    }
}

// ───────────────────────── Stage 4: Colored ──────────────────────────

/// Segments with their assigned colors. Call [`shape`](Self::shape)
/// next.
#[must_use = "pipeline stages are consumed by advancing — call .shape() to continue"]
pub struct Colored {
    config: PipelineConfig,
    segmentation: RgbaImage,
    source: RgbaImage,
    dimensions: Dimensions,
    segments: Vec<Segment>,
    discarded: usize,
    colors: SegmentColors,
}

impl Colored {
    #[must_use]
    pub const fn colors(&self) -> &SegmentColors {
        &self.colors
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Color {
            mode: self.config.color_mode,
            colored: self.colors.len(),
            skipped: self.segments.len() - self.colors.len(),
        }
    }

    /// Extract and simplify one polygon per colored segment, keeping
    /// draw order. Segments without a color are skipped.
    pub fn shape(self) -> Shaped {
        let mut polygons = Vec::with_capacity(self.colors.len());
        let mut vertices_before = 0usize;
        for segment in &self.segments {
            let Some(&fill) = self.colors.get(&segment.id()) else {
                continue;
            };
            let boundary = self
                .config
                .shape_mode
                .extract(segment, self.config.concavity);
            vertices_before += boundary.len();
            let polygon = crate::simplify::simplify(&boundary, self.config.simplify_tolerance);
            log::trace!(
                "segment {:?}: {} -> {} vertices",
                segment.id(),
                boundary.len(),
                polygon.len()
            );
            polygons.push(RenderablePolygon {
                polygon,
                fill,
                stroke_width: self.config.stroke_width,
                stroke: self.config.stroke_color,
            });
        }
        Shaped {
            config: self.config,
            segmentation: self.segmentation,
            source: self.source,
            dimensions: self.dimensions,
            segment_count: self.segments.len(),
            discarded: self.discarded,
            polygons,
            vertices_before,
        }
    }
}

// ───────────────────────── Stage 5: Shaped ───────────────────────────

/// Styled polygons ready for a renderer.
pub struct Shaped {
    config: PipelineConfig,
    segmentation: RgbaImage,
    source: RgbaImage,
    dimensions: Dimensions,
    segment_count: usize,
    discarded: usize,
    polygons: Vec<RenderablePolygon>,
    vertices_before: usize,
}

impl Shaped {
    #[must_use]
    pub fn polygons(&self) -> &[RenderablePolygon] {
        &self.polygons
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub const fn segmentation(&self) -> &RgbaImage {
        &self.segmentation
    }

    #[must_use]
    pub const fn source(&self) -> &RgbaImage {
        &self.source
    }

    fn vertex_count(&self) -> usize {
        self.polygons.iter().map(|p| p.polygon.len()).sum()
    }

    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics::Shape {
            mode: self.config.shape_mode,
            tolerance: self.config.simplify_tolerance,
            polygon_count: self.polygons.len(),
            vertices_before: self.vertices_before,
            vertices_after: self.vertex_count(),
        }
    }

    /// Summary of this run without drawing.
    #[must_use]
    pub fn summary(&self) -> RenderSummary {
        RenderSummary {
            dimensions: self.dimensions,
            segment_count: self.segment_count + self.discarded,
            discarded_count: self.discarded,
            polygon_count: self.polygons.len(),
            vertex_count: self.vertex_count(),
        }
    }

    /// Hand every polygon to `renderer` in draw order.
    pub fn draw<R: Renderer + ?Sized>(&self, renderer: &mut R) -> RenderSummary {
        for polygon in &self.polygons {
            renderer.add_polygon(polygon);
        }
        self.summary()
    }

    /// Consume the stage, keeping only the polygons.
    #[must_use]
    pub fn into_polygons(self) -> Vec<RenderablePolygon> {
        self.polygons
    }
}

// ───────────────────── Pipeline entry point ──────────────────────────

/// Incremental render pipeline.
///
/// Created via [`Pipeline::new`], which stores the rasters and config
/// without doing any processing.
pub struct Pipeline;

impl Pipeline {
    /// Create a pipeline over a segmentation map and an optional source
    /// image.
    ///
    /// The source image may have any size; it is resampled onto the
    /// segmentation map's working grid.
    #[allow(clippy::new_ret_no_self)]
    pub const fn new(
        segmentation: RgbaImage,
        source: Option<RgbaImage>,
        config: PipelineConfig,
    ) -> Pending {
        Pending {
            config,
            segmentation,
            source,
        }
    }
}

/// Run the whole pipeline and draw the result into `renderer`.
///
/// # Errors
///
/// Returns [`PipelineError::InvalidConfig`] for an out-of-range
/// configuration and [`PipelineError::MalformedColor`] for an
/// unparseable palette swatch. Per-segment problems never abort a run.
pub fn draw_segments<R: Renderer + ?Sized>(
    segmentation: &RgbaImage,
    source: Option<&RgbaImage>,
    config: &PipelineConfig,
    collaborators: &mut Collaborators<'_>,
    renderer: &mut R,
) -> Result<RenderSummary, PipelineError> {
    draw_segments_cancellable(
        segmentation,
        source,
        config,
        collaborators,
        renderer,
        &CancelToken::never(),
    )
}

/// [`draw_segments`] that stops with [`PipelineError::Superseded`] if
/// `cancel` fires before drawing starts.
///
/// # Errors
///
/// See [`draw_segments`].
pub fn draw_segments_cancellable<R: Renderer + ?Sized>(
    segmentation: &RgbaImage,
    source: Option<&RgbaImage>,
    config: &PipelineConfig,
    collaborators: &mut Collaborators<'_>,
    renderer: &mut R,
    cancel: &CancelToken,
) -> Result<RenderSummary, PipelineError> {
    let shaped = Pipeline::new(segmentation.clone(), source.cloned(), config.clone())
        .resize()?
        .label()
        .filter()
        .color(collaborators, cancel)?
        .shape();
    if cancel.is_cancelled() {
        return Err(PipelineError::Superseded);
    }
    Ok(shaped.draw(renderer))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use image::Rgba;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;
    use crate::boundary::ShapeMode;
    use crate::color::{ColorMode, VibrantExtractor};
    use crate::render::tests::{RecordingRenderer, RecordingSurface};
    use crate::render::{RenderSession, RenderSurface};
    use crate::types::{Point, Rgb};

    const RED: Rgba<u8> = Rgba([255, 0, 0, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    fn red_block_on_black() -> RgbaImage {
        RgbaImage::from_fn(4, 4, |x, y| if x < 2 && y < 2 { RED } else { BLACK })
    }

    fn with_collaborators<T>(f: impl FnOnce(&mut Collaborators<'_>) -> T) -> T {
        let mut rng = StdRng::seed_from_u64(1);
        let mut collaborators = Collaborators {
            rng: &mut rng,
            extractor: &VibrantExtractor,
        };
        f(&mut collaborators)
    }

    #[test]
    fn stages_expose_intermediates() {
        let shaped = with_collaborators(|c| {
            let labeled = Pipeline::new(red_block_on_black(), None, PipelineConfig::default())
                .resize()
                .unwrap()
                .label();
            assert_eq!(labeled.segments().len(), 2);
            let filtered = labeled.filter();
            assert_eq!(filtered.discarded_count(), 0);
            // Black bbox (3x3) sorts before red bbox (1x1).
            assert_eq!(filtered.segments()[0].label_color(), Rgb::BLACK);
            let colored = filtered.color(c, &CancelToken::never()).unwrap();
            assert_eq!(colored.colors().len(), 2);
            colored.shape()
        });
        assert_eq!(shaped.polygons().len(), 2);
        assert_eq!(shaped.polygons()[0].fill, Rgb::BLACK);
        assert_eq!(shaped.polygons()[1].fill, Rgb::new(255, 0, 0));
        assert_eq!(
            shaped.polygons()[1].polygon.points(),
            &[
                Point::new(0.0, 0.0),
                Point::new(1.0, 0.0),
                Point::new(1.0, 1.0),
                Point::new(0.0, 1.0),
            ]
        );
    }

    #[test]
    fn discard_threshold_scales_with_image_area() {
        // 100x100: one 20x20 red square (bbox area 19*19 = 361), one 5x5
        // blue square (bbox area 16), rest black.
        let img = RgbaImage::from_fn(100, 100, |x, y| {
            if x < 20 && y < 20 {
                RED
            } else if (50..55).contains(&x) && (50..55).contains(&y) {
                Rgba([0, 0, 255, 255])
            } else {
                BLACK
            }
        });
        let config = PipelineConfig {
            discard_threshold: 0.01,
            ..PipelineConfig::default()
        };
        let filtered = Pipeline::new(img, None, config)
            .resize()
            .unwrap()
            .label()
            .filter();
        assert_eq!(filtered.discarded_count(), 1);
        assert!(
            filtered
                .segments()
                .iter()
                .all(|s| s.bounds().area() >= 100)
        );
    }

    #[test]
    fn invalid_config_is_reported_before_work() {
        let config = PipelineConfig {
            stroke_width: 30.0,
            ..PipelineConfig::default()
        };
        let result = Pipeline::new(red_block_on_black(), None, config).resize();
        assert!(matches!(result, Err(PipelineError::InvalidConfig(_))));
    }

    #[test]
    fn source_image_is_resampled_to_working_grid() {
        let source = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 255]));
        let resized = Pipeline::new(red_block_on_black(), Some(source), PipelineConfig::default())
            .resize()
            .unwrap();
        assert_eq!(resized.source().dimensions(), (4, 4));
    }

    #[test]
    fn working_resolution_caps_segmentation() {
        let config = PipelineConfig {
            working_resolution: Some(2),
            ..PipelineConfig::default()
        };
        let labeled = Pipeline::new(red_block_on_black(), None, config)
            .resize()
            .unwrap()
            .label();
        // 2x2 grid: one red pixel, three black.
        assert_eq!(labeled.segments().len(), 2);
    }

    #[test]
    fn draw_segments_styles_every_polygon() {
        let config = PipelineConfig {
            color_mode: ColorMode::Segmentation,
            shape_mode: ShapeMode::Convex,
            stroke_width: 2.5,
            stroke_color: Rgb::new(1, 2, 3),
            ..PipelineConfig::default()
        };
        let mut renderer = RecordingRenderer::default();
        let summary = with_collaborators(|c| {
            draw_segments(&red_block_on_black(), None, &config, c, &mut renderer).unwrap()
        });
        assert_eq!(summary.segment_count, 2);
        assert_eq!(summary.polygon_count, 2);
        assert_eq!(renderer.polygons.len(), 2);
        for polygon in &renderer.polygons {
            assert!((polygon.stroke_width - 2.5).abs() < f64::EPSILON);
            assert_eq!(polygon.stroke, Rgb::new(1, 2, 3));
        }
    }

    #[test]
    fn empty_raster_draws_nothing() {
        let mut renderer = RecordingRenderer::default();
        let summary = with_collaborators(|c| {
            draw_segments(
                &RgbaImage::new(0, 0),
                None,
                &PipelineConfig::default(),
                c,
                &mut renderer,
            )
            .unwrap()
        });
        assert_eq!(summary.polygon_count, 0);
        assert!(renderer.polygons.is_empty());
    }

    #[test]
    fn session_keeps_latest_renderer() {
        let mut session = RenderSession::new(RecordingSurface::default());
        with_collaborators(|c| {
            session
                .render(&red_block_on_black(), None, &PipelineConfig::default(), c)
                .unwrap();
            session
                .render(&red_block_on_black(), None, &PipelineConfig::default(), c)
                .unwrap();
        });
        assert_eq!(session.surface().created, 2);
        assert_eq!(session.renderer().unwrap().polygons.len(), 2);
    }

    #[test]
    fn session_reports_unavailable_surface() {
        let mut session = RenderSession::new(RecordingSurface::default());
        let result = with_collaborators(|c| {
            session.render(&RgbaImage::new(0, 0), None, &PipelineConfig::default(), c)
        });
        assert!(matches!(
            result,
            Err(PipelineError::RenderSurfaceUnavailable(_))
        ));
        assert!(session.renderer().is_none());
    }

    /// Supersedes the session on its first extraction.
    struct InterruptingExtractor(crate::render::SessionHandle);

    impl PaletteExtractor for InterruptingExtractor {
        fn extract(&self, _png: &[u8]) -> Result<color::Swatches, PipelineError> {
            self.0.invalidate();
            Ok(color::Swatches::from([(
                color::swatch::VIBRANT.to_owned(),
                "#123456".to_owned(),
            )]))
        }
    }

    #[test]
    fn late_palette_results_are_discarded() {
        let mut session = RenderSession::new(RecordingSurface::default());
        let extractor = InterruptingExtractor(session.handle());
        let mut rng = StdRng::seed_from_u64(1);
        let mut collaborators = Collaborators {
            rng: &mut rng,
            extractor: &extractor,
        };
        let config = PipelineConfig {
            color_mode: ColorMode::Vibrant,
            ..PipelineConfig::default()
        };
        let result = session.render(&red_block_on_black(), None, &config, &mut collaborators);
        assert!(matches!(result, Err(PipelineError::Superseded)));
        assert!(session.renderer().is_none());
    }

    #[test]
    fn recording_surface_rejects_zero_size() {
        let mut surface = RecordingSurface::default();
        assert!(
            surface
                .create(Dimensions {
                    width: 0,
                    height: 0
                })
                .is_err()
        );
    }
}
