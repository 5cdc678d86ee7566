//! Raster preview renderer.
//!
//! Fills and strokes polygons onto a `tiny-skia` pixmap with
//! anti-aliasing. The canvas also keeps the polygons it was given, so
//! it can export the same drawing as SVG.

use image::{Rgba, RgbaImage};
use tiny_skia::{Color, FillRule, Paint, PathBuilder, Pixmap, Stroke, Transform};

use artyshapes_pipeline::render::{RenderSurface, Renderer};
use artyshapes_pipeline::{Dimensions, PipelineError, Polygon, RenderablePolygon, Rgb};

use crate::svg::{SvgMetadata, to_svg};

/// A [`Renderer`] that rasterizes into an RGBA pixmap.
pub struct PixmapCanvas {
    pixmap: Pixmap,
    background: Option<Rgb>,
    polygons: Vec<RenderablePolygon>,
}

impl PixmapCanvas {
    /// Create a canvas cleared to `background`, or transparent.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::RenderSurfaceUnavailable`] if either
    /// dimension is zero.
    pub fn new(dimensions: Dimensions, background: Option<Rgb>) -> Result<Self, PipelineError> {
        let pixmap = Pixmap::new(dimensions.width, dimensions.height).ok_or_else(|| {
            PipelineError::RenderSurfaceUnavailable(format!(
                "cannot allocate a {}x{} pixmap",
                dimensions.width, dimensions.height
            ))
        })?;
        let mut canvas = Self {
            pixmap,
            background,
            polygons: Vec::new(),
        };
        canvas.clear();
        Ok(canvas)
    }

    #[must_use]
    pub fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.pixmap.width(),
            height: self.pixmap.height(),
        }
    }

    fn clear(&mut self) {
        let color = self
            .background
            .map_or(Color::TRANSPARENT, |bg| Color::from_rgba8(bg.r, bg.g, bg.b, 255));
        self.pixmap.fill(color);
    }

    /// Convert the pixmap (premultiplied RGBA) to an `RgbaImage`
    /// (straight RGBA).
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_rgba_image(&self) -> RgbaImage {
        let data = self.pixmap.data();
        let mut img = RgbaImage::new(self.pixmap.width(), self.pixmap.height());
        for (i, pixel) in img.pixels_mut().enumerate() {
            let off = i * 4;
            let a = data[off + 3];
            if a == 0 {
                *pixel = Rgba([0, 0, 0, 0]);
            } else {
                let un = |c: u8| (u16::from(c) * 255 / u16::from(a)) as u8;
                *pixel = Rgba([un(data[off]), un(data[off + 1]), un(data[off + 2]), a]);
            }
        }
        img
    }

    /// Encode the drawing as PNG bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::Image`] if encoding fails.
    pub fn encode_png(&self) -> Result<Vec<u8>, PipelineError> {
        artyshapes_pipeline::raster::encode_png(&self.to_rgba_image())
    }
}

#[allow(clippy::cast_possible_truncation)]
fn build_path(polygon: &Polygon) -> Option<tiny_skia::Path> {
    let (first, rest) = polygon.points().split_first()?;
    let mut pb = PathBuilder::new();
    pb.move_to(first.x as f32, first.y as f32);
    for p in rest {
        pb.line_to(p.x as f32, p.y as f32);
    }
    pb.close();
    pb.finish()
}

fn paint(color: Rgb) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r, color.g, color.b, 255);
    paint.anti_alias = true;
    paint
}

impl Renderer for PixmapCanvas {
    #[allow(clippy::cast_possible_truncation)]
    fn add_polygon(&mut self, styled: &RenderablePolygon) {
        self.polygons.push(styled.clone());

        // Empty or degenerate rings may not form a path.
        let Some(path) = build_path(&styled.polygon) else {
            log::trace!("skipping degenerate polygon in raster preview");
            return;
        };
        self.pixmap.fill_path(
            &path,
            &paint(styled.fill),
            FillRule::Winding,
            Transform::identity(),
            None,
        );
        // tiny-skia treats a zero width as a hairline.
        if styled.stroke_width > 0.0 {
            let stroke = Stroke {
                width: styled.stroke_width as f32,
                ..Stroke::default()
            };
            self.pixmap.stroke_path(
                &path,
                &paint(styled.stroke),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    fn export_svg(&self) -> String {
        to_svg(&self.polygons, self.dimensions(), &SvgMetadata::default())
    }

    fn dispose(&mut self) {
        self.polygons.clear();
        self.clear();
    }
}

/// Creates a [`PixmapCanvas`] per render.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixmapSurface {
    pub background: Option<Rgb>,
}

impl RenderSurface for PixmapSurface {
    type Renderer = PixmapCanvas;

    fn create(&mut self, dimensions: Dimensions) -> Result<PixmapCanvas, PipelineError> {
        if dimensions.is_empty() {
            return Err(PipelineError::RenderSurfaceUnavailable(
                "canvas not ready yet".to_owned(),
            ));
        }
        PixmapCanvas::new(dimensions, self.background)
    }
}
