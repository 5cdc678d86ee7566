//! SVG export serializer.
//!
//! Converts styled polygons into an SVG string with one closed `<path>`
//! element per polygon, using the [`svg`] crate for document
//! construction, XML escaping, and path data formatting. Paths are
//! emitted in draw order, so later polygons paint over earlier ones.
//!
//! Optional [`SvgMetadata`] embeds `<title>` and `<desc>` elements for
//! accessibility and to help file managers identify exported files.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Path, Title};
use svg::node::{Node, Text, Value};

use artyshapes_pipeline::render::{RenderSurface, Renderer};
use artyshapes_pipeline::{Dimensions, PipelineError, Polygon, RenderablePolygon};

/// Metadata to embed in the SVG document.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Emitted as `<title>`; typically the source image filename.
    pub title: Option<&'a str>,

    /// Emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized pipeline configuration, emitted inside `<metadata>`
    /// so exported files carry their settings.
    pub config_json: Option<&'a str>,
}

/// Build an SVG path `d` attribute string for a closed polygon.
///
/// Uses `M` for the first vertex, `L` for the rest, and `Z` to close.
/// Returns an empty string for a polygon with no vertices.
///
/// # Examples
///
/// ```
/// use artyshapes_pipeline::{Point, Polygon};
/// use artyshapes_export::build_path_data;
///
/// let triangle = Polygon::new(vec![
///     Point::new(0.0, 0.0),
///     Point::new(4.0, 0.0),
///     Point::new(0.0, 3.0),
/// ]);
/// assert_eq!(build_path_data(&triangle), "M0,0 L4,0 L0,3 z");
/// ```
#[must_use]
pub fn build_path_data(polygon: &Polygon) -> String {
    let Some((first, rest)) = polygon.points().split_first() else {
        return String::new();
    };
    let mut data = Data::new().move_to((first.x, first.y));
    for p in rest {
        data = data.line_to((p.x, p.y));
    }
    String::from(Value::from(data.close()))
}

/// Serialize polygons into an SVG document sized to `dimensions`.
///
/// The `viewBox` is the working raster's pixel grid, so polygon
/// coordinates are used as-is.
#[must_use]
pub fn to_svg(
    polygons: &[RenderablePolygon],
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }

    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }

    if let Some(config_json) = metadata.config_json {
        let mut config_el = Element::new("artyshapes:config");
        config_el.assign("xmlns:artyshapes", "https://artyshapes.app/ns/1");
        config_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(config_el);
        doc = doc.add(metadata_el);
    }

    for styled in polygons {
        let d = build_path_data(&styled.polygon);
        if d.is_empty() {
            continue;
        }
        let path = Path::new()
            .set("d", d)
            .set("fill", styled.fill.to_hex())
            .set("stroke", styled.stroke.to_hex())
            .set("stroke-width", styled.stroke_width);
        doc = doc.add(path);
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

/// A [`Renderer`] that collects polygons and serializes them on demand.
#[derive(Debug, Clone)]
pub struct SvgCanvas {
    dimensions: Dimensions,
    title: Option<String>,
    polygons: Vec<RenderablePolygon>,
}

impl SvgCanvas {
    #[must_use]
    pub const fn new(dimensions: Dimensions) -> Self {
        Self {
            dimensions,
            title: None,
            polygons: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    #[must_use]
    pub const fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    #[must_use]
    pub fn polygons(&self) -> &[RenderablePolygon] {
        &self.polygons
    }
}

impl Renderer for SvgCanvas {
    fn add_polygon(&mut self, polygon: &RenderablePolygon) {
        self.polygons.push(polygon.clone());
    }

    fn export_svg(&self) -> String {
        let metadata = SvgMetadata {
            title: self.title.as_deref(),
            ..SvgMetadata::default()
        };
        to_svg(&self.polygons, self.dimensions, &metadata)
    }

    fn dispose(&mut self) {
        self.polygons.clear();
    }
}

/// Creates an [`SvgCanvas`] per render.
#[derive(Debug, Clone, Default)]
pub struct SvgSurface {
    pub title: Option<String>,
}

impl RenderSurface for SvgSurface {
    type Renderer = SvgCanvas;

    fn create(&mut self, dimensions: Dimensions) -> Result<SvgCanvas, PipelineError> {
        if dimensions.is_empty() {
            return Err(PipelineError::RenderSurfaceUnavailable(
                "canvas not ready yet".to_owned(),
            ));
        }
        let canvas = SvgCanvas::new(dimensions);
        Ok(match &self.title {
            Some(title) => canvas.with_title(title.clone()),
            None => canvas,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use artyshapes_pipeline::{Point, Rgb};

    use super::*;

    fn square(x: f64, fill: Rgb) -> RenderablePolygon {
        RenderablePolygon {
            polygon: Polygon::new(vec![
                Point::new(x, 0.0),
                Point::new(x + 2.0, 0.0),
                Point::new(x + 2.0, 2.0),
                Point::new(x, 2.0),
            ]),
            fill,
            stroke_width: 1.5,
            stroke: Rgb::BLACK,
        }
    }

    const DIMS: Dimensions = Dimensions {
        width: 10,
        height: 8,
    };

    #[test]
    fn document_uses_pixel_viewbox() {
        let svg = to_svg(&[], DIMS, &SvgMetadata::default());
        assert!(svg.starts_with("<?xml"));
        assert!(svg.contains(r#"viewBox="0 0 10 8""#));
        assert!(svg.contains(r#"width="10""#));
        assert!(svg.contains("<svg"));
        assert!(!svg.contains("<path"));

        let svg = to_svg(&[square(0.0, Rgb::WHITE)], DIMS, &SvgMetadata::default());
        assert!(svg.trim_end().ends_with("</svg>"));
    }

    #[test]
    fn paths_carry_style_in_draw_order() {
        let svg = to_svg(
            &[
                square(0.0, Rgb::new(255, 0, 0)),
                square(5.0, Rgb::new(0, 0, 255)),
            ],
            DIMS,
            &SvgMetadata::default(),
        );
        assert_eq!(svg.matches("<path").count(), 2);
        let red = svg.find("#ff0000").unwrap();
        let blue = svg.find("#0000ff").unwrap();
        assert!(red < blue);
        assert!(svg.contains(r##"stroke="#000000""##));
        assert!(svg.contains(r#"stroke-width="1.5""#));
    }

    #[test]
    fn empty_polygon_is_skipped() {
        let empty = RenderablePolygon {
            polygon: Polygon::new(vec![]),
            ..square(0.0, Rgb::WHITE)
        };
        let svg = to_svg(&[empty], DIMS, &SvgMetadata::default());
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn single_point_polygon_still_emits_a_path() {
        let dot = Polygon::new(vec![Point::new(3.0, 4.0)]);
        assert_eq!(build_path_data(&dot), "M3,4 z");
    }

    #[test]
    fn metadata_is_escaped() {
        let svg = to_svg(
            &[],
            DIMS,
            &SvgMetadata {
                title: Some("a < b"),
                description: Some("x & y"),
                config_json: Some(r#"{"shape_mode":"aabb"}"#),
            },
        );
        assert!(svg.contains("<title>a &lt; b</title>"));
        assert!(svg.contains("x &amp; y"));
        assert!(svg.contains("<metadata>"));
        assert!(svg.contains("artyshapes:config"));
    }

    #[test]
    fn canvas_dispose_forgets_polygons() {
        let mut canvas = SvgCanvas::new(DIMS).with_title("demo");
        canvas.add_polygon(&square(0.0, Rgb::WHITE));
        assert!(canvas.export_svg().contains("<path"));
        assert!(canvas.export_svg().contains("<title>demo</title>"));
        canvas.dispose();
        assert!(canvas.polygons().is_empty());
        assert!(!canvas.export_svg().contains("<path"));
    }

    #[test]
    fn surface_rejects_zero_size() {
        let result = SvgSurface::default().create(Dimensions {
            width: 0,
            height: 5,
        });
        assert!(matches!(
            result,
            Err(PipelineError::RenderSurfaceUnavailable(_))
        ));
    }
}
