//! Shared types for the artyshapes pipeline.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Re-export `RgbaImage` so downstream crates can reference raster
/// buffers without depending on `image` directly.
pub use image::RgbaImage;

/// A 2D point in raster coordinates.
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

    /// Rotate this point by `angle` radians about `center`.
    #[must_use]
    pub fn rotate_about(self, center: Self, angle: f64) -> Self {
        let (sin, cos) = angle.sin_cos();
        let dx = self.x - center.x;
        let dy = self.y - center.y;
        Self {
            x: dx.mul_add(cos, -(dy * sin)) + center.x,
            y: dx.mul_add(sin, dy * cos) + center.y,
        }
    }
}

/// An integer pixel coordinate inside a raster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PixelCoord {
    /// Column, `0 <= x < width`.
    pub x: u32,
    /// Row, `0 <= y < height`.
    pub y: u32,
}

impl PixelCoord {
    /// Create a new pixel coordinate.
    #[must_use]
    pub const fn new(x: u32, y: u32) -> Self {
        Self { x, y }
    }

    /// The coordinate as a floating-point [`Point`].
    #[must_use]
    pub fn to_point(self) -> Point {
        Point::new(f64::from(self.x), f64::from(self.y))
    }
}

/// An ordered ring of vertices. The ring is closed implicitly: the last
/// vertex connects back to the first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon(Vec<Point>);

impl Polygon {
    /// Create a new polygon from a vector of vertices.
    #[must_use]
    pub const fn new(points: Vec<Point>) -> Self {
        Self(points)
    }

    /// Returns `true` if the polygon has no vertices.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of vertices.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns a slice of all vertices.
    #[must_use]
    pub fn points(&self) -> &[Point] {
        &self.0
    }

    /// Consumes the polygon and returns the underlying vertices.
    #[must_use]
    pub fn into_points(self) -> Vec<Point> {
        self.0
    }

    /// A polygon with fewer than three vertices encloses no area
    /// (a point or a line).
    #[must_use]
    pub const fn is_degenerate(&self) -> bool {
        self.0.len() < 3
    }

    /// Unsigned enclosed area (shoelace formula).
    #[must_use]
    pub fn area(&self) -> f64 {
        let n = self.0.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.0[i];
                let b = self.0[(i + 1) % n];
                a.x.mul_add(b.y, -(b.x * a.y))
            })
            .sum();
        twice.abs() / 2.0
    }
}

/// Raster dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Dimensions {
    /// Dimensions of a raster buffer.
    #[must_use]
    pub fn of(raster: &RgbaImage) -> Self {
        Self {
            width: raster.width(),
            height: raster.height(),
        }
    }

    /// Total pixel count.
    #[must_use]
    pub fn area(self) -> u64 {
        u64::from(self.width) * u64::from(self.height)
    }

    /// Returns `true` if either side is zero.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// An 8-bit RGB color.
///
/// Serialized as a `#rrggbb` string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Rgb {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Rgb {
    /// Pure black.
    pub const BLACK: Self = Self::new(0, 0, 0);
    /// Pure white.
    pub const WHITE: Self = Self::new(255, 255, 255);

    /// Create a color from its channels.
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// The color of an RGBA sample, alpha discarded.
    #[must_use]
    pub const fn from_rgba(pixel: image::Rgba<u8>) -> Self {
        Self::new(pixel.0[0], pixel.0[1], pixel.0[2])
    }

    /// The channels as an array, in `[r, g, b]` order.
    #[must_use]
    pub const fn channels(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }

    /// Format as a lowercase `#rrggbb` string.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse a hex triplet. The leading `#` is optional and digits are
    /// case-insensitive, but exactly six digits are required.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::MalformedColor`] if `hex` is not a valid
    /// hex triplet.
    pub fn from_hex(hex: &str) -> Result<Self, PipelineError> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(PipelineError::MalformedColor(hex.to_owned()));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| PipelineError::MalformedColor(hex.to_owned()))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for Rgb {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Rgb {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Rgb> for String {
    fn from(color: Rgb) -> Self {
        color.to_hex()
    }
}

/// A polygon with its paint: the unit handed to a
/// [`Renderer`](crate::render::Renderer).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderablePolygon {
    /// The (possibly simplified) boundary.
    pub polygon: Polygon,
    /// Fill color.
    pub fill: Rgb,
    /// Outline width in raster pixels.
    pub stroke_width: f64,
    /// Outline color.
    pub stroke: Rgb,
}

/// Errors that can occur during pipeline processing.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Failed to decode or encode an image.
    #[error("image codec error: {0}")]
    Image(#[from] image::ImageError),

    /// The input image bytes were empty.
    #[error("input image data is empty")]
    EmptyInput,

    /// Pipeline configuration is invalid.
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),

    /// The shape mode name is not recognized.
    #[error("unknown shape mode {0:?} (expected aabb, convex, oabb, or concave)")]
    InvalidShapeMode(String),

    /// The color mode name is not recognized.
    #[error("unknown color mode {0:?}")]
    InvalidColorMode(String),

    /// A color string is not a `#rrggbb` hex triplet.
    #[error("malformed color value {0:?}")]
    MalformedColor(String),

    /// The renderer could not be created.
    #[error("render surface unavailable: {0}")]
    RenderSurfaceUnavailable(String),

    /// The segmentation model failed or returned an unusable map.
    #[error("segmentation failed: {0}")]
    Segmentation(String),

    /// A newer render request started before this one finished.
    #[error("render was superseded by a newer request")]
    Superseded,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert!((a.distance_squared(b) - 25.0).abs() < f64::EPSILON);
    }

    #[test]
    fn rotate_quarter_turn() {
        let p = Point::new(2.0, 1.0).rotate_about(Point::new(1.0, 1.0), std::f64::consts::FRAC_PI_2);
        assert!((p.x - 1.0).abs() < 1e-12);
        assert!((p.y - 2.0).abs() < 1e-12);
    }

    #[test]
    fn polygon_area_of_square() {
        let square = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(2.0, 2.0),
            Point::new(0.0, 2.0),
        ]);
        assert!((square.area() - 4.0).abs() < f64::EPSILON);
        assert!(!square.is_degenerate());
    }

    #[test]
    fn line_polygon_is_degenerate() {
        let line = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(5.0, 0.0)]);
        assert!(line.is_degenerate());
        assert!(line.area().abs() < f64::EPSILON);
    }

    #[test]
    fn hex_round_trip_cases() {
        assert_eq!(Rgb::from_hex("#000000").unwrap(), Rgb::BLACK);
        assert_eq!(Rgb::from_hex("#FFFFFF").unwrap(), Rgb::WHITE);
        assert_eq!(Rgb::from_hex("bd5c55").unwrap(), Rgb::new(189, 92, 85));
        assert_eq!(Rgb::new(189, 92, 85).to_hex(), "#bd5c55");
        assert_eq!(Rgb::new(0, 15, 255).to_hex(), "#000fff");
    }

    #[test]
    fn malformed_hex_is_rejected() {
        for bad in ["#buic55", "#fff", "", "#1234567", "12345g"] {
            assert!(
                matches!(Rgb::from_hex(bad), Err(PipelineError::MalformedColor(_))),
                "{bad:?} should be rejected",
            );
        }
    }

    #[test]
    fn rgb_serializes_as_hex_string() {
        let json = serde_json::to_string(&Rgb::new(255, 1, 1)).unwrap();
        assert_eq!(json, "\"#ff0101\"");
        let back: Rgb = serde_json::from_str("\"#30303A\"").unwrap();
        assert_eq!(back, Rgb::new(0x30, 0x30, 0x3a));
        assert!(serde_json::from_str::<Rgb>("\"red\"").is_err());
    }

    #[test]
    fn dimensions_area() {
        let dims = Dimensions {
            width: 100,
            height: 100,
        };
        assert_eq!(dims.area(), 10_000);
        assert!(!dims.is_empty());
        assert!(Dimensions { width: 0, height: 4 }.is_empty());
    }
}
