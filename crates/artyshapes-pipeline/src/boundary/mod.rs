//! Boundary extraction: one polygon per segment.
//!
//! [`ShapeMode`] selects the strategy at runtime. All strategies read
//! only the segment's member coordinates and bounding box; the
//! convex-hull based strategies may return degenerate polygons for
//! segments of one or two pixels, which downstream stages accept.

pub mod concave;
pub mod hull;
pub mod obb;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::segment::Segment;
use crate::types::{PipelineError, Polygon};

pub use concave::DEFAULT_CONCAVITY;

/// Selects which boundary shape to compute for each segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ShapeMode {
    /// Axis-aligned bounding box.
    #[default]
    Aabb,
    /// Convex hull of the member pixels.
    Convex,
    /// Box aligned to the principal axis of the convex hull.
    Oabb,
    /// Concave hull of the member pixels.
    Concave,
}

impl ShapeMode {
    pub const ALL: [Self; 4] = [Self::Aabb, Self::Convex, Self::Oabb, Self::Concave];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Aabb => "aabb",
            Self::Convex => "convex",
            Self::Oabb => "oabb",
            Self::Concave => "concave",
        }
    }
}

impl fmt::Display for ShapeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ShapeMode {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|mode| mode.name() == s)
            .ok_or_else(|| PipelineError::InvalidShapeMode(s.to_owned()))
    }
}

impl TryFrom<String> for ShapeMode {
    type Error = PipelineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShapeMode> for String {
    fn from(mode: ShapeMode) -> Self {
        mode.name().to_owned()
    }
}

/// Trait for boundary strategies.
pub trait BoundaryExtractor {
    /// Compute the boundary polygon of `segment`.
    fn extract(&self, segment: &Segment, concavity: f64) -> Polygon;
}

impl BoundaryExtractor for ShapeMode {
    fn extract(&self, segment: &Segment, concavity: f64) -> Polygon {
        match *self {
            Self::Aabb => segment.bounds().corners(),
            Self::Convex => hull::convex_hull(segment.members()),
            Self::Oabb => obb::oriented_bounding_box(&hull::convex_hull(segment.members())),
            Self::Concave => concave::concave_hull(segment.members(), concavity),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::segment::SegmentId;
    use crate::types::{PixelCoord, Point, Rgb};

    fn block(w: u32, h: u32) -> Segment {
        let members = (0..h)
            .flat_map(|y| (0..w).map(move |x| PixelCoord::new(x + 1, y + 2)))
            .collect::<Vec<_>>();
        Segment::new(SegmentId(0), members[0], Rgb::BLACK, members)
    }

    #[test]
    fn aabb_uses_fixed_winding() {
        let polygon = ShapeMode::Aabb.extract(&block(3, 2), DEFAULT_CONCAVITY);
        assert_eq!(
            polygon.points(),
            &[
                Point::new(1.0, 2.0),
                Point::new(3.0, 2.0),
                Point::new(3.0, 3.0),
                Point::new(1.0, 3.0),
            ]
        );
    }

    #[test]
    fn box_modes_agree_on_a_rectangle() {
        let segment = block(4, 3);
        let expected = segment.bounds().corners().area();
        for mode in [ShapeMode::Aabb, ShapeMode::Convex, ShapeMode::Oabb] {
            let area = mode.extract(&segment, DEFAULT_CONCAVITY).area();
            assert!((area - expected).abs() < 1e-6, "{mode}: {area} vs {expected}");
        }
        let concave = ShapeMode::Concave.extract(&segment, DEFAULT_CONCAVITY).area();
        assert!(concave > 0.0 && concave <= expected + 1e-6);
    }

    #[test]
    fn single_pixel_segment_is_degenerate_not_fatal() {
        let segment = block(1, 1);
        for mode in ShapeMode::ALL {
            let polygon = mode.extract(&segment, DEFAULT_CONCAVITY);
            assert!(polygon.area().abs() < 1e-9, "{mode}");
        }
    }

    #[test]
    fn mode_names_round_trip() {
        for mode in ShapeMode::ALL {
            assert_eq!(mode.to_string().parse::<ShapeMode>().unwrap(), mode);
        }
        assert!(matches!(
            "circle".parse::<ShapeMode>(),
            Err(PipelineError::InvalidShapeMode(name)) if name == "circle"
        ));
    }
}
