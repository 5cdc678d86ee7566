//! Segments: maximal connected regions of one exact color.

use serde::{Deserialize, Serialize};

use crate::types::{PixelCoord, Point, Polygon, Rgb};

/// Stable identity of a segment within one labeling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub usize);

/// Tight axis-aligned bounds of a set of pixel coordinates.
///
/// `north` is the minimum row, `south` the maximum row, `west` the
/// minimum column and `east` the maximum column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub north: u32,
    pub south: u32,
    pub east: u32,
    pub west: u32,
}

impl BoundingBox {
    /// The zero-size box around a single coordinate.
    #[must_use]
    pub const fn around(coord: PixelCoord) -> Self {
        Self {
            north: coord.y,
            south: coord.y,
            east: coord.x,
            west: coord.x,
        }
    }

    /// Grow the box to include `coord`.
    pub fn include(&mut self, coord: PixelCoord) {
        self.north = self.north.min(coord.y);
        self.south = self.south.max(coord.y);
        self.west = self.west.min(coord.x);
        self.east = self.east.max(coord.x);
    }

    /// Returns `true` if `coord` lies inside the box (edges included).
    #[must_use]
    pub const fn contains(&self, coord: PixelCoord) -> bool {
        coord.x >= self.west && coord.x <= self.east && coord.y >= self.north && coord.y <= self.south
    }

    /// `east - west`.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.east - self.west
    }

    /// `south - north`.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.south - self.north
    }

    /// Area measured between the extreme pixel coordinates,
    /// `(south - north) * (east - west)`. A single row or column of
    /// pixels has zero area.
    #[must_use]
    pub fn area(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    /// Integer-floored center, `(w + (e - w) / 2, n + (s - n) / 2)`.
    #[must_use]
    pub const fn center(&self) -> PixelCoord {
        PixelCoord::new(
            self.west + self.width() / 2,
            self.north + self.height() / 2,
        )
    }

    /// The four corners in winding order
    /// `(w, n) -> (e, n) -> (e, s) -> (w, s)`.
    #[must_use]
    pub fn corners(&self) -> Polygon {
        let (w, e) = (f64::from(self.west), f64::from(self.east));
        let (n, s) = (f64::from(self.north), f64::from(self.south));
        Polygon::new(vec![
            Point::new(w, n),
            Point::new(e, n),
            Point::new(e, s),
            Point::new(w, s),
        ])
    }
}

/// A maximal connected region of exactly-equal-color pixels.
///
/// Segments are immutable geometry records. The color chosen for a
/// segment by a [`ColorMode`](crate::color::ColorMode) lives in a
/// separate [`SegmentColors`](crate::color::SegmentColors) map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    id: SegmentId,
    root: PixelCoord,
    label_color: Rgb,
    bounds: BoundingBox,
    members: Vec<PixelCoord>,
}

impl Segment {
    /// Build a segment from its representative and members, computing
    /// the tight bounding box.
    ///
    /// The representative is not implicitly added to `members`; a
    /// segment built with no members is degenerate and is skipped by the
    /// color and boundary stages.
    #[must_use]
    pub fn new(id: SegmentId, root: PixelCoord, label_color: Rgb, members: Vec<PixelCoord>) -> Self {
        let bounds = members.split_first().map_or_else(
            || BoundingBox::around(root),
            |(first, rest)| {
                let mut bounds = BoundingBox::around(*first);
                for &c in rest {
                    bounds.include(c);
                }
                bounds
            },
        );
        Self {
            id,
            root,
            label_color,
            bounds,
            members,
        }
    }

    /// Used by the labeler, which accumulates bounds while collecting
    /// members.
    pub(crate) const fn from_parts(
        id: SegmentId,
        root: PixelCoord,
        label_color: Rgb,
        bounds: BoundingBox,
        members: Vec<PixelCoord>,
    ) -> Self {
        Self {
            id,
            root,
            label_color,
            bounds,
            members,
        }
    }

    #[must_use]
    pub const fn id(&self) -> SegmentId {
        self.id
    }

    /// Coordinate of the union-find representative the segment was
    /// materialized from.
    #[must_use]
    pub const fn root(&self) -> PixelCoord {
        self.root
    }

    /// The segment's color in the segmentation map.
    #[must_use]
    pub const fn label_color(&self) -> Rgb {
        self.label_color
    }

    #[must_use]
    pub const fn bounds(&self) -> BoundingBox {
        self.bounds
    }

    /// Member pixel coordinates, in row-major scan order.
    #[must_use]
    pub fn members(&self) -> &[PixelCoord] {
        &self.members
    }

    /// Number of member pixels.
    #[must_use]
    pub const fn len(&self) -> usize {
        self.members.len()
    }

    /// A segment with no recorded members is degenerate.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    /// Member coordinates as floating-point points.
    #[must_use]
    pub fn member_points(&self) -> Vec<Point> {
        self.members.iter().map(|c| c.to_point()).collect()
    }
}
