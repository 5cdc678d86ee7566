//! Concave hull via `geo`.

use geo::ConcaveHull;
use geo::concave_hull::ConcaveHullOptions;

use crate::types::{PixelCoord, Point, Polygon};

use super::hull;

/// Default concavity. Lower is tighter; infinity gives the convex hull.
pub const DEFAULT_CONCAVITY: f64 = 2.0;

/// Concave hull of `points`.
///
/// Inputs whose convex hull is degenerate (one or two distinct points,
/// or all points on one line) are returned as that degenerate hull.
#[must_use]
pub fn concave_hull(points: &[PixelCoord], concavity: f64) -> Polygon {
    let convex = hull::convex_hull_coords(points);
    if convex.len() < 3 {
        return Polygon::new(convex.into_iter().map(PixelCoord::to_point).collect());
    }

    let multi: geo::MultiPoint<f64> = points
        .iter()
        .map(|p| geo::Point::new(f64::from(p.x), f64::from(p.y)))
        .collect();
    let polygon = multi.concave_hull_with_options(ConcaveHullOptions {
        concavity,
        ..ConcaveHullOptions::default()
    });

    let mut ring: Vec<Point> = polygon
        .exterior()
        .coords()
        .map(|c| Point::new(c.x, c.y))
        .collect();
    // geo closes rings by repeating the first coordinate.
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    Polygon::new(ring)
}
