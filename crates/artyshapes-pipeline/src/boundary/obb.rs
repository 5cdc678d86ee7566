//! Oriented bounding box from the principal axis of the convex hull.
//!
//! This is a PCA heuristic, not the rotating-calipers minimum-area box.

use crate::types::{Point, Polygon};

/// Angle in radians between the dominant principal axis of `points`
/// and the x axis. Returns 0 for fewer than two points.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn principal_angle(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|p| p.x).sum::<f64>() / n;
    let mean_y = points.iter().map(|p| p.y).sum::<f64>() / n;
    let (mut cxx, mut cyy, mut cxy) = (0.0f64, 0.0f64, 0.0f64);
    for p in points {
        let dx = p.x - mean_x;
        let dy = p.y - mean_y;
        cxx = dx.mul_add(dx, cxx);
        cyy = dy.mul_add(dy, cyy);
        cxy = dx.mul_add(dy, cxy);
    }
    // Eigenvector of the larger eigenvalue of [[cxx, cxy], [cxy, cyy]].
    0.5 * (2.0 * cxy).atan2(cxx - cyy)
}

fn extent(points: impl Iterator<Item = Point>) -> Option<(Point, Point)> {
    points.fold(None, |acc, p| {
        Some(acc.map_or((p, p), |(lo, hi): (Point, Point)| {
            (
                Point::new(lo.x.min(p.x), lo.y.min(p.y)),
                Point::new(hi.x.max(p.x), hi.y.max(p.y)),
            )
        }))
    })
}

/// Box around `hull` aligned to its principal axis.
///
/// The hull is rotated by the negative principal angle about the center
/// of its axis-aligned box, boxed, and the four corners are rotated back.
/// Corners are in the same `(w, n) -> (e, n) -> (e, s) -> (w, s)` order
/// as an axis-aligned box in the rotated frame.
#[must_use]
pub fn oriented_bounding_box(hull: &Polygon) -> Polygon {
    let Some((lo, hi)) = extent(hull.points().iter().copied()) else {
        return Polygon::new(Vec::new());
    };
    let center = Point::new(f64::midpoint(lo.x, hi.x), f64::midpoint(lo.y, hi.y));
    let angle = principal_angle(hull.points());

    let rotated = hull.points().iter().map(|p| p.rotate_about(center, -angle));
    let Some((rlo, rhi)) = extent(rotated) else {
        return Polygon::new(Vec::new());
    };
    let corners = [
        Point::new(rlo.x, rlo.y),
        Point::new(rhi.x, rlo.y),
        Point::new(rhi.x, rhi.y),
        Point::new(rlo.x, rhi.y),
    ];
    Polygon::new(
        corners
            .into_iter()
            .map(|c| c.rotate_about(center, angle))
            .collect(),
    )
}
