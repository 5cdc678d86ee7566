//! Polygon simplification using the Ramer-Douglas-Peucker algorithm.
//!
//! The ring is simplified as an open chain from its first vertex to its
//! last; both are always kept, so the implicit closing edge is
//! unchanged. The kept set at a larger tolerance is a subset of the kept
//! set at a smaller one, so vertex count never grows with tolerance.

use crate::types::{Point, Polygon};

/// Simplify a polygon's vertex ring.
///
/// Vertices within `tolerance` pixels of the line between their
/// retained neighbors are removed. A tolerance of 0.0 returns the input
/// unchanged, as do polygons with fewer than 3 vertices.
#[must_use = "returns the simplified polygon"]
pub fn simplify(polygon: &Polygon, tolerance: f64) -> Polygon {
    let points = polygon.points();
    if tolerance <= 0.0 || points.len() < 3 {
        return polygon.clone();
    }

    let mut kept = vec![false; points.len()];
    kept[0] = true;
    kept[points.len() - 1] = true;

    rdp_recurse(points, 0, points.len() - 1, tolerance, &mut kept);

    let simplified: Vec<Point> = points
        .iter()
        .zip(&kept)
        .filter(|&(_, k)| *k)
        .map(|(&p, _)| p)
        .collect();

    Polygon::new(simplified)
}

/// Recursive step of the Ramer-Douglas-Peucker algorithm.
///
/// Finds the point between `start` and `end` that is farthest from the
/// line segment between them. If that distance exceeds `tolerance`, the
/// point is kept and both sub-segments are processed recursively.
fn rdp_recurse(points: &[Point], start: usize, end: usize, tolerance: f64, kept: &mut [bool]) {
    if end <= start + 1 {
        return;
    }

    let mut max_dist = 0.0;
    let mut max_idx = start;

    for i in (start + 1)..end {
        let d = perpendicular_distance(points[i], points[start], points[end]);
        if d > max_dist {
            max_dist = d;
            max_idx = i;
        }
    }

    if max_dist > tolerance {
        kept[max_idx] = true;
        rdp_recurse(points, start, max_idx, tolerance, kept);
        rdp_recurse(points, max_idx, end, tolerance, kept);
    }
}

/// Perpendicular distance from point `p` to the line defined by `a` and `b`.
///
/// When `a` and `b` coincide, returns the distance from `p` to `a`.
fn perpendicular_distance(p: Point, a: Point, b: Point) -> f64 {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let length_sq = dx.mul_add(dx, dy * dy);

    if length_sq == 0.0 {
        return p.distance(a);
    }

    let cross = dx.mul_add(a.y - p.y, -(dy * (a.x - p.x)));
    cross.abs() / length_sq.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A 24-vertex wobbly circle.
    fn wobbly_ring() -> Polygon {
        Polygon::new(
            (0..24)
                .map(|i| {
                    let t = f64::from(i) * std::f64::consts::TAU / 24.0;
                    let r = if i % 2 == 0 { 20.0 } else { 18.5 };
                    Point::new(r * t.cos() + 50.0, r * t.sin() + 50.0)
                })
                .collect(),
        )
    }

    #[test]
    fn zero_tolerance_is_identity() {
        let ring = wobbly_ring();
        assert_eq!(simplify(&ring, 0.0), ring);
    }

    #[test]
    fn tiny_polygons_unchanged() {
        let line = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)]);
        assert_eq!(simplify(&line, 5.0), line);
        assert!(simplify(&Polygon::new(vec![]), 5.0).is_empty());
    }

    #[test]
    fn collinear_edge_vertices_are_removed() {
        let square = Polygon::new(vec![
            Point::new(0.0, 0.0),
            Point::new(5.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(0.0, 5.0),
        ]);
        let result = simplify(&square, 0.1);
        assert_eq!(
            result.points(),
            &[
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
                Point::new(0.0, 10.0),
                Point::new(0.0, 5.0),
            ]
        );
    }

    #[test]
    fn vertex_count_never_grows_with_tolerance() {
        let ring = wobbly_ring();
        let mut previous = ring.len();
        for step in 0..=40 {
            let tolerance = f64::from(step) * 0.5;
            let count = simplify(&ring, tolerance).len();
            assert!(count <= previous, "tolerance {tolerance}: {count} > {previous}");
            previous = count;
        }
        assert!(previous < ring.len());
    }

    #[test]
    fn endpoints_are_kept() {
        let ring = wobbly_ring();
        let result = simplify(&ring, 100.0);
        assert_eq!(result.points().first(), ring.points().first());
        assert_eq!(result.points().last(), ring.points().last());
    }

    #[test]
    fn deterministic() {
        let ring = wobbly_ring();
        assert_eq!(simplify(&ring, 1.7), simplify(&ring, 1.7));
    }

    #[test]
    fn perpendicular_distance_diagonal_segment() {
        let d = perpendicular_distance(
            Point::new(2.0, -1.0),
            Point::new(0.0, 0.0),
            Point::new(4.0, 2.0),
        );
        let expected = 8.0 / 20.0_f64.sqrt();
        assert!((d - expected).abs() < 1e-10, "got {d}, expected {expected}");
    }

    #[test]
    fn perpendicular_distance_coincident_endpoints() {
        let d = perpendicular_distance(
            Point::new(3.0, 4.0),
            Point::new(0.0, 0.0),
            Point::new(0.0, 0.0),
        );
        assert!((d - 5.0).abs() < 1e-10);
    }
}
