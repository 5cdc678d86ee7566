//! Convex hull by Andrew's monotone chain.
//!
//! Works on integer pixel coordinates so the orientation test is exact.

use crate::types::{PixelCoord, Point, Polygon};

/// Cross product of `(a - o) x (b - o)`. Positive for a left turn in
/// y-up coordinates.
fn cross(o: PixelCoord, a: PixelCoord, b: PixelCoord) -> i64 {
    let (ox, oy) = (i64::from(o.x), i64::from(o.y));
    let (ax, ay) = (i64::from(a.x) - ox, i64::from(a.y) - oy);
    let (bx, by) = (i64::from(b.x) - ox, i64::from(b.y) - oy);
    ax * by - ay * bx
}

fn half_hull(points: impl Iterator<Item = PixelCoord>) -> Vec<PixelCoord> {
    let mut chain: Vec<PixelCoord> = Vec::new();
    for p in points {
        while chain.len() >= 2 && cross(chain[chain.len() - 2], chain[chain.len() - 1], p) <= 0 {
            chain.pop();
        }
        chain.push(p);
    }
    chain
}

/// Hull vertices of `points`, without collinear vertices.
///
/// Points are sorted by `x` then `y`; the lower chain is built by a
/// forward sweep and the upper chain by a reverse sweep. Fewer than
/// three distinct points, or all points on one line, give a degenerate
/// hull of one or two vertices.
#[must_use]
pub fn convex_hull_coords(points: &[PixelCoord]) -> Vec<PixelCoord> {
    let mut sorted: Vec<PixelCoord> = points.to_vec();
    sorted.sort_unstable_by_key(|p| (p.x, p.y));
    sorted.dedup();
    if sorted.len() < 3 {
        return sorted;
    }

    let mut lower = half_hull(sorted.iter().copied());
    let mut upper = half_hull(sorted.iter().rev().copied());
    // Each chain ends where the other begins.
    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Convex hull of `points` as a polygon.
#[must_use]
pub fn convex_hull(points: &[PixelCoord]) -> Polygon {
    Polygon::new(
        convex_hull_coords(points)
            .into_iter()
            .map(PixelCoord::to_point)
            .collect(),
    )
}

/// Returns `true` if `p` lies inside or on the boundary of the convex
/// polygon `hull` (vertices in either winding).
#[must_use]
pub fn contains(hull: &Polygon, p: Point) -> bool {
    let pts = hull.points();
    let n = pts.len();
    let mut side: Option<bool> = None;
    for i in 0..n {
        let a = pts[i];
        let b = pts[(i + 1) % n];
        let c = (b.x - a.x).mul_add(p.y - a.y, -((b.y - a.y) * (p.x - a.x)));
        if c.abs() < 1e-9 {
            continue;
        }
        match side {
            None => side = Some(c > 0.0),
            Some(positive) if positive != (c > 0.0) => return false,
            Some(_) => {}
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn coords(raw: &[(u32, u32)]) -> Vec<PixelCoord> {
        raw.iter().map(|&(x, y)| PixelCoord::new(x, y)).collect()
    }

    #[test]
    fn square_with_interior_points() {
        let pts = coords(&[(0, 0), (2, 0), (2, 2), (0, 2), (1, 1), (1, 0)]);
        let hull = convex_hull_coords(&pts);
        assert_eq!(hull, coords(&[(0, 0), (2, 0), (2, 2), (0, 2)]));
    }

    #[test]
    fn all_points_inside_hull() {
        let pts: Vec<PixelCoord> = (0..40u32)
            .map(|i| PixelCoord::new((i * 7) % 13, (i * 5) % 11))
            .collect();
        let hull = convex_hull(&pts);
        assert!(!hull.is_degenerate());
        for p in &pts {
            assert!(contains(&hull, p.to_point()), "{p:?} outside hull");
        }
    }

    #[test]
    fn hull_is_deterministic_under_input_order() {
        let pts = coords(&[(3, 1), (0, 0), (5, 5), (1, 4), (2, 2)]);
        let mut reversed = pts.clone();
        reversed.reverse();
        assert_eq!(convex_hull_coords(&pts), convex_hull_coords(&reversed));
    }

    #[test]
    fn degenerate_inputs() {
        assert!(convex_hull_coords(&[]).is_empty());
        assert_eq!(convex_hull_coords(&coords(&[(4, 4)])).len(), 1);
        assert_eq!(convex_hull_coords(&coords(&[(4, 4), (4, 4)])).len(), 1);
        let line = convex_hull_coords(&coords(&[(0, 0), (1, 1), (2, 2), (3, 3)]));
        assert_eq!(line, coords(&[(0, 0), (3, 3)]));
    }

    #[test]
    fn collinear_edge_points_are_dropped() {
        let pts = coords(&[(0, 0), (1, 0), (2, 0), (2, 1), (0, 1)]);
        assert_eq!(convex_hull_coords(&pts).len(), 4);
    }
}
