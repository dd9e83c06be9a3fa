//! Convex hull of the boundary candidates (Graham scan).
//!
//! The hull is the smallest convex polygon containing every candidate.
//! For a document on a darker background the candidates cluster along
//! the page outline, so the hull traces that outline and the quad
//! approximator only has to reduce it to four corners.

use crate::types::Point;

/// Compute the convex hull of `points`.
///
/// Returns hull vertices in sweep order starting at the leftmost point
/// (topmost among ties). Interior points, duplicates, and points lying
/// on a hull edge are dropped. Non-finite points are ignored.
///
/// With fewer than three (finite, distinct) points there is no polygon
/// to build, and the input is returned unchanged.
#[must_use]
pub fn convex_hull(points: &[Point]) -> Vec<Point> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let mut pts: Vec<Point> = points.iter().copied().filter(|p| p.is_finite()).collect();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup();
    if pts.len() < 3 {
        return pts;
    }

    // Lexicographic minimum: leftmost, then topmost.
    let pivot = pts[0];
    let angle = |p: Point| (p.y - pivot.y).atan2(p.x - pivot.x);

    // Polar order, farthest first along a shared ray. The angle key is a
    // total order; cross product signs are not once rounding enters.
    pts[1..].sort_by(|a, b| {
        angle(*a)
            .total_cmp(&angle(*b))
            .then_with(|| pivot.distance_squared(*b).total_cmp(&pivot.distance_squared(*a)))
    });

    let mut ordered = Vec::with_capacity(pts.len());
    ordered.push(pivot);
    for &p in &pts[1..] {
        // Several points on one ray from the pivot: keep the farthest.
        if let Some(&last) = ordered.last()
            && ordered.len() > 1
            && (angle(last).total_cmp(&angle(p)).is_eq() || cross(pivot, last, p) == 0.0)
        {
            continue;
        }
        ordered.push(p);
    }

    let mut hull: Vec<Point> = Vec::with_capacity(ordered.len());
    for p in ordered {
        while hull.len() > 1 && cross(hull[hull.len() - 2], hull[hull.len() - 1], p) <= 0.0 {
            hull.pop();
        }
        hull.push(p);
    }
    hull
}

/// Z component of `(b - a) × (c - a)`.
///
/// Positive when `a → b → c` turns toward increasing angle, negative
/// for the opposite turn, and zero when the three points are collinear.
pub(crate) fn cross(a: Point, b: Point, c: Point) -> f64 {
    (b.x - a.x).mul_add(c.y - a.y, -((b.y - a.y) * (c.x - a.x)))
}
