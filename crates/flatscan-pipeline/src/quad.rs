//! Quadrilateral approximation: reduce a convex hull to four corners.
//!
//! This module defines the [`QuadFitter`] trait for pluggable reduction
//! strategies and the [`QuadFitKind`] enum for selecting one at runtime.
//!
//! Every strategy shares the same contract: fewer than four hull points
//! yields `None`, exactly four are kept as-is (only reordered), and more
//! than four are reduced by the strategy. The result is always a
//! [`Quadrilateral`] in TL, TR, BR, BL order.

use serde::{Deserialize, Serialize};

use crate::types::{Point, Quadrilateral};

/// Selects how a hull with more than four points is reduced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum QuadFitKind {
    /// Corners of the hull's axis-aligned bounding box.
    ///
    /// Exact for documents that are roughly aligned with the frame;
    /// overestimates rotated documents.
    #[default]
    BoundingBox,

    /// Minimum-area enclosing rectangle (rotating calipers) via
    /// [`geo::MinimumRotatedRect`].
    ///
    /// Follows in-plane rotation, but still cannot express perspective
    /// foreshortening beyond what the hull itself provides.
    MinAreaRect,
}

impl QuadFitKind {
    /// Stable name for logs and diagnostics.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::BoundingBox => "BoundingBox",
            Self::MinAreaRect => "MinAreaRect",
        }
    }
}

/// Trait for hull-to-quadrilateral strategies.
///
/// Input: convex hull vertices in absolute space.
/// Output: exactly four ordered corners, or `None` when the hull has
/// fewer than four points.
pub trait QuadFitter {
    /// Reduce `hull` to a quadrilateral.
    fn fit(&self, hull: &[Point]) -> Option<Quadrilateral>;
}

impl QuadFitter for QuadFitKind {
    fn fit(&self, hull: &[Point]) -> Option<Quadrilateral> {
        match hull.len() {
            0..=3 => None,
            4 => Some(Quadrilateral::new(order_corners([
                hull[0], hull[1], hull[2], hull[3],
            ]))),
            _ => match *self {
                Self::BoundingBox => Some(bounding_box_quad(hull)),
                Self::MinAreaRect => min_area_rect_quad(hull),
            },
        }
    }
}

/// Reduce a hull with the default [`QuadFitKind::BoundingBox`] strategy.
#[must_use]
pub fn approximate_quadrilateral(hull: &[Point]) -> Option<Quadrilateral> {
    QuadFitKind::BoundingBox.fit(hull)
}

/// Put four unordered corners into TL, TR, BR, BL order.
///
/// TL minimizes `x + y`, BR maximizes it, TR maximizes `x - y` and BL
/// minimizes it. When two roles land on the same point (a square rotated
/// by 45° has tied sums) the corners are instead sorted by angle around
/// their centroid, starting from the TL candidate.
#[must_use]
pub fn order_corners(points: [Point; 4]) -> [Point; 4] {
    let sum = |p: &Point| p.x + p.y;
    let diff = |p: &Point| p.x - p.y;

    let tl = extreme_index(&points, sum, false);
    let br = extreme_index(&points, sum, true);
    let tr = extreme_index(&points, diff, true);
    let bl = extreme_index(&points, diff, false);

    let roles = [tl, tr, br, bl];
    let distinct = (0..4).all(|i| (i + 1..4).all(|j| roles[i] != roles[j]));
    if distinct {
        return roles.map(|i| points[i]);
    }

    let cx = points.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = points.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let mut by_angle = points;
    // y grows downward, so increasing angle runs clockwise on screen.
    by_angle.sort_by(|a, b| {
        let ta = (a.y - cy).atan2(a.x - cx);
        let tb = (b.y - cy).atan2(b.x - cx);
        ta.total_cmp(&tb)
    });
    let start = by_angle
        .iter()
        .position(|p| *p == points[tl])
        .unwrap_or(0);
    by_angle.rotate_left(start);
    by_angle
}

/// Index of the first point with the smallest (or largest) key.
fn extreme_index(points: &[Point; 4], key: impl Fn(&Point) -> f64, largest: bool) -> usize {
    let mut best = 0;
    for i in 1..4 {
        let (candidate, current) = (key(&points[i]), key(&points[best]));
        let better = if largest {
            candidate > current
        } else {
            candidate < current
        };
        if better {
            best = i;
        }
    }
    best
}

fn bounding_box_quad(hull: &[Point]) -> Quadrilateral {
    let min_x = hull.iter().map(|p| p.x).fold(f64::INFINITY, f64::min);
    let min_y = hull.iter().map(|p| p.y).fold(f64::INFINITY, f64::min);
    let max_x = hull.iter().map(|p| p.x).fold(f64::NEG_INFINITY, f64::max);
    let max_y = hull.iter().map(|p| p.y).fold(f64::NEG_INFINITY, f64::max);
    Quadrilateral::new([
        Point::new(min_x, min_y),
        Point::new(max_x, min_y),
        Point::new(max_x, max_y),
        Point::new(min_x, max_y),
    ])
}

/// Minimum-area rotated rectangle around the hull.
///
/// Returns `None` only if `geo` cannot build a rectangle (all points
/// collinear).
fn min_area_rect_quad(hull: &[Point]) -> Option<Quadrilateral> {
    use geo::MinimumRotatedRect;

    let cloud: geo::MultiPoint<f64> = hull.iter().map(|p| geo::Point::new(p.x, p.y)).collect();
    let rect = cloud.minimum_rotated_rect()?;
    let corners: Vec<Point> = rect
        .exterior()
        .coords()
        .take(4)
        .map(|c| Point::new(c.x, c.y))
        .collect();
    let corners: [Point; 4] = corners.try_into().ok()?;
    Some(Quadrilateral::new(order_corners(corners)))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn pt(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    fn octagon() -> Vec<Point> {
        vec![
            pt(30.0, 10.0),
            pt(70.0, 10.0),
            pt(90.0, 30.0),
            pt(90.0, 70.0),
            pt(70.0, 90.0),
            pt(30.0, 90.0),
            pt(10.0, 70.0),
            pt(10.0, 30.0),
        ]
    }

    #[test]
    fn fewer_than_four_points_is_none() {
        for n in 0..4 {
            let hull: Vec<Point> = (0..n).map(|i| pt(f64::from(i), 0.0)).collect();
            assert!(approximate_quadrilateral(&hull).is_none());
            assert!(QuadFitKind::MinAreaRect.fit(&hull).is_none());
        }
    }

    #[test]
    fn four_points_keep_their_coordinates() {
        // Hull sweep order (leftmost first), not TL/TR/BR/BL.
        let hull = [pt(10.0, 90.0), pt(12.0, 8.0), pt(95.0, 5.0), pt(92.0, 88.0)];
        let quad = approximate_quadrilateral(&hull).unwrap();
        assert_eq!(quad.top_left(), pt(12.0, 8.0));
        assert_eq!(quad.top_right(), pt(95.0, 5.0));
        assert_eq!(quad.bottom_right(), pt(92.0, 88.0));
        assert_eq!(quad.bottom_left(), pt(10.0, 90.0));
    }

    #[test]
    fn more_than_four_points_reduce_to_bounding_box() {
        let quad = approximate_quadrilateral(&octagon()).unwrap();
        assert_eq!(
            quad.corners(),
            &[pt(10.0, 10.0), pt(90.0, 10.0), pt(90.0, 90.0), pt(10.0, 90.0)]
        );
    }

    #[test]
    fn always_exactly_four_corners() {
        for n in 4..20 {
            let hull: Vec<Point> = (0..n)
                .map(|i| {
                    let t = f64::from(i) / f64::from(n) * std::f64::consts::TAU;
                    pt(50.0 + 40.0 * t.cos(), 50.0 + 40.0 * t.sin())
                })
                .collect();
            for kind in [QuadFitKind::BoundingBox, QuadFitKind::MinAreaRect] {
                let quad = kind.fit(&hull).unwrap();
                assert_eq!(quad.corners().len(), 4);
            }
        }
    }

    #[test]
    fn order_corners_handles_any_input_order() {
        let expected = [pt(0.0, 0.0), pt(100.0, 0.0), pt(100.0, 50.0), pt(0.0, 50.0)];
        let shuffled = [expected[2], expected[0], expected[3], expected[1]];
        assert_eq!(order_corners(shuffled), expected);
    }

    #[test]
    fn order_corners_on_rotated_rectangle() {
        // Rectangle rotated ~20° clockwise on screen.
        let tl = pt(120.0, 100.0);
        let tr = pt(400.0, 200.0);
        let br = pt(350.0, 340.0);
        let bl = pt(70.0, 240.0);
        assert_eq!(order_corners([br, bl, tr, tl]), [tl, tr, br, bl]);
    }

    #[test]
    fn order_corners_diamond_falls_back_to_angular_sort() {
        let top = pt(50.0, 0.0);
        let right = pt(100.0, 50.0);
        let bottom = pt(50.0, 100.0);
        let left = pt(0.0, 50.0);
        let ordered = order_corners([bottom, left, top, right]);
        // Four distinct corners, running clockwise on screen.
        let mut unique = ordered.to_vec();
        unique.dedup();
        assert_eq!(unique.len(), 4);
        assert_eq!(ordered, [left, top, right, bottom]);
    }

    #[test]
    fn min_area_rect_follows_rotation() {
        // Rotated rectangle with extra points on its edges.
        let a = pt(120.0, 100.0);
        let b = pt(400.0, 200.0);
        let c = pt(350.0, 340.0);
        let d = pt(70.0, 240.0);
        let mid = |p: Point, q: Point| pt(f64::midpoint(p.x, q.x), f64::midpoint(p.y, q.y));
        let hull = vec![a, mid(a, b), b, mid(b, c), c, mid(c, d), d, mid(d, a)];

        let quad = QuadFitKind::MinAreaRect.fit(&hull).unwrap();
        for (got, want) in quad.corners().iter().zip([a, b, c, d]) {
            assert!(got.distance(want) < 1e-6, "{got:?} vs {want:?}");
        }

        let bbox = QuadFitKind::BoundingBox.fit(&hull).unwrap();
        assert!(bbox.area() > quad.area());
    }

    #[test]
    fn quad_fit_kind_names() {
        assert_eq!(QuadFitKind::default().name(), "BoundingBox");
        assert_eq!(QuadFitKind::MinAreaRect.name(), "MinAreaRect");
    }
}
