//! Planar homography from a document quadrilateral to an upright rectangle.
//!
//! The 3×3 matrix `H` (with `h33 = 1`) is found from the four corner
//! correspondences by solving the standard 8-unknown linear system. Both
//! point sets are Hartley-normalized first (centroid at the origin, mean
//! distance √2) so the system stays well conditioned for pixel-scale
//! coordinates.

use nalgebra::{Matrix3, SMatrix, SVector, Vector3};

use crate::hull::cross;
use crate::types::{Dimensions, PipelineError, Point, Quadrilateral};

/// Below this the normalized 8×8 system is treated as singular.
pub const SINGULAR_EPSILON: f64 = 1e-9;

/// Minimum `|sin|` of the angle at any corner triple.
const COLLINEAR_EPSILON: f64 = 1e-6;

/// Homogeneous weights smaller than this are on the projective horizon.
const W_EPSILON: f64 = 1e-12;

/// A projective transform `p' ~ H · p`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Homography {
    /// The matrix, scaled so `h[(2, 2)] == 1`.
    pub h: Matrix3<f64>,
}

impl Homography {
    /// Wrap an existing matrix.
    #[must_use]
    pub const fn new(h: Matrix3<f64>) -> Self {
        Self { h }
    }

    /// Build the homography taking `quad` (TL, TR, BR, BL, absolute
    /// pixels) onto the rectangle `(0,0), (w,0), (w,h), (0,h)`.
    ///
    /// # Errors
    ///
    /// Returns [`PipelineError::InvalidQuadrilateral`] when a corner is
    /// non-finite, when any three corners are collinear or coincident,
    /// when the linear system is (near-)singular, or when the corners are
    /// folded (bow-tie) so the rectangle would wrap through infinity.
    /// Returns [`PipelineError::InvalidConfig`] for an empty `output`.
    pub fn from_quad_to_rect(quad: &Quadrilateral, output: Dimensions) -> Result<Self, PipelineError> {
        if output.is_empty() {
            return Err(PipelineError::InvalidConfig(format!(
                "output size must be non-zero, got {}x{}",
                output.width, output.height
            )));
        }
        let src = *quad.corners();
        check_corners(&src)?;

        let w = f64::from(output.width);
        let h = f64::from(output.height);
        let dst = [
            Point::new(0.0, 0.0),
            Point::new(w, 0.0),
            Point::new(w, h),
            Point::new(0.0, h),
        ];

        let homography = solve_4pt(&src, &dst)?;
        let inverse = homography
            .inverse()
            .ok_or_else(|| invalid("homography is not invertible"))?;

        // Every output corner must come from the same side of the
        // horizon, otherwise the quad is folded over itself.
        let weights = dst.map(|p| inverse.weight(p));
        let all_positive = weights.iter().all(|&w| w > W_EPSILON);
        let all_negative = weights.iter().all(|&w| w < -W_EPSILON);
        if !(all_positive || all_negative) {
            return Err(invalid(
                "corners are folded or not convex; the document would wrap through infinity",
            ));
        }

        Ok(homography)
    }

    /// Apply the transform; `None` when the point maps to infinity.
    #[must_use]
    pub fn apply(&self, p: Point) -> Option<Point> {
        let v = self.h * Vector3::new(p.x, p.y, 1.0);
        let w = v[2];
        if w.abs() < W_EPSILON || !w.is_finite() {
            return None;
        }
        Some(Point::new(v[0] / w, v[1] / w))
    }

    /// The inverse transform, if the matrix is invertible.
    #[must_use]
    pub fn inverse(&self) -> Option<Self> {
        self.h
            .try_inverse()
            .and_then(normalize_homography)
            .map(Self::new)
    }

    fn weight(&self, p: Point) -> f64 {
        (self.h * Vector3::new(p.x, p.y, 1.0))[2]
    }
}

fn invalid(reason: &str) -> PipelineError {
    PipelineError::InvalidQuadrilateral(reason.to_owned())
}

/// Reject non-finite corners and any collinear or coincident triple.
fn check_corners(corners: &[Point; 4]) -> Result<(), PipelineError> {
    if !corners.iter().all(|p| p.is_finite()) {
        return Err(invalid("corner coordinates must be finite"));
    }
    for skip in 0..4 {
        let mut triple = corners
            .iter()
            .enumerate()
            .filter(|&(i, _)| i != skip)
            .map(|(_, &p)| p);
        let (Some(a), Some(b), Some(c)) = (triple.next(), triple.next(), triple.next()) else {
            continue;
        };
        let ab = a.distance(b);
        let ac = a.distance(c);
        let bc = b.distance(c);
        let longest = ab.max(ac).max(bc);
        // |cross| = 2 * triangle area; divide by the two longest sides to
        // get a scale-free sine.
        let second = (ab + ac + bc) - longest - ab.min(ac).min(bc);
        if longest <= 0.0 || second <= 0.0 {
            return Err(invalid("corners coincide"));
        }
        if cross(a, b, c).abs() / (longest * second) < COLLINEAR_EPSILON {
            return Err(invalid("three corners are collinear"));
        }
    }
    Ok(())
}

fn hartley_normalization(cx: f64, cy: f64, mean_dist: f64) -> Matrix3<f64> {
    let s = if mean_dist > 1e-12 {
        std::f64::consts::SQRT_2 / mean_dist
    } else {
        1.0
    };

    Matrix3::<f64>::new(s, 0.0, -s * cx, 0.0, s, -s * cy, 0.0, 0.0, 1.0)
}

fn normalize_points4(pts: &[Point; 4]) -> ([Point; 4], Matrix3<f64>) {
    let cx = pts.iter().map(|p| p.x).sum::<f64>() / 4.0;
    let cy = pts.iter().map(|p| p.y).sum::<f64>() / 4.0;
    let centroid = Point::new(cx, cy);
    let mean_dist = pts.iter().map(|p| p.distance(centroid)).sum::<f64>() / 4.0;

    let t = hartley_normalization(cx, cy, mean_dist);
    let out = pts.map(|p| {
        let v = t * Vector3::new(p.x, p.y, 1.0);
        Point::new(v[0], v[1])
    });
    (out, t)
}

fn normalize_homography(h: Matrix3<f64>) -> Option<Matrix3<f64>> {
    let s = h[(2, 2)];
    if s.abs() < 1e-12 || !s.is_finite() {
        return None;
    }
    Some(h / s)
}

/// Solve `dst ~ H · src` from four correspondences.
fn solve_4pt(src: &[Point; 4], dst: &[Point; 4]) -> Result<Homography, PipelineError> {
    // Unknowns: [h11 h12 h13 h21 h22 h23 h31 h32], with h33 = 1
    // h11 x + h12 y + h13 - u h31 x - u h32 y = u
    // h21 x + h22 y + h23 - v h31 x - v h32 y = v
    let (src_n, t_src) = normalize_points4(src);
    let (dst_n, t_dst) = normalize_points4(dst);

    let mut a = SMatrix::<f64, 8, 8>::zeros();
    let mut b = SVector::<f64, 8>::zeros();

    for k in 0..4 {
        let Point { x, y } = src_n[k];
        let Point { x: u, y: v } = dst_n[k];

        let r0 = 2 * k;
        a[(r0, 0)] = x;
        a[(r0, 1)] = y;
        a[(r0, 2)] = 1.0;
        a[(r0, 6)] = -u * x;
        a[(r0, 7)] = -u * y;
        b[r0] = u;

        let r1 = 2 * k + 1;
        a[(r1, 3)] = x;
        a[(r1, 4)] = y;
        a[(r1, 5)] = 1.0;
        a[(r1, 6)] = -v * x;
        a[(r1, 7)] = -v * y;
        b[r1] = v;
    }

    let det = a.determinant();
    if !det.is_finite() || det.abs() < SINGULAR_EPSILON {
        return Err(invalid("corner system is singular"));
    }

    let x = a
        .lu()
        .solve(&b)
        .ok_or_else(|| invalid("corner system is singular"))?;

    let hn = Matrix3::<f64>::new(
        x[0], x[1], x[2], //
        x[3], x[4], x[5], //
        x[6], x[7], 1.0,
    );

    // H = T_dst^{-1} * Hn * T_src
    let t_dst_inv = t_dst
        .try_inverse()
        .ok_or_else(|| invalid("output normalization is singular"))?;
    let h = normalize_homography(t_dst_inv * hn * t_src)
        .ok_or_else(|| invalid("homography maps the origin to infinity"))?;

    Ok(Homography::new(h))
}
