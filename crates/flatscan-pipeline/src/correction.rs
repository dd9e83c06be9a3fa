//! Interactive corner correction.
//!
//! [`CorrectionState`] is the data behind the review overlay: four
//! corners in relative space plus a small drag state machine.
//!
//! ```text
//!            begin_drag(i)
//!   Idle ─────────────────▶ Dragging(i) ──┐ move_to(p): corners[i] = clamp(p)
//!    ▲                          │   ▲     │
//!    └──────── end_drag ────────┘   └─────┘
//! ```
//!
//! Only one drag can be active at a time, and [`CorrectionState::confirm`]
//! is only accepted from `Idle`. No convexity check happens while
//! dragging; a folded quadrilateral is caught by the rectifier.

use serde::{Deserialize, Serialize};

use crate::types::{Dimensions, PixelBuffer, Quadrilateral, RelativePoint, ScanConfig};

/// One of the four document corners, in quadrilateral order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Corner {
    /// Index 0.
    TopLeft,
    /// Index 1.
    TopRight,
    /// Index 2.
    BottomRight,
    /// Index 3.
    BottomLeft,
}

impl Corner {
    /// All corners in index order.
    pub const ALL: [Self; 4] = [
        Self::TopLeft,
        Self::TopRight,
        Self::BottomRight,
        Self::BottomLeft,
    ];

    /// Position of this corner in a [`Quadrilateral`].
    #[must_use]
    pub const fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<usize> for Corner {
    type Error = CorrectionError;

    fn try_from(index: usize) -> Result<Self, Self::Error> {
        Self::ALL
            .get(index)
            .copied()
            .ok_or(CorrectionError::InvalidCorner(index))
    }
}

/// Whether a corner is currently being dragged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DragState {
    /// No drag in progress.
    #[default]
    Idle,
    /// The given corner follows the pointer.
    Dragging(Corner),
}

/// Operations rejected by the correction state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CorrectionError {
    /// Another corner is already being dragged, or a drag is still open
    /// when confirming.
    #[error("corner {active:?} is already being dragged")]
    DragInProgress {
        /// The corner currently held.
        active: Corner,
    },

    /// A move arrived while no corner was held.
    #[error("no corner is being dragged")]
    NotDragging,

    /// Corner index outside `0..=3`.
    #[error("corner index {0} is out of range (expected 0..=3)")]
    InvalidCorner(usize),

    /// A move target had a NaN or infinite coordinate.
    #[error("corner position must be finite")]
    NonFinitePoint,
}

/// Corners under review, in relative space, with the drag state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "StoredCorrection")]
pub struct CorrectionState {
    corners: [RelativePoint; 4],
    drag: DragState,
    image: Dimensions,
}

/// Serialized form of [`CorrectionState`], re-checked on the way in.
#[derive(Deserialize)]
struct StoredCorrection {
    corners: [RelativePoint; 4],
    #[serde(default)]
    drag: DragState,
    image: Dimensions,
}

impl TryFrom<StoredCorrection> for CorrectionState {
    type Error = CorrectionError;

    fn try_from(stored: StoredCorrection) -> Result<Self, Self::Error> {
        if !stored.corners.iter().all(|c| c.is_finite()) {
            return Err(CorrectionError::NonFinitePoint);
        }
        let mut state = Self::new(stored.corners, stored.image);
        state.drag = stored.drag;
        Ok(state)
    }
}

impl CorrectionState {
    /// Start a review of `corners` (relative, TL, TR, BR, BL) on a frame
    /// of size `image`. Corners are clamped into `[0, 1]²`.
    #[must_use]
    pub fn new(corners: [RelativePoint; 4], image: Dimensions) -> Self {
        Self {
            corners: corners.map(RelativePoint::clamped),
            drag: DragState::Idle,
            image,
        }
    }

    /// Start a review from an absolute quadrilateral.
    #[must_use]
    pub fn from_quadrilateral(quad: &Quadrilateral, image: Dimensions) -> Self {
        Self::new(quad.to_relative(image), image)
    }

    /// Current corners in relative space.
    #[must_use]
    pub const fn corners(&self) -> &[RelativePoint; 4] {
        &self.corners
    }

    /// Size of the frame being corrected.
    #[must_use]
    pub const fn image(&self) -> Dimensions {
        self.image
    }

    /// Current drag state.
    #[must_use]
    pub const fn drag_state(&self) -> DragState {
        self.drag
    }

    /// The corner being dragged, if any.
    #[must_use]
    pub const fn active_corner(&self) -> Option<Corner> {
        match self.drag {
            DragState::Idle => None,
            DragState::Dragging(corner) => Some(corner),
        }
    }

    /// Grab `corner`.
    ///
    /// # Errors
    ///
    /// Returns [`CorrectionError::DragInProgress`] if a corner is already
    /// held; the state is unchanged.
    pub fn begin_drag(&mut self, corner: Corner) -> Result<(), CorrectionError> {
        if let DragState::Dragging(active) = self.drag {
            return Err(CorrectionError::DragInProgress { active });
        }
        self.drag = DragState::Dragging(corner);
        Ok(())
    }

    /// Move the held corner to `point`, clamped into `[0, 1]²`.
    ///
    /// The other three corners are untouched.
    ///
    /// # Errors
    ///
    /// Returns [`CorrectionError::NotDragging`] when idle and
    /// [`CorrectionError::NonFinitePoint`] for NaN or infinite input;
    /// the state is unchanged in both cases.
    pub fn move_to(&mut self, point: RelativePoint) -> Result<(), CorrectionError> {
        let DragState::Dragging(corner) = self.drag else {
            return Err(CorrectionError::NotDragging);
        };
        if !point.is_finite() {
            return Err(CorrectionError::NonFinitePoint);
        }
        self.corners[corner.index()] = point.clamped();
        Ok(())
    }

    /// Release the held corner. Calling this while idle is a no-op.
    pub const fn end_drag(&mut self) {
        self.drag = DragState::Idle;
    }

    /// Finish the review and convert the corners back to absolute pixels
    /// (`relative × (width, height)`).
    ///
    /// # Errors
    ///
    /// Returns [`CorrectionError::DragInProgress`] while a corner is held.
    pub fn confirm(&self) -> Result<Quadrilateral, CorrectionError> {
        if let DragState::Dragging(active) = self.drag {
            return Err(CorrectionError::DragInProgress { active });
        }
        Ok(Quadrilateral::from_relative(&self.corners, self.image))
    }

    /// Confirm and hand the quadrilateral to [`crate::scan`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::PipelineError::Correction`] while a corner is held,
    /// and otherwise any error from [`crate::scan`] (notably
    /// [`crate::PipelineError::InvalidQuadrilateral`] when the user
    /// dragged the corners into a degenerate shape).
    pub fn confirm_and_scan(
        &self,
        source: &PixelBuffer,
        config: &ScanConfig,
    ) -> Result<PixelBuffer, crate::PipelineError> {
        let quad = self.confirm()?;
        crate::scan(source, &quad, config)
    }

    /// The corner closest to `point` within `radius` (relative units).
    ///
    /// Distances are measured in relative space; ties go to the lower
    /// index.
    #[must_use]
    pub fn corner_near(&self, point: RelativePoint, radius: f64) -> Option<Corner> {
        let mut best: Option<(Corner, f64)> = None;
        for corner in Corner::ALL {
            let c = self.corners[corner.index()];
            let d = (c.x - point.x).hypot(c.y - point.y);
            if d <= radius && best.is_none_or(|(_, bd)| d < bd) {
                best = Some((corner, d));
            }
        }
        best.map(|(corner, _)| corner)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Point;

    fn rp(x: f64, y: f64) -> RelativePoint {
        RelativePoint::new(x, y)
    }

    fn review() -> CorrectionState {
        CorrectionState::new(
            [rp(0.1, 0.1), rp(0.9, 0.1), rp(0.9, 0.9), rp(0.1, 0.9)],
            Dimensions::new(1000, 500),
        )
    }

    #[test]
    fn drag_moves_only_the_held_corner() {
        let mut state = review();
        state.begin_drag(Corner::TopLeft).unwrap();
        state.move_to(rp(0.05, 0.05)).unwrap();
        state.end_drag();

        assert_eq!(state.drag_state(), DragState::Idle);
        assert_eq!(
            state.corners(),
            &[rp(0.05, 0.05), rp(0.9, 0.1), rp(0.9, 0.9), rp(0.1, 0.9)]
        );
    }

    #[test]
    fn move_clamps_into_unit_square() {
        let mut state = review();
        state.begin_drag(Corner::BottomRight).unwrap();
        state.move_to(rp(1.4, -0.2)).unwrap();
        assert_eq!(state.corners()[2], rp(1.0, 0.0));
        assert_eq!(state.active_corner(), Some(Corner::BottomRight));
    }

    #[test]
    fn move_while_idle_is_rejected() {
        let mut state = review();
        let before = state.clone();
        assert_eq!(state.move_to(rp(0.5, 0.5)), Err(CorrectionError::NotDragging));
        assert_eq!(state, before);
    }

    #[test]
    fn second_drag_is_rejected() {
        let mut state = review();
        state.begin_drag(Corner::TopRight).unwrap();
        assert_eq!(
            state.begin_drag(Corner::BottomLeft),
            Err(CorrectionError::DragInProgress {
                active: Corner::TopRight
            })
        );
        assert_eq!(state.active_corner(), Some(Corner::TopRight));
    }

    #[test]
    fn non_finite_move_is_rejected() {
        let mut state = review();
        state.begin_drag(Corner::TopLeft).unwrap();
        assert_eq!(
            state.move_to(rp(f64::NAN, 0.2)),
            Err(CorrectionError::NonFinitePoint)
        );
        assert_eq!(state.corners()[0], rp(0.1, 0.1));
    }

    #[test]
    fn end_drag_is_idempotent() {
        let mut state = review();
        state.end_drag();
        state.end_drag();
        assert_eq!(state.drag_state(), DragState::Idle);
    }

    #[test]
    fn confirm_converts_to_absolute() {
        let quad = review().confirm().unwrap();
        assert_eq!(quad.top_left(), Point::new(100.0, 50.0));
        assert_eq!(quad.top_right(), Point::new(900.0, 50.0));
        assert_eq!(quad.bottom_right(), Point::new(900.0, 450.0));
        assert_eq!(quad.bottom_left(), Point::new(100.0, 450.0));
    }

    #[test]
    fn confirm_during_drag_is_rejected() {
        let mut state = review();
        state.begin_drag(Corner::BottomLeft).unwrap();
        assert!(matches!(
            state.confirm(),
            Err(CorrectionError::DragInProgress { .. })
        ));
    }

    #[test]
    fn corner_index_conversion() {
        assert_eq!(Corner::try_from(2), Ok(Corner::BottomRight));
        assert_eq!(Corner::try_from(4), Err(CorrectionError::InvalidCorner(4)));
        for (i, corner) in Corner::ALL.iter().enumerate() {
            assert_eq!(corner.index(), i);
        }
    }

    #[test]
    fn from_quadrilateral_round_trips() {
        let frame = Dimensions::new(1000, 500);
        let quad = Quadrilateral::centered(frame, 0.8);
        let state = CorrectionState::from_quadrilateral(&quad, frame);
        let back = state.confirm().unwrap();
        for (a, b) in back.corners().iter().zip(quad.corners()) {
            assert!(a.distance(*b) < 1e-9, "{a:?} vs {b:?}");
        }
    }

    #[test]
    fn corner_near_picks_closest_within_radius() {
        let state = review();
        assert_eq!(state.corner_near(rp(0.12, 0.11), 0.05), Some(Corner::TopLeft));
        assert_eq!(state.corner_near(rp(0.88, 0.9), 0.05), Some(Corner::BottomRight));
        assert_eq!(state.corner_near(rp(0.5, 0.5), 0.05), None);
    }

    #[test]
    fn self_intersecting_drag_is_allowed_but_scan_rejects_it() {
        let mut state = review();
        state.begin_drag(Corner::TopRight).unwrap();
        state.move_to(rp(0.9, 0.9)).unwrap();
        state.end_drag();
        state.begin_drag(Corner::BottomRight).unwrap();
        state.move_to(rp(0.9, 0.1)).unwrap();
        state.end_drag();

        let source = PixelBuffer::from_pixel(1000, 500, image::Rgba([200, 200, 200, 255]));
        let result = state.confirm_and_scan(&source, &ScanConfig::default());
        assert!(matches!(
            result,
            Err(crate::PipelineError::InvalidQuadrilateral(_))
        ));
    }

    #[test]
    fn deserialized_state_is_clamped() {
        let json = r#"{
            "corners": [
                {"x": -0.5, "y": 0.1},
                {"x": 1.7, "y": 0.1},
                {"x": 0.9, "y": 0.9},
                {"x": 0.1, "y": 2.0}
            ],
            "drag": {"Dragging": "TopRight"},
            "image": {"width": 1000, "height": 500}
        }"#;
        let state: CorrectionState = serde_json::from_str(json).unwrap();
        assert_eq!(
            state.corners(),
            &[rp(0.0, 0.1), rp(1.0, 0.1), rp(0.9, 0.9), rp(0.1, 1.0)]
        );
        assert_eq!(state.active_corner(), Some(Corner::TopRight));
        assert_eq!(state.image(), Dimensions::new(1000, 500));
    }

    #[test]
    fn serialized_state_reloads_unchanged() {
        let mut state = review();
        state.begin_drag(Corner::BottomLeft).unwrap();
        let json = serde_json::to_string(&state).unwrap();
        let back: CorrectionState = serde_json::from_str(&json).unwrap();
        assert_eq!(back, state);
    }
}
