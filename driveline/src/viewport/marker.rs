//! Vehicle marker rotation animation.
//!
//! The heading rotates only the marker icon, never the map. Each animation
//! frame moves the displayed rotation a fixed fraction of the way toward the
//! target along the shortest arc, so the marker never spins the long way
//! round across north.
//!
//! ```text
//! frame:    0      1      2      3      ...
//! current: 350 → 353.5 → 355.9 → 357.6 → ... → 10 (target)
//!               (+30% of shortest delta each frame)
//! ```

use crate::heading::{normalize_degrees, shortest_delta};

/// Fraction of the remaining delta covered per frame.
pub const DEFAULT_STEP_FRACTION: f64 = 0.3;

/// Below this remaining delta (degrees) the marker snaps to the target.
pub const SNAP_EPSILON_DEG: f64 = 0.05;

/// Exponential-approach rotation animator.
#[derive(Debug, Clone, Default)]
pub struct MarkerRotation {
    current: Option<f64>,
    target: Option<f64>,
    /// Last value handed out by `step`, so unchanged frames emit nothing.
    emitted: Option<f64>,
}

impl MarkerRotation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Displayed rotation, `None` until the first target arrives.
    pub fn current(&self) -> Option<f64> {
        self.current
    }

    pub fn target(&self) -> Option<f64> {
        self.target
    }

    /// Set a new target rotation. The first target snaps immediately.
    pub fn set_target(&mut self, degrees: f64) {
        if !degrees.is_finite() {
            return;
        }
        let target = normalize_degrees(degrees);
        if self.current.is_none() {
            self.current = Some(target);
        }
        self.target = Some(target);
    }

    /// Advance one frame. Returns the new rotation when it differs from the
    /// last one returned.
    pub fn step(&mut self) -> Option<f64> {
        let (current, target) = (self.current?, self.target?);

        let delta = shortest_delta(current, target);
        let next = if delta.abs() > SNAP_EPSILON_DEG {
            normalize_degrees(current + delta * DEFAULT_STEP_FRACTION)
        } else {
            target
        };
        self.current = Some(next);

        if self.emitted == Some(next) {
            return None;
        }
        self.emitted = Some(next);
        Some(next)
    }

    /// Forget the last emitted value so the next frame re-sends the rotation.
    pub fn invalidate(&mut self) {
        self.emitted = None;
    }

    /// Whether the animation has settled on its target.
    pub fn is_settled(&self) -> bool {
        self.current == self.target
    }
}
