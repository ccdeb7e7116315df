//! Centering Evaluator
//!
//! A target is centered when the viewport's screen-space center lies inside
//! the target rectangle and, along the scroll axis, sits within
//! `tolerance * extent` of the target's own center. The boundary is inclusive.

use folio_core::{Point, Rect};
use serde::{Deserialize, Serialize};

/// Scroll axis a trigger measures along
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    /// Vertically scrolling page stacks
    #[default]
    Vertical,
    /// Horizontally scrolling pagers
    Horizontal,
}

impl Axis {
    /// Coordinate of `point` along this axis
    pub fn along(&self, point: Point) -> f32 {
        match self {
            Axis::Vertical => point.y,
            Axis::Horizontal => point.x,
        }
    }

    /// Extent of `rect` along this axis
    pub fn extent(&self, rect: &Rect) -> f32 {
        match self {
            Axis::Vertical => rect.height(),
            Axis::Horizontal => rect.width(),
        }
    }
}

/// Centering tolerance as a fraction of the target's extent, in `[0, 0.5]`
#[derive(Clone, Copy, Debug, PartialEq, PartialOrd)]
pub struct Tolerance(f32);

impl Tolerance {
    pub const MIN: f32 = 0.0;
    pub const MAX: f32 = 0.5;
    pub const DEFAULT: Tolerance = Tolerance(0.1);

    /// Clamp `fraction` into range
    ///
    /// A non-finite fraction falls back to [`Tolerance::DEFAULT`].
    pub fn new(fraction: f32) -> Self {
        if !fraction.is_finite() {
            tracing::warn!(fraction, "non-finite centering tolerance, using default");
            return Self::DEFAULT;
        }
        let clamped = fraction.clamp(Self::MIN, Self::MAX);
        if clamped != fraction {
            tracing::warn!(fraction, clamped, "centering tolerance clamped");
        }
        Self(clamped)
    }

    /// `Some` only if `fraction` is already in range
    pub fn checked(fraction: f32) -> Option<Self> {
        (Self::MIN..=Self::MAX)
            .contains(&fraction)
            .then_some(Self(fraction))
    }

    pub fn fraction(&self) -> f32 {
        self.0
    }
}

impl Default for Tolerance {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Decides whether a target is centered in a viewport
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CenteringEvaluator {
    axis: Axis,
    tolerance: Tolerance,
}

impl CenteringEvaluator {
    pub fn new(axis: Axis, tolerance: Tolerance) -> Self {
        Self { axis, tolerance }
    }

    pub fn vertical(tolerance: Tolerance) -> Self {
        Self::new(Axis::Vertical, tolerance)
    }

    pub fn horizontal(tolerance: Tolerance) -> Self {
        Self::new(Axis::Horizontal, tolerance)
    }

    pub fn axis(&self) -> Axis {
        self.axis
    }

    pub fn tolerance(&self) -> Tolerance {
        self.tolerance
    }

    pub fn is_centered(&self, viewport: &Rect, target: &Rect) -> bool {
        if viewport.is_degenerate() || target.is_degenerate() {
            return false;
        }

        let center = viewport.center();
        if !target.contains(center) {
            return false;
        }

        let distance = (self.axis.along(center) - self.axis.along(target.center())).abs();
        distance <= self.axis.extent(target) * self.tolerance.fraction()
    }

    /// Like [`is_centered`](Self::is_centered), false when either side is missing
    pub fn evaluate(&self, viewport: Option<Rect>, target: Option<Rect>) -> bool {
        match (viewport, target) {
            (Some(viewport), Some(target)) => self.is_centered(&viewport, &target),
            _ => false,
        }
    }
}

/// Vertical centering test
pub fn is_centered(viewport: &Rect, target: &Rect, tolerance: f32) -> bool {
    CenteringEvaluator::vertical(Tolerance::new(tolerance)).is_centered(viewport, target)
}
