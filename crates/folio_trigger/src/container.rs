//! Scroll containers
//!
//! [`ScrollContainer`] is the slice of a host scroll view the lock needs:
//! the enabled flag, per-axis permissions, momentum and velocity.
//! [`ScrollView`] is an in-memory container with simple momentum physics,
//! used by headless hosts and the simulator.

use std::sync::{Arc, Mutex, PoisonError};

use folio_core::{Event, Point, Size, SubscriptionId};
use serde::{Deserialize, Serialize};

/// The scroll permissions a lock captures and restores
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct ScrollSettings {
    pub enabled: bool,
    pub vertical: bool,
    pub horizontal: bool,
    pub momentum: bool,
}

impl ScrollSettings {
    /// Nothing moves
    pub const LOCKED: ScrollSettings = ScrollSettings {
        enabled: false,
        vertical: false,
        horizontal: false,
        momentum: false,
    };

    /// A vertically scrolling list with momentum
    pub fn vertical_list() -> Self {
        Self {
            enabled: true,
            vertical: true,
            horizontal: false,
            momentum: true,
        }
    }

    /// A horizontally scrolling pager with momentum
    pub fn horizontal_pager() -> Self {
        Self {
            enabled: true,
            vertical: false,
            horizontal: true,
            momentum: true,
        }
    }
}

impl Default for ScrollSettings {
    fn default() -> Self {
        Self::vertical_list()
    }
}

/// A scrollable region whose permissions can be toggled
pub trait ScrollContainer: Send {
    fn settings(&self) -> ScrollSettings;

    fn apply_settings(&mut self, settings: ScrollSettings);

    /// Current scroll velocity in pixels per second
    fn velocity(&self) -> Point;

    fn set_velocity(&mut self, velocity: Point);
}

// ============================================================================
// In-memory scroll view
// ============================================================================

/// Momentum tuning
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollPhysicsConfig {
    /// Deceleration in pixels/second²
    pub deceleration: f32,
    /// Velocity below which momentum stops (pixels/second)
    pub velocity_threshold: f32,
}

impl Default for ScrollPhysicsConfig {
    fn default() -> Self {
        Self {
            deceleration: 1500.0,
            velocity_threshold: 10.0,
        }
    }
}

/// In-memory scroll view
///
/// Offsets are positive in the direction of travel: `offset.y = 100` means the
/// content has moved 100px up. Value-changed subscribers are invoked on every
/// offset change with the new offset.
pub struct ScrollView {
    offset: Point,
    velocity: Point,
    viewport: Size,
    content: Size,
    settings: ScrollSettings,
    physics: ScrollPhysicsConfig,
    value_changed: Event<Point>,
}

/// A scroll view shared between a host and a [`ScrollController`](crate::ScrollController)
pub type SharedScrollView = Arc<Mutex<ScrollView>>;

impl ScrollView {
    pub fn new(viewport: Size, content: Size) -> Self {
        Self {
            offset: Point::default(),
            velocity: Point::default(),
            viewport,
            content,
            settings: ScrollSettings::default(),
            physics: ScrollPhysicsConfig::default(),
            value_changed: Event::new(),
        }
    }

    pub fn with_settings(mut self, settings: ScrollSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn with_physics(mut self, physics: ScrollPhysicsConfig) -> Self {
        self.physics = physics;
        self
    }

    pub fn shared(self) -> SharedScrollView {
        Arc::new(Mutex::new(self))
    }

    pub fn offset(&self) -> Point {
        self.offset
    }

    pub fn viewport(&self) -> Size {
        self.viewport
    }

    pub fn content(&self) -> Size {
        self.content
    }

    pub fn set_content(&mut self, content: Size) {
        self.content = content;
        self.set_offset(self.offset);
    }

    /// Largest offset on each axis
    pub fn max_offset(&self) -> Point {
        Point::new(
            (self.content.width - self.viewport.width).max(0.0),
            (self.content.height - self.viewport.height).max(0.0),
        )
    }

    /// Offset as a fraction of the scrollable range (0 when nothing scrolls)
    pub fn normalized_offset(&self) -> Point {
        let max = self.max_offset();
        let fraction = |offset: f32, max: f32| if max > 0.0 { offset / max } else { 0.0 };
        Point::new(fraction(self.offset.x, max.x), fraction(self.offset.y, max.y))
    }

    /// Move the content programmatically, ignoring the scroll permissions
    pub fn set_offset(&mut self, offset: Point) {
        if !offset.is_finite() {
            tracing::warn!(?offset, "ignoring non-finite scroll offset");
            return;
        }
        let max = self.max_offset();
        let clamped = Point::new(offset.x.clamp(0.0, max.x), offset.y.clamp(0.0, max.y));
        if clamped != self.offset {
            self.offset = clamped;
            self.value_changed.emit(&clamped);
        }
    }

    /// Apply a user drag. Returns true if the offset moved.
    pub fn scroll_by(&mut self, dx: f32, dy: f32) -> bool {
        if !self.settings.enabled {
            return false;
        }
        let dx = if self.settings.horizontal { dx } else { 0.0 };
        let dy = if self.settings.vertical { dy } else { 0.0 };
        let before = self.offset;
        self.set_offset(Point::new(before.x + dx, before.y + dy));
        self.offset != before
    }

    /// Release a drag with velocity (pixels/second). Ignored without momentum.
    pub fn fling(&mut self, vx: f32, vy: f32) {
        if !(self.settings.enabled && self.settings.momentum) {
            return;
        }
        self.velocity = Point::new(
            if self.settings.horizontal { vx } else { 0.0 },
            if self.settings.vertical { vy } else { 0.0 },
        );
    }

    /// Integrate momentum. Returns true while still moving.
    pub fn step(&mut self, dt: f32) -> bool {
        if !(dt.is_finite() && dt > 0.0) || self.velocity == Point::default() {
            return false;
        }

        let before = self.offset;
        self.set_offset(Point::new(
            before.x + self.velocity.x * dt,
            before.y + self.velocity.y * dt,
        ));

        let decay = self.physics.deceleration * dt;
        let slow = |v: f32, moved: bool| {
            if !moved {
                // Pinned against an edge
                return 0.0;
            }
            let v = v.signum() * (v.abs() - decay).max(0.0);
            if v.abs() < self.physics.velocity_threshold {
                0.0
            } else {
                v
            }
        };
        self.velocity = Point::new(
            slow(self.velocity.x, self.offset.x != before.x),
            slow(self.velocity.y, self.offset.y != before.y),
        );

        self.velocity != Point::default()
    }

    /// Observe offset changes
    pub fn on_value_changed<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Point) + Send + Sync + 'static,
    {
        self.value_changed.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.value_changed.unsubscribe(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.value_changed.subscriber_count()
    }
}

impl std::fmt::Debug for ScrollView {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollView")
            .field("offset", &self.offset)
            .field("velocity", &self.velocity)
            .field("viewport", &self.viewport)
            .field("content", &self.content)
            .field("settings", &self.settings)
            .finish()
    }
}

impl ScrollContainer for ScrollView {
    fn settings(&self) -> ScrollSettings {
        self.settings
    }

    fn apply_settings(&mut self, settings: ScrollSettings) {
        self.settings = settings;
    }

    fn velocity(&self) -> Point {
        self.velocity
    }

    fn set_velocity(&mut self, velocity: Point) {
        self.velocity = velocity;
    }
}

impl ScrollContainer for SharedScrollView {
    fn settings(&self) -> ScrollSettings {
        self.lock().unwrap_or_else(PoisonError::into_inner).settings
    }

    fn apply_settings(&mut self, settings: ScrollSettings) {
        self.lock().unwrap_or_else(PoisonError::into_inner).settings = settings;
    }

    fn velocity(&self) -> Point {
        self.lock().unwrap_or_else(PoisonError::into_inner).velocity
    }

    fn set_velocity(&mut self, velocity: Point) {
        self.lock().unwrap_or_else(PoisonError::into_inner).velocity = velocity;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn view() -> ScrollView {
        ScrollView::new(Size::new(100.0, 200.0), Size::new(100.0, 1000.0))
    }

    #[test]
    fn test_scroll_by_respects_axes_and_bounds() {
        let mut view = view();
        assert!(view.scroll_by(50.0, 120.0));
        assert_eq!(view.offset(), Point::new(0.0, 120.0));

        view.scroll_by(0.0, 10_000.0);
        assert_eq!(view.offset().y, 800.0);
        assert_eq!(view.normalized_offset().y, 1.0);

        view.scroll_by(0.0, -10_000.0);
        assert_eq!(view.offset().y, 0.0);
    }

    #[test]
    fn test_disabled_view_ignores_input() {
        let mut view = view().with_settings(ScrollSettings::LOCKED);
        assert!(!view.scroll_by(0.0, 50.0));
        view.fling(0.0, 500.0);
        assert!(!view.step(0.1));
        assert_eq!(view.offset(), Point::default());
    }

    #[test]
    fn test_momentum_decays_to_rest() {
        let mut view = view();
        view.fling(0.0, 600.0);
        let mut frames = 0;
        while view.step(1.0 / 60.0) {
            frames += 1;
            assert!(frames < 1000);
        }
        assert!(view.offset().y > 0.0);
        assert_eq!(view.velocity(), Point::default());
    }

    #[test]
    fn test_momentum_stops_at_edge() {
        let mut view = view();
        view.fling(0.0, -500.0);
        assert!(!view.step(0.1));
        assert_eq!(view.velocity(), Point::default());
    }

    #[test]
    fn test_value_changed_fires_on_movement_only() {
        let mut view = view();
        let count = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&count);
        view.on_value_changed(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
        });

        view.scroll_by(0.0, 10.0);
        view.scroll_by(0.0, 0.0);
        view.set_offset(Point::new(0.0, 10.0));
        view.set_offset(Point::new(f32::NAN, 0.0));
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_shared_view_is_a_container() {
        let shared = view().shared();
        let mut container: Box<dyn ScrollContainer> = Box::new(Arc::clone(&shared));
        container.apply_settings(ScrollSettings::horizontal_pager());
        let settings = shared.lock().unwrap().settings();
        assert_eq!(settings, ScrollSettings::horizontal_pager());
    }
}
