//! Scroll Lock Controller
//!
//! Freezes a scroll container while a trigger's sequence plays and restores
//! exactly what was there before. One [`ScrollLock`] exists per container; the
//! dispatchers that share a container share it through a [`SharedScroll`], so
//! a second lock never overwrites the first capture.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use folio_core::{FolioError, Point};

use crate::container::{ScrollContainer, ScrollSettings};

/// Container state captured by [`ScrollLock::lock`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LockSnapshot {
    pub was_enabled: bool,
    pub allow_vertical: bool,
    pub allow_horizontal: bool,
    pub allow_momentum: bool,
}

impl From<ScrollSettings> for LockSnapshot {
    fn from(settings: ScrollSettings) -> Self {
        Self {
            was_enabled: settings.enabled,
            allow_vertical: settings.vertical,
            allow_horizontal: settings.horizontal,
            allow_momentum: settings.momentum,
        }
    }
}

impl From<LockSnapshot> for ScrollSettings {
    fn from(snapshot: LockSnapshot) -> Self {
        Self {
            enabled: snapshot.was_enabled,
            vertical: snapshot.allow_vertical,
            horizontal: snapshot.allow_horizontal,
            momentum: snapshot.allow_momentum,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LockOutcome {
    /// State captured and scrolling disabled
    Locked,
    /// The container was already locked; nothing changed
    AlreadyLocked,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UnlockOutcome {
    /// The captured state was written back
    Restored,
    /// No snapshot was held; the fallback settings were applied
    FallbackApplied,
    /// The container was not locked
    NotLocked,
}

/// Lock state for one container
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScrollLock {
    snapshot: Option<LockSnapshot>,
    locked: bool,
    fallback: ScrollSettings,
}

impl Default for ScrollLock {
    fn default() -> Self {
        Self::new(ScrollSettings::default())
    }
}

impl ScrollLock {
    /// `fallback` is applied by `unlock` when no snapshot is held
    pub fn new(fallback: ScrollSettings) -> Self {
        Self {
            snapshot: None,
            locked: false,
            fallback,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn snapshot(&self) -> Option<LockSnapshot> {
        self.snapshot
    }

    pub fn fallback(&self) -> ScrollSettings {
        self.fallback
    }

    pub fn lock(&mut self, container: &mut dyn ScrollContainer) -> LockOutcome {
        if self.locked {
            tracing::debug!(error = %FolioError::DoubleLockAttempt, "keeping first snapshot");
            return LockOutcome::AlreadyLocked;
        }

        let snapshot = LockSnapshot::from(container.settings());
        container.apply_settings(ScrollSettings::LOCKED);
        container.set_velocity(Point::default());
        self.snapshot = Some(snapshot);
        self.locked = true;
        tracing::debug!(?snapshot, "scroll locked");
        LockOutcome::Locked
    }

    /// Restore each captured flag independently
    pub fn unlock(&mut self, container: &mut dyn ScrollContainer) -> UnlockOutcome {
        if !self.locked {
            return UnlockOutcome::NotLocked;
        }
        self.locked = false;

        match self.snapshot.take() {
            Some(snapshot) => {
                container.apply_settings(snapshot.into());
                tracing::debug!(?snapshot, "scroll restored");
                UnlockOutcome::Restored
            }
            None => {
                container.apply_settings(self.fallback);
                tracing::warn!(fallback = ?self.fallback, "unlock without snapshot, applied fallback");
                UnlockOutcome::FallbackApplied
            }
        }
    }

    /// Forget the captured state while staying locked
    ///
    /// Used when the host reconfigures the container under a lock; the next
    /// `unlock` applies the fallback.
    pub fn discard(&mut self) -> Option<LockSnapshot> {
        self.snapshot.take()
    }
}

// ============================================================================
// Shared controller
// ============================================================================

/// A container together with its lock
pub struct ScrollController {
    container: Box<dyn ScrollContainer>,
    lock: ScrollLock,
}

impl ScrollController {
    pub fn new(container: impl ScrollContainer + 'static, fallback: ScrollSettings) -> Self {
        Self {
            container: Box::new(container),
            lock: ScrollLock::new(fallback),
        }
    }

    pub fn lock(&mut self) -> LockOutcome {
        self.lock.lock(self.container.as_mut())
    }

    pub fn unlock(&mut self) -> UnlockOutcome {
        self.lock.unlock(self.container.as_mut())
    }

    pub fn discard(&mut self) -> Option<LockSnapshot> {
        self.lock.discard()
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_locked()
    }

    pub fn snapshot(&self) -> Option<LockSnapshot> {
        self.lock.snapshot()
    }

    pub fn settings(&self) -> ScrollSettings {
        self.container.settings()
    }
}

impl std::fmt::Debug for ScrollController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScrollController")
            .field("settings", &self.container.settings())
            .field("lock", &self.lock)
            .finish()
    }
}

/// Cloneable handle to one container's [`ScrollController`]
#[derive(Clone, Debug)]
pub struct SharedScroll {
    inner: Arc<Mutex<ScrollController>>,
}

impl SharedScroll {
    pub fn new(container: impl ScrollContainer + 'static, fallback: ScrollSettings) -> Self {
        Self {
            inner: Arc::new(Mutex::new(ScrollController::new(container, fallback))),
        }
    }

    fn controller(&self) -> MutexGuard<'_, ScrollController> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn lock(&self) -> LockOutcome {
        self.controller().lock()
    }

    pub fn unlock(&self) -> UnlockOutcome {
        self.controller().unlock()
    }

    pub fn discard(&self) -> Option<LockSnapshot> {
        self.controller().discard()
    }

    pub fn is_locked(&self) -> bool {
        self.controller().is_locked()
    }

    pub fn snapshot(&self) -> Option<LockSnapshot> {
        self.controller().snapshot()
    }

    pub fn settings(&self) -> ScrollSettings {
        self.controller().settings()
    }

    /// True if both handles point at the same controller
    pub fn same_container(&self, other: &SharedScroll) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::ScrollView;
    use folio_core::Size;

    fn view(settings: ScrollSettings) -> ScrollView {
        ScrollView::new(Size::new(100.0, 200.0), Size::new(100.0, 1000.0)).with_settings(settings)
    }

    #[test]
    fn test_lock_then_unlock_restores() {
        let mut view = view(ScrollSettings::vertical_list());
        let mut lock = ScrollLock::default();

        assert_eq!(lock.lock(&mut view), LockOutcome::Locked);
        assert_eq!(view.settings(), ScrollSettings::LOCKED);
        assert!(lock.is_locked());

        assert_eq!(lock.unlock(&mut view), UnlockOutcome::Restored);
        assert_eq!(view.settings(), ScrollSettings::vertical_list());
        assert!(!lock.is_locked());
    }

    #[test]
    fn test_double_lock_keeps_first_snapshot() {
        let original = ScrollSettings {
            enabled: true,
            vertical: true,
            horizontal: true,
            momentum: false,
        };
        let mut view = view(original);
        let mut lock = ScrollLock::default();

        lock.lock(&mut view);
        assert_eq!(lock.lock(&mut view), LockOutcome::AlreadyLocked);
        assert_eq!(lock.snapshot(), Some(original.into()));

        lock.unlock(&mut view);
        assert_eq!(view.settings(), original);
    }

    #[test]
    fn test_axes_restored_independently() {
        let original = ScrollSettings {
            enabled: true,
            vertical: false,
            horizontal: true,
            momentum: true,
        };
        let mut view = view(original);
        let mut lock = ScrollLock::default();
        lock.lock(&mut view);
        lock.unlock(&mut view);
        assert_eq!(view.settings(), original);
    }

    #[test]
    fn test_disabled_container_stays_disabled() {
        let original = ScrollSettings {
            enabled: false,
            ..ScrollSettings::vertical_list()
        };
        let mut view = view(original);
        let mut lock = ScrollLock::default();
        lock.lock(&mut view);
        lock.unlock(&mut view);
        assert!(!view.settings().enabled);
    }

    #[test]
    fn test_lock_zeroes_velocity() {
        let mut view = view(ScrollSettings::vertical_list());
        view.fling(0.0, 800.0);
        let mut lock = ScrollLock::default();
        lock.lock(&mut view);
        assert_eq!(view.velocity(), Point::default());
        assert!(!view.step(0.1));
    }

    #[test]
    fn test_unlock_without_lock_is_noop() {
        let mut view = view(ScrollSettings::LOCKED);
        let mut lock = ScrollLock::default();
        assert_eq!(lock.unlock(&mut view), UnlockOutcome::NotLocked);
        assert_eq!(view.settings(), ScrollSettings::LOCKED);
    }

    #[test]
    fn test_discarded_snapshot_applies_fallback() {
        let mut view = view(ScrollSettings::LOCKED);
        let mut lock = ScrollLock::new(ScrollSettings::horizontal_pager());
        lock.lock(&mut view);
        assert_eq!(lock.discard(), Some(ScrollSettings::LOCKED.into()));
        assert_eq!(lock.unlock(&mut view), UnlockOutcome::FallbackApplied);
        assert_eq!(view.settings(), ScrollSettings::horizontal_pager());
    }

    #[test]
    fn test_shared_scroll_handles_share_one_lock() {
        let shared = view(ScrollSettings::vertical_list()).shared();
        let a = SharedScroll::new(Arc::clone(&shared), ScrollSettings::default());
        let b = a.clone();

        assert_eq!(a.lock(), LockOutcome::Locked);
        assert_eq!(b.lock(), LockOutcome::AlreadyLocked);
        assert!(b.is_locked());
        assert!(a.same_container(&b));

        assert_eq!(b.unlock(), UnlockOutcome::Restored);
        assert!(!a.is_locked());
        assert_eq!(a.settings(), ScrollSettings::vertical_list());
    }
}
