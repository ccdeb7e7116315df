//! Collaborator interfaces
//!
//! The trigger engine drives panels, media and modals it does not own. Hosts
//! implement these traits over their engine objects and hand a [`Services`]
//! bundle to the scene at construction; nothing here is a process-wide
//! singleton.
//!
//! The `Memory*` types are complete headless implementations used by tests and
//! by the `folio simulate` command.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(name: impl Into<String>) -> Self {
                Self(name.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(name: &str) -> Self {
                Self(name.to_string())
            }
        }
    };
}

string_id! {
    /// A panel whose opacity and visibility a sequence drives
    PanelId
}

string_id! {
    /// An audio or video clip known to the media collaborator
    MediaHandle
}

string_id! {
    /// A modal dialog known to the modal collaborator
    ModalId
}

/// Opacity and visibility of content panels
pub trait PanelSurface: Send + Sync {
    /// Current opacity, or `None` if the panel is unknown
    fn opacity(&self, panel: &PanelId) -> Option<f32>;

    fn set_opacity(&self, panel: &PanelId, opacity: f32);

    fn set_active(&self, panel: &PanelId, active: bool);

    /// Current visibility, or `None` if the panel is unknown
    fn is_active(&self, panel: &PanelId) -> Option<bool>;
}

/// Callback invoked once when a clip stops playing on its own
pub type PlaybackEndedCallback = Box<dyn FnOnce() + Send>;

/// Audio/video playback
pub trait MediaPlayback: Send + Sync {
    fn play(&self, handle: &MediaHandle);

    fn stop(&self, handle: &MediaHandle);

    fn is_playing(&self, handle: &MediaHandle) -> bool;

    /// Register a one-shot callback for the end of the current playback
    fn on_playback_ended(&self, handle: &MediaHandle, callback: PlaybackEndedCallback);
}

/// Modal and overlay display
pub trait ModalDisplay: Send + Sync {
    fn show(&self, modal: &ModalId);

    fn hide(&self, modal: &ModalId);

    fn is_visible(&self, modal: &ModalId) -> bool;
}

/// Collaborators injected into a scene
#[derive(Clone)]
pub struct Services {
    pub panels: Arc<dyn PanelSurface>,
    pub media: Arc<dyn MediaPlayback>,
    pub modals: Arc<dyn ModalDisplay>,
}

impl Services {
    pub fn new(
        panels: Arc<dyn PanelSurface>,
        media: Arc<dyn MediaPlayback>,
        modals: Arc<dyn ModalDisplay>,
    ) -> Self {
        Self {
            panels,
            media,
            modals,
        }
    }

    /// Services backed entirely by the in-memory implementations
    pub fn headless() -> Self {
        Self::new(
            Arc::new(MemoryPanels::new()),
            Arc::new(MemoryMedia::new()),
            Arc::new(MemoryModals::new()),
        )
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

// ============================================================================
// Headless implementations
// ============================================================================

#[derive(Clone, Copy, Debug, PartialEq)]
struct PanelState {
    opacity: f32,
    active: bool,
}

#[derive(Debug, Default)]
struct PanelsInner {
    panels: FxHashMap<PanelId, PanelState>,
    writes: FxHashMap<PanelId, usize>,
}

/// In-memory panel surface
#[derive(Debug, Default)]
pub struct MemoryPanels {
    inner: Mutex<PanelsInner>,
}

impl MemoryPanels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a panel
    pub fn insert(&self, panel: impl Into<PanelId>, opacity: f32, active: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner
            .panels
            .insert(panel.into(), PanelState { opacity, active });
    }

    /// Number of opacity writes the panel has received
    pub fn opacity_writes(&self, panel: &PanelId) -> usize {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.writes.get(panel).copied().unwrap_or(0)
    }
}

impl PanelSurface for MemoryPanels {
    fn opacity(&self, panel: &PanelId) -> Option<f32> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.panels.get(panel).map(|p| p.opacity)
    }

    fn set_opacity(&self, panel: &PanelId, opacity: f32) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(state) = inner.panels.get_mut(panel) else {
            tracing::warn!(%panel, "set_opacity on unknown panel");
            return;
        };
        state.opacity = opacity;
        *inner.writes.entry(panel.clone()).or_insert(0) += 1;
    }

    fn set_active(&self, panel: &PanelId, active: bool) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        match inner.panels.get_mut(panel) {
            Some(state) => state.active = active,
            None => tracing::warn!(%panel, "set_active on unknown panel"),
        }
    }

    fn is_active(&self, panel: &PanelId) -> Option<bool> {
        let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.panels.get(panel).map(|p| p.active)
    }
}

/// A call recorded by [`MemoryMedia`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MediaCall {
    Play(MediaHandle),
    Stop(MediaHandle),
}

#[derive(Default)]
struct MediaInner {
    playing: FxHashSet<MediaHandle>,
    ended: FxHashMap<MediaHandle, Vec<PlaybackEndedCallback>>,
    calls: Vec<MediaCall>,
}

/// In-memory media player
///
/// Clips play until [`MemoryMedia::finish`] is called, which simulates the
/// clip reaching its end.
#[derive(Default)]
pub struct MemoryMedia {
    inner: Mutex<MediaInner>,
}

impl MemoryMedia {
    pub fn new() -> Self {
        Self::default()
    }

    /// End playback of `handle` naturally, firing ended callbacks
    pub fn finish(&self, handle: &MediaHandle) {
        let callbacks = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.playing.remove(handle);
            inner.ended.remove(handle).unwrap_or_default()
        };
        for callback in callbacks {
            callback();
        }
    }

    /// Every play/stop call in order
    pub fn calls(&self) -> Vec<MediaCall> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .calls
            .clone()
    }
}

impl MediaPlayback for MemoryMedia {
    fn play(&self, handle: &MediaHandle) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.playing.insert(handle.clone());
        // Callbacks belong to the playback they were registered for
        inner.ended.remove(handle);
        inner.calls.push(MediaCall::Play(handle.clone()));
    }

    fn stop(&self, handle: &MediaHandle) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.playing.remove(handle);
        // A stopped clip never reaches its end
        inner.ended.remove(handle);
        inner.calls.push(MediaCall::Stop(handle.clone()));
    }

    fn is_playing(&self, handle: &MediaHandle) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .playing
            .contains(handle)
    }

    fn on_playback_ended(&self, handle: &MediaHandle, callback: PlaybackEndedCallback) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .ended
            .entry(handle.clone())
            .or_default()
            .push(callback);
    }
}

impl fmt::Debug for MemoryMedia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryMedia")
            .field("calls", &self.calls())
            .finish()
    }
}

#[derive(Debug, Default)]
struct ModalsInner {
    visible: FxHashSet<ModalId>,
    shown: Vec<ModalId>,
}

/// In-memory modal display
#[derive(Debug, Default)]
pub struct MemoryModals {
    inner: Mutex<ModalsInner>,
}

impl MemoryModals {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every modal ever shown, in order
    pub fn shown(&self) -> Vec<ModalId> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .shown
            .clone()
    }
}

impl ModalDisplay for MemoryModals {
    fn show(&self, modal: &ModalId) {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.visible.insert(modal.clone());
        inner.shown.push(modal.clone());
    }

    fn hide(&self, modal: &ModalId) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .visible
            .remove(modal);
    }

    fn is_visible(&self, modal: &ModalId) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .visible
            .contains(modal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[test]
    fn test_memory_panels_track_writes() {
        let panels = MemoryPanels::new();
        let page = PanelId::from("page");
        panels.insert("page", 0.0, false);

        panels.set_opacity(&page, 0.5);
        panels.set_active(&page, true);

        assert_eq!(panels.opacity(&page), Some(0.5));
        assert_eq!(panels.is_active(&page), Some(true));
        assert_eq!(panels.opacity_writes(&page), 1);
        assert_eq!(panels.opacity(&PanelId::from("missing")), None);
    }

    #[test]
    fn test_memory_media_finish_fires_ended() {
        let media = MemoryMedia::new();
        let clip = MediaHandle::from("clip");
        let ended = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ended);

        media.play(&clip);
        media.on_playback_ended(&clip, Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(media.is_playing(&clip));

        media.finish(&clip);
        assert!(!media.is_playing(&clip));
        assert!(ended.load(Ordering::SeqCst));
    }

    #[test]
    fn test_memory_media_stop_drops_ended_callbacks() {
        let media = MemoryMedia::new();
        let clip = MediaHandle::from("clip");
        let ended = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&ended);

        media.play(&clip);
        media.on_playback_ended(&clip, Box::new(move || flag.store(true, Ordering::SeqCst)));
        media.stop(&clip);
        media.finish(&clip);

        assert!(!ended.load(Ordering::SeqCst));
        assert_eq!(
            media.calls(),
            vec![MediaCall::Play(clip.clone()), MediaCall::Stop(clip)]
        );
    }

    #[test]
    fn test_memory_media_replay_drops_stale_callbacks() {
        let media = MemoryMedia::new();
        let clip = MediaHandle::from("clip");
        let stale = Arc::new(AtomicBool::new(false));
        let fresh = Arc::new(AtomicBool::new(false));

        media.play(&clip);
        let flag = Arc::clone(&stale);
        media.on_playback_ended(&clip, Box::new(move || flag.store(true, Ordering::SeqCst)));

        media.play(&clip);
        let flag = Arc::clone(&fresh);
        media.on_playback_ended(&clip, Box::new(move || flag.store(true, Ordering::SeqCst)));
        media.finish(&clip);

        assert!(!stale.load(Ordering::SeqCst));
        assert!(fresh.load(Ordering::SeqCst));
    }

    #[test]
    fn test_memory_modals() {
        let modals = MemoryModals::new();
        let intro = ModalId::from("intro");
        modals.show(&intro);
        assert!(modals.is_visible(&intro));
        modals.hide(&intro);
        assert!(!modals.is_visible(&intro));
        assert_eq!(modals.shown(), vec![intro]);
    }
}
