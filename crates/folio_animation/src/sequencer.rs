//! Frame-stepped sequencer
//!
//! Runs [`Sequence`]s cooperatively on the caller's frame loop. Nothing here
//! spawns threads or sleeps: every call to [`Sequencer::advance`] moves each
//! running sequence forward by the frame's elapsed time, carrying leftover
//! time from a finished step into the next one.
//!
//! A panel is owned by the sequence that was last started on it. Starting a
//! new sequence on an owned panel supersedes the old one, which stops writing
//! immediately and reports [`SequenceOutcome::Superseded`].
//!
//! Step side effects (collaborator calls, custom callbacks) and finish
//! callbacks run with the sequencer unlocked, so they may start or stop other
//! sequences through a [`SequencerHandle`].
//!
//! ```rust
//! use folio_animation::{Sequence, Sequencer};
//! use folio_core::{MemoryPanels, PanelId, PanelSurface, Services};
//! use std::sync::Arc;
//!
//! let panels = Arc::new(MemoryPanels::new());
//! panels.insert("page", 0.0, true);
//! let services = Services {
//!     panels: panels.clone(),
//!     ..Services::headless()
//! };
//!
//! let sequencer = Sequencer::new(services);
//! sequencer.run(Sequence::new().on_panel("page").fade_in(1.0));
//! sequencer.advance(0.25);
//! sequencer.advance(0.25);
//!
//! assert_eq!(panels.opacity(&PanelId::from("page")), Some(0.5));
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use folio_core::{Event, FolioError, PanelId, Services, SubscriptionId};
use rustc_hash::FxHashMap;
use slotmap::{new_key_type, SlotMap};
use smallvec::SmallVec;

use crate::sequence::{Sequence, SequenceStep, StopBehavior};

new_key_type! {
    /// Handle to a sequence started with `run()`
    pub struct SequenceId;
}

/// How a sequence ended
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SequenceOutcome {
    /// Every step ran
    Completed,
    /// Stopped through `stop()` / `stop_all()`
    Cancelled,
    /// Another sequence was started on the same panel
    Superseded,
}

/// Delivered exactly once per sequence
#[derive(Clone, Debug, PartialEq)]
pub struct SequenceFinished {
    pub id: SequenceId,
    pub label: Option<String>,
    pub panel: Option<PanelId>,
    pub outcome: SequenceOutcome,
}

/// One-shot callback for a single sequence's end
pub type FinishCallback = Box<dyn FnOnce(&SequenceFinished) + Send>;

/// Sequencer configuration
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SequencerConfig {
    /// Largest frame delta accepted by `advance()`, in seconds. A frame that
    /// took longer (window drag, debugger pause) is clamped to this.
    pub max_dt: f32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self { max_dt: 0.25 }
    }
}

// ============================================================================
// Running state
// ============================================================================

/// Progress inside the current step
enum ActiveStep {
    /// Not entered yet
    Pending,
    /// Wait or fade in progress; `from` is the fade's starting opacity
    Timed { elapsed: f32, from: f32 },
    /// Waiting for a clip to end
    AwaitMedia { ended: Arc<AtomicBool> },
}

struct RunningSequence {
    label: Option<String>,
    panel: Option<PanelId>,
    steps: Vec<SequenceStep>,
    stop_behavior: StopBehavior,
    index: usize,
    active: ActiveStep,
    on_finish: SmallVec<[FinishCallback; 1]>,
}

impl RunningSequence {
    fn new(sequence: Sequence) -> Self {
        let (label, panel, steps, stop_behavior) = sequence.into_parts();
        Self {
            label,
            panel,
            steps,
            stop_behavior,
            index: 0,
            active: ActiveStep::Pending,
            on_finish: SmallVec::new(),
        }
    }

    fn name(&self) -> &str {
        self.label.as_deref().unwrap_or("<unnamed>")
    }

    /// Move forward by `dt` seconds. Returns true once every step has run.
    ///
    /// Checks `cancel` before each step so a sequence stopped from inside one
    /// of its own callbacks performs no further writes.
    fn advance(&mut self, dt: f32, services: &Services, cancel: &AtomicBool) -> bool {
        let mut budget = dt;

        loop {
            if cancel.load(Ordering::Acquire) {
                return false;
            }
            let Some(step) = self.steps.get(self.index) else {
                return true;
            };

            let done = match step {
                SequenceStep::Wait(duration) => {
                    let duration = *duration;
                    let elapsed = match &mut self.active {
                        ActiveStep::Timed { elapsed, .. } => {
                            *elapsed += budget;
                            *elapsed
                        }
                        _ => {
                            self.active = ActiveStep::Timed {
                                elapsed: budget,
                                from: 0.0,
                            };
                            budget
                        }
                    };
                    if elapsed >= duration {
                        budget = elapsed - duration;
                        true
                    } else {
                        false
                    }
                }

                SequenceStep::FadeTo {
                    target,
                    duration,
                    easing,
                } => {
                    let (target, duration, easing) = (*target, *duration, *easing);
                    let Some(panel) = self.panel.as_ref() else {
                        tracing::warn!(
                            sequence = self.name(),
                            error = %FolioError::MissingReference("panel"),
                            "fade step skipped"
                        );
                        self.complete_step();
                        continue;
                    };

                    let (elapsed, from) = match &mut self.active {
                        ActiveStep::Timed { elapsed, from } => {
                            *elapsed += budget;
                            (*elapsed, *from)
                        }
                        _ => {
                            let Some(from) = services.panels.opacity(panel) else {
                                tracing::warn!(
                                    sequence = self.name(),
                                    %panel,
                                    "fade step skipped: panel unknown to surface"
                                );
                                self.complete_step();
                                continue;
                            };
                            self.active = ActiveStep::Timed {
                                elapsed: budget,
                                from,
                            };
                            (budget, from)
                        }
                    };

                    if elapsed >= duration {
                        services.panels.set_opacity(panel, target);
                        budget = elapsed - duration;
                        true
                    } else {
                        let value = easing.interpolate(from, target, elapsed / duration);
                        services.panels.set_opacity(panel, value);
                        false
                    }
                }

                SequenceStep::SetActive(active) => {
                    match self.panel.as_ref() {
                        Some(panel) => services.panels.set_active(panel, *active),
                        None => tracing::warn!(
                            sequence = self.name(),
                            error = %FolioError::MissingReference("panel"),
                            "visibility step skipped"
                        ),
                    }
                    true
                }

                SequenceStep::PlayMedia(handle) => {
                    services.media.play(handle);
                    true
                }

                SequenceStep::StopMedia(handle) => {
                    services.media.stop(handle);
                    true
                }

                SequenceStep::WaitForMedia(handle) => match &self.active {
                    ActiveStep::AwaitMedia { ended } => {
                        ended.load(Ordering::Acquire) || !services.media.is_playing(handle)
                    }
                    _ => {
                        if services.media.is_playing(handle) {
                            let ended = Arc::new(AtomicBool::new(false));
                            let flag = Arc::clone(&ended);
                            services.media.on_playback_ended(
                                handle,
                                Box::new(move || flag.store(true, Ordering::Release)),
                            );
                            self.active = ActiveStep::AwaitMedia { ended };
                            false
                        } else {
                            true
                        }
                    }
                },

                SequenceStep::Custom(callback) => {
                    let callback = Arc::clone(callback);
                    callback();
                    true
                }
            };

            if !done {
                return false;
            }
            self.complete_step();
        }
    }

    fn complete_step(&mut self) {
        self.index += 1;
        self.active = ActiveStep::Pending;
    }

    /// Leave the panel in the configured terminal state after a stop
    fn apply_stop(&self, services: &Services) {
        let Some(panel) = self.panel.as_ref() else {
            return;
        };

        match self.stop_behavior {
            StopBehavior::Hold => {}
            StopBehavior::SnapStep => {
                if let (
                    Some(SequenceStep::FadeTo { target, .. }),
                    ActiveStep::Timed { .. },
                ) = (self.steps.get(self.index), &self.active)
                {
                    services.panels.set_opacity(panel, *target);
                }
            }
            StopBehavior::Finish => {
                for step in self.steps.iter().skip(self.index) {
                    match step {
                        SequenceStep::FadeTo { target, .. } => {
                            services.panels.set_opacity(panel, *target)
                        }
                        SequenceStep::SetActive(active) => services.panels.set_active(panel, *active),
                        _ => {}
                    }
                }
            }
        }
    }

    fn finish(
        self: Box<Self>,
        id: SequenceId,
        outcome: SequenceOutcome,
        finished: &Event<SequenceFinished>,
    ) {
        let RunningSequence {
            label,
            panel,
            on_finish,
            ..
        } = *self;
        let event = SequenceFinished {
            id,
            label,
            panel,
            outcome,
        };
        tracing::debug!(sequence = ?event.label, ?outcome, "sequence finished");
        for callback in on_finish {
            callback(&event);
        }
        finished.emit(&event);
    }
}

// ============================================================================
// Shared state
// ============================================================================

struct Slot {
    /// `None` while `advance()` has the sequence checked out
    running: Option<Box<RunningSequence>>,
    panel: Option<PanelId>,
    cancel: Arc<AtomicBool>,
    /// Set when stopped while checked out
    interrupted: Option<SequenceOutcome>,
}

struct SequencerInner {
    sequences: SlotMap<SequenceId, Slot>,
    owners: FxHashMap<PanelId, SequenceId>,
}

/// What a stop request resolved to
enum Stopped {
    /// The sequence was idle and has been removed
    Removed(Box<RunningSequence>),
    /// The sequence is being stepped; `advance()` finishes it
    Deferred,
    Unknown,
}

impl SequencerInner {
    fn release_owner(&mut self, id: SequenceId, panel: Option<&PanelId>) {
        if let Some(panel) = panel {
            if self.owners.get(panel) == Some(&id) {
                self.owners.remove(panel);
            }
        }
    }

    fn stop(&mut self, id: SequenceId, outcome: SequenceOutcome) -> Stopped {
        let Some(slot) = self.sequences.get_mut(id) else {
            return Stopped::Unknown;
        };
        if slot.interrupted.is_some() {
            return Stopped::Unknown;
        }

        slot.cancel.store(true, Ordering::Release);
        let panel = slot.panel.clone();
        let stopped = match slot.running.take() {
            Some(running) => {
                self.sequences.remove(id);
                Stopped::Removed(running)
            }
            None => {
                slot.interrupted = Some(outcome);
                Stopped::Deferred
            }
        };
        self.release_owner(id, panel.as_ref());
        stopped
    }
}

struct SequencerShared {
    inner: Mutex<SequencerInner>,
    services: Services,
    finished: Event<SequenceFinished>,
    config: SequencerConfig,
}

impl SequencerShared {
    fn lock(&self) -> MutexGuard<'_, SequencerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn run(&self, sequence: Sequence, on_finish: Option<FinishCallback>) -> SequenceId {
        let mut running = Box::new(RunningSequence::new(sequence));
        if let Some(callback) = on_finish {
            running.on_finish.push(callback);
        }
        let panel = running.panel.clone();
        let label = running.label.clone();

        let (id, superseded) = {
            let mut inner = self.lock();
            let previous = panel
                .as_ref()
                .and_then(|panel| inner.owners.get(panel).copied());
            let superseded = previous.map(|old| (old, inner.stop(old, SequenceOutcome::Superseded)));

            let id = inner.sequences.insert(Slot {
                running: Some(running),
                panel: panel.clone(),
                cancel: Arc::new(AtomicBool::new(false)),
                interrupted: None,
            });
            if let Some(panel) = panel.clone() {
                inner.owners.insert(panel, id);
            }
            (id, superseded)
        };

        if let Some((old, stopped)) = superseded {
            tracing::debug!(
                error = %FolioError::SequenceAlreadyRunning(
                    panel.as_ref().map(|p| p.to_string()).unwrap_or_default()
                ),
                "superseding running sequence"
            );
            if let Stopped::Removed(previous) = stopped {
                previous.finish(old, SequenceOutcome::Superseded, &self.finished);
            }
        }

        tracing::debug!(sequence = ?label, ?panel, "sequence started");
        id
    }

    fn stop(&self, id: SequenceId) -> bool {
        let stopped = self.lock().stop(id, SequenceOutcome::Cancelled);
        match stopped {
            Stopped::Removed(running) => {
                running.apply_stop(&self.services);
                running.finish(id, SequenceOutcome::Cancelled, &self.finished);
                true
            }
            Stopped::Deferred => true,
            Stopped::Unknown => false,
        }
    }

    fn stop_all(&self) -> usize {
        let ids: Vec<SequenceId> = self.lock().sequences.keys().collect();
        ids.into_iter().filter(|id| self.stop(*id)).count()
    }

    fn advance(&self, dt: f32) -> bool {
        if !dt.is_finite() || dt < 0.0 {
            tracing::warn!(dt, "ignoring invalid frame delta");
            return self.has_running();
        }
        let dt = dt.min(self.config.max_dt);

        let ids: SmallVec<[SequenceId; 8]> = self.lock().sequences.keys().collect();
        let mut ended: SmallVec<[(SequenceId, Box<RunningSequence>, SequenceOutcome); 4]> =
            SmallVec::new();

        for id in ids {
            let checked_out = {
                let mut inner = self.lock();
                inner
                    .sequences
                    .get_mut(id)
                    .and_then(|slot| slot.running.take().map(|r| (r, Arc::clone(&slot.cancel))))
            };
            let Some((mut running, cancel)) = checked_out else {
                continue;
            };

            let done = running.advance(dt, &self.services, &cancel);

            let mut inner = self.lock();
            let interrupted = inner.sequences.get(id).and_then(|slot| slot.interrupted);
            match (interrupted, done) {
                (Some(outcome), _) => {
                    inner.sequences.remove(id);
                    ended.push((id, running, outcome));
                }
                (None, true) => {
                    inner.sequences.remove(id);
                    inner.release_owner(id, running.panel.as_ref());
                    ended.push((id, running, SequenceOutcome::Completed));
                }
                (None, false) => {
                    if let Some(slot) = inner.sequences.get_mut(id) {
                        slot.running = Some(running);
                    }
                }
            }
        }

        for (id, running, outcome) in ended {
            if outcome == SequenceOutcome::Cancelled {
                running.apply_stop(&self.services);
            }
            running.finish(id, outcome, &self.finished);
        }

        self.has_running()
    }

    fn has_running(&self) -> bool {
        !self.lock().sequences.is_empty()
    }

    fn is_running(&self, id: SequenceId) -> bool {
        self.lock()
            .sequences
            .get(id)
            .is_some_and(|slot| slot.interrupted.is_none())
    }

    fn owner_of(&self, panel: &PanelId) -> Option<SequenceId> {
        self.lock().owners.get(panel).copied()
    }
}

// ============================================================================
// Public API
// ============================================================================

/// The sequencer for one scene
///
/// Owns the running sequences. Components that need to start sequences hold a
/// [`SequencerHandle`], which stops working once the sequencer is dropped.
pub struct Sequencer {
    shared: Arc<SequencerShared>,
}

impl Sequencer {
    pub fn new(services: Services) -> Self {
        Self::with_config(services, SequencerConfig::default())
    }

    pub fn with_config(services: Services, config: SequencerConfig) -> Self {
        Self {
            shared: Arc::new(SequencerShared {
                inner: Mutex::new(SequencerInner {
                    sequences: SlotMap::with_key(),
                    owners: FxHashMap::default(),
                }),
                services,
                finished: Event::new(),
                config,
            }),
        }
    }

    /// Get a handle to this sequencer for passing to components
    pub fn handle(&self) -> SequencerHandle {
        SequencerHandle {
            shared: Arc::downgrade(&self.shared),
        }
    }

    pub fn services(&self) -> &Services {
        &self.shared.services
    }

    /// Start a sequence. Its steps begin on the next `advance()`.
    pub fn run(&self, sequence: Sequence) -> SequenceId {
        self.shared.run(sequence, None)
    }

    /// Start a sequence with a callback for its end
    pub fn run_with<F>(&self, sequence: Sequence, on_finish: F) -> SequenceId
    where
        F: FnOnce(&SequenceFinished) + Send + 'static,
    {
        self.shared.run(sequence, Some(Box::new(on_finish)))
    }

    /// Stop a sequence, applying its stop behavior. Returns false if it was
    /// not running.
    pub fn stop(&self, id: SequenceId) -> bool {
        self.shared.stop(id)
    }

    /// Stop every running sequence. Returns how many were stopped.
    pub fn stop_all(&self) -> usize {
        self.shared.stop_all()
    }

    /// Advance all sequences by `dt` seconds
    ///
    /// Returns true if any sequence is still running.
    pub fn advance(&self, dt: f32) -> bool {
        self.shared.advance(dt)
    }

    pub fn is_running(&self, id: SequenceId) -> bool {
        self.shared.is_running(id)
    }

    pub fn has_running(&self) -> bool {
        self.shared.has_running()
    }

    pub fn running_count(&self) -> usize {
        self.shared.lock().sequences.len()
    }

    /// Sequence currently owning the panel's opacity
    pub fn owner_of(&self, panel: &PanelId) -> Option<SequenceId> {
        self.shared.owner_of(panel)
    }

    /// Observe every sequence's end
    pub fn subscribe_finished<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&SequenceFinished) + Send + Sync + 'static,
    {
        self.shared.finished.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.shared.finished.unsubscribe(id)
    }
}

impl std::fmt::Debug for Sequencer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequencer")
            .field("running", &self.running_count())
            .finish()
    }
}

/// Weak handle to a [`Sequencer`]
///
/// Every method is a no-op (returning `None`/`false`) once the sequencer has
/// been dropped.
#[derive(Clone, Default)]
pub struct SequencerHandle {
    shared: Weak<SequencerShared>,
}

impl SequencerHandle {
    /// A handle that is never alive
    pub fn detached() -> Self {
        Self::default()
    }

    pub fn is_alive(&self) -> bool {
        self.shared.strong_count() > 0
    }

    pub fn run(&self, sequence: Sequence) -> Option<SequenceId> {
        let shared = self.shared.upgrade()?;
        Some(shared.run(sequence, None))
    }

    pub fn run_with<F>(&self, sequence: Sequence, on_finish: F) -> Option<SequenceId>
    where
        F: FnOnce(&SequenceFinished) + Send + 'static,
    {
        let shared = self.shared.upgrade()?;
        Some(shared.run(sequence, Some(Box::new(on_finish))))
    }

    pub fn stop(&self, id: SequenceId) -> bool {
        self.shared.upgrade().is_some_and(|shared| shared.stop(id))
    }

    pub fn is_running(&self, id: SequenceId) -> bool {
        self.shared
            .upgrade()
            .is_some_and(|shared| shared.is_running(id))
    }

    pub fn owner_of(&self, panel: &PanelId) -> Option<SequenceId> {
        self.shared.upgrade()?.owner_of(panel)
    }
}

impl std::fmt::Debug for SequencerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SequencerHandle")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Easing;
    use folio_core::{MediaHandle, MemoryMedia, MemoryModals, MemoryPanels, PanelSurface};
    use std::sync::atomic::AtomicUsize;

    const EPS: f32 = 1e-4;

    struct Fixture {
        panels: Arc<MemoryPanels>,
        media: Arc<MemoryMedia>,
        sequencer: Sequencer,
    }

    fn fixture() -> Fixture {
        let panels = Arc::new(MemoryPanels::new());
        let media = Arc::new(MemoryMedia::new());
        panels.insert("page", 0.0, false);
        let services = Services::new(panels.clone(), media.clone(), Arc::new(MemoryModals::new()));
        Fixture {
            panels,
            media,
            // Whole-second deltas in these tests stay unclamped
            sequencer: Sequencer::with_config(services, SequencerConfig { max_dt: 1.0 }),
        }
    }

    fn page() -> PanelId {
        PanelId::from("page")
    }

    fn opacity(fx: &Fixture) -> f32 {
        fx.panels.opacity(&page()).unwrap()
    }

    fn record_outcomes(sequencer: &Sequencer) -> Arc<Mutex<Vec<(SequenceId, SequenceOutcome)>>> {
        let outcomes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&outcomes);
        sequencer.subscribe_finished(move |e| sink.lock().unwrap().push((e.id, e.outcome)));
        outcomes
    }

    #[test]
    fn test_wait_then_fade_in_small_steps() {
        let fx = fixture();
        fx.sequencer
            .run(Sequence::new().on_panel("page").wait(1.0).fade_to(1.0, 0.5));

        for _ in 0..14 {
            fx.sequencer.advance(0.1);
        }

        assert!((opacity(&fx) - 0.8).abs() < 1e-3, "opacity {}", opacity(&fx));
    }

    #[test]
    fn test_leftover_time_carries_into_next_step() {
        let fx = fixture();
        fx.sequencer
            .run(Sequence::new().on_panel("page").wait(0.25).fade_to(1.0, 1.0));

        fx.sequencer.advance(0.25);
        fx.sequencer.advance(0.25);
        // 0.25 into the fade, nothing lost at the step boundary
        assert!((opacity(&fx) - 0.25).abs() < EPS);
    }

    #[test]
    fn test_zero_duration_fade_is_immediate() {
        let fx = fixture();
        let id = fx.sequencer.run(Sequence::new().on_panel("page").fade_to(0.6, 0.0));

        assert!(!fx.sequencer.advance(0.0));
        assert_eq!(opacity(&fx), 0.6);
        assert!(!fx.sequencer.is_running(id));
    }

    #[test]
    fn test_eased_fade() {
        let fx = fixture();
        fx.sequencer.run(
            Sequence::new()
                .on_panel("page")
                .fade_to_with(1.0, 1.0, Easing::EaseInQuad),
        );
        fx.sequencer.advance(0.5);
        assert!((opacity(&fx) - 0.25).abs() < EPS);
        fx.sequencer.advance(0.5);
        assert_eq!(opacity(&fx), 1.0);
    }

    #[test]
    fn test_completion_is_delivered_once() {
        let fx = fixture();
        let outcomes = record_outcomes(&fx.sequencer);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);

        let id = fx.sequencer.run_with(
            Sequence::new().on_panel("page").fade_in(0.2),
            move |e| {
                assert_eq!(e.outcome, SequenceOutcome::Completed);
                counter.fetch_add(1, Ordering::SeqCst);
            },
        );

        for _ in 0..10 {
            fx.sequencer.advance(0.1);
        }
        assert!(!fx.sequencer.stop(id));

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            *outcomes.lock().unwrap(),
            vec![(id, SequenceOutcome::Completed)]
        );
        assert_eq!(fx.sequencer.owner_of(&page()), None);
    }

    #[test]
    fn test_second_run_supersedes_without_flicker() {
        let fx = fixture();
        let outcomes = record_outcomes(&fx.sequencer);

        let first = fx.sequencer.run(Sequence::new().on_panel("page").fade_in(1.0));
        fx.sequencer.advance(0.4);
        assert!((opacity(&fx) - 0.4).abs() < EPS);

        let second = fx.sequencer.run(Sequence::new().on_panel("page").fade_out(0.4));
        assert!(!fx.sequencer.is_running(first));
        assert_eq!(fx.sequencer.owner_of(&page()), Some(second));
        // Superseding wrote nothing
        assert!((opacity(&fx) - 0.4).abs() < EPS);

        let mut previous = opacity(&fx);
        for _ in 0..5 {
            fx.sequencer.advance(0.1);
            let now = opacity(&fx);
            assert!(now <= previous + EPS, "opacity went back up: {previous} -> {now}");
            previous = now;
        }
        assert_eq!(opacity(&fx), 0.0);
        assert_eq!(
            *outcomes.lock().unwrap(),
            vec![
                (first, SequenceOutcome::Superseded),
                (second, SequenceOutcome::Completed)
            ]
        );
    }

    #[test]
    fn test_stop_snaps_current_fade() {
        let fx = fixture();
        let id = fx.sequencer.run(Sequence::new().on_panel("page").fade_in(1.0).fade_out(1.0));
        fx.sequencer.advance(0.3);

        assert!(fx.sequencer.stop(id));
        assert_eq!(opacity(&fx), 1.0);
        assert!(!fx.sequencer.has_running());
    }

    #[test]
    fn test_stop_hold_leaves_value() {
        let fx = fixture();
        let id = fx.sequencer.run(
            Sequence::new()
                .on_panel("page")
                .stop_behavior(StopBehavior::Hold)
                .fade_in(1.0),
        );
        fx.sequencer.advance(0.3);
        fx.sequencer.stop(id);
        assert!((opacity(&fx) - 0.3).abs() < EPS);
    }

    #[test]
    fn test_stop_finish_applies_end_state() {
        let fx = fixture();
        let id = fx.sequencer.run(
            Sequence::new()
                .on_panel("page")
                .stop_behavior(StopBehavior::Finish)
                .wait(5.0)
                .fade_to(0.7, 1.0)
                .set_active(true)
                .play_media("never"),
        );
        fx.sequencer.advance(0.1);
        fx.sequencer.stop(id);

        assert_eq!(opacity(&fx), 0.7);
        assert_eq!(fx.panels.is_active(&page()), Some(true));
        assert!(fx.media.calls().is_empty());
    }

    #[test]
    fn test_wait_for_media() {
        let fx = fixture();
        let clip = MediaHandle::from("voice");
        let id = fx.sequencer.run(
            Sequence::new()
                .on_panel("page")
                .play_media("voice")
                .wait_for_media("voice")
                .set_active(true),
        );

        for _ in 0..5 {
            fx.sequencer.advance(0.1);
        }
        assert!(fx.sequencer.is_running(id));
        assert_eq!(fx.panels.is_active(&page()), Some(false));

        fx.media.finish(&clip);
        fx.sequencer.advance(0.1);
        assert!(!fx.sequencer.is_running(id));
        assert_eq!(fx.panels.is_active(&page()), Some(true));
    }

    #[test]
    fn test_fade_without_panel_is_skipped() {
        let fx = fixture();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = fx.sequencer.run(Sequence::new().fade_in(1.0).custom(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        fx.sequencer.advance(0.1);
        assert!(!fx.sequencer.is_running(id));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_custom_step_may_use_handle() {
        let fx = fixture();
        let handle = fx.sequencer.handle();
        let follow_up = Arc::new(Mutex::new(None));
        let slot = Arc::clone(&follow_up);

        fx.sequencer.run(Sequence::new().custom(move || {
            *slot.lock().unwrap() = handle.run(Sequence::new().on_panel("page").fade_in(0.1));
        }));

        fx.sequencer.advance(0.0);
        let id = follow_up.lock().unwrap().expect("follow-up started");
        assert!(fx.sequencer.is_running(id));
        fx.sequencer.advance(0.1);
        assert_eq!(opacity(&fx), 1.0);
    }

    #[test]
    fn test_self_stop_from_custom_step_halts_writes() {
        let fx = fixture();
        let handle = fx.sequencer.handle();
        let own_id = Arc::new(Mutex::new(None::<SequenceId>));
        let slot = Arc::clone(&own_id);

        let id = fx.sequencer.run(
            Sequence::new()
                .on_panel("page")
                .stop_behavior(StopBehavior::Hold)
                .custom(move || {
                    if let Some(id) = *slot.lock().unwrap() {
                        handle.stop(id);
                    }
                })
                .fade_to(1.0, 0.0),
        );
        *own_id.lock().unwrap() = Some(id);

        fx.sequencer.advance(0.1);
        assert!(!fx.sequencer.is_running(id));
        assert_eq!(fx.panels.opacity_writes(&page()), 0);
    }

    #[test]
    fn test_invalid_and_huge_deltas() {
        let fx = fixture();
        fx.sequencer.run(Sequence::new().on_panel("page").fade_in(2.0));

        fx.sequencer.advance(f32::NAN);
        fx.sequencer.advance(-1.0);
        assert_eq!(fx.panels.opacity_writes(&page()), 0);

        fx.sequencer.advance(10.0);
        assert!((opacity(&fx) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_default_config_clamps_long_frames() {
        let fx = fixture();
        let sequencer = Sequencer::new(fx.sequencer.services().clone());
        assert_eq!(SequencerConfig::default().max_dt, 0.25);

        sequencer.run(Sequence::new().on_panel("page").fade_in(1.0));
        sequencer.advance(0.5);
        assert!((opacity(&fx) - 0.25).abs() < EPS);
    }

    #[test]
    fn test_handle_weak_reference() {
        let fx = fixture();
        let handle = fx.sequencer.handle();
        assert!(handle.is_alive());
        drop(fx);
        assert!(!handle.is_alive());
        assert!(handle.run(Sequence::new()).is_none());
    }

    #[test]
    fn test_stop_all() {
        let fx = fixture();
        fx.panels.insert("other", 0.0, false);
        fx.sequencer.run(Sequence::new().on_panel("page").fade_in(1.0));
        fx.sequencer.run(Sequence::new().on_panel("other").fade_in(1.0));
        fx.sequencer.advance(0.5);

        assert_eq!(fx.sequencer.stop_all(), 2);
        assert!(!fx.sequencer.has_running());
        assert_eq!(opacity(&fx), 1.0);
    }
}
