//! Trigger Dispatcher
//!
//! Per-frame glue for one trigger. Each [`TriggerDispatcher::tick`]:
//!
//! 1. collects sequence completions delivered since the last tick
//! 2. projects viewport and target to screen space and runs the centering test
//! 3. feeds the result to the latch
//! 4. on fire: locks the scroll container, plays the audio cue and starts the
//!    trigger's sequence
//!
//! On completion the lock is released (per [`UnlockPolicy`]) and the
//! configured modal and reveal panel are shown. Nothing here returns an
//! error: missing nodes, projection failures and a dropped sequencer are
//! logged (once per distinct failure) and the frame carries on.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex, PoisonError};

use folio_animation::{Sequence, SequenceFinished, SequenceId, SequenceOutcome, SequencerHandle};
use folio_core::{
    dirty_flag, DirtyFlag, Event, FolioError, NodeGeometry, ProjectionMode, ScreenRectProjector,
    Services, SubscriptionId,
};

use crate::centering::CenteringEvaluator;
use crate::config::{Evaluation, TriggerConfig, UnlockPolicy};
use crate::container::ScrollView;
use crate::latch::{Latch, LatchState};
use crate::lock::{LockOutcome, SharedScroll};

/// Something a trigger did
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TriggerEvent {
    Fired { trigger: String },
    /// The sequence ran to the end (or there was none)
    Completed { trigger: String },
    /// The sequence was stopped or superseded
    Cancelled { trigger: String },
    /// The scroll lock this trigger took was released
    Unlocked { trigger: String },
}

impl TriggerEvent {
    pub fn trigger(&self) -> &str {
        match self {
            TriggerEvent::Fired { trigger }
            | TriggerEvent::Completed { trigger }
            | TriggerEvent::Cancelled { trigger }
            | TriggerEvent::Unlocked { trigger } => trigger,
        }
    }
}

/// Builder for [`TriggerDispatcher`]
pub struct TriggerBuilder {
    name: String,
    config: TriggerConfig,
    projection: ProjectionMode,
    viewport: Option<Arc<dyn NodeGeometry>>,
    target: Option<Arc<dyn NodeGeometry>>,
    scroll: Option<SharedScroll>,
    sequence: Option<Sequence>,
    events: Option<Arc<Event<TriggerEvent>>>,
}

impl TriggerBuilder {
    pub fn new(name: impl Into<String>, config: TriggerConfig) -> Self {
        Self {
            name: name.into(),
            config,
            projection: ProjectionMode::Overlay,
            viewport: None,
            target: None,
            scroll: None,
            sequence: None,
            events: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// How nodes map to screen space. Resolved once; nodes reporting another
    /// render mode are rejected at evaluation time.
    pub fn projection(mut self, mode: ProjectionMode) -> Self {
        self.projection = mode;
        self
    }

    pub fn viewport(mut self, node: Arc<dyn NodeGeometry>) -> Self {
        self.viewport = Some(node);
        self
    }

    pub fn target(mut self, node: Arc<dyn NodeGeometry>) -> Self {
        self.target = Some(node);
        self
    }

    pub fn scroll(mut self, scroll: SharedScroll) -> Self {
        self.scroll = Some(scroll);
        self
    }

    /// Template cloned and run on every fire
    pub fn sequence(mut self, sequence: Sequence) -> Self {
        self.sequence = Some(sequence);
        self
    }

    /// Publish events on a shared bus instead of a private one
    pub fn events(mut self, events: Arc<Event<TriggerEvent>>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self, sequencer: SequencerHandle, services: Services) -> TriggerDispatcher {
        let evaluator = self.config.evaluator();
        let latch = Latch::new(self.config.fire_mode);
        TriggerDispatcher {
            name: self.name,
            projector: ScreenRectProjector::new(self.projection),
            evaluator,
            latch,
            viewport: self.viewport,
            target: self.target,
            scroll: self.scroll,
            sequence: self.sequence,
            sequencer,
            services,
            events: self.events.unwrap_or_default(),
            inbox: Arc::default(),
            scroll_dirty: dirty_flag(),
            active: None,
            holds_lock: false,
            modal_shown: false,
            centered: false,
            last_error: None,
            torn_down: false,
            config: self.config,
        }
    }
}

impl std::fmt::Debug for TriggerBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerBuilder")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Drives one trigger frame by frame
pub struct TriggerDispatcher {
    name: String,
    config: TriggerConfig,
    projector: ScreenRectProjector,
    evaluator: CenteringEvaluator,
    latch: Latch,
    viewport: Option<Arc<dyn NodeGeometry>>,
    target: Option<Arc<dyn NodeGeometry>>,
    scroll: Option<SharedScroll>,
    sequence: Option<Sequence>,
    sequencer: SequencerHandle,
    services: Services,
    events: Arc<Event<TriggerEvent>>,
    /// Completions pushed by sequencer callbacks, drained on our own thread
    inbox: Arc<Mutex<Vec<SequenceFinished>>>,
    scroll_dirty: DirtyFlag,
    active: Option<SequenceId>,
    holds_lock: bool,
    modal_shown: bool,
    centered: bool,
    last_error: Option<FolioError>,
    torn_down: bool,
}

impl TriggerDispatcher {
    /// A dispatcher with no nodes or scroll container bound yet
    pub fn new(
        name: impl Into<String>,
        config: TriggerConfig,
        sequencer: SequencerHandle,
        services: Services,
    ) -> Self {
        TriggerBuilder::new(name, config).build(sequencer, services)
    }

    pub fn builder(name: impl Into<String>, config: TriggerConfig) -> TriggerBuilder {
        TriggerBuilder::new(name, config)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> &TriggerConfig {
        &self.config
    }

    pub fn latch_state(&self) -> LatchState {
        self.latch.state()
    }

    /// Result of the most recent centering test
    pub fn is_centered(&self) -> bool {
        self.centered
    }

    /// True while this trigger's sequence is in flight
    pub fn is_running(&self) -> bool {
        self.active
            .is_some_and(|id| self.sequencer.is_running(id))
    }

    /// True while this trigger holds the scroll lock
    pub fn holds_lock(&self) -> bool {
        self.holds_lock
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }

    pub fn set_viewport(&mut self, node: Arc<dyn NodeGeometry>) {
        self.viewport = Some(node);
    }

    pub fn set_target(&mut self, node: Arc<dyn NodeGeometry>) {
        self.target = Some(node);
    }

    pub fn set_scroll(&mut self, scroll: SharedScroll) {
        self.scroll = Some(scroll);
    }

    /// Run one frame. Returns true on the frame the trigger fires.
    pub fn tick(&mut self) -> bool {
        if self.torn_down {
            return false;
        }

        self.process_finished();

        if !self.should_evaluate() {
            return false;
        }

        self.centered = self.evaluate();
        tracing::trace!(trigger = %self.name, centered = self.centered, "evaluated");
        if !self.centered && self.config.cancel_on_leave {
            if let Some(id) = self.active {
                tracing::debug!(trigger = %self.name, "target left center, stopping sequence");
                self.sequencer.stop(id);
            }
        }

        let fired = self.latch.observe(self.centered);
        if fired {
            self.fire();
        }

        self.process_finished();
        fired
    }

    /// Mark the scroll position as changed, for [`Evaluation::OnScrollChanged`]
    pub fn notify_scroll_changed(&self) {
        self.scroll_dirty.store(true, Ordering::Release);
    }

    /// The flag `notify_scroll_changed` sets, for wiring into host callbacks
    pub fn scroll_changed_flag(&self) -> DirtyFlag {
        Arc::clone(&self.scroll_dirty)
    }

    /// Subscribe to a scroll view's value-changed event
    pub fn watch(&self, view: &ScrollView) -> SubscriptionId {
        let flag = self.scroll_changed_flag();
        view.on_value_changed(move |_| flag.store(true, Ordering::Release))
    }

    /// Release the scroll lock taken on fire. Returns false if none was held.
    ///
    /// The only way out of the lock under [`UnlockPolicy::Manual`].
    pub fn unlock(&mut self) -> bool {
        self.release_lock()
    }

    /// Re-arm the latch, stopping any running sequence and releasing the lock
    pub fn reset(&mut self) {
        if let Some(id) = self.active {
            self.sequencer.stop(id);
        }
        self.process_finished();
        self.active = None;
        self.release_lock();
        self.latch.reset();
        self.scroll_dirty.store(true, Ordering::Release);
    }

    /// Stop the sequence, release the lock and hide the modal
    ///
    /// Safe to call more than once; also runs on drop.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        if let Some(id) = self.active.take() {
            self.sequencer.stop(id);
        }
        self.inbox
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.release_lock();

        if self.modal_shown {
            if let Some(modal) = &self.config.modal {
                self.services.modals.hide(modal);
            }
            self.modal_shown = false;
        }
        tracing::debug!(trigger = %self.name, "trigger torn down");
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&TriggerEvent) + Send + Sync + 'static,
    {
        self.events.subscribe(callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Handle completions delivered by the sequencer
    pub fn process_finished(&mut self) {
        let finished = std::mem::take(
            &mut *self.inbox.lock().unwrap_or_else(PoisonError::into_inner),
        );

        for event in finished {
            if self.active != Some(event.id) {
                tracing::trace!(trigger = %self.name, outcome = ?event.outcome, "stale sequence end");
                continue;
            }
            self.active = None;

            match event.outcome {
                SequenceOutcome::Completed => self.complete(),
                SequenceOutcome::Cancelled | SequenceOutcome::Superseded => {
                    tracing::debug!(trigger = %self.name, outcome = ?event.outcome, "sequence cancelled");
                    self.emit(TriggerEvent::Cancelled {
                        trigger: self.name.clone(),
                    });
                    if self.config.unlock_on_cancel {
                        self.release_lock();
                    }
                }
            }
        }
    }

    fn should_evaluate(&self) -> bool {
        match self.config.evaluation {
            Evaluation::EveryFrame => true,
            Evaluation::OnScrollChanged => self.scroll_dirty.swap(false, Ordering::AcqRel),
        }
    }

    fn evaluate(&mut self) -> bool {
        let nodes = self.viewport.clone().zip(self.target.clone());
        let Some((viewport, target)) = nodes else {
            let missing = if self.viewport.is_none() {
                "viewport"
            } else {
                "target"
            };
            self.report(FolioError::MissingReference(missing));
            return false;
        };

        match self
            .projector
            .project_pair(viewport.as_ref(), target.as_ref())
        {
            Ok((viewport, target)) => {
                self.last_error = None;
                self.evaluator.is_centered(&viewport, &target)
            }
            Err(err) => {
                self.report(err);
                false
            }
        }
    }

    fn fire(&mut self) {
        tracing::debug!(trigger = %self.name, "trigger fired");

        if self.config.lock_scroll {
            match &self.scroll {
                Some(scroll) => {
                    if scroll.lock() == LockOutcome::Locked {
                        self.holds_lock = true;
                    }
                }
                None => self.report(FolioError::MissingReference("scroll container")),
            }
        }

        if let Some(cue) = &self.config.audio_cue {
            self.services.media.play(cue);
        }

        self.emit(TriggerEvent::Fired {
            trigger: self.name.clone(),
        });

        let Some(sequence) = self.sequence.clone() else {
            self.complete();
            return;
        };

        let inbox = Arc::clone(&self.inbox);
        let started = self.sequencer.run_with(sequence, move |finished| {
            inbox
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(finished.clone());
        });

        match started {
            Some(id) => self.active = Some(id),
            None => {
                self.report(FolioError::MissingReference("sequencer"));
                self.complete();
            }
        }
    }

    fn complete(&mut self) {
        tracing::debug!(trigger = %self.name, "trigger completed");

        if self.config.unlock == UnlockPolicy::OnComplete {
            self.release_lock();
        }

        if let Some(modal) = &self.config.modal {
            self.services.modals.show(modal);
            self.modal_shown = true;
        }

        if let Some(panel) = &self.config.reveal_panel {
            self.services.panels.set_active(panel, true);
            self.services.panels.set_opacity(panel, 1.0);
        }

        self.emit(TriggerEvent::Completed {
            trigger: self.name.clone(),
        });
    }

    fn release_lock(&mut self) -> bool {
        if !self.holds_lock {
            return false;
        }
        self.holds_lock = false;

        if let Some(scroll) = &self.scroll {
            scroll.unlock();
        }
        self.emit(TriggerEvent::Unlocked {
            trigger: self.name.clone(),
        });
        true
    }

    fn emit(&self, event: TriggerEvent) {
        self.events.emit(&event);
    }

    /// Log a failure the first time it shows up
    fn report(&mut self, err: FolioError) {
        if self.last_error.as_ref() != Some(&err) {
            tracing::warn!(trigger = %self.name, error = %err, "trigger evaluation skipped");
            self.last_error = Some(err);
        }
    }
}

impl Drop for TriggerDispatcher {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for TriggerDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerDispatcher")
            .field("name", &self.name)
            .field("latch", &self.latch)
            .field("centered", &self.centered)
            .field("active", &self.active)
            .field("holds_lock", &self.holds_lock)
            .field("torn_down", &self.torn_down)
            .finish_non_exhaustive()
    }
}
