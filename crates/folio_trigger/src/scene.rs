//! Trigger scenes
//!
//! A [`TriggerScene`] owns the sequencer and every dispatcher for one page
//! stack, and is the single per-frame entry point:
//!
//! ```text
//! update(dt):
//!   tick every dispatcher (evaluate -> latch -> lock -> start sequence)
//!   advance the sequencer by dt
//!   deliver sequence completions (unlock, modal, reveal)
//! ```

use std::sync::{Arc, PoisonError};

use folio_animation::{Sequencer, SequencerConfig};
use folio_core::{Event, NodeGeometry, ProjectionMode, Services, SubscriptionId};
use indexmap::IndexMap;
use rustc_hash::FxHashMap;

use crate::config::{ConfigError, SceneConfig, TriggerConfig};
use crate::container::SharedScrollView;
use crate::dispatcher::{TriggerBuilder, TriggerDispatcher, TriggerEvent};
use crate::lock::SharedScroll;

/// Host objects a scene file refers to
pub struct SceneBindings {
    projection: ProjectionMode,
    viewport: Option<Arc<dyn NodeGeometry>>,
    targets: FxHashMap<String, Arc<dyn NodeGeometry>>,
    scroll: Option<SharedScroll>,
    scroll_view: Option<SharedScrollView>,
}

impl Default for SceneBindings {
    fn default() -> Self {
        Self {
            projection: ProjectionMode::Overlay,
            viewport: None,
            targets: FxHashMap::default(),
            scroll: None,
            scroll_view: None,
        }
    }
}

impl SceneBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn projection(mut self, mode: ProjectionMode) -> Self {
        self.projection = mode;
        self
    }

    pub fn viewport(mut self, node: Arc<dyn NodeGeometry>) -> Self {
        self.viewport = Some(node);
        self
    }

    /// Bind the target node of the trigger called `trigger`
    pub fn target(mut self, trigger: impl Into<String>, node: Arc<dyn NodeGeometry>) -> Self {
        self.targets.insert(trigger.into(), node);
        self
    }

    /// Lock an arbitrary container
    pub fn scroll(mut self, scroll: SharedScroll) -> Self {
        self.scroll = Some(scroll);
        self
    }

    /// Lock an in-memory scroll view and report its movement to every trigger
    pub fn scroll_view(mut self, view: SharedScrollView) -> Self {
        self.scroll_view = Some(view);
        self
    }
}

impl std::fmt::Debug for SceneBindings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SceneBindings")
            .field("projection", &self.projection)
            .field("has_viewport", &self.viewport.is_some())
            .field("targets", &self.targets.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// Every trigger of one page stack
pub struct TriggerScene {
    name: Option<String>,
    // Declared before the sequencer so dispatchers tear down while it is alive
    dispatchers: IndexMap<String, TriggerDispatcher>,
    sequencer: Sequencer,
    services: Services,
    events: Arc<Event<TriggerEvent>>,
    /// Watched view and each trigger's value-changed subscription
    watched: Option<(SharedScrollView, IndexMap<String, SubscriptionId>)>,
    torn_down: bool,
}

impl TriggerScene {
    pub fn new(services: Services) -> Self {
        Self::with_config(services, SequencerConfig::default())
    }

    pub fn with_config(services: Services, config: SequencerConfig) -> Self {
        Self {
            name: None,
            dispatchers: IndexMap::new(),
            sequencer: Sequencer::with_config(services.clone(), config),
            services,
            events: Arc::new(Event::new()),
            watched: None,
            torn_down: false,
        }
    }

    /// Build a scene from a validated config and the host's bindings
    ///
    /// Triggers without a bound target are still created; they log a missing
    /// reference and never fire.
    pub fn from_config(
        config: &SceneConfig,
        services: Services,
        bindings: SceneBindings,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let mut scene = Self::with_config(services, config.sequencer_config());
        scene.name = config.name.clone();

        let scroll = bindings.scroll.clone().or_else(|| {
            bindings
                .scroll_view
                .as_ref()
                .map(|view| SharedScroll::new(Arc::clone(view), config.fallback_scroll))
        });

        for spec in &config.triggers {
            let mut builder = scene
                .trigger(spec.name.clone(), spec.config.clone())
                .projection(bindings.projection);
            if let Some(viewport) = &bindings.viewport {
                builder = builder.viewport(Arc::clone(viewport));
            }
            match bindings.targets.get(&spec.name) {
                Some(target) => builder = builder.target(Arc::clone(target)),
                None => tracing::warn!(trigger = %spec.name, "no target bound"),
            }
            if let Some(scroll) = &scroll {
                builder = builder.scroll(scroll.clone());
            }
            if let Some(sequence) = &spec.sequence {
                builder = builder.sequence(sequence.to_sequence());
            }
            scene.add_trigger(builder)?;
        }

        if let Some(view) = bindings.scroll_view {
            scene.watch(view);
        }

        tracing::info!(
            scene = ?scene.name,
            triggers = scene.dispatchers.len(),
            "scene loaded"
        );
        Ok(scene)
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Start a trigger wired to this scene's event bus
    pub fn trigger(&self, name: impl Into<String>, config: TriggerConfig) -> TriggerBuilder {
        TriggerBuilder::new(name, config).events(Arc::clone(&self.events))
    }

    pub fn add_trigger(
        &mut self,
        builder: TriggerBuilder,
    ) -> Result<&mut TriggerDispatcher, ConfigError> {
        let name = builder.name().to_string();
        if name.trim().is_empty() {
            return Err(ConfigError::EmptyName);
        }
        if self.dispatchers.contains_key(&name) {
            return Err(ConfigError::DuplicateTrigger(name));
        }

        let mut dispatcher = builder
            .events(Arc::clone(&self.events))
            .build(self.sequencer.handle(), self.services.clone());
        if let Some((view, subscriptions)) = &mut self.watched {
            let view = view.lock().unwrap_or_else(PoisonError::into_inner);
            subscriptions.insert(name.clone(), dispatcher.watch(&view));
        }
        if self.torn_down {
            dispatcher.teardown();
        }

        let entry = self.dispatchers.entry(name).or_insert(dispatcher);
        Ok(entry)
    }

    /// Remove and tear down a trigger
    pub fn remove_trigger(&mut self, name: &str) -> bool {
        let Some(mut dispatcher) = self.dispatchers.shift_remove(name) else {
            return false;
        };
        if let Some((view, subscriptions)) = &mut self.watched {
            if let Some(id) = subscriptions.shift_remove(name) {
                view.lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .unsubscribe(id);
            }
        }
        dispatcher.teardown();
        true
    }

    pub fn dispatcher(&self, name: &str) -> Option<&TriggerDispatcher> {
        self.dispatchers.get(name)
    }

    pub fn dispatcher_mut(&mut self, name: &str) -> Option<&mut TriggerDispatcher> {
        self.dispatchers.get_mut(name)
    }

    pub fn dispatchers(&self) -> impl Iterator<Item = &TriggerDispatcher> {
        self.dispatchers.values()
    }

    pub fn len(&self) -> usize {
        self.dispatchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dispatchers.is_empty()
    }

    /// Report scroll view movement to every trigger
    pub fn watch(&mut self, view: SharedScrollView) {
        self.unwatch();
        let subscriptions = {
            let guard = view.lock().unwrap_or_else(PoisonError::into_inner);
            self.dispatchers
                .iter()
                .map(|(name, dispatcher)| (name.clone(), dispatcher.watch(&guard)))
                .collect()
        };
        self.watched = Some((view, subscriptions));
    }

    fn unwatch(&mut self) {
        if let Some((view, subscriptions)) = self.watched.take() {
            let view = view.lock().unwrap_or_else(PoisonError::into_inner);
            for id in subscriptions.into_values() {
                view.unsubscribe(id);
            }
        }
    }

    /// Mark the scroll position changed for every trigger
    pub fn notify_scroll_changed(&self) {
        for dispatcher in self.dispatchers.values() {
            dispatcher.notify_scroll_changed();
        }
    }

    /// Run one frame. Returns the names of the triggers that fired.
    pub fn update(&mut self, dt: f32) -> Vec<String> {
        if self.torn_down {
            return Vec::new();
        }

        let fired: Vec<String> = self
            .dispatchers
            .values_mut()
            .filter_map(|dispatcher| dispatcher.tick().then(|| dispatcher.name().to_string()))
            .collect();

        self.sequencer.advance(dt);

        for dispatcher in self.dispatchers.values_mut() {
            dispatcher.process_finished();
        }

        fired
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

    /// Tear down every trigger and stop every sequence. Idempotent.
    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;

        for dispatcher in self.dispatchers.values_mut() {
            dispatcher.teardown();
        }
        let stopped = self.sequencer.stop_all();
        self.unwatch();
        tracing::debug!(scene = ?self.name, stopped, "scene torn down");
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down
    }
}

impl Drop for TriggerScene {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl std::fmt::Debug for TriggerScene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerScene")
            .field("name", &self.name)
            .field("triggers", &self.dispatchers.keys().collect::<Vec<_>>())
            .field("sequencer", &self.sequencer)
            .field("torn_down", &self.torn_down)
            .finish()
    }
}
