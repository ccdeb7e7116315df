//! Headless scene simulation
//!
//! Lays the scene's pages out in a vertical stack, drags the scroll view at a
//! constant speed and runs the scene frame by frame against the in-memory
//! collaborators.

use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};
use folio_core::{
    MemoryMedia, MemoryModals, MemoryPanels, ModalDisplay, ModalId, Rect, Services, Size,
    StaticNode,
};
use folio_trigger::{
    Axis, SceneBindings, SceneConfig, ScrollContainer, ScrollSettings, ScrollView, TriggerEvent,
    TriggerScene, UnlockPolicy,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// Page layout for a simulation, in pixels
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Layout {
    pub viewport_width: f32,
    pub viewport_height: f32,
    pub page_height: f32,
    pub spacing: f32,
    /// Content above the first page
    pub lead_in: f32,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            viewport_width: 400.0,
            viewport_height: 600.0,
            page_height: 600.0,
            spacing: 0.0,
            lead_in: 600.0,
        }
    }
}

impl Layout {
    /// Content-space top of page `index`
    pub fn page_top(&self, index: usize) -> f32 {
        self.lead_in + index as f32 * (self.page_height + self.spacing)
    }

    /// Enough content for the last page to reach the viewport center
    pub fn content_height(&self, pages: usize) -> f32 {
        self.page_top(pages) + self.viewport_height
    }
}

/// A scene file plus its `[layout]` table
#[derive(Debug, Deserialize)]
pub struct SimulationFile {
    #[serde(default)]
    pub layout: Layout,
    #[serde(flatten)]
    pub scene: SceneConfig,
}

impl SimulationFile {
    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let file: SimulationFile = toml::from_str(&source)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        file.scene
            .validate()
            .with_context(|| format!("Invalid scene {}", path.display()))?;
        Ok(file)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimulateOptions {
    pub frames: u32,
    pub dt: f32,
    /// Drag speed in pixels per second
    pub speed: f32,
    /// Dismiss modals as soon as they open, releasing manual locks
    pub close_modals: bool,
}

/// What happened during a run
#[derive(Debug, Default)]
pub struct Report {
    pub events: Vec<(u32, TriggerEvent)>,
    pub final_offset: f32,
    pub scroll_locked: bool,
    pub modals: Vec<ModalId>,
}

impl Report {
    pub fn fired(&self) -> impl Iterator<Item = (u32, &str)> {
        self.events.iter().filter_map(|(frame, event)| match event {
            TriggerEvent::Fired { trigger } => Some((*frame, trigger.as_str())),
            _ => None,
        })
    }
}

pub fn run(file: &SimulationFile, options: &SimulateOptions) -> Result<Report> {
    let layout = file.layout;
    let config = &file.scene;

    let panels = Arc::new(MemoryPanels::new());
    let modals = Arc::new(MemoryModals::new());
    let services = Services::new(panels.clone(), Arc::new(MemoryMedia::new()), modals.clone());

    let view = ScrollView::new(
        Size::new(layout.viewport_width, layout.viewport_height),
        Size::new(
            layout.viewport_width,
            layout.content_height(config.triggers.len()),
        ),
    )
    .with_settings(ScrollSettings::vertical_list())
    .shared();

    let viewport = Arc::new(StaticNode::overlay(Rect::new(
        0.0,
        0.0,
        layout.viewport_width,
        layout.viewport_height,
    )));
    let mut bindings = SceneBindings::new()
        .viewport(viewport)
        .scroll_view(Arc::clone(&view));

    let mut pages = Vec::with_capacity(config.triggers.len());
    for (index, trigger) in config.triggers.iter().enumerate() {
        if trigger.config.axis == Axis::Horizontal {
            warn!(trigger = %trigger.name, "horizontal trigger in a vertical simulation");
        }
        for panel in trigger
            .sequence
            .iter()
            .filter_map(|s| s.panel.as_ref())
            .chain(trigger.config.reveal_panel.as_ref())
        {
            panels.insert(panel.clone(), 0.0, false);
        }

        let page = Arc::new(StaticNode::overlay(page_rect(&layout, index, 0.0)));
        bindings = bindings.target(trigger.name.clone(), page.clone());
        pages.push(page);
    }

    let mut scene = TriggerScene::from_config(config, services, bindings)?;
    let inbox = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&inbox);
    scene.subscribe(move |event: &TriggerEvent| {
        sink.lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone())
    });

    let mut report = Report::default();
    for frame in 0..options.frames {
        let offset = {
            let mut view = view.lock().unwrap_or_else(PoisonError::into_inner);
            view.scroll_by(0.0, options.speed * options.dt);
            view.step(options.dt);
            view.offset().y
        };
        for (index, page) in pages.iter().enumerate() {
            page.set_rect(page_rect(&layout, index, offset));
        }

        scene.update(options.dt);

        let events = std::mem::take(&mut *inbox.lock().unwrap_or_else(PoisonError::into_inner));
        for event in events {
            let time = frame as f32 * options.dt;
            match &event {
                TriggerEvent::Fired { trigger } => {
                    info!(frame, time, offset, %trigger, "fired")
                }
                TriggerEvent::Completed { trigger } => {
                    info!(frame, time, %trigger, "completed");
                    if options.close_modals {
                        close_modal(&mut scene, trigger, &modals);
                    }
                }
                TriggerEvent::Cancelled { trigger } => info!(frame, time, %trigger, "cancelled"),
                TriggerEvent::Unlocked { trigger } => debug!(frame, time, %trigger, "unlocked"),
            }
            report.events.push((frame, event));
        }
    }

    {
        let view = view.lock().unwrap_or_else(PoisonError::into_inner);
        report.final_offset = view.offset().y;
        report.scroll_locked = view.settings() == ScrollSettings::LOCKED;
    }
    report.modals = modals.shown();
    scene.teardown();
    Ok(report)
}

fn page_rect(layout: &Layout, index: usize, offset: f32) -> Rect {
    Rect::new(
        0.0,
        layout.page_top(index) - offset,
        layout.viewport_width,
        layout.page_height,
    )
}

/// The simulated reader closes the modal right away
fn close_modal(scene: &mut TriggerScene, trigger: &str, modals: &MemoryModals) {
    let Some(dispatcher) = scene.dispatcher_mut(trigger) else {
        return;
    };
    if let Some(modal) = dispatcher.config().modal.clone() {
        modals.hide(&modal);
    }
    if dispatcher.config().unlock == UnlockPolicy::Manual {
        dispatcher.unlock();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
name = "demo"

[layout]
viewport_height = 200.0
page_height = 200.0
lead_in = 200.0

[[trigger]]
name = "one"
modal = "quiz"
unlock = "manual"

[trigger.sequence]
panel = "one"
steps = [{ step = "fade_to", target = 1.0, seconds = 0.2 }]

[[trigger]]
name = "two"

[trigger.sequence]
panel = "two"
steps = [{ step = "wait", seconds = 0.2 }]
"#;

    fn options(close_modals: bool) -> SimulateOptions {
        SimulateOptions {
            frames: 200,
            dt: 0.05,
            speed: 100.0,
            close_modals,
        }
    }

    #[test]
    fn test_layout_parsed_alongside_scene() {
        let file: SimulationFile = toml::from_str(SCENE).unwrap();
        assert_eq!(file.layout.viewport_height, 200.0);
        assert_eq!(file.layout.viewport_width, 400.0);
        assert_eq!(file.scene.triggers.len(), 2);
        assert_eq!(file.layout.page_top(1), 400.0);
    }

    #[test]
    fn test_manual_lock_holds_without_reader() {
        let file: SimulationFile = toml::from_str(SCENE).unwrap();
        let report = run(&file, &options(false)).unwrap();
        let fired: Vec<&str> = report.fired().map(|(_, name)| name).collect();
        assert_eq!(fired, vec!["one"]);
        assert!(report.scroll_locked);
        assert_eq!(report.modals, vec![ModalId::from("quiz")]);
    }

    #[test]
    fn test_reader_closing_modals_reaches_every_page() {
        let file: SimulationFile = toml::from_str(SCENE).unwrap();
        let report = run(&file, &options(true)).unwrap();
        let fired: Vec<&str> = report.fired().map(|(_, name)| name).collect();
        assert_eq!(fired, vec!["one", "two"]);
        assert!(!report.scroll_locked);
    }
}
