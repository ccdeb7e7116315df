//! Folio Trigger
//!
//! Scroll-position triggers for page stacks: detect when a page is centered
//! in its viewport, fire once per approach, freeze the scroll container while
//! the page's sequence plays, and restore it afterwards.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use folio_animation::Sequence;
//! use folio_core::{Rect, Services, Size, StaticNode};
//! use folio_trigger::{ScrollView, SharedScroll, ScrollSettings, TriggerConfig, TriggerScene};
//!
//! let mut scene = TriggerScene::new(Services::headless());
//! let view = ScrollView::new(Size::new(100.0, 200.0), Size::new(100.0, 1000.0)).shared();
//! let viewport = Arc::new(StaticNode::overlay(Rect::new(0.0, 0.0, 100.0, 200.0)));
//! let page = Arc::new(StaticNode::overlay(Rect::new(0.0, 50.0, 100.0, 100.0)));
//!
//! let trigger = scene
//!     .trigger("page-1", TriggerConfig::default())
//!     .viewport(viewport)
//!     .target(page)
//!     .scroll(SharedScroll::new(view, ScrollSettings::default()))
//!     .sequence(Sequence::new().on_panel("page-1").fade_in(0.5));
//! scene.add_trigger(trigger).unwrap();
//!
//! assert_eq!(scene.update(1.0 / 60.0), vec!["page-1".to_string()]);
//! ```

pub mod centering;
pub mod config;
pub mod container;
pub mod dispatcher;
pub mod latch;
pub mod lock;
pub mod scene;


pub use centering::{is_centered, Axis, CenteringEvaluator, Tolerance};
pub use config::{ConfigError, Evaluation, SceneConfig, TriggerConfig, TriggerSpec, UnlockPolicy};
pub use container::{
    ScrollContainer, ScrollPhysicsConfig, ScrollSettings, ScrollView, SharedScrollView,
};
pub use dispatcher::{TriggerBuilder, TriggerDispatcher, TriggerEvent};
pub use latch::{FireMode, Latch, LatchState};
pub use lock::{LockOutcome, LockSnapshot, ScrollController, ScrollLock, SharedScroll, UnlockOutcome};
pub use scene::{SceneBindings, TriggerScene};
