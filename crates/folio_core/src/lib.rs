//! Folio Core
//!
//! Foundational primitives shared by the Folio scroll-trigger crates:
//!
//! - **Geometry**: points, sizes, rectangles and the small amount of matrix math
//!   needed to project UI nodes into screen space
//! - **Projection**: the Screen Rect Projector, resolved once per trigger
//! - **Services**: interfaces to the collaborators the trigger engine drives
//!   (panel opacity/visibility, media playback, modal display) plus headless
//!   in-memory implementations
//! - **Events**: a small broadcast primitive and the shared dirty flag
//! - **Errors**: the failure taxonomy, always handled locally by callers
//!
//! # Example
//!
//! ```rust
//! use folio_core::{Point, Rect};
//!
//! let page = Rect::new(0.0, 45.0, 100.0, 100.0);
//! assert_eq!(page.center(), Point::new(50.0, 95.0));
//! assert!(page.contains(Point::new(50.0, 100.0)));
//! ```

pub mod error;
pub mod events;
pub mod geometry;
pub mod projection;
pub mod services;

pub use error::{FolioError, Result};
pub use events::{dirty_flag, DirtyFlag, Event, SubscriptionId};
pub use geometry::{Mat4, Point, Rect, Size, Vec3};
pub use projection::{
    CameraTransform, NodeGeometry, ProjectionMode, RenderMode, ScreenRectProjector, StaticNode,
};
pub use services::{
    MediaCall, MediaHandle, MediaPlayback, MemoryMedia, MemoryModals, MemoryPanels, ModalDisplay,
    ModalId, PanelId, PanelSurface, PlaybackEndedCallback, Services,
};
