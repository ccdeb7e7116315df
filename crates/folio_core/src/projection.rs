//! Screen Rect Projector
//!
//! Converts a node's four world-space corners into the axis-aligned screen
//! rectangle that encloses them. The projection mode is resolved once when a
//! trigger is set up and both the viewport and the target are projected with
//! it; a node that reports a different render mode is rejected instead of
//! silently producing an offset rectangle.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};
use crate::geometry::{Mat4, Point, Rect, Size, Vec3};

/// How a node's canvas is composited
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    /// Drawn directly in screen space; world coordinates are screen pixels
    #[default]
    Overlay,
    /// Drawn through a camera; world coordinates need a view-projection
    Camera,
}

/// Camera state needed to map world space to screen pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CameraTransform {
    /// Combined view * projection matrix
    pub view_projection: Mat4,
    /// Screen size in pixels
    pub viewport: Size,
}

impl CameraTransform {
    pub fn new(view_projection: Mat4, viewport: Size) -> Self {
        Self {
            view_projection,
            viewport,
        }
    }

    /// World point to screen pixels (origin top-left, y down)
    pub fn world_to_screen(&self, p: Vec3) -> Point {
        let ndc = self.view_projection.transform_point(p);
        Point::new(
            (ndc.x + 1.0) * 0.5 * self.viewport.width,
            (1.0 - ndc.y) * 0.5 * self.viewport.height,
        )
    }
}

/// Projection mode resolved at setup
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub enum ProjectionMode {
    #[default]
    Overlay,
    Camera(CameraTransform),
}

impl ProjectionMode {
    pub fn render_mode(&self) -> RenderMode {
        match self {
            ProjectionMode::Overlay => RenderMode::Overlay,
            ProjectionMode::Camera(_) => RenderMode::Camera,
        }
    }
}

/// Geometry source for a scene node (viewport or target panel)
pub trait NodeGeometry: Send + Sync {
    /// The four corners in world space
    fn world_corners(&self) -> [Vec3; 4];

    /// Render mode of the canvas the node lives on
    fn render_mode(&self) -> RenderMode;
}

/// Projects nodes into screen space with a single, fixed mode
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ScreenRectProjector {
    mode: ProjectionMode,
}

impl ScreenRectProjector {
    pub fn new(mode: ProjectionMode) -> Self {
        Self { mode }
    }

    pub fn overlay() -> Self {
        Self::new(ProjectionMode::Overlay)
    }

    pub fn mode(&self) -> ProjectionMode {
        self.mode
    }

    /// Project one node. `label` names the node in errors.
    pub fn project(&self, node: &dyn NodeGeometry, label: &'static str) -> Result<Rect> {
        let actual = node.render_mode();
        let expected = self.mode.render_mode();
        if actual != expected {
            return Err(FolioError::ProjectionMismatch {
                node: label,
                expected,
                actual,
            });
        }

        let corners = node.world_corners();
        let screen = match &self.mode {
            ProjectionMode::Overlay => corners.map(|c| c.xy()),
            ProjectionMode::Camera(camera) => corners.map(|c| camera.world_to_screen(c)),
        };

        let rect = Rect::from_corners(&screen).ok_or(FolioError::DegenerateGeometry(label))?;
        if rect.is_degenerate() {
            return Err(FolioError::DegenerateGeometry(label));
        }
        Ok(rect)
    }

    /// Project a viewport and a target with the same mode
    pub fn project_pair(
        &self,
        viewport: &dyn NodeGeometry,
        target: &dyn NodeGeometry,
    ) -> Result<(Rect, Rect)> {
        Ok((
            self.project(viewport, "viewport")?,
            self.project(target, "target")?,
        ))
    }
}

/// A node whose corners are set directly by the host
///
/// Useful for headless hosts and tests, or for engines that already compute
/// world corners and only need to hand them over.
#[derive(Debug)]
pub struct StaticNode {
    corners: Mutex<[Vec3; 4]>,
    mode: RenderMode,
}

impl StaticNode {
    pub fn new(corners: [Vec3; 4], mode: RenderMode) -> Self {
        Self {
            corners: Mutex::new(corners),
            mode,
        }
    }

    /// Overlay node covering `rect`
    pub fn overlay(rect: Rect) -> Self {
        Self::new(Self::rect_corners(rect), RenderMode::Overlay)
    }

    /// Move the node to cover `rect` (z = 0)
    pub fn set_rect(&self, rect: Rect) {
        *self.corners.lock().unwrap_or_else(PoisonError::into_inner) = Self::rect_corners(rect);
    }

    pub fn set_corners(&self, corners: [Vec3; 4]) {
        *self.corners.lock().unwrap_or_else(PoisonError::into_inner) = corners;
    }

    fn rect_corners(rect: Rect) -> [Vec3; 4] {
        [
            Vec3::new(rect.x(), rect.y(), 0.0),
            Vec3::new(rect.max_x(), rect.y(), 0.0),
            Vec3::new(rect.max_x(), rect.max_y(), 0.0),
            Vec3::new(rect.x(), rect.max_y(), 0.0),
        ]
    }
}

impl NodeGeometry for StaticNode {
    fn world_corners(&self) -> [Vec3; 4] {
        *self.corners.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn render_mode(&self) -> RenderMode {
        self.mode
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_overlay_projection_is_identity() {
        let node = StaticNode::overlay(Rect::new(10.0, 20.0, 100.0, 50.0));
        let rect = ScreenRectProjector::overlay().project(&node, "target").unwrap();
        assert_eq!(rect, Rect::new(10.0, 20.0, 100.0, 50.0));
    }

    #[test]
    fn test_camera_projection_flips_y() {
        // World box [0,200]x[0,100] fills a 400x200 screen
        let camera = CameraTransform::new(
            Mat4::orthographic(0.0, 200.0, 0.0, 100.0, -1.0, 1.0),
            Size::new(400.0, 200.0),
        );
        let node = StaticNode::new(
            [
                Vec3::new(0.0, 50.0, 0.0),
                Vec3::new(100.0, 50.0, 0.0),
                Vec3::new(100.0, 100.0, 0.0),
                Vec3::new(0.0, 100.0, 0.0),
            ],
            RenderMode::Camera,
        );

        let rect = ScreenRectProjector::new(ProjectionMode::Camera(camera))
            .project(&node, "target")
            .unwrap();

        // Upper half of the world maps to the top half of the screen
        assert!((rect.x() - 0.0).abs() < 1e-3);
        assert!((rect.y() - 0.0).abs() < 1e-3);
        assert!((rect.width() - 200.0).abs() < 1e-3);
        assert!((rect.height() - 100.0).abs() < 1e-3);
    }

    #[test]
    fn test_mode_mismatch_is_rejected() {
        let projector = ScreenRectProjector::overlay();
        let viewport = StaticNode::overlay(Rect::new(0.0, 0.0, 100.0, 100.0));
        let target = StaticNode::new([Vec3::ZERO; 4], RenderMode::Camera);

        let err = projector.project_pair(&viewport, &target).unwrap_err();
        assert_eq!(
            err,
            FolioError::ProjectionMismatch {
                node: "target",
                expected: RenderMode::Overlay,
                actual: RenderMode::Camera,
            }
        );
    }

    #[test]
    fn test_behind_camera_is_degenerate() {
        let mut view_projection = Mat4::IDENTITY;
        // w = -1 for every point
        view_projection.cols[3][3] = -1.0;
        let camera = CameraTransform::new(view_projection, Size::new(100.0, 100.0));
        let node = StaticNode::new([Vec3::ZERO; 4], RenderMode::Camera);

        let err = ScreenRectProjector::new(ProjectionMode::Camera(camera))
            .project(&node, "viewport")
            .unwrap_err();
        assert_eq!(err, FolioError::DegenerateGeometry("viewport"));
    }
}
