//! Geometry for screen-space trigger evaluation
//!
//! Rectangles are axis-aligned with a top-left origin. They carry no identity:
//! callers recompute them every evaluation tick because scrolling and resizing
//! move them continuously.

// ─────────────────────────────────────────────────────────────────────────────
// Core Geometry Types
// ─────────────────────────────────────────────────────────────────────────────

/// 2D point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub const ZERO: Point = Point { x: 0.0, y: 0.0 };

    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// 2D size
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Size {
    pub width: f32,
    pub height: f32,
}

impl Size {
    pub const ZERO: Size = Size {
        width: 0.0,
        height: 0.0,
    };

    pub const fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Axis-aligned 2D rectangle
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub origin: Point,
    pub size: Size,
}

impl Rect {
    pub const ZERO: Rect = Rect {
        origin: Point::ZERO,
        size: Size::ZERO,
    };

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            origin: Point::new(x, y),
            size: Size::new(width, height),
        }
    }

    pub fn from_origin_size(origin: Point, size: Size) -> Self {
        Self { origin, size }
    }

    /// Create a rect from center point and size
    pub fn from_center(center: Point, size: Size) -> Self {
        Rect {
            origin: Point::new(center.x - size.width / 2.0, center.y - size.height / 2.0),
            size,
        }
    }

    /// Create a rect from two corner points
    pub fn from_points(p1: Point, p2: Point) -> Self {
        let min_x = p1.x.min(p2.x);
        let min_y = p1.y.min(p2.y);
        let max_x = p1.x.max(p2.x);
        let max_y = p1.y.max(p2.y);
        Rect {
            origin: Point::new(min_x, min_y),
            size: Size::new(max_x - min_x, max_y - min_y),
        }
    }

    /// Smallest rect enclosing every corner
    ///
    /// Returns `None` for an empty slice or when any corner is not finite
    /// (a projection behind the camera produces infinities).
    pub fn from_corners(corners: &[Point]) -> Option<Self> {
        let (first, rest) = corners.split_first()?;
        if !first.is_finite() {
            return None;
        }
        let mut rect = Rect::from_origin_size(*first, Size::ZERO);
        for corner in rest {
            if !corner.is_finite() {
                return None;
            }
            rect = rect.expand_to_include(*corner);
        }
        Some(rect)
    }

    pub fn x(&self) -> f32 {
        self.origin.x
    }

    pub fn y(&self) -> f32 {
        self.origin.y
    }

    pub fn width(&self) -> f32 {
        self.size.width
    }

    pub fn height(&self) -> f32 {
        self.size.height
    }

    pub fn max_x(&self) -> f32 {
        self.origin.x + self.size.width
    }

    pub fn max_y(&self) -> f32 {
        self.origin.y + self.size.height
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.origin.x + self.size.width / 2.0,
            self.origin.y + self.size.height / 2.0,
        )
    }

    /// Inclusive on every edge
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.origin.x
            && point.x <= self.max_x()
            && point.y >= self.origin.y
            && point.y <= self.max_y()
    }

    /// Check if this rect overlaps another
    ///
    /// Rects that only share an edge do not overlap.
    pub fn overlaps(&self, other: &Rect) -> bool {
        self.origin.x < other.max_x()
            && self.max_x() > other.origin.x
            && self.origin.y < other.max_y()
            && self.max_y() > other.origin.y
    }

    /// True when the rect cannot take part in a centering test:
    /// non-finite coordinates or a negative extent.
    ///
    /// Zero-size rects are valid, they just contain a single line or point.
    pub fn is_degenerate(&self) -> bool {
        !self.origin.is_finite()
            || !self.size.width.is_finite()
            || !self.size.height.is_finite()
            || self.size.width < 0.0
            || self.size.height < 0.0
    }

    /// Offset the rect by a delta
    pub fn offset(&self, dx: f32, dy: f32) -> Self {
        Rect {
            origin: Point::new(self.origin.x + dx, self.origin.y + dy),
            size: self.size,
        }
    }

    /// Expand rect to include a point
    pub fn expand_to_include(&self, point: Point) -> Self {
        let min_x = self.origin.x.min(point.x);
        let min_y = self.origin.y.min(point.y);
        let max_x = self.max_x().max(point.x);
        let max_y = self.max_y().max(point.y);
        Rect {
            origin: Point::new(min_x, min_y),
            size: Size::new(max_x - min_x, max_y - min_y),
        }
    }
}

/// 3D vector
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// Drop the z component
    pub fn xy(&self) -> Point {
        Point::new(self.x, self.y)
    }
}

/// 4x4 transformation matrix (column-major)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Mat4 {
    pub cols: [[f32; 4]; 4],
}

impl Default for Mat4 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    pub fn translation(x: f32, y: f32, z: f32) -> Self {
        Self {
            cols: [
                [1.0, 0.0, 0.0, 0.0],
                [0.0, 1.0, 0.0, 0.0],
                [0.0, 0.0, 1.0, 0.0],
                [x, y, z, 1.0],
            ],
        }
    }

    pub fn scale(x: f32, y: f32, z: f32) -> Self {
        Self {
            cols: [
                [x, 0.0, 0.0, 0.0],
                [0.0, y, 0.0, 0.0],
                [0.0, 0.0, z, 0.0],
                [0.0, 0.0, 0.0, 1.0],
            ],
        }
    }

    /// Orthographic projection mapping the box onto normalized device coordinates
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Self {
        let rl = right - left;
        let tb = top - bottom;
        let fna = far - near;
        Self {
            cols: [
                [2.0 / rl, 0.0, 0.0, 0.0],
                [0.0, 2.0 / tb, 0.0, 0.0],
                [0.0, 0.0, -2.0 / fna, 0.0],
                [
                    -(right + left) / rl,
                    -(top + bottom) / tb,
                    -(far + near) / fna,
                    1.0,
                ],
            ],
        }
    }

    /// Multiply two matrices
    pub fn mul(&self, other: &Mat4) -> Mat4 {
        let mut result = [[0.0f32; 4]; 4];
        for (i, column) in result.iter_mut().enumerate() {
            for (j, cell) in column.iter_mut().enumerate() {
                for k in 0..4 {
                    *cell += self.cols[k][j] * other.cols[i][k];
                }
            }
        }
        Mat4 { cols: result }
    }

    /// Transform a point, applying the perspective divide
    ///
    /// Points with `w <= 0` lie behind the camera; their coordinates come back
    /// non-finite so callers can reject them.
    pub fn transform_point(&self, p: Vec3) -> Vec3 {
        let v = [p.x, p.y, p.z, 1.0];
        let mut out = [0.0f32; 4];
        for (j, slot) in out.iter_mut().enumerate() {
            for (k, component) in v.iter().enumerate() {
                *slot += self.cols[k][j] * component;
            }
        }
        let w = out[3];
        if w <= 0.0 {
            return Vec3::new(f32::NAN, f32::NAN, f32::NAN);
        }
        Vec3::new(out[0] / w, out[1] / w, out[2] / w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_center_and_contains() {
        let rect = Rect::new(0.0, 45.0, 100.0, 100.0);
        assert_eq!(rect.center(), Point::new(50.0, 95.0));
        assert!(rect.contains(Point::new(0.0, 45.0)));
        assert!(rect.contains(Point::new(100.0, 145.0)));
        assert!(!rect.contains(Point::new(100.1, 100.0)));
    }

    #[test]
    fn test_rect_overlaps() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let c = Rect::new(10.0, 0.0, 10.0, 10.0);
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
    }

    #[test]
    fn test_rect_from_corners_encloses_all() {
        let corners = [
            Point::new(10.0, 40.0),
            Point::new(-5.0, 20.0),
            Point::new(30.0, 25.0),
            Point::new(0.0, 60.0),
        ];
        let rect = Rect::from_corners(&corners).unwrap();
        assert_eq!(rect, Rect::new(-5.0, 20.0, 35.0, 40.0));
    }

    #[test]
    fn test_rect_from_corners_rejects_non_finite() {
        assert!(Rect::from_corners(&[]).is_none());
        assert!(Rect::from_corners(&[Point::ZERO, Point::new(f32::NAN, 0.0)]).is_none());
    }

    #[test]
    fn test_degenerate_detection() {
        assert!(!Rect::ZERO.is_degenerate());
        assert!(Rect::new(0.0, 0.0, -1.0, 4.0).is_degenerate());
        assert!(Rect::new(f32::INFINITY, 0.0, 1.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_mat4_transform_point() {
        let m = Mat4::translation(5.0, -2.0, 0.0).mul(&Mat4::scale(2.0, 2.0, 1.0));
        let p = m.transform_point(Vec3::new(1.0, 1.0, 0.0));
        assert_eq!(p, Vec3::new(7.0, 0.0, 0.0));
    }

    #[test]
    fn test_orthographic_maps_to_ndc() {
        let m = Mat4::orthographic(0.0, 200.0, 0.0, 100.0, -1.0, 1.0);
        let p = m.transform_point(Vec3::new(200.0, 100.0, 0.0));
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }
}
