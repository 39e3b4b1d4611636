//! Coordinate-space conversions for detector quadrilaterals.
//!
//! Detectors report corners in a normalized space (0..1 on both axes) with the
//! origin at the bottom-left and y growing upward. Images and PDF layout work
//! in pixels with the origin at the top-left. Every transform here is pure.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Mirror y around the unit interval (`y' = 1 - y`).
    pub fn flipped(self) -> Self {
        Self::new(self.x, 1.0 - self.y)
    }

    pub fn scaled(self, size: Size) -> Self {
        Self::new(self.x * size.width, self.y * size.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Pixel size of an image.
    pub fn of_image(width: u32, height: u32) -> Self {
        Self::new(width as f64, height as f64)
    }
}

/// Axis-aligned rectangle. `(x, y)` is the origin corner in whatever space
/// the rectangle was derived in.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn origin(&self) -> Point {
        Point::new(self.x, self.y)
    }

    pub fn translated(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    pub fn max_x(&self) -> f64 {
        self.x + self.width
    }

    pub fn max_y(&self) -> f64 {
        self.y + self.height
    }

    /// Intersection with `[0, width) x [0, height)` snapped outward to whole
    /// pixels. `None` when nothing of the rectangle lies inside the bounds.
    pub fn clamped_pixels(&self, width: u32, height: u32) -> Option<PixelRect> {
        if !(self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()) {
            return None;
        }
        let x0 = self.x.floor().max(0.0);
        let y0 = self.y.floor().max(0.0);
        let x1 = self.max_x().ceil().min(width as f64);
        let y1 = self.max_y().ceil().min(height as f64);

        if x1 <= x0 || y1 <= y0 {
            return None;
        }

        Some(PixelRect {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }
}

/// Integer pixel rectangle, top-left origin, guaranteed non-empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

/// Four-corner region around a detected line of text.
///
/// Corner names refer to the text's own orientation, not to screen space.
/// The corners are expected to form a simple quad roughly following the
/// baseline; nothing enforces it.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Quadrilateral {
    pub top_left: Point,
    pub top_right: Point,
    pub bottom_left: Point,
    pub bottom_right: Point,
}

impl Quadrilateral {
    pub const fn new(
        top_left: Point,
        top_right: Point,
        bottom_left: Point,
        bottom_right: Point,
    ) -> Self {
        Self {
            top_left,
            top_right,
            bottom_left,
            bottom_right,
        }
    }

    /// Axis-aligned quad spanning `[left, right] x [bottom, top]` (y up).
    pub fn from_bounds(left: f64, bottom: f64, right: f64, top: f64) -> Self {
        Self::new(
            Point::new(left, top),
            Point::new(right, top),
            Point::new(left, bottom),
            Point::new(right, bottom),
        )
    }

    fn map(self, f: impl Fn(Point) -> Point) -> Self {
        Self::new(
            f(self.top_left),
            f(self.top_right),
            f(self.bottom_left),
            f(self.bottom_right),
        )
    }

    /// Convert from bottom-left-origin normalized space to top-left-origin
    /// normalized space. Self-inverse.
    pub fn to_top_left_origin(self) -> Self {
        self.map(Point::flipped)
    }

    /// Scale normalized coordinates to pixels for an image of `size`.
    pub fn to_absolute(self, size: Size) -> Self {
        self.map(|p| p.scaled(size))
    }

    /// Rectangle anchored at `bottom_left`, as wide as the bottom edge and as
    /// tall as the right edge. Rotation of skewed quads is discarded; callers
    /// convert to the space they need first.
    pub fn bounding_rect(&self) -> Rect {
        Rect::new(
            self.bottom_left.x,
            self.bottom_left.y,
            (self.bottom_right.x - self.bottom_left.x).abs(),
            (self.top_right.y - self.bottom_right.y).abs(),
        )
    }

    /// Closed outline `bottom_left → bottom_right → top_right → top_left → bottom_left`.
    pub fn as_path(&self) -> Vec<Point> {
        vec![
            self.bottom_left,
            self.bottom_right,
            self.top_right,
            self.top_left,
            self.bottom_left,
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn invoice_quad() -> Quadrilateral {
        Quadrilateral::from_bounds(0.1, 0.1, 0.5, 0.2)
    }

    #[test]
    fn flip_is_self_inverse() {
        for &(x, y) in &[(0.0, 0.0), (0.25, 0.75), (1.0, 1.0), (0.3, 0.01)] {
            let p = Point::new(x, y);
            let back = p.flipped().flipped();
            assert!((back.x - p.x).abs() < EPS && (back.y - p.y).abs() < EPS);
        }

        let q = invoice_quad();
        let round_trip = q.to_top_left_origin().to_top_left_origin();
        for (a, b) in q.as_path().iter().zip(round_trip.as_path().iter()) {
            assert!((a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS);
        }
    }

    #[test]
    fn flip_mirrors_y_only() {
        let q = invoice_quad().to_top_left_origin();
        assert!((q.bottom_left.x - 0.1).abs() < EPS);
        assert!((q.bottom_left.y - 0.9).abs() < EPS);
        assert!((q.top_left.y - 0.8).abs() < EPS);
    }

    #[test]
    fn absolute_width_scales_linearly() {
        let q = invoice_quad();
        let size = Size::new(1000.0, 1400.0);
        let normalized = q.bounding_rect();
        let absolute = q.to_absolute(size).bounding_rect();
        assert!((absolute.width - normalized.width * size.width).abs() < 1e-6);
        assert!((absolute.height - normalized.height * size.height).abs() < 1e-6);
    }

    #[test]
    fn bounding_rect_anchors_at_bottom_left() {
        let rect = invoice_quad()
            .to_top_left_origin()
            .to_absolute(Size::new(1000.0, 1400.0))
            .bounding_rect();
        assert!((rect.x - 100.0).abs() < 1e-6);
        assert!((rect.y - 1260.0).abs() < 1e-6);
        assert!((rect.width - 400.0).abs() < 1e-6);
        assert!((rect.height - 140.0).abs() < 1e-6);
    }

    #[test]
    fn bounding_rect_width_is_absolute_for_mirrored_quads() {
        let q = Quadrilateral::new(
            Point::new(0.5, 0.2),
            Point::new(0.1, 0.2),
            Point::new(0.5, 0.1),
            Point::new(0.1, 0.1),
        );
        let rect = q.bounding_rect();
        assert!((rect.width - 0.4).abs() < EPS);
        assert!((rect.height - 0.1).abs() < EPS);
    }

    #[test]
    fn path_is_closed_in_drawing_order() {
        let q = invoice_quad();
        let path = q.as_path();
        assert_eq!(path.len(), 5);
        assert_eq!(path[0], q.bottom_left);
        assert_eq!(path[1], q.bottom_right);
        assert_eq!(path[2], q.top_right);
        assert_eq!(path[3], q.top_left);
        assert_eq!(path[4], q.bottom_left);
    }

    #[test]
    fn clamped_pixels_inside_bounds() {
        let px = Rect::new(100.0, 1120.0, 400.0, 140.0)
            .clamped_pixels(1000, 1400)
            .unwrap();
        assert_eq!(px, PixelRect { x: 100, y: 1120, width: 400, height: 140 });
    }

    #[test]
    fn clamped_pixels_trims_overhang() {
        let px = Rect::new(-10.5, 1350.0, 100.0, 100.0)
            .clamped_pixels(1000, 1400)
            .unwrap();
        assert_eq!(px.x, 0);
        assert_eq!(px.y, 1350);
        assert_eq!(px.width, 90);
        assert_eq!(px.height, 50);
    }

    #[test]
    fn clamped_pixels_outside_is_none() {
        assert!(Rect::new(1200.0, 0.0, 50.0, 50.0).clamped_pixels(1000, 1400).is_none());
        assert!(Rect::new(10.0, 10.0, 0.0, 50.0).clamped_pixels(1000, 1400).is_none());
        assert!(Rect::new(f64::NAN, 10.0, 5.0, 5.0).clamped_pixels(1000, 1400).is_none());
    }
}
