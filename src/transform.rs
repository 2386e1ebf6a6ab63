//! Canvas/image coordinate mathematics.
//!
//! This module contains the viewport state and the pure functions mapping
//! canvas-space pointer positions to image-space pixel coordinates,
//! extracted for testability and reusability.

use crate::constants::zoom;

/// A point in canvas space (physical pixels of the drawing surface).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CanvasPoint {
    pub x: f32,
    pub y: f32,
}

impl CanvasPoint {
    /// Create a new canvas-space point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// A point in image space (pixel coordinates of the annotated image).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImagePoint {
    pub x: f32,
    pub y: f32,
}

impl ImagePoint {
    /// Create a new image-space point.
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another image-space point.
    pub fn distance_to(&self, other: ImagePoint) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Size of the drawing surface in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasSize {
    pub width: f32,
    pub height: f32,
}

impl CanvasSize {
    /// Create a new canvas size.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Size of the annotated image in image pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ImageSize {
    pub width: f32,
    pub height: f32,
}

impl ImageSize {
    /// Create a new image size.
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

impl From<(u32, u32)> for ImageSize {
    fn from((width, height): (u32, u32)) -> Self {
        Self::new(width as f32, height as f32)
    }
}

/// Represents pan/zoom/cursor viewport state for the open image.
///
/// Pan is in canvas pixels relative to the centered fit position. Zoom and
/// pan changes are always relative deltas so that concurrent adjustments
/// compose instead of clobbering each other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub zoom: f32,
    pub pan_x: f32,
    pub pan_y: f32,
    /// Last known cursor position on the canvas, if any.
    pub cursor: Option<CanvasPoint>,
}

impl Viewport {
    /// Create a new viewport with the given zoom and pan.
    pub fn new(zoom: f32, pan_x: f32, pan_y: f32) -> Self {
        Self {
            zoom,
            pan_x,
            pan_y,
            cursor: None,
        }
    }

    /// Create an identity viewport (zoom=1, no pan).
    pub fn identity() -> Self {
        Self::new(1.0, 0.0, 0.0)
    }

    /// Apply a zoom delta, clamped to the given range. Pan is unchanged.
    pub fn zoom_by(&self, delta: f32, min_zoom: f32, max_zoom: f32) -> Viewport {
        Viewport {
            zoom: (self.zoom + delta).clamp(min_zoom, max_zoom),
            ..*self
        }
    }

    /// Apply a pan delta in canvas pixels.
    pub fn pan_by(&self, dx: f32, dy: f32) -> Viewport {
        Viewport {
            pan_x: self.pan_x + dx,
            pan_y: self.pan_y + dy,
            ..*self
        }
    }

    /// Calculate a cursor-anchored zoom.
    ///
    /// This keeps the image point under the cursor fixed while zooming.
    /// The algorithm:
    /// 1. Find the image-space point under the cursor
    /// 2. After zooming, adjust pan so that same point stays under cursor
    pub fn zoom_at(
        &self,
        delta: f32,
        cursor: CanvasPoint,
        canvas: CanvasSize,
        image: ImageSize,
        min_zoom: f32,
        max_zoom: f32,
    ) -> Viewport {
        let new_zoom = (self.zoom + delta).clamp(min_zoom, max_zoom);

        // Image-space point under cursor (before zoom)
        let anchor = self.mapping(canvas, image).to_image(cursor);

        // New origin that keeps the anchor under the cursor
        let origin_x = cursor.x - anchor.x * new_zoom;
        let origin_y = cursor.y - anchor.y * new_zoom;

        // Back out the pan from the origin formula
        let pan_x = origin_x - (canvas.width - image.width * new_zoom) / 2.0;
        let pan_y = origin_y - (canvas.height - image.height * new_zoom) / 2.0;

        Viewport {
            zoom: new_zoom,
            pan_x,
            pan_y,
            cursor: self.cursor,
        }
    }

    /// Reset to the centered fit position (zoom=1, no pan).
    pub fn reset(&self) -> Viewport {
        Viewport {
            zoom: 1.0,
            pan_x: 0.0,
            pan_y: 0.0,
            cursor: self.cursor,
        }
    }

    /// Record the cursor position for subsequent cursor-anchored commands.
    pub fn with_cursor(&self, cursor: CanvasPoint) -> Viewport {
        Viewport {
            cursor: Some(cursor),
            ..*self
        }
    }

    /// Derive the canvas/image mapping for the given surface and image sizes.
    ///
    /// The image is drawn centered at zoom 1 with pan 0; the origin is the
    /// canvas position of the image's top-left pixel:
    /// `origin_x = (canvas_width - image_width * zoom) / 2 + pan_x`.
    pub fn mapping(&self, canvas: CanvasSize, image: ImageSize) -> CanvasMapping {
        CanvasMapping {
            origin_x: (canvas.width - image.width * self.zoom) / 2.0 + self.pan_x,
            origin_y: (canvas.height - image.height * self.zoom) / 2.0 + self.pan_y,
            zoom: self.zoom,
        }
    }
}

impl Default for Viewport {
    fn default() -> Self {
        Self::identity()
    }
}

/// A resolved mapping between canvas space and image space.
///
/// Derived from a [`Viewport`] plus the current canvas and image sizes;
/// valid until either of those changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CanvasMapping {
    /// Canvas X of the image's top-left pixel
    pub origin_x: f32,
    /// Canvas Y of the image's top-left pixel
    pub origin_y: f32,
    /// Zoom factor the mapping was derived at
    pub zoom: f32,
}

impl CanvasMapping {
    /// Map a canvas-space point to image-space pixel coordinates.
    pub fn to_image(&self, p: CanvasPoint) -> ImagePoint {
        ImagePoint {
            x: (p.x - self.origin_x) / self.zoom,
            y: (p.y - self.origin_y) / self.zoom,
        }
    }

    /// Map an image-space point to canvas-space coordinates.
    pub fn to_canvas(&self, p: ImagePoint) -> CanvasPoint {
        CanvasPoint {
            x: self.origin_x + p.x * self.zoom,
            y: self.origin_y + p.y * self.zoom,
        }
    }

    /// Scale an image-space length to canvas space.
    pub fn length_to_canvas(&self, len: f32) -> f32 {
        len * self.zoom
    }

    /// Hit radius scaled for the current zoom level.
    ///
    /// Scaled inversely with zoom so handles are equally easy to grab
    /// at any magnification.
    pub fn scaled_hit_radius(&self, radius: f32) -> f32 {
        radius / self.zoom.max(zoom::DIVISOR_FLOOR)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPSILON: f32 = 0.0001;

    fn approx_eq(a: f32, b: f32) -> bool {
        (a - b).abs() < EPSILON
    }

    #[test]
    fn test_identity_viewport() {
        let v = Viewport::identity();
        assert_eq!(v.zoom, 1.0);
        assert_eq!(v.pan_x, 0.0);
        assert_eq!(v.pan_y, 0.0);
        assert!(v.cursor.is_none());
    }

    #[test]
    fn test_centered_origin_at_known_zoom() {
        // 800x600 canvas, 400x300 image at zoom 1.5: drawn size is 600x450,
        // so the centered origin sits at (100, 75).
        let v = Viewport::new(1.5, 0.0, 0.0);
        let m = v.mapping(CanvasSize::new(800.0, 600.0), ImageSize::new(400.0, 300.0));

        assert!(approx_eq(m.origin_x, 100.0));
        assert!(approx_eq(m.origin_y, 75.0));
    }

    #[test]
    fn test_canvas_to_image_corners() {
        let v = Viewport::new(1.5, 0.0, 0.0);
        let m = v.mapping(CanvasSize::new(800.0, 600.0), ImageSize::new(400.0, 300.0));

        let top_left = m.to_image(CanvasPoint::new(100.0, 75.0));
        assert!(approx_eq(top_left.x, 0.0));
        assert!(approx_eq(top_left.y, 0.0));

        let bottom_right = m.to_image(CanvasPoint::new(700.0, 525.0));
        assert!(approx_eq(bottom_right.x, 400.0));
        assert!(approx_eq(bottom_right.y, 300.0));
    }

    #[test]
    fn test_image_to_canvas_round_trip() {
        let v = Viewport::new(2.3, 17.0, -42.0);
        let m = v.mapping(CanvasSize::new(1280.0, 720.0), ImageSize::new(640.0, 480.0));

        let p = ImagePoint::new(123.4, 56.7);
        let back = m.to_image(m.to_canvas(p));

        assert!(approx_eq(back.x, p.x));
        assert!(approx_eq(back.y, p.y));
    }

    #[test]
    fn test_pan_shifts_origin() {
        let v = Viewport::new(1.5, 40.0, -10.0);
        let m = v.mapping(CanvasSize::new(800.0, 600.0), ImageSize::new(400.0, 300.0));

        assert!(approx_eq(m.origin_x, 140.0));
        assert!(approx_eq(m.origin_y, 65.0));
    }

    #[test]
    fn test_zoom_by_is_relative_and_clamped() {
        let v = Viewport::new(1.0, 5.0, 5.0);

        let zoomed = v.zoom_by(0.1, 0.2, 5.0);
        assert!(approx_eq(zoomed.zoom, 1.1));
        assert_eq!(zoomed.pan_x, 5.0);

        let maxed = v.zoom_by(100.0, 0.2, 5.0);
        assert_eq!(maxed.zoom, 5.0);

        let floored = v.zoom_by(-100.0, 0.2, 5.0);
        assert!(approx_eq(floored.zoom, 0.2));
    }

    #[test]
    fn test_pan_by_accumulates() {
        let v = Viewport::new(1.0, 10.0, 20.0);
        let panned = v.pan_by(5.0, -10.0);

        assert_eq!(panned.zoom, 1.0);
        assert_eq!(panned.pan_x, 15.0);
        assert_eq!(panned.pan_y, 10.0);
    }

    #[test]
    fn test_zoom_at_preserves_cursor_point() {
        // After zooming, the same image point should be under the cursor
        let canvas = CanvasSize::new(800.0, 600.0);
        let image = ImageSize::new(400.0, 300.0);
        let v = Viewport::new(1.0, 50.0, 30.0);
        let cursor = CanvasPoint::new(250.0, 180.0);

        let before = v.mapping(canvas, image).to_image(cursor);
        let zoomed = v.zoom_at(0.5, cursor, canvas, image, 0.2, 5.0);
        let after = zoomed.mapping(canvas, image).to_image(cursor);

        assert!(approx_eq(zoomed.zoom, 1.5));
        assert!(approx_eq(before.x, after.x));
        assert!(approx_eq(before.y, after.y));
    }

    #[test]
    fn test_zoom_at_center_keeps_pan() {
        // Zooming at the exact canvas center of a centered image keeps pan zero
        let canvas = CanvasSize::new(800.0, 600.0);
        let image = ImageSize::new(400.0, 300.0);
        let v = Viewport::identity();

        let zoomed = v.zoom_at(1.0, CanvasPoint::new(400.0, 300.0), canvas, image, 0.2, 5.0);

        assert!(approx_eq(zoomed.zoom, 2.0));
        assert!(approx_eq(zoomed.pan_x, 0.0));
        assert!(approx_eq(zoomed.pan_y, 0.0));
    }

    #[test]
    fn test_scaled_hit_radius() {
        let m = Viewport::new(2.0, 0.0, 0.0)
            .mapping(CanvasSize::new(100.0, 100.0), ImageSize::new(50.0, 50.0));
        assert!(approx_eq(m.scaled_hit_radius(8.0), 4.0));

        // Radius division is floored so tiny zooms cannot blow it up
        let tiny = Viewport::new(0.01, 0.0, 0.0)
            .mapping(CanvasSize::new(100.0, 100.0), ImageSize::new(50.0, 50.0));
        assert!(approx_eq(tiny.scaled_hit_radius(8.0), 80.0));
    }

    #[test]
    fn test_reset_clears_zoom_and_pan() {
        let v = Viewport::new(3.0, 120.0, -80.0).with_cursor(CanvasPoint::new(5.0, 5.0));
        let reset = v.reset();

        assert_eq!(reset.zoom, 1.0);
        assert_eq!(reset.pan_x, 0.0);
        assert_eq!(reset.pan_y, 0.0);
        assert!(reset.cursor.is_some());
    }
}
