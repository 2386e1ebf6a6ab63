//! Bounding box drawing and resizing.

use crate::constants::overlay;
use crate::model::{Annotation, BBox, HandleId};
use crate::tools::{DrawList, Rgba, Tool, ToolKind};
use crate::transform::{CanvasMapping, ImagePoint};

/// Tool for drawing axis-aligned bounding boxes.
///
/// A draft is anchored at the press point and follows the pointer; corners
/// may be dragged in any order, the finished box is normalized.
#[derive(Debug, Default)]
pub struct BboxTool {
    draft: Option<Draft>,
}

#[derive(Debug, Clone, Copy)]
struct Draft {
    start: ImagePoint,
    current: ImagePoint,
}

impl BboxTool {
    /// Create a new bbox tool with no draft in progress.
    pub fn new() -> Self {
        Self::default()
    }

    /// The draft box as currently dragged, normalized.
    pub fn draft_box(&self) -> Option<BBox> {
        self.draft.map(|d| BBox::from_corners(d.start, d.current))
    }
}

impl Tool for BboxTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Bbox
    }

    fn begin(&mut self, point: ImagePoint) {
        self.draft = Some(Draft {
            start: point,
            current: point,
        });
    }

    fn update(&mut self, point: ImagePoint) {
        if let Some(draft) = &mut self.draft {
            draft.current = point;
        }
    }

    fn finish(&mut self, min_size: f32) -> Option<BBox> {
        let bbox = self.draft.take().map(|d| BBox::from_corners(d.start, d.current))?;
        if bbox.meets_min_size(min_size) {
            Some(bbox)
        } else {
            log::debug!(
                "Discarding degenerate draft {:.1}x{:.1} (min {:.1})",
                bbox.width,
                bbox.height,
                min_size
            );
            None
        }
    }

    fn cancel(&mut self) {
        self.draft = None;
    }

    fn is_drawing(&self) -> bool {
        self.draft.is_some()
    }

    fn hit_test(&self, annotation: &Annotation, point: ImagePoint) -> bool {
        annotation
            .geometry
            .is_some_and(|bbox| bbox.contains(point))
    }

    fn hit_test_handle(
        &self,
        annotation: &Annotation,
        point: ImagePoint,
        radius: f32,
    ) -> Option<HandleId> {
        let bbox = annotation.geometry?;
        HandleId::all()
            .iter()
            .copied()
            .find(|handle| handle.position(&bbox).distance_to(point) <= radius)
    }

    fn draw_annotation(
        &self,
        list: &mut DrawList,
        map: &CanvasMapping,
        annotation: &Annotation,
        label: &str,
        color: Rgba,
        selected: bool,
    ) {
        let Some(bbox) = annotation.geometry else {
            return;
        };

        let top_left = map.to_canvas(ImagePoint::new(bbox.x, bbox.y));
        let stroke = if selected {
            overlay::SELECTED_STROKE_WIDTH
        } else {
            overlay::STROKE_WIDTH
        };

        list.rect(
            top_left.x,
            top_left.y,
            map.length_to_canvas(bbox.width),
            map.length_to_canvas(bbox.height),
            color,
            stroke,
        );
        if !label.is_empty() {
            list.label_above(top_left, label, color);
        }
    }

    fn draw_preview(&self, list: &mut DrawList, map: &CanvasMapping, color: Rgba) {
        let Some(bbox) = self.draft_box() else {
            return;
        };
        let top_left = map.to_canvas(ImagePoint::new(bbox.x, bbox.y));
        list.rect(
            top_left.x,
            top_left.y,
            map.length_to_canvas(bbox.width),
            map.length_to_canvas(bbox.height),
            [color[0], color[1], color[2], color[3] * overlay::PREVIEW_ALPHA],
            overlay::STROKE_WIDTH,
        );
    }

    fn draw_handles(&self, list: &mut DrawList, map: &CanvasMapping, annotation: &Annotation) {
        let Some(bbox) = annotation.geometry else {
            return;
        };
        for handle in HandleId::all() {
            let at = map.to_canvas(handle.position(&bbox));
            list.handle_square(at, overlay::HANDLE_SIZE, overlay::HANDLE_COLOR);
        }
    }
}

/// Resize a box by dragging one handle to a new pointer position.
///
/// The opposite corner or edge stays anchored. Dragging past the anchor
/// flips the box; both sides are floored at `min_size` away from the anchor.
pub fn apply_handle_drag(
    original: &BBox,
    handle: HandleId,
    cursor: ImagePoint,
    min_size: f32,
) -> BBox {
    let (x, width) = match handle {
        HandleId::TopLeft | HandleId::Left | HandleId::BottomLeft => {
            span(original.right(), cursor.x, min_size)
        }
        HandleId::TopRight | HandleId::Right | HandleId::BottomRight => {
            span(original.x, cursor.x, min_size)
        }
        HandleId::Top | HandleId::Bottom => (original.x, original.width),
    };
    let (y, height) = match handle {
        HandleId::TopLeft | HandleId::Top | HandleId::TopRight => {
            span(original.bottom(), cursor.y, min_size)
        }
        HandleId::BottomLeft | HandleId::Bottom | HandleId::BottomRight => {
            span(original.y, cursor.y, min_size)
        }
        HandleId::Left | HandleId::Right => (original.y, original.height),
    };
    BBox::new(x, y, width, height)
}

/// One axis of a handle drag: the span from a fixed anchor towards the
/// cursor, floored at the minimum size.
fn span(anchor: f32, cursor: f32, min_size: f32) -> (f32, f32) {
    let size = (cursor - anchor).abs().max(min_size);
    if cursor >= anchor {
        (anchor, size)
    } else {
        (anchor - size, size)
    }
}
