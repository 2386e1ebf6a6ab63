//! Geometry tool system for canvas interactions.
//!
//! Each annotation kind is handled by a tool implementing [`Tool`]: the
//! tool owns its in-progress draft, validates finished geometry, hit-tests
//! existing annotations, and emits draw commands for the render pass.
//! Tools receive image-space points; emitted draw commands are canvas-space.

mod bbox;
mod classify;
mod registry;
mod select;

pub use bbox::{BboxTool, apply_handle_drag};
pub use classify::ClassifyTool;
pub use registry::ToolRegistry;
pub use select::{DragRelease, EditState, SelectTool};

use crate::model::{Annotation, BBox, HandleId};
use crate::transform::{CanvasMapping, CanvasPoint, ImagePoint};

/// RGBA color with components in 0..1.
pub type Rgba = [f32; 4];

/// The active tool determines how pointer events are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ToolKind {
    /// Point-select: pick, cycle and resize existing annotations
    #[default]
    Select,
    /// Draw axis-aligned bounding boxes
    Bbox,
    /// Toggle image-level classification labels
    Classify,
}

impl ToolKind {
    /// Get the display name for this tool.
    pub fn name(&self) -> &'static str {
        match self {
            ToolKind::Select => "Select",
            ToolKind::Bbox => "Bounding Box",
            ToolKind::Classify => "Classify",
        }
    }

    /// Check if this tool draws new geometry (not Select).
    pub fn is_drawing_tool(&self) -> bool {
        matches!(self, ToolKind::Bbox)
    }
}

/// A single canvas-space draw command.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCmd {
    /// Stroked rectangle outline
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        color: Rgba,
        stroke_width: f32,
    },
    /// Filled square centered on a point (resize handles)
    HandleSquare { x: f32, y: f32, size: f32, color: Rgba },
    /// Text label anchored at its top-left corner
    Label {
        x: f32,
        y: f32,
        text: String,
        color: Rgba,
    },
}

/// An ordered list of draw commands for one frame.
///
/// Commands are emitted back-to-front; the host draws them in order on top
/// of the image. Badges (geometry-less annotations) stack automatically in
/// the image's top-left corner.
#[derive(Debug, Clone, Default)]
pub struct DrawList {
    /// Commands in draw order
    pub cmds: Vec<DrawCmd>,
    badge_count: usize,
}

/// Badge stacking inset from the image origin, canvas pixels.
const BADGE_MARGIN: f32 = 6.0;
/// Vertical distance between stacked badges, canvas pixels.
const BADGE_ROW_HEIGHT: f32 = 16.0;
/// Gap between a box outline and its floating label.
const LABEL_OFFSET: f32 = 14.0;

impl DrawList {
    /// Create an empty draw list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a stroked rectangle.
    pub fn rect(&mut self, x: f32, y: f32, width: f32, height: f32, color: Rgba, stroke_width: f32) {
        self.cmds.push(DrawCmd::Rect {
            x,
            y,
            width,
            height,
            color,
            stroke_width,
        });
    }

    /// Add a filled handle square centered on a canvas point.
    pub fn handle_square(&mut self, at: CanvasPoint, size: f32, color: Rgba) {
        self.cmds.push(DrawCmd::HandleSquare {
            x: at.x,
            y: at.y,
            size,
            color,
        });
    }

    /// Add a label floating above a canvas point.
    pub fn label_above(&mut self, at: CanvasPoint, text: impl Into<String>, color: Rgba) {
        self.cmds.push(DrawCmd::Label {
            x: at.x,
            y: at.y - LABEL_OFFSET,
            text: text.into(),
            color,
        });
    }

    /// Add a badge in the image's top-left corner; repeated badges stack.
    pub fn badge(&mut self, image_origin: CanvasPoint, text: impl Into<String>, color: Rgba) {
        let y = image_origin.y + BADGE_MARGIN + self.badge_count as f32 * BADGE_ROW_HEIGHT;
        self.cmds.push(DrawCmd::Label {
            x: image_origin.x + BADGE_MARGIN,
            y,
            text: text.into(),
            color,
        });
        self.badge_count += 1;
    }

    /// Check if the list has no commands.
    pub fn is_empty(&self) -> bool {
        self.cmds.is_empty()
    }

    /// Number of commands in the list.
    pub fn len(&self) -> usize {
        self.cmds.len()
    }
}

/// Contract every geometry tool fulfils.
///
/// Draft methods work in image space; methods that do not apply to a tool
/// keep the default no-ops (a classification tool never draws geometry, a
/// select tool never produces a draft).
pub trait Tool {
    /// Which tool this is.
    fn kind(&self) -> ToolKind;

    /// Begin a new draft at the given image point.
    fn begin(&mut self, _point: ImagePoint) {}

    /// Extend the in-progress draft to the given image point.
    fn update(&mut self, _point: ImagePoint) {}

    /// Finish the draft, returning its geometry if it is valid.
    ///
    /// Drafts below `min_size` are discarded and `None` is returned.
    fn finish(&mut self, _min_size: f32) -> Option<BBox> {
        None
    }

    /// Abandon the in-progress draft.
    fn cancel(&mut self) {}

    /// Whether a draft is currently in progress.
    fn is_drawing(&self) -> bool {
        false
    }

    /// Check if an image point hits the body of an annotation.
    fn hit_test(&self, _annotation: &Annotation, _point: ImagePoint) -> bool {
        false
    }

    /// Check if an image point grabs a resize handle of an annotation.
    ///
    /// `radius` is the hit radius already scaled to image space.
    fn hit_test_handle(
        &self,
        _annotation: &Annotation,
        _point: ImagePoint,
        _radius: f32,
    ) -> Option<HandleId> {
        None
    }

    /// Emit draw commands for one annotation.
    fn draw_annotation(
        &self,
        _list: &mut DrawList,
        _map: &CanvasMapping,
        _annotation: &Annotation,
        _label: &str,
        _color: Rgba,
        _selected: bool,
    ) {
    }

    /// Emit draw commands for the in-progress draft.
    fn draw_preview(&self, _list: &mut DrawList, _map: &CanvasMapping, _color: Rgba) {}

    /// Emit resize handles for a selected annotation.
    fn draw_handles(&self, _list: &mut DrawList, _map: &CanvasMapping, _annotation: &Annotation) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_badges_stack_downward() {
        let mut list = DrawList::new();
        let origin = CanvasPoint::new(100.0, 50.0);

        list.badge(origin, "car", [1.0; 4]);
        list.badge(origin, "truck", [1.0; 4]);

        match (&list.cmds[0], &list.cmds[1]) {
            (DrawCmd::Label { y: y0, .. }, DrawCmd::Label { y: y1, .. }) => {
                assert!(y1 > y0);
                assert_eq!(y1 - y0, BADGE_ROW_HEIGHT);
            }
            other => panic!("expected two labels, got {other:?}"),
        }
    }

    #[test]
    fn test_tool_kind_names() {
        assert_eq!(ToolKind::Select.name(), "Select");
        assert!(ToolKind::Bbox.is_drawing_tool());
        assert!(!ToolKind::Select.is_drawing_tool());
        assert!(!ToolKind::Classify.is_drawing_tool());
    }
}
