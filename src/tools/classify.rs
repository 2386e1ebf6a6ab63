//! Classification marker tool.

use crate::model::Annotation;
use crate::tools::{DrawList, Rgba, Tool, ToolKind};
use crate::transform::{CanvasMapping, ImagePoint};

/// Tool for image-level labels.
///
/// Classification markers have no geometry, so there is nothing to draft or
/// hit-test; toggling classes goes through the engine's classify operation.
/// The tool renders one stacked badge per label in the image corner, which
/// also covers no-object markers.
#[derive(Debug, Default)]
pub struct ClassifyTool;

impl ClassifyTool {
    /// Create a new classify tool.
    pub fn new() -> Self {
        Self
    }
}

impl Tool for ClassifyTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Classify
    }

    fn draw_annotation(
        &self,
        list: &mut DrawList,
        map: &CanvasMapping,
        _annotation: &Annotation,
        label: &str,
        color: Rgba,
        _selected: bool,
    ) {
        if label.is_empty() {
            return;
        }
        let image_origin = map.to_canvas(ImagePoint::new(0.0, 0.0));
        list.badge(image_origin, label, color);
    }
}
