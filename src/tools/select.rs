//! Point-select tool: picking, cycling and handle drags.

use crate::model::{Annotation, AnnotationId, BBox, HandleId};
use crate::tools::bbox::apply_handle_drag;
use crate::tools::{Tool, ToolKind};
use crate::transform::ImagePoint;

/// Interaction state for an ongoing handle drag.
///
/// A press on a handle only becomes a drag after the pointer travels a
/// minimum distance; a press released before that is treated as a click so
/// that clicking a selected annotation still cycles the selection.
#[derive(Debug, Clone, Default)]
pub enum EditState {
    /// Nothing in progress
    #[default]
    Idle,
    /// Handle pressed, waiting for enough movement to count as a drag
    PotentialDrag {
        annotation_id: AnnotationId,
        handle: HandleId,
        start: ImagePoint,
        original: BBox,
    },
    /// Actively resizing via a handle
    DraggingHandle {
        annotation_id: AnnotationId,
        handle: HandleId,
        original: BBox,
        current: BBox,
    },
}

impl EditState {
    /// Whether a press is waiting to become a drag.
    pub fn is_potential_drag(&self) -> bool {
        matches!(self, EditState::PotentialDrag { .. })
    }

    /// Whether a handle drag is in progress.
    pub fn is_dragging(&self) -> bool {
        matches!(self, EditState::DraggingHandle { .. })
    }
}

/// What a pointer release concluded.
#[derive(Debug, Clone, PartialEq)]
pub enum DragRelease {
    /// Nothing was pressed
    Idle,
    /// Press without enough travel; treat as a selection click
    Click,
    /// A resize finished and its final shape must be committed
    Commit {
        /// Annotation that was resized
        annotation_id: AnnotationId,
        /// Final shape at release, not yet clipped to image bounds
        shape: BBox,
    },
}

/// Tool for selecting and modifying existing annotations.
///
/// Selection and cycling bookkeeping lives with the per-image data; this
/// tool owns only the transient drag interaction, which navigation cancels.
#[derive(Debug, Default)]
pub struct SelectTool {
    edit: EditState,
}

impl SelectTool {
    /// Create a new select tool.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current interaction state.
    pub fn edit_state(&self) -> &EditState {
        &self.edit
    }

    /// Record a press on a resize handle of a selected annotation.
    pub fn press_handle(
        &mut self,
        annotation_id: AnnotationId,
        handle: HandleId,
        start: ImagePoint,
        original: BBox,
    ) {
        log::debug!(
            "Potential drag on annotation {}, handle={:?}",
            annotation_id,
            handle
        );
        self.edit = EditState::PotentialDrag {
            annotation_id,
            handle,
            start,
            original,
        };
    }

    /// Follow pointer motion.
    ///
    /// Returns the resized shape to preview locally once the press has
    /// turned into a drag; `None` while idle or below the drag threshold.
    pub fn drag_to(
        &mut self,
        cursor: ImagePoint,
        min_drag_distance: f32,
        min_resize_size: f32,
    ) -> Option<(AnnotationId, BBox)> {
        // Promote a potential drag once the pointer has travelled far enough
        if let EditState::PotentialDrag {
            annotation_id,
            handle,
            start,
            original,
        } = &self.edit
        {
            if start.distance_to(cursor) < min_drag_distance {
                return None;
            }
            log::debug!(
                "Starting handle drag on annotation {}, handle={:?}",
                annotation_id,
                handle
            );
            self.edit = EditState::DraggingHandle {
                annotation_id: annotation_id.clone(),
                handle: *handle,
                original: *original,
                current: *original,
            };
        }

        if let EditState::DraggingHandle {
            annotation_id,
            handle,
            original,
            current,
        } = &mut self.edit
        {
            *current = apply_handle_drag(original, *handle, cursor, min_resize_size);
            return Some((annotation_id.clone(), *current));
        }
        None
    }

    /// Release the pointer, concluding the interaction.
    pub fn release(&mut self) -> DragRelease {
        match std::mem::take(&mut self.edit) {
            EditState::Idle => DragRelease::Idle,
            EditState::PotentialDrag { .. } => DragRelease::Click,
            EditState::DraggingHandle {
                annotation_id,
                current,
                ..
            } => DragRelease::Commit {
                annotation_id,
                shape: current,
            },
        }
    }
}

impl Tool for SelectTool {
    fn kind(&self) -> ToolKind {
        ToolKind::Select
    }

    fn cancel(&mut self) {
        self.edit = EditState::Idle;
    }

    fn hit_test(&self, annotation: &Annotation, point: ImagePoint) -> bool {
        annotation.geometry.is_some_and(|bbox| bbox.contains(point))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN_DRAG: f32 = 3.0;
    const MIN_RESIZE: f32 = 10.0;

    #[test]
    fn test_press_and_release_without_travel_is_click() {
        let mut tool = SelectTool::new();
        tool.press_handle(
            "a1".to_string(),
            HandleId::TopLeft,
            ImagePoint::new(10.0, 10.0),
            BBox::new(10.0, 10.0, 40.0, 40.0),
        );
        assert!(tool.edit_state().is_potential_drag());

        // A wiggle below the threshold does not start a drag
        let moved = tool.drag_to(ImagePoint::new(11.0, 10.5), MIN_DRAG, MIN_RESIZE);
        assert!(moved.is_none());

        assert_eq!(tool.release(), DragRelease::Click);
        assert!(matches!(tool.edit_state(), EditState::Idle));
    }

    #[test]
    fn test_drag_resizes_and_commits() {
        let mut tool = SelectTool::new();
        tool.press_handle(
            "a1".to_string(),
            HandleId::BottomRight,
            ImagePoint::new(50.0, 50.0),
            BBox::new(10.0, 10.0, 40.0, 40.0),
        );

        let (id, shape) = tool
            .drag_to(ImagePoint::new(80.0, 70.0), MIN_DRAG, MIN_RESIZE)
            .unwrap();
        assert_eq!(id, "a1");
        assert_eq!(shape, BBox::new(10.0, 10.0, 70.0, 60.0));
        assert!(tool.edit_state().is_dragging());

        match tool.release() {
            DragRelease::Commit {
                annotation_id,
                shape,
            } => {
                assert_eq!(annotation_id, "a1");
                assert_eq!(shape, BBox::new(10.0, 10.0, 70.0, 60.0));
            }
            other => panic!("expected commit, got {other:?}"),
        }
    }

    #[test]
    fn test_drag_applies_from_original_not_cumulative() {
        let mut tool = SelectTool::new();
        let original = BBox::new(10.0, 10.0, 40.0, 40.0);
        tool.press_handle(
            "a1".to_string(),
            HandleId::Right,
            ImagePoint::new(50.0, 30.0),
            original,
        );

        tool.drag_to(ImagePoint::new(90.0, 30.0), MIN_DRAG, MIN_RESIZE);
        let (_, shape) = tool
            .drag_to(ImagePoint::new(60.0, 30.0), MIN_DRAG, MIN_RESIZE)
            .unwrap();

        // Moving back shrinks again relative to the original shape
        assert_eq!(shape, BBox::new(10.0, 10.0, 50.0, 40.0));
    }

    #[test]
    fn test_cancel_resets_interaction() {
        let mut tool = SelectTool::new();
        tool.press_handle(
            "a1".to_string(),
            HandleId::Top,
            ImagePoint::new(30.0, 10.0),
            BBox::new(10.0, 10.0, 40.0, 40.0),
        );
        tool.drag_to(ImagePoint::new(30.0, 100.0), MIN_DRAG, MIN_RESIZE);

        tool.cancel();
        assert_eq!(tool.release(), DragRelease::Idle);
    }

    #[test]
    fn test_release_when_idle() {
        let mut tool = SelectTool::new();
        assert_eq!(tool.release(), DragRelease::Idle);
    }
}
