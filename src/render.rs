//! Render-loop glue: pointer routing and draw-list assembly.
//!
//! Pointer events are interpreted against the active tool and turned
//! into either immediate local state changes (selection, live drag
//! preview) or a [`PointerIntent`] the workstation follows up with a
//! collaborator call. Drawing consumes the same state into a
//! [`DrawList`] once per dirty frame.

use std::collections::HashSet;

use crate::config::GeometryConfig;
use crate::constants::overlay;
use crate::model::{Annotation, AnnotationId, AnnotationKind, BBox, ClassId, ClassTable, TaskType};
use crate::state::ImageData;
use crate::tools::{DragRelease, DrawList, Rgba, ToolKind, ToolRegistry};
use crate::transform::{CanvasMapping, CanvasPoint, ImagePoint};

/// Phase of a pointer gesture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerKind {
    Down,
    Moved,
    Up,
}

/// A pointer event in canvas coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    pub kind: PointerKind,
    pub position: CanvasPoint,
}

impl PointerEvent {
    pub fn new(kind: PointerKind, x: f32, y: f32) -> Self {
        Self {
            kind,
            position: CanvasPoint::new(x, y),
        }
    }
}

/// Keys the engine reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    /// Abandon the in-progress draft or drag
    Escape,
    /// Delete the selected annotation
    Delete,
}

/// Follow-up work a routed pointer event asks of the workstation.
#[derive(Debug, Clone, PartialEq)]
pub enum PointerIntent {
    /// Nothing changed
    None,
    /// Local state changed; a redraw is enough
    Redraw,
    /// A completed draw produced a box to persist, not yet clipped
    CreateBox(BBox),
    /// A handle drag finished; persist the final shape
    CommitResize {
        annotation_id: AnnotationId,
        shape: BBox,
    },
}

/// Interpret one pointer event against the active tool.
///
/// Selection changes and drag previews are applied to `data` directly;
/// anything needing a collaborator round-trip is returned as an intent.
pub fn route_pointer(
    event: PointerEvent,
    active_tool: ToolKind,
    registry: &mut ToolRegistry,
    data: &mut ImageData,
    map: &CanvasMapping,
    geometry: &GeometryConfig,
    task: TaskType,
    hidden: &HashSet<ClassId>,
) -> PointerIntent {
    let point = map.to_image(event.position);

    match active_tool {
        ToolKind::Select => match event.kind {
            PointerKind::Down => {
                // Handle hits on the selected annotation win over body hits
                let radius = map.scaled_hit_radius(geometry.handle_hit_radius);
                let pressed = data.selected_annotation().and_then(|annotation| {
                    let handle = registry
                        .for_annotation(annotation.annotation_type)
                        .hit_test_handle(annotation, point, radius)?;
                    let original = annotation.geometry?;
                    Some((annotation.id.clone(), handle, original))
                });

                if let Some((annotation_id, handle, original)) = pressed {
                    registry
                        .select()
                        .press_handle(annotation_id, handle, point, original);
                    return PointerIntent::None;
                }
                select_cycle(registry, data, point, task, hidden)
            }
            PointerKind::Moved => {
                let dragged = registry.select().drag_to(
                    point,
                    geometry.min_drag_distance,
                    geometry.min_resize_size,
                );
                if let Some((annotation_id, shape)) = dragged {
                    if let Some(annotation) = data.annotation_mut(&annotation_id) {
                        annotation.geometry = Some(shape);
                    }
                    return PointerIntent::Redraw;
                }
                PointerIntent::None
            }
            PointerKind::Up => match registry.select().release() {
                DragRelease::Idle => PointerIntent::None,
                // A press without travel acts as a selection click
                DragRelease::Click => select_cycle(registry, data, point, task, hidden),
                DragRelease::Commit {
                    annotation_id,
                    shape,
                } => PointerIntent::CommitResize {
                    annotation_id,
                    shape,
                },
            },
        },
        ToolKind::Bbox => {
            let tool = registry.tool_mut(ToolKind::Bbox);
            match event.kind {
                PointerKind::Down => {
                    tool.begin(point);
                    PointerIntent::Redraw
                }
                PointerKind::Moved => {
                    if tool.is_drawing() {
                        tool.update(point);
                        PointerIntent::Redraw
                    } else {
                        PointerIntent::None
                    }
                }
                PointerKind::Up => {
                    if !tool.is_drawing() {
                        return PointerIntent::None;
                    }
                    match tool.finish(geometry.min_draw_size) {
                        Some(shape) => PointerIntent::CreateBox(shape),
                        // Degenerate draft discarded; clear the preview
                        None => PointerIntent::Redraw,
                    }
                }
            }
        }
        // Class toggles come from the class list, not the canvas
        ToolKind::Classify => PointerIntent::None,
    }
}

/// Click-to-select with cycling through overlapping annotations.
fn select_cycle(
    registry: &ToolRegistry,
    data: &mut ImageData,
    point: ImagePoint,
    task: TaskType,
    hidden: &HashSet<ClassId>,
) -> PointerIntent {
    // All visible annotations under the cursor, bottom to top
    let hit_indices: Vec<usize> = data
        .annotations
        .iter()
        .enumerate()
        .filter(|(_, ann)| ann.task() == Some(task))
        .filter(|(_, ann)| !ann.class_id.is_some_and(|c| hidden.contains(&c)))
        .filter(|(_, ann)| {
            registry
                .for_annotation(ann.annotation_type)
                .hit_test(ann, point)
        })
        .map(|(idx, _)| idx)
        .collect();

    if hit_indices.is_empty() {
        data.select(None);
        log::debug!("No annotation at click position, deselected");
        return PointerIntent::Redraw;
    }

    // Cycle when re-clicking the same overlap stack, else pick top-most
    let next_idx = if let Some(last_idx) = data.last_clicked {
        if hit_indices.contains(&last_idx) {
            let pos = hit_indices.iter().position(|&i| i == last_idx).unwrap_or(0);
            hit_indices[(pos + 1) % hit_indices.len()]
        } else {
            *hit_indices.last().unwrap()
        }
    } else {
        *hit_indices.last().unwrap()
    };

    data.selected = Some(data.annotations[next_idx].id.clone());
    data.last_clicked = Some(next_idx);
    log::debug!(
        "Selected annotation {} ({} overlapping)",
        data.annotations[next_idx].id,
        hit_indices.len()
    );
    PointerIntent::Redraw
}

/// Assemble the draw list for the active image.
///
/// Order matters: committed annotations bottom to top in storage order,
/// handles for the selection, then the in-progress draft preview on top.
pub fn build_draw_list(
    registry: &ToolRegistry,
    data: Option<&ImageData>,
    table: Option<&ClassTable>,
    hidden: &HashSet<ClassId>,
    map: &CanvasMapping,
    task: TaskType,
    active_tool: ToolKind,
    active_class: Option<ClassId>,
) -> DrawList {
    let mut list = DrawList::new();
    let Some(data) = data else {
        return list;
    };

    for annotation in data.of_task(task) {
        if annotation.class_id.is_some_and(|c| hidden.contains(&c)) {
            continue;
        }
        let selected = data.selected.as_deref() == Some(annotation.id.as_str());
        let color = if selected {
            overlay::SELECTED_COLOR
        } else {
            annotation_rgba(annotation, table)
        };
        let label = annotation_label(annotation, table);
        let tool = registry.for_annotation(annotation.annotation_type);
        tool.draw_annotation(&mut list, map, annotation, &label, color, selected);
        if selected {
            tool.draw_handles(&mut list, map, annotation);
        }
    }

    let preview_color = class_rgba(table, active_class);
    registry.tool(active_tool).draw_preview(&mut list, map, preview_color);

    list
}

fn annotation_rgba(annotation: &Annotation, table: Option<&ClassTable>) -> Rgba {
    if annotation.annotation_type == AnnotationKind::NoObject {
        return overlay::NO_OBJECT_COLOR;
    }
    class_rgba(table, annotation.class_id)
}

/// Class color as RGBA floats, red fallback for unknown classes.
fn class_rgba(table: Option<&ClassTable>, class_id: Option<ClassId>) -> Rgba {
    class_id
        .and_then(|id| table.and_then(|t| t.get(id)))
        .map(|class| {
            [
                class.color[0] as f32 / 255.0,
                class.color[1] as f32 / 255.0,
                class.color[2] as f32 / 255.0,
                overlay::DEFAULT_ALPHA,
            ]
        })
        .unwrap_or([1.0, 0.0, 0.0, overlay::DEFAULT_ALPHA])
}

fn annotation_label(annotation: &Annotation, table: Option<&ClassTable>) -> String {
    if annotation.annotation_type == AnnotationKind::NoObject {
        return "no object".to_string();
    }
    // Table lookup first; stored name covers classes no longer in the table
    let name = annotation
        .class_id
        .and_then(|id| table.and_then(|t| t.get(id)))
        .map(|class| class.name.clone())
        .or_else(|| annotation.class_name.clone());
    match (name, annotation.confidence) {
        (Some(name), Some(confidence)) => format!("{} ({:.2})", name, confidence),
        (Some(name), None) => name,
        (None, _) => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ClassInfo, ClassificationMode};

    fn map() -> CanvasMapping {
        CanvasMapping {
            origin_x: 0.0,
            origin_y: 0.0,
            zoom: 1.0,
        }
    }

    fn bbox_annotation(x: f32, y: f32, w: f32, h: f32, class_id: u32) -> Annotation {
        Annotation::draft(
            "i1",
            AnnotationKind::Bbox,
            Some(BBox::new(x, y, w, h)),
            Some(class_id),
            "alice",
        )
    }

    fn route(
        kind: PointerKind,
        x: f32,
        y: f32,
        registry: &mut ToolRegistry,
        data: &mut ImageData,
        tool: ToolKind,
    ) -> PointerIntent {
        route_pointer(
            PointerEvent::new(kind, x, y),
            tool,
            registry,
            data,
            &map(),
            &GeometryConfig::default(),
            TaskType::Detection,
            &HashSet::new(),
        )
    }

    #[test]
    fn test_bbox_drag_produces_create_intent() {
        let mut registry = ToolRegistry::new();
        let mut data = ImageData::default();

        route(PointerKind::Down, 10.0, 10.0, &mut registry, &mut data, ToolKind::Bbox);
        route(PointerKind::Moved, 60.0, 50.0, &mut registry, &mut data, ToolKind::Bbox);
        let intent = route(PointerKind::Up, 60.0, 50.0, &mut registry, &mut data, ToolKind::Bbox);

        assert_eq!(intent, PointerIntent::CreateBox(BBox::new(10.0, 10.0, 50.0, 40.0)));
    }

    #[test]
    fn test_click_cycles_through_overlapping() {
        let mut registry = ToolRegistry::new();
        let mut data = ImageData::default();
        data.annotations.push(bbox_annotation(0.0, 0.0, 100.0, 100.0, 0));
        data.annotations.push(bbox_annotation(20.0, 20.0, 100.0, 100.0, 0));
        let bottom = data.annotations[0].id.clone();
        let top = data.annotations[1].id.clone();

        // First click picks the top-most annotation
        route(PointerKind::Down, 50.0, 50.0, &mut registry, &mut data, ToolKind::Select);
        route(PointerKind::Up, 50.0, 50.0, &mut registry, &mut data, ToolKind::Select);
        assert_eq!(data.selected.as_deref(), Some(top.as_str()));

        // Clicking again in the same overlap cycles to the one below
        route(PointerKind::Down, 50.0, 50.0, &mut registry, &mut data, ToolKind::Select);
        route(PointerKind::Up, 50.0, 50.0, &mut registry, &mut data, ToolKind::Select);
        assert_eq!(data.selected.as_deref(), Some(bottom.as_str()));
    }

    #[test]
    fn test_click_empty_space_deselects() {
        let mut registry = ToolRegistry::new();
        let mut data = ImageData::default();
        data.annotations.push(bbox_annotation(0.0, 0.0, 50.0, 50.0, 0));
        let id = data.annotations[0].id.clone();
        data.select(Some(id));

        let intent = route(PointerKind::Down, 200.0, 200.0, &mut registry, &mut data, ToolKind::Select);
        assert_eq!(intent, PointerIntent::Redraw);
        assert!(data.selected.is_none());
    }

    #[test]
    fn test_handle_drag_commits_resized_shape() {
        let mut registry = ToolRegistry::new();
        let mut data = ImageData::default();
        data.annotations.push(bbox_annotation(10.0, 10.0, 100.0, 80.0, 0));
        let id = data.annotations[0].id.clone();
        data.select(Some(id.clone()));

        // Press the bottom-right corner handle and drag it outward
        route(PointerKind::Down, 110.0, 90.0, &mut registry, &mut data, ToolKind::Select);
        let moved = route(PointerKind::Moved, 150.0, 120.0, &mut registry, &mut data, ToolKind::Select);
        assert_eq!(moved, PointerIntent::Redraw);
        assert_eq!(
            data.annotations[0].geometry,
            Some(BBox::new(10.0, 10.0, 140.0, 110.0))
        );

        let intent = route(PointerKind::Up, 150.0, 120.0, &mut registry, &mut data, ToolKind::Select);
        assert_eq!(
            intent,
            PointerIntent::CommitResize {
                annotation_id: id,
                shape: BBox::new(10.0, 10.0, 140.0, 110.0),
            }
        );
    }

    #[test]
    fn test_handle_press_without_travel_cycles() {
        let mut registry = ToolRegistry::new();
        let mut data = ImageData::default();
        data.annotations.push(bbox_annotation(10.0, 10.0, 100.0, 80.0, 0));
        let id = data.annotations[0].id.clone();
        data.select(Some(id.clone()));

        route(PointerKind::Down, 110.0, 90.0, &mut registry, &mut data, ToolKind::Select);
        route(PointerKind::Up, 105.0, 85.0, &mut registry, &mut data, ToolKind::Select);

        // The release fell inside the box, so the click keeps it selected
        assert_eq!(data.selected.as_deref(), Some(id.as_str()));
        assert_eq!(data.annotations[0].geometry, Some(BBox::new(10.0, 10.0, 100.0, 80.0)));
    }

    fn table() -> ClassTable {
        ClassTable::new(
            vec![ClassInfo::new(0, "car", 0), ClassInfo::new(1, "truck", 1)],
            ClassificationMode::Single,
        )
    }

    #[test]
    fn test_draw_list_skips_hidden_classes() {
        let registry = ToolRegistry::new();
        let mut data = ImageData::default();
        data.annotations.push(bbox_annotation(0.0, 0.0, 50.0, 50.0, 0));
        data.annotations.push(bbox_annotation(60.0, 0.0, 50.0, 50.0, 1));
        let hidden: HashSet<ClassId> = [1].into_iter().collect();

        let list = build_draw_list(
            &registry,
            Some(&data),
            Some(&table()),
            &hidden,
            &map(),
            TaskType::Detection,
            ToolKind::Select,
            None,
        );

        // One rect and one label for the single visible annotation
        assert_eq!(list.len(), 2);
    }

    #[test]
    fn test_label_uses_table_then_stored_name() {
        let mut known = bbox_annotation(0.0, 0.0, 50.0, 50.0, 0);
        known.class_name = Some("automobile".to_string());
        assert_eq!(annotation_label(&known, Some(&table())), "car");

        let mut orphan = bbox_annotation(0.0, 0.0, 50.0, 50.0, 9);
        orphan.class_name = Some("bike".to_string());
        assert_eq!(annotation_label(&orphan, Some(&table())), "bike");
    }

    #[test]
    fn test_draw_list_adds_handles_for_selection() {
        let registry = ToolRegistry::new();
        let mut data = ImageData::default();
        data.annotations.push(bbox_annotation(0.0, 0.0, 50.0, 50.0, 0));
        let id = data.annotations[0].id.clone();
        data.select(Some(id));

        let list = build_draw_list(
            &registry,
            Some(&data),
            Some(&table()),
            &HashSet::new(),
            &map(),
            TaskType::Detection,
            ToolKind::Select,
            None,
        );

        // Rect + label + eight handles
        assert_eq!(list.len(), 10);
    }
}
