//! The annotation workstation: one owned state object for the whole engine.
//!
//! Everything the host reads or mutates goes through here. Mutations are
//! named async operations that apply the optimistic local change first,
//! then await the collaborator and reconcile; pure reads and viewport
//! changes are synchronous. Every mutation marks the scene dirty so the
//! host knows to run a render pass.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::Utc;

use crate::batch::{BatchAction, BatchPlan, BatchReport};
use crate::config::EngineConfig;
use crate::error::{EngineError, RemoteError};
use crate::event::EngineEvent;
use crate::lifecycle::{self, StatusSummary};
use crate::model::{
    Annotation, AnnotationId, AnnotationKind, AnnotationState, BBox, ClassId, ClassTable,
    ClassificationMode, ImageId, ImageLock, ImageRecord, ImageStatus, TASK_ATTRIBUTE, TaskType,
};
use crate::remote::{CreateAnnotation, RemoteStore, UpdateAnnotation};
use crate::render::{self, Key, PointerEvent, PointerIntent};
use crate::session::EditSession;
use crate::state::{ImageData, ImageDataStore, ProjectState};
use crate::tools::{DrawList, ToolKind, ToolRegistry};
use crate::transform::{CanvasMapping, CanvasSize, Viewport};

/// Owns project, annotation, tool, viewport and session state for one
/// operator working one project.
pub struct Workstation {
    config: EngineConfig,
    remote: Arc<dyn RemoteStore>,
    project_id: String,
    user_id: String,

    project: ProjectState,
    data: ImageDataStore,
    registry: ToolRegistry,

    active_tool: ToolKind,
    /// Default class for new annotations, remembered per task
    active_classes: BTreeMap<TaskType, ClassId>,
    /// Classes hidden from rendering and hit-testing, per task
    hidden: BTreeMap<TaskType, HashSet<ClassId>>,

    viewport: Viewport,
    canvas_size: Option<CanvasSize>,

    /// Images picked for batch operations
    multi_selection: HashSet<ImageId>,
    events: VecDeque<EngineEvent>,
    session: Option<EditSession>,
    dirty: bool,
}

impl Workstation {
    /// Create a workstation for one project and user.
    pub fn new(
        config: EngineConfig,
        remote: Arc<dyn RemoteStore>,
        project_id: impl Into<String>,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            config,
            remote,
            project_id: project_id.into(),
            user_id: user_id.into(),
            project: ProjectState::new(),
            data: ImageDataStore::new(),
            registry: ToolRegistry::new(),
            active_tool: ToolKind::Select,
            active_classes: BTreeMap::new(),
            hidden: BTreeMap::new(),
            viewport: Viewport::identity(),
            canvas_size: None,
            multi_selection: HashSet::new(),
            events: VecDeque::new(),
            session: None,
            dirty: false,
        }
    }

    /// Install the project's image list and class tables.
    ///
    /// The host fetches this metadata itself; annotations come separately
    /// through [`Workstation::sync_annotations`].
    pub fn load_project(
        &mut self,
        images: Vec<ImageRecord>,
        class_tables: BTreeMap<TaskType, ClassTable>,
    ) {
        log::info!(
            "Loaded project {} with {} images",
            self.project_id,
            images.len()
        );
        self.project.images = images;
        self.project.current_index = 0;
        self.project.class_tables = class_tables;
        self.data = ImageDataStore::new();
        self.multi_selection.clear();
        self.viewport = Viewport::identity();
        self.dirty = true;
    }

    /// Fetch the project's annotations and replace the local lists.
    pub async fn sync_annotations(&mut self) -> Result<usize, EngineError> {
        let annotations = self.remote.list_annotations(&self.project_id, None).await?;
        let count = annotations.len();
        self.data.replace_all(annotations);
        self.dirty = true;
        log::info!("Synced {} annotations from the collaborator", count);
        Ok(count)
    }

    // ---- host-facing reads ----

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn project(&self) -> &ProjectState {
        &self.project
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn active_tool(&self) -> ToolKind {
        self.active_tool
    }

    pub fn active_task(&self) -> TaskType {
        self.project.active_task
    }

    /// Default class for newly drawn annotations under the active task.
    pub fn active_class(&self) -> Option<ClassId> {
        self.active_classes.get(&self.project.active_task).copied()
    }

    /// Working data for the open image, if any exists yet.
    pub fn current_data(&self) -> Option<&ImageData> {
        self.project
            .current_image()
            .and_then(|image| self.data.get(&image.id))
    }

    /// Annotations on the open image, all tasks mixed.
    pub fn current_annotations(&self) -> &[Annotation] {
        self.current_data()
            .map(|data| data.annotations.as_slice())
            .unwrap_or(&[])
    }

    /// Annotations on any image, for gallery-style summaries.
    pub fn annotations_of(&self, image_id: &str) -> &[Annotation] {
        self.data
            .get(image_id)
            .map(|data| data.annotations.as_slice())
            .unwrap_or(&[])
    }

    pub fn selected_annotation(&self) -> Option<&Annotation> {
        self.current_data().and_then(|data| data.selected_annotation())
    }

    /// Whether this user holds the open image's edit lock.
    pub fn holds_lock(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.holds_lock())
    }

    /// Locks other users hold in the project, for "editing by X" badges.
    pub async fn other_locks(&self) -> Result<Vec<ImageLock>, EngineError> {
        let locks = self.remote.list_locks(&self.project_id).await?;
        Ok(locks
            .into_iter()
            .filter(|lock| lock.locked_by != self.user_id)
            .collect())
    }

    /// Progress string like "3/15".
    pub fn progress(&self) -> String {
        self.project.progress()
    }

    /// An image's status for the active task, derived from annotations.
    pub fn status_of(&self, image_id: &str) -> ImageStatus {
        let annotations = self
            .data
            .get(image_id)
            .map(|data| data.annotations.as_slice())
            .unwrap_or(&[]);
        lifecycle::image_status(annotations, self.project.active_task)
    }

    pub fn current_status(&self) -> ImageStatus {
        match self.project.current_image() {
            Some(image) => self.status_of(&image.id),
            None => ImageStatus::NotStarted,
        }
    }

    /// Per-status image counts for the active task.
    pub fn status_summary(&self) -> StatusSummary {
        lifecycle::summarize(
            self.project
                .images
                .iter()
                .map(|image| self.status_of(&image.id)),
        )
    }

    /// Take everything queued for the host since the last drain.
    pub fn drain_events(&mut self) -> Vec<EngineEvent> {
        self.events.drain(..).collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    // ---- tool, task and class selection ----

    /// Switch the active tool; tools the active task does not permit are
    /// ignored.
    pub fn set_active_tool(&mut self, tool: ToolKind) {
        if !self.registry.is_permitted(tool, self.project.active_task) {
            log::debug!(
                "Tool {} not available for {}",
                tool.name(),
                self.project.active_task.name()
            );
            return;
        }
        if self.active_tool != tool {
            self.registry.cancel_all();
            self.active_tool = tool;
            self.dirty = true;
        }
    }

    /// Switch the active task, abandoning drafts and falling back to the
    /// select tool when the current tool is not permitted.
    pub fn set_active_task(&mut self, task: TaskType) {
        if self.project.active_task == task {
            return;
        }
        self.registry.cancel_all();
        self.project.active_task = task;
        if !self.registry.is_permitted(self.active_tool, task) {
            log::debug!(
                "Tool {} not available for {}, falling back to Select",
                self.active_tool.name(),
                task.name()
            );
            self.active_tool = ToolKind::Select;
        }
        // The selection belongs to the previous task's annotation set
        if let Some(image) = self.project.current_image() {
            if let Some(data) = self.data.get_mut(&image.id) {
                data.select(None);
            }
        }
        self.dirty = true;
    }

    /// Pick the default class for new annotations under the active task.
    pub fn set_active_class(&mut self, class_id: ClassId) -> Result<(), EngineError> {
        let known = self
            .project
            .class_table()
            .is_some_and(|table| table.contains(class_id));
        if !known {
            return Err(EngineError::UnknownClass { id: class_id });
        }
        self.active_classes.insert(self.project.active_task, class_id);
        self.dirty = true;
        Ok(())
    }

    /// Hide or show one class's annotations under the active task.
    pub fn toggle_class_visibility(&mut self, class_id: ClassId) {
        let hidden = self.hidden.entry(self.project.active_task).or_default();
        if !hidden.insert(class_id) {
            hidden.remove(&class_id);
        }
        self.dirty = true;
    }

    pub fn is_class_hidden(&self, class_id: ClassId) -> bool {
        self.hidden
            .get(&self.project.active_task)
            .is_some_and(|set| set.contains(&class_id))
    }

    /// Reorder the active task's class table and persist the new order.
    pub async fn reorder_classes(&mut self, ordered: &[ClassId]) -> Result<(), EngineError> {
        let task = self.project.active_task;
        let Some(table) = self.project.class_table_mut() else {
            return Err(EngineError::ClassReorderMismatch {
                expected: 0,
                got: ordered.len(),
            });
        };
        table.reorder(ordered)?;
        self.dirty = true;
        log::info!("Reordered {} classes for {}", ordered.len(), task.name());

        if let Err(err) = self
            .remote
            .save_class_order(&self.project_id, task, ordered)
            .await
        {
            log::error!("Class order for {} not saved: {}", task.name(), err);
            self.push_remote_failure("save_class_order", &err);
        }
        Ok(())
    }

    // ---- viewport ----

    pub fn set_canvas_size(&mut self, size: CanvasSize) {
        self.canvas_size = Some(size);
        self.dirty = true;
    }

    /// The canvas/image mapping for the open image, once the host has
    /// reported a canvas size.
    pub fn mapping(&self) -> Option<CanvasMapping> {
        let canvas = self.canvas_size?;
        let image = self.project.current_image()?.size();
        Some(self.viewport.mapping(canvas, image))
    }

    pub fn zoom_in(&mut self) {
        self.zoom_by(self.config.zoom.step);
    }

    pub fn zoom_out(&mut self) {
        self.zoom_by(-self.config.zoom.step);
    }

    /// Apply a relative zoom, anchored on the cursor when known.
    pub fn zoom_by(&mut self, delta: f32) {
        let anchored = self.viewport.cursor.and_then(|cursor| {
            let canvas = self.canvas_size?;
            let image = self.project.current_image()?.size();
            Some(self.viewport.zoom_at(
                delta,
                cursor,
                canvas,
                image,
                self.config.zoom.min,
                self.config.zoom.max,
            ))
        });
        self.viewport = anchored.unwrap_or_else(|| {
            self.viewport
                .zoom_by(delta, self.config.zoom.min, self.config.zoom.max)
        });
        self.dirty = true;
    }

    pub fn pan_by(&mut self, dx: f32, dy: f32) {
        self.viewport = self.viewport.pan_by(dx, dy);
        self.dirty = true;
    }

    /// Reset to the centered fit view.
    pub fn reset_view(&mut self) {
        self.viewport = self.viewport.reset();
        self.dirty = true;
    }

    // ---- input routing and rendering ----

    /// Interpret one pointer event against the active tool.
    ///
    /// Ignored until an image is open and a canvas size is known. Remote
    /// failures surface as events, never as panics or errors here.
    pub async fn handle_pointer(&mut self, event: PointerEvent) {
        let Some(mapping) = self.mapping() else {
            log::debug!("Pointer event ignored, no open image or canvas size");
            return;
        };
        self.viewport = self.viewport.with_cursor(event.position);

        let Some(image_id) = self.project.current_image().map(|image| image.id.clone()) else {
            return;
        };
        let task = self.project.active_task;
        let empty = HashSet::new();
        let hidden = self.hidden.get(&task).unwrap_or(&empty);

        let intent = render::route_pointer(
            event,
            self.active_tool,
            &mut self.registry,
            self.data.get_or_create(&image_id),
            &mapping,
            &self.config.geometry,
            task,
            hidden,
        );

        match intent {
            PointerIntent::None => {}
            PointerIntent::Redraw => self.dirty = true,
            PointerIntent::CreateBox(shape) => {
                let class_id = self.active_class();
                if let Err(err) = self.create_annotation(shape, class_id).await {
                    log::debug!("Draw discarded: {}", err);
                    self.dirty = true;
                }
            }
            PointerIntent::CommitResize {
                annotation_id,
                shape,
            } => {
                if let Err(err) = self.resize_annotation(&annotation_id, shape).await {
                    log::warn!("Resize commit failed: {}", err);
                }
            }
        }
    }

    /// Interpret one key press.
    pub async fn handle_key(&mut self, key: Key) {
        match key {
            Key::Escape => {
                self.registry.cancel_all();
                if let Some(image) = self.project.current_image() {
                    if let Some(data) = self.data.get_mut(&image.id) {
                        data.select(None);
                    }
                }
                self.dirty = true;
            }
            Key::Delete => {
                if let Err(err) = self.delete_selected().await {
                    log::warn!("Delete failed: {}", err);
                }
            }
        }
    }

    /// Produce the draw list for the current frame and clear the dirty
    /// flag. Never fails and never talks to the collaborator.
    pub fn render(&mut self) -> DrawList {
        let Some(mapping) = self.mapping() else {
            self.dirty = false;
            return DrawList::new();
        };
        let task = self.project.active_task;
        let data = self.current_data();
        let table = self.project.class_table();
        let empty = HashSet::new();
        let hidden = self.hidden.get(&task).unwrap_or(&empty);

        let list = render::build_draw_list(
            &self.registry,
            data,
            table,
            hidden,
            &mapping,
            task,
            self.active_tool,
            self.active_class(),
        );
        self.dirty = false;
        list
    }

    // ---- annotation mutations ----

    /// Persist a freshly drawn box on the open image.
    ///
    /// The shape is clipped into the image first; a clip that changed it
    /// queues a warning event. Boxes degenerate after clipping are
    /// rejected before any collaborator call.
    pub async fn create_annotation(
        &mut self,
        shape: BBox,
        class_id: Option<ClassId>,
    ) -> Result<AnnotationId, EngineError> {
        let record = self
            .project
            .current_image()
            .ok_or(EngineError::NoActiveImage)?;
        let image_id = record.id.clone();
        let image_size = record.size();

        let clipped = shape.clip_to(image_size);
        if !clipped.meets_min_size(self.config.geometry.min_draw_size) {
            return Err(EngineError::degenerate(clipped.width, clipped.height));
        }

        let mut draft = Annotation::draft(
            image_id.clone(),
            AnnotationKind::Bbox,
            Some(clipped),
            class_id,
            self.user_id.clone(),
        );
        draft.class_name = self.class_name_of(class_id);
        let temp_id = draft.id.clone();
        let payload = CreateAnnotation::from_draft(&draft);

        if clipped != shape {
            log::warn!("Box on {} clipped to image bounds", image_id);
            self.events.push_back(EngineEvent::GeometryClipped {
                annotation_id: temp_id.clone(),
            });
        }

        let data = self.data.get_or_create(&image_id);
        data.annotations.push(draft);
        data.select(Some(temp_id.clone()));
        self.mark_image_dirty(&image_id);

        match self.remote.create_annotation(&self.project_id, payload).await {
            Ok(stored) => {
                let stored_id = stored.id.clone();
                let data = self.data.get_or_create(&image_id);
                if let Some(local) = data.annotation_mut(&temp_id) {
                    *local = stored;
                }
                if data.selected.as_deref() == Some(temp_id.as_str()) {
                    data.selected = Some(stored_id.clone());
                }
                log::debug!("Annotation {} persisted as {}", temp_id, stored_id);
                Ok(stored_id)
            }
            Err(err) => {
                log::error!("Create annotation on {} failed: {}", image_id, err);
                self.push_remote_failure("create_annotation", &err);
                Ok(temp_id)
            }
        }
    }

    /// Commit a finished handle drag, clipping the shape into the image.
    ///
    /// Editing reverts a confirmed annotation to draft.
    pub async fn resize_annotation(
        &mut self,
        annotation_id: &str,
        shape: BBox,
    ) -> Result<(), EngineError> {
        let record = self
            .project
            .current_image()
            .ok_or(EngineError::NoActiveImage)?;
        let image_id = record.id.clone();
        let image_size = record.size();

        let clipped = shape.clip_to(image_size);
        if clipped != shape {
            log::warn!("Resize of {} clipped to image bounds", annotation_id);
            self.events.push_back(EngineEvent::GeometryClipped {
                annotation_id: annotation_id.to_string(),
            });
        }

        let data = self.data.get_or_create(&image_id);
        let annotation = data
            .annotation_mut(annotation_id)
            .ok_or_else(|| EngineError::unknown_annotation(annotation_id))?;
        annotation.geometry = Some(clipped);
        annotation.unconfirm();
        let unsaved = annotation.has_temp_id();
        self.mark_image_dirty(&image_id);

        if unsaved {
            log::debug!(
                "Annotation {} not yet persisted, keeping local geometry",
                annotation_id
            );
            return Ok(());
        }
        let patch = UpdateAnnotation {
            geometry: Some(clipped),
            class_id: None,
            class_name: None,
            state: Some(AnnotationState::Draft),
        };
        if let Err(err) = self
            .remote
            .update_annotation(&self.project_id, annotation_id, patch)
            .await
        {
            log::error!("Update of {} failed: {}", annotation_id, err);
            self.push_remote_failure("update_annotation", &err);
        }
        Ok(())
    }

    /// Delete one annotation from the open image.
    pub async fn delete_annotation(&mut self, annotation_id: &str) -> Result<(), EngineError> {
        let record = self
            .project
            .current_image()
            .ok_or(EngineError::NoActiveImage)?;
        let image_id = record.id.clone();

        let data = self.data.get_or_create(&image_id);
        let removed = data
            .remove(annotation_id)
            .ok_or_else(|| EngineError::unknown_annotation(annotation_id))?;
        self.mark_image_dirty(&image_id);
        log::info!("Deleted annotation {} on {}", annotation_id, image_id);

        if removed.has_temp_id() {
            return Ok(());
        }
        if let Err(err) = self
            .remote
            .delete_annotation(&self.project_id, annotation_id)
            .await
        {
            log::error!("Delete of {} failed: {}", annotation_id, err);
            self.push_remote_failure("delete_annotation", &err);
        }
        Ok(())
    }

    /// Delete the selected annotation; no selection is a no-op.
    pub async fn delete_selected(&mut self) -> Result<(), EngineError> {
        let selected = self.current_data().and_then(|data| data.selected.clone());
        match selected {
            Some(id) => self.delete_annotation(&id).await,
            None => Ok(()),
        }
    }

    /// Re-class the selected annotation; no selection is a no-op.
    pub async fn assign_class(&mut self, class_id: ClassId) -> Result<(), EngineError> {
        let known = self
            .project
            .class_table()
            .is_some_and(|table| table.contains(class_id));
        if !known {
            return Err(EngineError::UnknownClass { id: class_id });
        }
        let class_name = self.class_name_of(Some(class_id));
        let image_id = self
            .project
            .current_image()
            .map(|image| image.id.clone())
            .ok_or(EngineError::NoActiveImage)?;
        let Some(selected) = self
            .data
            .get(&image_id)
            .and_then(|data| data.selected.clone())
        else {
            log::debug!("No selection, class assignment ignored");
            return Ok(());
        };

        let data = self.data.get_or_create(&image_id);
        let annotation = data
            .annotation_mut(&selected)
            .ok_or_else(|| EngineError::unknown_annotation(selected.as_str()))?;
        if annotation.annotation_type == AnnotationKind::NoObject {
            log::debug!("No-object markers carry no class, ignoring");
            return Ok(());
        }
        annotation.class_id = Some(class_id);
        annotation.class_name = class_name.clone();
        annotation.unconfirm();
        let unsaved = annotation.has_temp_id();
        self.mark_image_dirty(&image_id);

        if unsaved {
            return Ok(());
        }
        let patch = UpdateAnnotation {
            geometry: None,
            class_id: Some(class_id),
            class_name,
            state: Some(AnnotationState::Draft),
        };
        if let Err(err) = self
            .remote
            .update_annotation(&self.project_id, &selected, patch)
            .await
        {
            log::error!("Class change of {} failed: {}", selected, err);
            self.push_remote_failure("update_annotation", &err);
        }
        Ok(())
    }

    /// Toggle a classification label on the open image.
    ///
    /// Single-label tables replace the previous label; toggling the same
    /// class again removes it. Multi-label tables toggle each class
    /// independently.
    pub async fn toggle_class(&mut self, class_id: ClassId) -> Result<(), EngineError> {
        let Some(table) = self.project.class_tables.get(&TaskType::Classification) else {
            return Err(EngineError::UnknownClass { id: class_id });
        };
        if !table.contains(class_id) {
            return Err(EngineError::UnknownClass { id: class_id });
        }
        let mode = table.mode;
        let class_name = table.get(class_id).map(|class| class.name.clone());
        let image_id = self
            .project
            .current_image()
            .map(|image| image.id.clone())
            .ok_or(EngineError::NoActiveImage)?;

        let existing: Vec<(AnnotationId, Option<ClassId>)> = self
            .data
            .get_or_create(&image_id)
            .annotations
            .iter()
            .filter(|a| a.annotation_type == AnnotationKind::Classification)
            .map(|a| (a.id.clone(), a.class_id))
            .collect();
        let had_same = existing.iter().any(|(_, class)| *class == Some(class_id));

        let doomed: Vec<AnnotationId> = match mode {
            // Single label: any toggle clears what was there
            ClassificationMode::Single => existing.iter().map(|(id, _)| id.clone()).collect(),
            // Multi label: only the re-toggled class goes
            ClassificationMode::Multi => existing
                .iter()
                .filter(|(_, class)| *class == Some(class_id))
                .map(|(id, _)| id.clone())
                .collect(),
        };

        for id in &doomed {
            let removed = self.data.get_or_create(&image_id).remove(id);
            if removed.is_some_and(|a| !a.has_temp_id()) {
                if let Err(err) = self.remote.delete_annotation(&self.project_id, id).await {
                    log::error!("Delete of label {} failed: {}", id, err);
                    self.push_remote_failure("delete_annotation", &err);
                }
            }
        }

        if !had_same {
            let mut draft = Annotation::draft(
                image_id.clone(),
                AnnotationKind::Classification,
                None,
                Some(class_id),
                self.user_id.clone(),
            );
            draft.class_name = class_name;
            let temp_id = draft.id.clone();
            let payload = CreateAnnotation::from_draft(&draft);
            self.data.get_or_create(&image_id).annotations.push(draft);

            match self.remote.create_annotation(&self.project_id, payload).await {
                Ok(stored) => {
                    let data = self.data.get_or_create(&image_id);
                    if let Some(local) = data.annotation_mut(&temp_id) {
                        *local = stored;
                    }
                }
                Err(err) => {
                    log::error!("Create label on {} failed: {}", image_id, err);
                    self.push_remote_failure("create_annotation", &err);
                }
            }
        }

        self.mark_image_dirty(&image_id);
        log::debug!("Toggled class {} on {}", class_id, image_id);
        Ok(())
    }

    // ---- lifecycle ----

    /// Confirm the open image's annotation set for the active task, then
    /// advance to the next unfinished image.
    ///
    /// The local confirm is applied optimistically; on a collaborator
    /// failure it is retained, the failure is queued as an event, and no
    /// advance happens.
    pub async fn confirm_current(&mut self) -> Result<(), EngineError> {
        let image_id = self
            .project
            .current_image()
            .map(|image| image.id.clone())
            .ok_or(EngineError::NoActiveImage)?;
        let task = self.project.active_task;
        let now = Utc::now();

        let data = self.data.get_or_create(&image_id);
        let confirmed = lifecycle::confirm_task(&mut data.annotations, task, &self.user_id, now);
        if let Some(record) = self.project.image_mut(&image_id) {
            record.is_confirmed = true;
        }
        self.dirty = true;
        log::info!("Confirmed {} annotations on {}", confirmed, image_id);

        match self
            .remote
            .confirm_image(&self.project_id, &image_id, task, &self.user_id)
            .await
        {
            Ok(_receipt) => {
                if self.config.advance_on_confirm {
                    let next = self.advance_target();
                    if next != self.project.current_index {
                        self.goto_image(next).await;
                    }
                }
                Ok(())
            }
            Err(err) => {
                log::error!("Confirm of {} failed: {}", image_id, err);
                self.push_remote_failure("confirm_image", &err);
                Ok(())
            }
        }
    }

    /// Revert the open image's annotation set to drafts for the active
    /// task.
    pub async fn unconfirm_current(&mut self) -> Result<(), EngineError> {
        let image_id = self
            .project
            .current_image()
            .map(|image| image.id.clone())
            .ok_or(EngineError::NoActiveImage)?;
        let task = self.project.active_task;

        let data = self.data.get_or_create(&image_id);
        let reverted = lifecycle::unconfirm_task(&mut data.annotations, task);
        self.mark_image_dirty(&image_id);
        log::info!("Reverted {} annotations on {} to draft", reverted, image_id);

        if let Err(err) = self
            .remote
            .unconfirm_image(&self.project_id, &image_id, task)
            .await
        {
            log::error!("Unconfirm of {} failed: {}", image_id, err);
            self.push_remote_failure("unconfirm_image", &err);
        }
        Ok(())
    }

    // ---- navigation and editing session ----

    /// Open the image at `index`, releasing the old edit lock and
    /// acquiring the new one. Out-of-range indices are ignored.
    pub async fn goto_image(&mut self, index: usize) {
        if index >= self.project.images.len() {
            log::warn!("Image index {} out of range", index);
            return;
        }
        self.end_editing().await;
        self.registry.cancel_all();
        self.project.current_index = index;
        self.viewport = self.viewport.reset();
        self.dirty = true;
        log::info!(
            "Switched to image {} ({})",
            self.project.current_name(),
            self.project.progress()
        );
        self.begin_editing().await;
    }

    pub async fn next_image(&mut self) {
        let index = self.project.next();
        self.goto_image(index).await;
    }

    pub async fn prev_image(&mut self) {
        let index = self.project.prev();
        self.goto_image(index).await;
    }

    /// Acquire the open image's edit lock and start its heartbeat.
    ///
    /// A lock held by someone else queues an advisory event; editing
    /// proceeds unlocked either way.
    pub async fn begin_editing(&mut self) {
        let Some(image) = self.project.current_image() else {
            return;
        };
        let image_id = image.id.clone();
        if self.session.as_ref().is_some_and(|s| s.image_id() == image_id) {
            return;
        }
        self.end_editing().await;

        match EditSession::begin(
            Arc::clone(&self.remote),
            &self.project_id,
            &image_id,
            &self.user_id,
            self.config.lock.heartbeat_interval(),
        )
        .await
        {
            Ok(session) => {
                if let Some(holder) = session.acquisition().conflicting_holder() {
                    log::warn!("Image {} is being edited by {}", image_id, holder);
                    self.events.push_back(EngineEvent::LockConflict {
                        image_id: image_id.clone(),
                        holder: holder.to_string(),
                    });
                }
                self.session = Some(session);
            }
            Err(err) => {
                log::error!("Lock acquisition for {} failed: {}", image_id, err);
                self.push_remote_failure("acquire_lock", &err);
                self.session = None;
            }
        }
    }

    /// Stop the heartbeat and release the lock when held.
    pub async fn end_editing(&mut self) {
        if let Some(session) = self.session.take() {
            let image_id = session.image_id().to_string();
            if let Err(err) = session.leave().await {
                log::warn!("Lock release for {} failed: {}", image_id, err);
            }
        }
    }

    // ---- multi-selection and batches ----

    pub fn toggle_image_selection(&mut self, image_id: &str) {
        if !self.multi_selection.remove(image_id) {
            self.multi_selection.insert(image_id.to_string());
        }
        self.dirty = true;
    }

    pub fn clear_image_selection(&mut self) {
        self.multi_selection.clear();
        self.dirty = true;
    }

    pub fn selected_images(&self) -> &HashSet<ImageId> {
        &self.multi_selection
    }

    /// Resolve a batch action into a plan the host confirms with the
    /// operator before running.
    pub fn plan_batch(&self, action: BatchAction) -> Result<BatchPlan, EngineError> {
        if let BatchAction::AssignClass(class_id) = action {
            let known = self
                .project
                .class_table()
                .is_some_and(|table| table.contains(class_id));
            if !known {
                return Err(EngineError::UnknownClass { id: class_id });
            }
        }
        Ok(BatchPlan::new(action, self.batch_targets()?))
    }

    fn batch_targets(&self) -> Result<Vec<ImageId>, EngineError> {
        if self.multi_selection.is_empty() {
            let current = self
                .project
                .current_image()
                .ok_or(EngineError::NoActiveImage)?;
            return Ok(vec![current.id.clone()]);
        }
        // Project order keeps batch progress deterministic
        Ok(self
            .project
            .images
            .iter()
            .filter(|image| self.multi_selection.contains(&image.id))
            .map(|image| image.id.clone())
            .collect())
    }

    /// Run a planned batch sequentially, one image at a time.
    ///
    /// Progress is queued after every attempted image. The first failure
    /// aborts the rest: applied images stay applied, the report goes out
    /// as a [`EngineEvent::BatchFinished`] event, and the error names the
    /// failing image. Batch items apply locally only after the
    /// collaborator accepted them, so a failed image is left untouched.
    pub async fn run_batch(&mut self, plan: BatchPlan) -> Result<BatchReport, EngineError> {
        let task = self.project.active_task;
        let total = plan.targets.len();
        let mut report = BatchReport::new(plan.action);
        log::info!("Batch start: {}", plan.describe());

        for (index, image_id) in plan.targets.iter().enumerate() {
            let outcome = self.apply_batch_item(plan.action, task, image_id).await;
            self.events.push_back(EngineEvent::BatchProgress {
                current: index + 1,
                total,
            });
            match outcome {
                Ok(()) => report.record_success(image_id.clone()),
                Err(err) => {
                    report.record_failure(
                        image_id.clone(),
                        err.to_string(),
                        &plan.targets[index + 1..],
                    );
                    self.dirty = true;
                    let completed = report.completed.len();
                    log::warn!("{}", report.summary());
                    self.events.push_back(EngineEvent::BatchFinished(report));
                    return Err(EngineError::BatchAborted {
                        image_id: image_id.clone(),
                        completed,
                        total,
                        source: err,
                    });
                }
            }
        }

        self.multi_selection.clear();
        self.dirty = true;
        log::info!("{}", report.summary());
        self.events
            .push_back(EngineEvent::BatchFinished(report.clone()));
        Ok(report)
    }

    async fn apply_batch_item(
        &mut self,
        action: BatchAction,
        task: TaskType,
        image_id: &str,
    ) -> Result<(), RemoteError> {
        match action {
            BatchAction::Confirm => {
                let receipt = self
                    .remote
                    .confirm_image(&self.project_id, image_id, task, &self.user_id)
                    .await?;
                let stamp = receipt.confirmed_at.unwrap_or_else(Utc::now);
                if let Some(data) = self.data.get_mut(image_id) {
                    lifecycle::confirm_task(&mut data.annotations, task, &self.user_id, stamp);
                }
                if let Some(record) = self.project.image_mut(image_id) {
                    record.is_confirmed = receipt.is_confirmed;
                }
            }
            BatchAction::MarkNoObject => {
                for id in self.stored_task_annotation_ids(image_id, task, false) {
                    self.remote.delete_annotation(&self.project_id, &id).await?;
                }
                let mut attributes = HashMap::new();
                attributes.insert(TASK_ATTRIBUTE.to_string(), task.as_str().to_string());
                let payload = CreateAnnotation {
                    image_id: image_id.to_string(),
                    annotation_type: AnnotationKind::NoObject,
                    geometry: None,
                    class_id: None,
                    class_name: None,
                    created_by: self.user_id.clone(),
                    attributes,
                };
                let marker = self.remote.create_annotation(&self.project_id, payload).await?;

                let data = self.data.get_or_create(image_id);
                data.remove_task(task);
                data.annotations.push(marker);
                if let Some(record) = self.project.image_mut(image_id) {
                    record.is_confirmed = false;
                }
            }
            BatchAction::DeleteAll => {
                for id in self.stored_task_annotation_ids(image_id, task, false) {
                    self.remote.delete_annotation(&self.project_id, &id).await?;
                }
                if let Some(data) = self.data.get_mut(image_id) {
                    data.remove_task(task);
                }
                if let Some(record) = self.project.image_mut(image_id) {
                    record.is_confirmed = false;
                }
            }
            BatchAction::AssignClass(class_id) => {
                let class_name = self
                    .project
                    .class_tables
                    .get(&task)
                    .and_then(|table| table.get(class_id))
                    .map(|class| class.name.clone());
                for id in self.stored_task_annotation_ids(image_id, task, true) {
                    let patch = UpdateAnnotation {
                        geometry: None,
                        class_id: Some(class_id),
                        class_name: class_name.clone(),
                        state: Some(AnnotationState::Draft),
                    };
                    self.remote
                        .update_annotation(&self.project_id, &id, patch)
                        .await?;
                }
                if let Some(data) = self.data.get_mut(image_id) {
                    for annotation in &mut data.annotations {
                        if annotation.task() == Some(task)
                            && annotation.annotation_type != AnnotationKind::NoObject
                        {
                            annotation.class_id = Some(class_id);
                            annotation.class_name = class_name.clone();
                            annotation.unconfirm();
                        }
                    }
                }
                if let Some(record) = self.project.image_mut(image_id) {
                    record.is_confirmed = false;
                }
            }
        }
        Ok(())
    }

    // ---- internals ----

    /// Display name for a class in the active task's table.
    fn class_name_of(&self, class_id: Option<ClassId>) -> Option<String> {
        let table = self.project.class_table()?;
        class_id
            .and_then(|id| table.get(id))
            .map(|class| class.name.clone())
    }

    /// Server-side ids of an image's annotations for one task. Markers
    /// are skipped when `classed_only` because they carry no class to
    /// patch.
    fn stored_task_annotation_ids(
        &self,
        image_id: &str,
        task: TaskType,
        classed_only: bool,
    ) -> Vec<AnnotationId> {
        self.data
            .get(image_id)
            .map(|data| {
                data.of_task(task)
                    .filter(|a| !a.has_temp_id())
                    .filter(|a| !classed_only || a.annotation_type != AnnotationKind::NoObject)
                    .map(|a| a.id.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Where confirming the current image should land the selection.
    fn advance_target(&self) -> usize {
        let statuses: Vec<ImageStatus> = self
            .project
            .images
            .iter()
            .map(|image| self.status_of(&image.id))
            .collect();
        lifecycle::advance_after_confirm(&statuses, self.project.current_index)
    }

    /// An edit happened on the image: clear its confirmed mirror flag and
    /// mark the scene for redraw.
    fn mark_image_dirty(&mut self, image_id: &str) {
        if let Some(record) = self.project.image_mut(image_id) {
            record.is_confirmed = false;
        }
        self.dirty = true;
    }

    fn push_remote_failure(&mut self, operation: &str, err: &RemoteError) {
        self.events.push_back(EngineEvent::RemoteFailure {
            operation: operation.to_string(),
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ClassInfo;
    use crate::remote::MemoryRemote;

    fn class_table() -> ClassTable {
        ClassTable::new(
            vec![ClassInfo::new(0, "car", 0), ClassInfo::new(1, "truck", 1)],
            ClassificationMode::Single,
        )
    }

    fn workstation(image_count: usize) -> (Workstation, Arc<MemoryRemote>) {
        let remote = Arc::new(MemoryRemote::new());
        let mut ws = Workstation::new(EngineConfig::new(), remote.clone(), "p1", "alice");
        let images = (0..image_count)
            .map(|n| ImageRecord::new(format!("i{}", n + 1), format!("img_{n}.jpg"), 400, 300))
            .collect();
        let mut tables = BTreeMap::new();
        tables.insert(TaskType::Detection, class_table());
        tables.insert(TaskType::Classification, class_table());
        ws.load_project(images, tables);
        (ws, remote)
    }

    #[test]
    fn test_plan_batch_falls_back_to_current_image() {
        let (ws, _remote) = workstation(3);
        let plan = ws.plan_batch(BatchAction::DeleteAll).unwrap();
        assert_eq!(plan.targets, vec!["i1"]);
    }

    #[test]
    fn test_plan_batch_keeps_project_order() {
        let (mut ws, _remote) = workstation(3);
        ws.toggle_image_selection("i3");
        ws.toggle_image_selection("i1");

        let plan = ws.plan_batch(BatchAction::Confirm).unwrap();
        assert_eq!(plan.targets, vec!["i1", "i3"]);
    }

    #[test]
    fn test_plan_batch_rejects_unknown_class() {
        let (ws, _remote) = workstation(1);
        let err = ws.plan_batch(BatchAction::AssignClass(99)).unwrap_err();
        assert!(matches!(err, EngineError::UnknownClass { id: 99 }));
    }

    #[test]
    fn test_task_switch_falls_back_to_select_tool() {
        let (mut ws, _remote) = workstation(1);
        ws.set_active_tool(ToolKind::Bbox);
        assert_eq!(ws.active_tool(), ToolKind::Bbox);

        ws.set_active_task(TaskType::Classification);
        assert_eq!(ws.active_tool(), ToolKind::Select);

        // The box tool is not offered under classification
        ws.set_active_tool(ToolKind::Bbox);
        assert_eq!(ws.active_tool(), ToolKind::Select);
    }

    #[test]
    fn test_zoom_stays_clamped() {
        let (mut ws, _remote) = workstation(1);
        for _ in 0..100 {
            ws.zoom_out();
        }
        assert_eq!(ws.viewport().zoom, ws.config().zoom.min);

        for _ in 0..100 {
            ws.zoom_in();
        }
        assert_eq!(ws.viewport().zoom, ws.config().zoom.max);
    }

    #[test]
    fn test_class_visibility_toggles() {
        let (mut ws, _remote) = workstation(1);
        assert!(!ws.is_class_hidden(1));
        ws.toggle_class_visibility(1);
        assert!(ws.is_class_hidden(1));
        ws.toggle_class_visibility(1);
        assert!(!ws.is_class_hidden(1));
    }

    #[tokio::test]
    async fn test_create_clips_and_persists() {
        let (mut ws, remote) = workstation(1);

        let id = ws
            .create_annotation(BBox::new(390.0, 280.0, 30.0, 40.0), Some(0))
            .await
            .unwrap();

        assert_eq!(id, "ann-1");
        let events = ws.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::GeometryClipped { .. })));

        let stored = remote.list_annotations("p1", Some("i1")).await.unwrap();
        assert_eq!(stored[0].geometry, Some(BBox::new(390.0, 280.0, 10.0, 20.0)));
        assert_eq!(stored[0].class_name.as_deref(), Some("car"));
        assert_eq!(ws.current_annotations()[0].id, "ann-1");
        assert!(!ws.project().images[0].is_confirmed);
    }

    #[tokio::test]
    async fn test_create_rejects_degenerate_after_clip() {
        let (mut ws, remote) = workstation(1);

        let err = ws
            .create_annotation(BBox::new(-150.0, -100.0, 100.0, 70.0), Some(0))
            .await
            .unwrap_err();

        assert!(matches!(err, EngineError::DegenerateGeometry { .. }));
        assert!(ws.current_annotations().is_empty());
        assert!(remote.list_annotations("p1", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_failure_keeps_optimistic_draft() {
        let (mut ws, remote) = workstation(1);
        remote.fail_on("create_annotation", "i1");

        let id = ws
            .create_annotation(BBox::new(10.0, 10.0, 50.0, 50.0), Some(0))
            .await
            .unwrap();

        assert!(id.starts_with(crate::model::TEMP_ID_PREFIX));
        assert_eq!(ws.current_annotations().len(), 1);
        let events = ws.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::RemoteFailure { operation, .. } if operation == "create_annotation")));
    }

    #[tokio::test]
    async fn test_assign_class_requires_known_class() {
        let (mut ws, _remote) = workstation(1);
        let err = ws.assign_class(99).await.unwrap_err();
        assert!(matches!(err, EngineError::UnknownClass { id: 99 }));
    }

    #[tokio::test]
    async fn test_reorder_keeps_optimistic_order_on_remote_failure() {
        let (mut ws, remote) = workstation(1);
        remote.fail_on("save_class_order", "detection");

        ws.reorder_classes(&[1, 0]).await.unwrap();

        let ids: Vec<ClassId> = ws
            .project()
            .class_table()
            .unwrap()
            .classes
            .iter()
            .map(|c| c.id)
            .collect();
        assert_eq!(ids, vec![1, 0]);
        let events = ws.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, EngineEvent::RemoteFailure { operation, .. } if operation == "save_class_order")));
    }

    #[tokio::test]
    async fn test_other_locks_skips_own_session() {
        let (ws, remote) = workstation(2);
        remote.seed_lock("i1", "alice", Utc::now());
        remote.seed_lock("i2", "bob", Utc::now());

        let locks = ws.other_locks().await.unwrap();
        assert_eq!(locks.len(), 1);
        assert_eq!(locks[0].image_id, "i2");
        assert_eq!(locks[0].locked_by, "bob");
    }

    #[tokio::test]
    async fn test_multi_mode_labels_accumulate() {
        let remote = Arc::new(MemoryRemote::new());
        let mut ws = Workstation::new(EngineConfig::new(), remote, "p1", "alice");
        let mut tables = BTreeMap::new();
        tables.insert(
            TaskType::Classification,
            ClassTable::new(
                vec![ClassInfo::new(0, "car", 0), ClassInfo::new(1, "truck", 1)],
                ClassificationMode::Multi,
            ),
        );
        ws.load_project(vec![ImageRecord::new("i1", "a.jpg", 400, 300)], tables);
        ws.set_active_task(TaskType::Classification);

        ws.toggle_class(0).await.unwrap();
        ws.toggle_class(1).await.unwrap();
        assert_eq!(ws.current_annotations().len(), 2);

        // Re-toggling removes only that label
        ws.toggle_class(0).await.unwrap();
        let remaining = ws.current_annotations();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].class_id, Some(1));
    }
}
