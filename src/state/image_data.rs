//! Per-image working data: annotations plus selection state.

use std::collections::HashMap;

use crate::model::{Annotation, AnnotationId, ImageId, TaskType};

/// Data the engine keeps for one image.
#[derive(Clone, Debug, Default)]
pub struct ImageData {
    /// Annotations on this image, all tasks mixed
    pub annotations: Vec<Annotation>,
    /// Currently selected annotation, if any
    pub selected: Option<AnnotationId>,
    /// Position of the last click in the overlap-cycling order
    pub last_clicked: Option<usize>,
}

impl ImageData {
    pub fn annotation(&self, id: &str) -> Option<&Annotation> {
        self.annotations.iter().find(|a| a.id == id)
    }

    pub fn annotation_mut(&mut self, id: &str) -> Option<&mut Annotation> {
        self.annotations.iter_mut().find(|a| a.id == id)
    }

    pub fn selected_annotation(&self) -> Option<&Annotation> {
        self.selected.as_deref().and_then(|id| self.annotation(id))
    }

    /// Change the selection, resetting the overlap-cycling position.
    pub fn select(&mut self, id: Option<AnnotationId>) {
        if self.selected != id {
            self.last_clicked = None;
        }
        self.selected = id;
    }

    /// Remove an annotation, clearing the selection if it pointed there.
    pub fn remove(&mut self, id: &str) -> Option<Annotation> {
        let index = self.annotations.iter().position(|a| a.id == id)?;
        if self.selected.as_deref() == Some(id) {
            self.selected = None;
            self.last_clicked = None;
        }
        Some(self.annotations.remove(index))
    }

    /// Annotations belonging to one task, in insertion order.
    pub fn of_task(&self, task: TaskType) -> impl Iterator<Item = &Annotation> {
        self.annotations
            .iter()
            .filter(move |a| a.task() == Some(task))
    }

    /// Remove every annotation of one task, returning how many went.
    /// Selection and cycling state are cleared if they pointed into the
    /// removed set.
    pub fn remove_task(&mut self, task: TaskType) -> usize {
        let before = self.annotations.len();
        self.annotations.retain(|a| a.task() != Some(task));
        let removed = before - self.annotations.len();
        if removed > 0 {
            self.last_clicked = None;
            if self
                .selected
                .as_deref()
                .is_some_and(|id| self.annotation(id).is_none())
            {
                self.selected = None;
            }
        }
        removed
    }
}

/// Storage for per-image data, keyed by image id.
#[derive(Clone, Debug, Default)]
pub struct ImageDataStore {
    data: HashMap<ImageId, ImageData>,
}

impl ImageDataStore {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Get data for an image, creating default if not exists.
    pub fn get_or_create(&mut self, id: &str) -> &mut ImageData {
        self.data.entry(id.to_string()).or_default()
    }

    pub fn get(&self, id: &str) -> Option<&ImageData> {
        self.data.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut ImageData> {
        self.data.get_mut(id)
    }

    /// Replace every image's annotation list from a collaborator fetch.
    /// Selection state is dropped along with the old lists.
    pub fn replace_all(&mut self, annotations: Vec<Annotation>) {
        self.data.clear();
        for annotation in annotations {
            let image_id = annotation.image_id.clone();
            self.get_or_create(&image_id).annotations.push(annotation);
        }
    }
}
