//! Project state: the image sequence and per-task class tables.

use std::collections::BTreeMap;

use crate::lifecycle;
use crate::model::{ClassTable, ImageRecord, TaskType};

/// The project a workstation session is working through.
#[derive(Clone, Debug)]
pub struct ProjectState {
    /// Images in working order
    pub images: Vec<ImageRecord>,
    /// Current image index
    pub current_index: usize,
    /// Class table per declared task
    pub class_tables: BTreeMap<TaskType, ClassTable>,
    /// Task whose annotations and tools are active
    pub active_task: TaskType,
}

impl Default for ProjectState {
    fn default() -> Self {
        Self {
            images: Vec::new(),
            current_index: 0,
            class_tables: BTreeMap::new(),
            active_task: TaskType::Detection,
        }
    }
}

impl ProjectState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the current image record.
    pub fn current_image(&self) -> Option<&ImageRecord> {
        self.images.get(self.current_index)
    }

    pub fn current_image_mut(&mut self) -> Option<&mut ImageRecord> {
        self.images.get_mut(self.current_index)
    }

    /// Get the current image filename for display.
    pub fn current_name(&self) -> String {
        self.current_image()
            .map(|image| image.file_name.clone())
            .unwrap_or_else(|| "Unknown".to_string())
    }

    pub fn image(&self, id: &str) -> Option<&ImageRecord> {
        self.images.iter().find(|image| image.id == id)
    }

    pub fn image_mut(&mut self, id: &str) -> Option<&mut ImageRecord> {
        self.images.iter_mut().find(|image| image.id == id)
    }

    /// Index of the next image, wrapping around.
    pub fn next(&self) -> usize {
        lifecycle::next_index(self.images.len(), self.current_index)
    }

    /// Index of the previous image, wrapping around.
    pub fn prev(&self) -> usize {
        lifecycle::prev_index(self.images.len(), self.current_index)
    }

    /// Class table of the active task, if the project declares one.
    pub fn class_table(&self) -> Option<&ClassTable> {
        self.class_tables.get(&self.active_task)
    }

    pub fn class_table_mut(&mut self) -> Option<&mut ClassTable> {
        self.class_tables.get_mut(&self.active_task)
    }

    /// Get progress string like "3/15".
    pub fn progress(&self) -> String {
        format!("{}/{}", self.current_index + 1, self.images.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn project_with(count: usize) -> ProjectState {
        let mut project = ProjectState::new();
        project.images = (0..count)
            .map(|n| ImageRecord::new(format!("i{n}"), format!("img_{n}.jpg"), 400, 300))
            .collect();
        project
    }

    #[test]
    fn test_navigation_wraps_both_ways() {
        let mut project = project_with(3);
        assert_eq!(project.next(), 1);
        project.current_index = 2;
        assert_eq!(project.next(), 0);
        project.current_index = 0;
        assert_eq!(project.prev(), 2);
    }

    #[test]
    fn test_progress_string() {
        let mut project = project_with(15);
        project.current_index = 2;
        assert_eq!(project.progress(), "3/15");
        assert_eq!(project.current_name(), "img_2.jpg");
    }
}
