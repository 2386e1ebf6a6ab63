//! Task types and ordered class tables.

use serde::{Deserialize, Serialize};

use crate::constants::color;
use crate::error::EngineError;

/// Unique identifier for a class within a task's class table.
pub type ClassId = u32;

/// Annotation task types a project can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Object detection with box geometry
    Detection,
    /// Image-level classification labels
    Classification,
    /// Region segmentation
    Segmentation,
}

impl TaskType {
    /// Get the display name for this task.
    pub fn name(&self) -> &'static str {
        match self {
            TaskType::Detection => "Detection",
            TaskType::Classification => "Classification",
            TaskType::Segmentation => "Segmentation",
        }
    }

    /// Wire name for this task, as carried in annotation attributes.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskType::Detection => "detection",
            TaskType::Classification => "classification",
            TaskType::Segmentation => "segmentation",
        }
    }

    /// Parse a wire name back into a task type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "detection" => Some(TaskType::Detection),
            "classification" => Some(TaskType::Classification),
            "segmentation" => Some(TaskType::Segmentation),
            _ => None,
        }
    }

    /// Get all task types.
    pub fn all() -> &'static [TaskType] {
        &[
            TaskType::Detection,
            TaskType::Classification,
            TaskType::Segmentation,
        ]
    }
}

/// Label cardinality for a classification task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationMode {
    /// Exactly one label at a time; toggling a class replaces the previous one
    #[default]
    Single,
    /// Any number of labels; classes toggle independently
    Multi,
}

/// A class definition with display order and color.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassInfo {
    /// Unique identifier within the task
    pub id: ClassId,
    /// Display name
    pub name: String,
    /// Position in the ordered class list
    pub order: u32,
    /// RGB color for overlays
    #[serde(default = "default_class_color")]
    pub color: [u8; 3],
}

fn default_class_color() -> [u8; 3] {
    [178, 178, 178]
}

impl ClassInfo {
    /// Create a new class with a generated color.
    pub fn new(id: ClassId, name: &str, order: u32) -> Self {
        Self {
            id,
            name: name.to_string(),
            order,
            color: class_color(id),
        }
    }
}

/// Generate a distinct color for a class id using the golden angle.
pub fn class_color(id: ClassId) -> [u8; 3] {
    let hue = (id as f32 * color::GOLDEN_ANGLE) % 360.0;
    let (r, g, b) = hsv_to_rgb(hue, color::SATURATION, color::VALUE);
    [(r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8]
}

/// Convert HSV (hue in degrees, s/v in 0..1) to RGB in 0..1.
fn hsv_to_rgb(h: f32, s: f32, v: f32) -> (f32, f32, f32) {
    let c = v * s;
    let x = c * (1.0 - ((h / 60.0) % 2.0 - 1.0).abs());
    let m = v - c;

    let (r, g, b) = if h < 60.0 {
        (c, x, 0.0)
    } else if h < 120.0 {
        (x, c, 0.0)
    } else if h < 180.0 {
        (0.0, c, x)
    } else if h < 240.0 {
        (0.0, x, c)
    } else if h < 300.0 {
        (x, 0.0, c)
    } else {
        (c, 0.0, x)
    };

    (r + m, g + m, b + m)
}

/// The ordered class table for one task.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassTable {
    /// Classes sorted by their `order` field
    pub classes: Vec<ClassInfo>,
    /// Label cardinality; only meaningful for classification tasks
    #[serde(default)]
    pub mode: ClassificationMode,
}

impl ClassTable {
    /// Create a table from classes, sorting them by display order.
    pub fn new(mut classes: Vec<ClassInfo>, mode: ClassificationMode) -> Self {
        classes.sort_by_key(|c| c.order);
        Self { classes, mode }
    }

    /// Look up a class by id.
    pub fn get(&self, id: ClassId) -> Option<&ClassInfo> {
        self.classes.iter().find(|c| c.id == id)
    }

    /// Check whether a class id is defined in the table.
    pub fn contains(&self, id: ClassId) -> bool {
        self.get(id).is_some()
    }

    /// Color for a class id, defaulting to gray for unknown ids.
    pub fn color_of(&self, id: ClassId) -> [u8; 3] {
        self.get(id).map(|c| c.color).unwrap_or_else(default_class_color)
    }

    /// Apply a new display order.
    ///
    /// The request must be a permutation of the known class ids; anything
    /// else (missing, extra, duplicate ids) is rejected without changes.
    pub fn reorder(&mut self, ordered: &[ClassId]) -> Result<(), EngineError> {
        if ordered.len() != self.classes.len() {
            return Err(EngineError::ClassReorderMismatch {
                expected: self.classes.len(),
                got: ordered.len(),
            });
        }

        let mut seen = Vec::with_capacity(ordered.len());
        for id in ordered {
            if !self.contains(*id) || seen.contains(id) {
                return Err(EngineError::ClassReorderMismatch {
                    expected: self.classes.len(),
                    got: ordered.len(),
                });
            }
            seen.push(*id);
        }

        for class in &mut self.classes {
            // Position in the request becomes the new order
            let position = ordered.iter().position(|id| *id == class.id);
            if let Some(position) = position {
                class.order = position as u32;
            }
        }
        self.classes.sort_by_key(|c| c.order);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ClassTable {
        ClassTable::new(
            vec![
                ClassInfo::new(1, "car", 0),
                ClassInfo::new(2, "truck", 1),
                ClassInfo::new(3, "bike", 2),
            ],
            ClassificationMode::Single,
        )
    }

    #[test]
    fn test_class_colors_are_distinct() {
        let a = class_color(1);
        let b = class_color(2);
        let c = class_color(3);
        assert_ne!(a, b);
        assert_ne!(b, c);
        assert_ne!(a, c);
    }

    #[test]
    fn test_reorder_permutation() {
        let mut t = table();
        t.reorder(&[3, 1, 2]).unwrap();

        let ids: Vec<ClassId> = t.classes.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);
        assert_eq!(t.get(3).unwrap().order, 0);
        assert_eq!(t.get(2).unwrap().order, 2);
    }

    #[test]
    fn test_reorder_rejects_wrong_length() {
        let mut t = table();
        let err = t.reorder(&[1, 2]).unwrap_err();
        assert!(matches!(
            err,
            EngineError::ClassReorderMismatch {
                expected: 3,
                got: 2
            }
        ));
    }

    #[test]
    fn test_reorder_rejects_unknown_and_duplicate_ids() {
        let mut t = table();
        assert!(t.reorder(&[1, 2, 99]).is_err());
        assert!(t.reorder(&[1, 2, 2]).is_err());

        // Failed reorders leave the table untouched
        let ids: Vec<ClassId> = t.classes.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_task_type_wire_names() {
        assert_eq!(TaskType::Detection.as_str(), "detection");
        assert_eq!(TaskType::parse("segmentation"), Some(TaskType::Segmentation));
        assert_eq!(TaskType::parse("bogus"), None);
    }
}
