//! Data models for the annotation engine.

mod annotation;
mod image;
mod lock;
mod task;

pub use annotation::{
    Annotation, AnnotationId, AnnotationKind, AnnotationState, BBox, HandleId, TASK_ATTRIBUTE,
    TEMP_ID_PREFIX, temp_id,
};
pub use image::{ImageId, ImageRecord, ImageStatus};
pub use lock::{ImageLock, LockAcquisition};
pub use task::{ClassId, ClassInfo, ClassTable, ClassificationMode, TaskType, class_color};
