//! Image records and per-image annotation status.

use serde::{Deserialize, Serialize};

use crate::transform::ImageSize;

/// Unique identifier for an image, assigned by the collaborator.
pub type ImageId = String;

/// A project image as listed by the collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageRecord {
    /// Unique identifier
    pub id: ImageId,

    /// Display/file name
    #[serde(alias = "fileName")]
    pub file_name: String,

    /// Source location of the pixel data, for the host's loader
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Pixel width
    pub width: u32,

    /// Pixel height
    pub height: u32,

    /// Whether the image's annotation set has been confirmed as a whole
    #[serde(default, alias = "isConfirmed")]
    pub is_confirmed: bool,
}

impl ImageRecord {
    /// Create a new image record.
    pub fn new(id: impl Into<ImageId>, file_name: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            id: id.into(),
            file_name: file_name.into(),
            url: None,
            width,
            height,
            is_confirmed: false,
        }
    }

    /// Pixel dimensions as an [`ImageSize`] for coordinate math.
    pub fn size(&self) -> ImageSize {
        ImageSize::from((self.width, self.height))
    }
}

/// Derived annotation status of an image for one task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    /// No annotations for the task
    NotStarted,
    /// At least one draft annotation
    InProgress,
    /// One or more annotations, all confirmed
    Completed,
}

impl ImageStatus {
    /// Get the display name for this status.
    pub fn name(&self) -> &'static str {
        match self {
            ImageStatus::NotStarted => "Not Started",
            ImageStatus::InProgress => "In Progress",
            ImageStatus::Completed => "Completed",
        }
    }
}
