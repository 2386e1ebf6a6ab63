//! Annotation data structures and box geometry.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

use crate::model::image::ImageId;
use crate::model::task::{ClassId, TaskType};
use crate::transform::{ImagePoint, ImageSize};

/// Unique identifier for an annotation.
///
/// Server-assigned for persisted annotations; optimistic drafts carry a
/// temporary id until the collaborator echoes the real one back.
pub type AnnotationId = String;

/// Prefix marking ids minted locally before the collaborator has answered.
pub const TEMP_ID_PREFIX: &str = "tmp-";

/// Mint a temporary id for an optimistic draft.
pub fn temp_id() -> AnnotationId {
    format!("{}{}", TEMP_ID_PREFIX, Uuid::new_v4())
}

/// An axis-aligned box in image-space pixels.
///
/// Serialized as a `[x, y, width, height]` array to match the collaborator's
/// geometry payload.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BBox {
    /// Create a box from position and size.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a normalized box from two corner points in any order.
    pub fn from_corners(a: ImagePoint, b: ImagePoint) -> Self {
        Self {
            x: a.x.min(b.x),
            y: a.y.min(b.y),
            width: (b.x - a.x).abs(),
            height: (b.y - a.y).abs(),
        }
    }

    /// Right edge X coordinate.
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    /// Bottom edge Y coordinate.
    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Center of the box.
    pub fn center(&self) -> ImagePoint {
        ImagePoint::new(self.x + self.width / 2.0, self.y + self.height / 2.0)
    }

    /// Check if a point lies inside the box (edges inclusive).
    pub fn contains(&self, p: ImagePoint) -> bool {
        p.x >= self.x && p.x <= self.right() && p.y >= self.y && p.y <= self.bottom()
    }

    /// Check whether both sides meet a minimum size.
    pub fn meets_min_size(&self, min: f32) -> bool {
        self.width >= min && self.height >= min
    }

    /// Clip the box into the image bounds.
    ///
    /// A box entirely outside the image collapses to a zero-sized sliver on
    /// the nearest edge.
    pub fn clip_to(&self, image: ImageSize) -> Self {
        let x = self.x.clamp(0.0, image.width);
        let y = self.y.clamp(0.0, image.height);
        let right = self.right().clamp(0.0, image.width);
        let bottom = self.bottom().clamp(0.0, image.height);
        Self {
            x,
            y,
            width: (right - x).max(0.0),
            height: (bottom - y).max(0.0),
        }
    }

    /// Check the box lies fully inside the image bounds.
    pub fn is_within(&self, image: ImageSize) -> bool {
        self.x >= 0.0
            && self.y >= 0.0
            && self.right() <= image.width
            && self.bottom() <= image.height
    }
}

impl Serialize for BBox {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        [self.x, self.y, self.width, self.height].serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for BBox {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let coords = <[f32; 4]>::deserialize(deserializer)?;
        if coords[2] < 0.0 || coords[3] < 0.0 {
            return Err(D::Error::custom("bbox width/height must be non-negative"));
        }
        Ok(Self::new(coords[0], coords[1], coords[2], coords[3]))
    }
}

/// Resize handles around a selected box.
///
/// Corner handles move two edges; edge handles move one. The opposite
/// corner or edge stays fixed during the drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleId {
    TopLeft,
    Top,
    TopRight,
    Right,
    BottomRight,
    Bottom,
    BottomLeft,
    Left,
}

impl HandleId {
    /// All handles in clockwise order starting from the top-left corner.
    pub fn all() -> &'static [HandleId] {
        &[
            HandleId::TopLeft,
            HandleId::Top,
            HandleId::TopRight,
            HandleId::Right,
            HandleId::BottomRight,
            HandleId::Bottom,
            HandleId::BottomLeft,
            HandleId::Left,
        ]
    }

    /// Position of this handle on the given box, in image space.
    pub fn position(&self, bbox: &BBox) -> ImagePoint {
        let cx = bbox.x + bbox.width / 2.0;
        let cy = bbox.y + bbox.height / 2.0;
        match self {
            HandleId::TopLeft => ImagePoint::new(bbox.x, bbox.y),
            HandleId::Top => ImagePoint::new(cx, bbox.y),
            HandleId::TopRight => ImagePoint::new(bbox.right(), bbox.y),
            HandleId::Right => ImagePoint::new(bbox.right(), cy),
            HandleId::BottomRight => ImagePoint::new(bbox.right(), bbox.bottom()),
            HandleId::Bottom => ImagePoint::new(cx, bbox.bottom()),
            HandleId::BottomLeft => ImagePoint::new(bbox.x, bbox.bottom()),
            HandleId::Left => ImagePoint::new(bbox.x, cy),
        }
    }
}

/// Annotation kinds understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationKind {
    /// Axis-aligned bounding box with spatial geometry
    Bbox,
    /// Image-level class label without geometry
    Classification,
    /// Marker that the image contains nothing to annotate for a task
    NoObject,
}

impl AnnotationKind {
    /// Get the display name for this kind.
    pub fn name(&self) -> &'static str {
        match self {
            AnnotationKind::Bbox => "Bounding Box",
            AnnotationKind::Classification => "Classification",
            AnnotationKind::NoObject => "No Object",
        }
    }

    /// Whether annotations of this kind carry spatial geometry.
    pub fn expects_geometry(&self) -> bool {
        matches!(self, AnnotationKind::Bbox)
    }
}

/// Lifecycle state of a single annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationState {
    /// Editable, not yet reviewed
    #[default]
    Draft,
    /// Reviewed and frozen into the image's confirmed set
    Confirmed,
}

/// A single annotation as the engine holds it.
///
/// Field aliases accept the camelCase spelling some collaborator endpoints
/// still emit; the engine always serializes snake_case.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    /// Unique identifier (temporary until the collaborator assigns one)
    pub id: AnnotationId,

    /// Image this annotation belongs to
    #[serde(alias = "imageId")]
    pub image_id: ImageId,

    /// Owning project, stamped by the collaborator on creation
    #[serde(default, alias = "projectId", skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,

    /// Kind discriminator; decides the expected geometry shape
    #[serde(alias = "annotationType")]
    pub annotation_type: AnnotationKind,

    /// Box geometry for spatial kinds, absent otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<BBox>,

    /// Class from the owning task's class table
    #[serde(default, alias = "classId", skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,

    /// Display name matching `class_id`, denormalized onto the row
    #[serde(default, alias = "className", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    /// Draft/confirmed lifecycle state
    #[serde(default)]
    pub state: AnnotationState,

    /// Confidence score when the annotation was machine-suggested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,

    /// User that created the annotation
    #[serde(default, alias = "createdBy", skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    /// User that confirmed the annotation
    #[serde(default, alias = "confirmedBy", skip_serializing_if = "Option::is_none")]
    pub confirmed_by: Option<String>,

    /// When the annotation was confirmed
    #[serde(default, alias = "confirmedAt", skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,

    /// Open key/value map carrying task context for kinds that are not
    /// intrinsically bound to one task (e.g. no-object markers)
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

/// Attribute key naming the task a no-object marker belongs to.
pub const TASK_ATTRIBUTE: &str = "task";

impl Annotation {
    /// Create an optimistic draft with a temporary id.
    pub fn draft(
        image_id: impl Into<ImageId>,
        annotation_type: AnnotationKind,
        geometry: Option<BBox>,
        class_id: Option<ClassId>,
        created_by: impl Into<String>,
    ) -> Self {
        Self {
            id: temp_id(),
            image_id: image_id.into(),
            project_id: None,
            annotation_type,
            geometry,
            class_id,
            class_name: None,
            state: AnnotationState::Draft,
            confidence: None,
            created_by: Some(created_by.into()),
            confirmed_by: None,
            confirmed_at: None,
            attributes: HashMap::new(),
        }
    }

    /// Whether the id is still a locally minted temporary.
    pub fn has_temp_id(&self) -> bool {
        self.id.starts_with(TEMP_ID_PREFIX)
    }

    /// Whether the annotation is in the confirmed state.
    pub fn is_confirmed(&self) -> bool {
        self.state == AnnotationState::Confirmed
    }

    /// Task name carried in the attributes map, if any.
    pub fn task_attribute(&self) -> Option<&str> {
        self.attributes.get(TASK_ATTRIBUTE).map(String::as_str)
    }

    /// The task this annotation belongs to.
    ///
    /// Spatial and classification kinds are intrinsically bound to a task;
    /// no-object markers carry theirs in the attributes map and belong to
    /// none when the attribute is missing or unrecognized.
    pub fn task(&self) -> Option<TaskType> {
        match self.annotation_type {
            AnnotationKind::Bbox => Some(TaskType::Detection),
            AnnotationKind::Classification => Some(TaskType::Classification),
            AnnotationKind::NoObject => self.task_attribute().and_then(TaskType::parse),
        }
    }

    /// Mark the annotation confirmed by the given user at the given time.
    pub fn confirm(&mut self, user: &str, at: DateTime<Utc>) {
        self.state = AnnotationState::Confirmed;
        self.confirmed_by = Some(user.to_string());
        self.confirmed_at = Some(at);
    }

    /// Revert the annotation to an editable draft.
    pub fn unconfirm(&mut self) {
        self.state = AnnotationState::Draft;
        self.confirmed_by = None;
        self.confirmed_at = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_corners_normalizes() {
        let b = BBox::from_corners(ImagePoint::new(50.0, 80.0), ImagePoint::new(10.0, 20.0));
        assert_eq!(b.x, 10.0);
        assert_eq!(b.y, 20.0);
        assert_eq!(b.width, 40.0);
        assert_eq!(b.height, 60.0);
    }

    #[test]
    fn test_contains_edges_inclusive() {
        let b = BBox::new(10.0, 10.0, 20.0, 20.0);
        assert!(b.contains(ImagePoint::new(10.0, 10.0)));
        assert!(b.contains(ImagePoint::new(30.0, 30.0)));
        assert!(b.contains(ImagePoint::new(20.0, 20.0)));
        assert!(!b.contains(ImagePoint::new(30.1, 20.0)));
    }

    #[test]
    fn test_clip_to_bounds() {
        let image = ImageSize::new(100.0, 100.0);

        let overflow = BBox::new(80.0, -10.0, 40.0, 30.0).clip_to(image);
        assert_eq!(overflow.x, 80.0);
        assert_eq!(overflow.y, 0.0);
        assert_eq!(overflow.width, 20.0);
        assert_eq!(overflow.height, 20.0);

        let inside = BBox::new(10.0, 10.0, 20.0, 20.0).clip_to(image);
        assert_eq!(inside, BBox::new(10.0, 10.0, 20.0, 20.0));
    }

    #[test]
    fn test_handle_positions() {
        let b = BBox::new(0.0, 0.0, 100.0, 50.0);

        assert_eq!(HandleId::TopLeft.position(&b), ImagePoint::new(0.0, 0.0));
        assert_eq!(
            HandleId::BottomRight.position(&b),
            ImagePoint::new(100.0, 50.0)
        );
        assert_eq!(HandleId::Top.position(&b), ImagePoint::new(50.0, 0.0));
        assert_eq!(HandleId::Left.position(&b), ImagePoint::new(0.0, 25.0));
        assert_eq!(HandleId::all().len(), 8);
    }

    #[test]
    fn test_bbox_serializes_as_array() {
        let b = BBox::new(1.0, 2.0, 3.0, 4.0);
        let json = serde_json::to_string(&b).unwrap();
        assert_eq!(json, "[1.0,2.0,3.0,4.0]");

        let back: BBox = serde_json::from_str(&json).unwrap();
        assert_eq!(back, b);
    }

    #[test]
    fn test_bbox_rejects_negative_size() {
        let result: Result<BBox, _> = serde_json::from_str("[0.0,0.0,-5.0,4.0]");
        assert!(result.is_err());
    }

    #[test]
    fn test_annotation_accepts_camel_case_payload() {
        let json = r#"{
            "id": "a1",
            "imageId": "img-7",
            "annotationType": "bbox",
            "geometry": [10.0, 20.0, 30.0, 40.0],
            "classId": 2,
            "className": "truck",
            "state": "confirmed",
            "confirmedBy": "alice",
            "confirmedAt": "2026-03-01T12:00:00Z"
        }"#;

        let ann: Annotation = serde_json::from_str(json).unwrap();
        assert_eq!(ann.image_id, "img-7");
        assert_eq!(ann.annotation_type, AnnotationKind::Bbox);
        assert_eq!(ann.geometry, Some(BBox::new(10.0, 20.0, 30.0, 40.0)));
        assert_eq!(ann.class_id, Some(2));
        assert_eq!(ann.class_name.as_deref(), Some("truck"));
        assert!(ann.is_confirmed());
        assert_eq!(ann.confirmed_by.as_deref(), Some("alice"));
    }

    #[test]
    fn test_annotation_serializes_snake_case() {
        let mut ann = Annotation::draft("img-1", AnnotationKind::NoObject, None, None, "bob");
        ann.attributes
            .insert(TASK_ATTRIBUTE.to_string(), "detection".to_string());

        let json = serde_json::to_string(&ann).unwrap();
        assert!(json.contains("\"image_id\""));
        assert!(json.contains("\"annotation_type\":\"no_object\""));
        assert!(!json.contains("imageId"));

        let back: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(back.task_attribute(), Some("detection"));
    }

    #[test]
    fn test_task_binding() {
        let bbox = Annotation::draft("i", AnnotationKind::Bbox, None, None, "t");
        assert_eq!(bbox.task(), Some(TaskType::Detection));

        let label = Annotation::draft("i", AnnotationKind::Classification, None, None, "t");
        assert_eq!(label.task(), Some(TaskType::Classification));

        // Markers belong to no task until the attribute names one
        let mut marker = Annotation::draft("i", AnnotationKind::NoObject, None, None, "t");
        assert_eq!(marker.task(), None);
        marker
            .attributes
            .insert(TASK_ATTRIBUTE.to_string(), "classification".to_string());
        assert_eq!(marker.task(), Some(TaskType::Classification));
    }

    #[test]
    fn test_draft_gets_temp_id() {
        let ann = Annotation::draft("img-1", AnnotationKind::Bbox, None, Some(1), "bob");
        assert!(ann.has_temp_id());
        assert_eq!(ann.state, AnnotationState::Draft);

        let other = Annotation::draft("img-1", AnnotationKind::Bbox, None, Some(1), "bob");
        assert_ne!(ann.id, other.id);
    }

    #[test]
    fn test_confirm_and_unconfirm() {
        let mut ann = Annotation::draft("img-1", AnnotationKind::Bbox, None, Some(1), "bob");
        ann.confirm("alice", Utc::now());
        assert!(ann.is_confirmed());
        assert_eq!(ann.confirmed_by.as_deref(), Some("alice"));

        ann.unconfirm();
        assert!(!ann.is_confirmed());
        assert!(ann.confirmed_by.is_none());
        assert!(ann.confirmed_at.is_none());
    }
}
