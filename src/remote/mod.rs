//! Remote collaborator boundary.
//!
//! The engine talks to the annotation store and lock service through
//! [`RemoteStore`]; payload shape differences between collaborator
//! endpoints are normalized here, at the serde boundary, so core logic
//! only ever sees the canonical model types.

mod memory;

pub use memory::MemoryRemote;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RemoteError;
use crate::model::{
    Annotation, AnnotationKind, AnnotationState, BBox, ClassId, ImageId, ImageLock,
    LockAcquisition, TaskType,
};
use std::collections::HashMap;

/// Payload for creating an annotation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAnnotation {
    /// Image the annotation belongs to
    #[serde(alias = "imageId")]
    pub image_id: ImageId,

    /// Kind discriminator
    #[serde(alias = "annotationType")]
    pub annotation_type: AnnotationKind,

    /// Box geometry for spatial kinds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<BBox>,

    /// Class from the owning task's class table
    #[serde(default, alias = "classId", skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,

    /// Display name matching `class_id`
    #[serde(default, alias = "className", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    /// Creating user
    #[serde(alias = "createdBy")]
    pub created_by: String,

    /// Task context for kinds not intrinsically bound to one task
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub attributes: HashMap<String, String>,
}

impl CreateAnnotation {
    /// Build the payload from an optimistic draft.
    pub fn from_draft(draft: &Annotation) -> Self {
        Self {
            image_id: draft.image_id.clone(),
            annotation_type: draft.annotation_type,
            geometry: draft.geometry,
            class_id: draft.class_id,
            class_name: draft.class_name.clone(),
            created_by: draft.created_by.clone().unwrap_or_default(),
            attributes: draft.attributes.clone(),
        }
    }
}

/// Partial update for an annotation; absent fields are left unchanged.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateAnnotation {
    /// New geometry
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geometry: Option<BBox>,

    /// New class
    #[serde(default, alias = "classId", skip_serializing_if = "Option::is_none")]
    pub class_id: Option<ClassId>,

    /// Display name travelling with a class change
    #[serde(default, alias = "className", skip_serializing_if = "Option::is_none")]
    pub class_name: Option<String>,

    /// New lifecycle state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<AnnotationState>,
}

impl UpdateAnnotation {
    /// Patch that only moves/resizes geometry.
    pub fn geometry(bbox: BBox) -> Self {
        Self {
            geometry: Some(bbox),
            ..Self::default()
        }
    }
}

/// Collaborator's answer to an image confirm or unconfirm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmReceipt {
    /// Image the receipt covers
    #[serde(alias = "imageId")]
    pub image_id: ImageId,

    /// Image-level confirmed flag after the operation
    #[serde(alias = "isConfirmed")]
    pub is_confirmed: bool,

    /// When the confirmation was recorded, when confirmed
    #[serde(default, alias = "confirmedAt", skip_serializing_if = "Option::is_none")]
    pub confirmed_at: Option<DateTime<Utc>>,
}

/// The annotation store and lock service the workstation collaborates with.
///
/// All calls are whole-operation: an `Ok` means the collaborator has
/// durably applied the change, an `Err` means local optimistic state may
/// be ahead of the collaborator.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Persist a new annotation; the returned record carries the
    /// collaborator-assigned id.
    async fn create_annotation(
        &self,
        project_id: &str,
        payload: CreateAnnotation,
    ) -> Result<Annotation, RemoteError>;

    /// Apply a partial update to an annotation.
    async fn update_annotation(
        &self,
        project_id: &str,
        annotation_id: &str,
        patch: UpdateAnnotation,
    ) -> Result<Annotation, RemoteError>;

    /// Delete an annotation.
    async fn delete_annotation(
        &self,
        project_id: &str,
        annotation_id: &str,
    ) -> Result<(), RemoteError>;

    /// List annotations, optionally scoped to one image.
    async fn list_annotations(
        &self,
        project_id: &str,
        image_id: Option<&str>,
    ) -> Result<Vec<Annotation>, RemoteError>;

    /// Confirm an image's annotation set for one task.
    async fn confirm_image(
        &self,
        project_id: &str,
        image_id: &str,
        task: TaskType,
        user_id: &str,
    ) -> Result<ConfirmReceipt, RemoteError>;

    /// Revert an image's annotation set to drafts for one task.
    async fn unconfirm_image(
        &self,
        project_id: &str,
        image_id: &str,
        task: TaskType,
    ) -> Result<ConfirmReceipt, RemoteError>;

    /// Request the edit lock for an image.
    async fn acquire_lock(
        &self,
        project_id: &str,
        image_id: &str,
        user_id: &str,
    ) -> Result<LockAcquisition, RemoteError>;

    /// Refresh a held lock's heartbeat.
    async fn heartbeat_lock(
        &self,
        project_id: &str,
        image_id: &str,
        user_id: &str,
    ) -> Result<(), RemoteError>;

    /// Release a held lock.
    async fn release_lock(
        &self,
        project_id: &str,
        image_id: &str,
        user_id: &str,
    ) -> Result<(), RemoteError>;

    /// List the currently held locks in a project.
    async fn list_locks(&self, project_id: &str) -> Result<Vec<ImageLock>, RemoteError>;

    /// Persist a task's class display order.
    async fn save_class_order(
        &self,
        project_id: &str,
        task: TaskType,
        ordered: &[ClassId],
    ) -> Result<(), RemoteError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_patch_skips_absent_fields() {
        let patch = UpdateAnnotation::geometry(BBox::new(1.0, 2.0, 3.0, 4.0));
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"geometry":[1.0,2.0,3.0,4.0]}"#);
    }

    #[test]
    fn test_create_payload_from_draft() {
        let mut draft = Annotation::draft(
            "img-1",
            AnnotationKind::Bbox,
            Some(BBox::new(0.0, 0.0, 20.0, 20.0)),
            Some(4),
            "alice",
        );
        draft.class_name = Some("car".to_string());
        let payload = CreateAnnotation::from_draft(&draft);

        assert_eq!(payload.image_id, "img-1");
        assert_eq!(payload.class_id, Some(4));
        assert_eq!(payload.class_name.as_deref(), Some("car"));
        assert_eq!(payload.created_by, "alice");
    }

    #[test]
    fn test_receipt_accepts_camel_case() {
        let json = r#"{"imageId": "i1", "isConfirmed": true, "confirmedAt": "2026-03-01T09:00:00Z"}"#;
        let receipt: ConfirmReceipt = serde_json::from_str(json).unwrap();
        assert!(receipt.is_confirmed);
        assert_eq!(receipt.image_id, "i1");
    }
}
