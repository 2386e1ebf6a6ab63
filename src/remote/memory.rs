//! In-memory collaborator, used by tests and offline sessions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::constants;
use crate::error::RemoteError;
use crate::model::{
    Annotation, AnnotationState, ClassId, ImageId, ImageLock, LockAcquisition, TaskType,
};
use crate::remote::{ConfirmReceipt, CreateAnnotation, RemoteStore, UpdateAnnotation};

/// A [`RemoteStore`] backed by process memory.
///
/// Behaves like the real collaborator, including lock contention and
/// stale-lock takeover, and can be told to fail specific calls so the
/// engine's partial-failure paths can be exercised.
pub struct MemoryRemote {
    state: Mutex<MemoryState>,
    stale_after_secs: i64,
}

#[derive(Default)]
struct MemoryState {
    annotations: Vec<Annotation>,
    next_id: u64,
    confirmed_images: HashMap<ImageId, bool>,
    locks: HashMap<ImageId, ImageLock>,
    class_orders: BTreeMap<TaskType, Vec<ClassId>>,
    failures: HashSet<(String, String)>,
}

impl Default for MemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::with_stale_after(constants::lock::STALE_AFTER_SECS)
    }

    /// Collaborator that treats locks older than `secs` as abandoned.
    pub fn with_stale_after(secs: i64) -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            stale_after_secs: secs,
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the next call of `op` touching entity `id` fail with a
    /// network error. `"*"` matches any entity. One-shot: the failure is
    /// consumed when it fires.
    pub fn fail_on(&self, op: &str, id: &str) {
        self.state()
            .failures
            .insert((op.to_string(), id.to_string()));
    }

    /// Drop all pending injected failures.
    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Pre-populate annotations, as if another collaborator wrote them.
    pub fn seed_annotations(&self, annotations: Vec<Annotation>) {
        self.state().annotations.extend(annotations);
    }

    /// Pre-populate a lock, backdatable for staleness tests.
    pub fn seed_lock(&self, image_id: &str, user_id: &str, last_heartbeat: DateTime<Utc>) {
        let lock = ImageLock::new(image_id, user_id, last_heartbeat);
        self.state().locks.insert(image_id.to_string(), lock);
    }

    /// Who currently holds the lock on `image_id`, if anyone.
    pub fn lock_holder(&self, image_id: &str) -> Option<String> {
        self.state()
            .locks
            .get(image_id)
            .map(|lock| lock.locked_by.clone())
    }

    /// Image-level confirmed flag as the collaborator last recorded it.
    pub fn image_confirmed(&self, image_id: &str) -> bool {
        self.state()
            .confirmed_images
            .get(image_id)
            .copied()
            .unwrap_or(false)
    }

    fn check(state: &mut MemoryState, op: &str, id: &str) -> Result<(), RemoteError> {
        let exact = (op.to_string(), id.to_string());
        let any = (op.to_string(), "*".to_string());
        if state.failures.remove(&exact) || state.failures.remove(&any) {
            return Err(RemoteError::network(format!("injected failure: {op} {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn create_annotation(
        &self,
        project_id: &str,
        payload: CreateAnnotation,
    ) -> Result<Annotation, RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "create_annotation", &payload.image_id)?;

        state.next_id += 1;
        let annotation = Annotation {
            id: format!("ann-{}", state.next_id),
            image_id: payload.image_id,
            project_id: Some(project_id.to_string()),
            annotation_type: payload.annotation_type,
            geometry: payload.geometry,
            class_id: payload.class_id,
            class_name: payload.class_name,
            state: AnnotationState::Draft,
            confidence: None,
            created_by: Some(payload.created_by),
            confirmed_by: None,
            confirmed_at: None,
            attributes: payload.attributes,
        };
        state.annotations.push(annotation.clone());
        Ok(annotation)
    }

    async fn update_annotation(
        &self,
        _project_id: &str,
        annotation_id: &str,
        patch: UpdateAnnotation,
    ) -> Result<Annotation, RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "update_annotation", annotation_id)?;

        let annotation = state
            .annotations
            .iter_mut()
            .find(|a| a.id == annotation_id)
            .ok_or_else(|| RemoteError::not_found("annotation", annotation_id))?;

        if let Some(geometry) = patch.geometry {
            annotation.geometry = Some(geometry);
        }
        if let Some(class_id) = patch.class_id {
            annotation.class_id = Some(class_id);
        }
        if let Some(class_name) = patch.class_name {
            annotation.class_name = Some(class_name);
        }
        if let Some(new_state) = patch.state {
            annotation.state = new_state;
        }
        Ok(annotation.clone())
    }

    async fn delete_annotation(
        &self,
        _project_id: &str,
        annotation_id: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "delete_annotation", annotation_id)?;

        let before = state.annotations.len();
        state.annotations.retain(|a| a.id != annotation_id);
        if state.annotations.len() == before {
            return Err(RemoteError::not_found("annotation", annotation_id));
        }
        Ok(())
    }

    async fn list_annotations(
        &self,
        _project_id: &str,
        image_id: Option<&str>,
    ) -> Result<Vec<Annotation>, RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "list_annotations", image_id.unwrap_or("*"))?;

        Ok(state
            .annotations
            .iter()
            .filter(|a| image_id.is_none_or(|id| a.image_id == id))
            .cloned()
            .collect())
    }

    async fn confirm_image(
        &self,
        _project_id: &str,
        image_id: &str,
        task: TaskType,
        user_id: &str,
    ) -> Result<ConfirmReceipt, RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "confirm_image", image_id)?;

        let now = Utc::now();
        for annotation in &mut state.annotations {
            // Re-confirming keeps the original reviewer stamp
            if annotation.image_id == image_id
                && annotation.task() == Some(task)
                && !annotation.is_confirmed()
            {
                annotation.confirm(user_id, now);
            }
        }
        state.confirmed_images.insert(image_id.to_string(), true);
        Ok(ConfirmReceipt {
            image_id: image_id.to_string(),
            is_confirmed: true,
            confirmed_at: Some(now),
        })
    }

    async fn unconfirm_image(
        &self,
        _project_id: &str,
        image_id: &str,
        task: TaskType,
    ) -> Result<ConfirmReceipt, RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "unconfirm_image", image_id)?;

        for annotation in &mut state.annotations {
            if annotation.image_id == image_id && annotation.task() == Some(task) {
                annotation.unconfirm();
            }
        }
        state.confirmed_images.insert(image_id.to_string(), false);
        Ok(ConfirmReceipt {
            image_id: image_id.to_string(),
            is_confirmed: false,
            confirmed_at: None,
        })
    }

    async fn acquire_lock(
        &self,
        _project_id: &str,
        image_id: &str,
        user_id: &str,
    ) -> Result<LockAcquisition, RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "acquire_lock", image_id)?;

        let now = Utc::now();
        if let Some(existing) = state.locks.get_mut(image_id) {
            if existing.locked_by == user_id {
                existing.touch(now);
                return Ok(LockAcquisition::Refreshed(existing.clone()));
            }
            if !existing.is_stale(self.stale_after_secs, now) {
                return Ok(LockAcquisition::AlreadyLocked(existing.clone()));
            }
            log::debug!(
                "Taking over stale lock on {} from {}",
                image_id,
                existing.locked_by
            );
        }

        let lock = ImageLock::new(image_id, user_id, now);
        state.locks.insert(image_id.to_string(), lock.clone());
        Ok(LockAcquisition::Acquired(lock))
    }

    async fn heartbeat_lock(
        &self,
        _project_id: &str,
        image_id: &str,
        user_id: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "heartbeat_lock", image_id)?;

        match state.locks.get_mut(image_id) {
            Some(lock) if lock.locked_by == user_id => {
                lock.touch(Utc::now());
                Ok(())
            }
            Some(lock) => Err(RemoteError::server(
                409,
                format!("lock on {} is held by {}", image_id, lock.locked_by),
            )),
            None => Err(RemoteError::not_found("lock", image_id)),
        }
    }

    async fn release_lock(
        &self,
        _project_id: &str,
        image_id: &str,
        user_id: &str,
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "release_lock", image_id)?;

        match state.locks.get(image_id) {
            Some(lock) if lock.locked_by != user_id => Err(RemoteError::server(
                409,
                format!("lock on {} is held by {}", image_id, lock.locked_by),
            )),
            Some(_) => {
                state.locks.remove(image_id);
                Ok(())
            }
            // Releasing an already-expired lock is not an error.
            None => Ok(()),
        }
    }

    async fn list_locks(&self, _project_id: &str) -> Result<Vec<ImageLock>, RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "list_locks", "*")?;

        Ok(state.locks.values().cloned().collect())
    }

    async fn save_class_order(
        &self,
        _project_id: &str,
        task: TaskType,
        ordered: &[ClassId],
    ) -> Result<(), RemoteError> {
        let mut state = self.state();
        Self::check(&mut state, "save_class_order", task.as_str())?;

        state.class_orders.insert(task, ordered.to_vec());
        Ok(())
    }
}
