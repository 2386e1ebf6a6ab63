//! Advisory per-image edit locks.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::model::image::ImageId;

/// A lease on an image held by one user.
///
/// Locks are advisory: holding one does not technically prevent concurrent
/// edits, it only signals intent to other workstations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImageLock {
    /// Image the lock covers
    #[serde(alias = "imageId")]
    pub image_id: ImageId,

    /// User holding the lock
    #[serde(alias = "lockedBy", alias = "userId")]
    pub locked_by: String,

    /// When the lock was first acquired
    #[serde(alias = "acquiredAt")]
    pub acquired_at: DateTime<Utc>,

    /// Last heartbeat refresh
    #[serde(alias = "lastHeartbeat", alias = "heartbeatAt")]
    pub last_heartbeat: DateTime<Utc>,
}

impl ImageLock {
    /// Create a fresh lock held by the given user.
    pub fn new(image_id: impl Into<ImageId>, locked_by: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            image_id: image_id.into(),
            locked_by: locked_by.into(),
            acquired_at: now,
            last_heartbeat: now,
        }
    }

    /// Refresh the heartbeat stamp.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_heartbeat = now;
    }

    /// Whether the lock has gone stale (no heartbeat within the window).
    pub fn is_stale(&self, stale_after_secs: i64, now: DateTime<Utc>) -> bool {
        now - self.last_heartbeat > Duration::seconds(stale_after_secs)
    }
}

/// Outcome of a lock acquisition request.
#[derive(Debug, Clone, PartialEq)]
pub enum LockAcquisition {
    /// Lock granted to the requesting user
    Acquired(ImageLock),
    /// The requesting user already held the lock; heartbeat refreshed
    Refreshed(ImageLock),
    /// Another user holds the lock; editing proceeds unlocked
    AlreadyLocked(ImageLock),
}

impl LockAcquisition {
    /// The lock record behind this outcome.
    pub fn lock(&self) -> &ImageLock {
        match self {
            LockAcquisition::Acquired(lock)
            | LockAcquisition::Refreshed(lock)
            | LockAcquisition::AlreadyLocked(lock) => lock,
        }
    }

    /// Whether the requesting user ended up holding the lock.
    pub fn is_held(&self) -> bool {
        matches!(
            self,
            LockAcquisition::Acquired(_) | LockAcquisition::Refreshed(_)
        )
    }

    /// Holder's user id when someone else has the lock.
    pub fn conflicting_holder(&self) -> Option<&str> {
        match self {
            LockAcquisition::AlreadyLocked(lock) => Some(&lock.locked_by),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_lock_is_not_stale() {
        let now = Utc::now();
        let lock = ImageLock::new("img-1", "alice", now);
        assert!(!lock.is_stale(90, now));
        assert_eq!(lock.acquired_at, lock.last_heartbeat);
    }

    #[test]
    fn test_lock_goes_stale_without_heartbeat() {
        let now = Utc::now();
        let mut lock = ImageLock::new("img-1", "alice", now);

        let later = now + Duration::seconds(120);
        assert!(lock.is_stale(90, later));

        lock.touch(later);
        assert!(!lock.is_stale(90, later));
    }

    #[test]
    fn test_acquisition_outcomes() {
        let lock = ImageLock::new("img-1", "alice", Utc::now());

        let acquired = LockAcquisition::Acquired(lock.clone());
        assert!(acquired.is_held());
        assert!(acquired.conflicting_holder().is_none());

        let conflicted = LockAcquisition::AlreadyLocked(lock);
        assert!(!conflicted.is_held());
        assert_eq!(conflicted.conflicting_holder(), Some("alice"));
    }

    #[test]
    fn test_lock_accepts_camel_case() {
        let json = r#"{
            "imageId": "img-9",
            "lockedBy": "bob",
            "acquiredAt": "2026-03-01T10:00:00Z",
            "lastHeartbeat": "2026-03-01T10:05:00Z"
        }"#;
        let lock: ImageLock = serde_json::from_str(json).unwrap();
        assert_eq!(lock.image_id, "img-9");
        assert_eq!(lock.locked_by, "bob");
    }
}
