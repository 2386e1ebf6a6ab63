//! Draft/confirmed lifecycle and per-image status derivation.
//!
//! Everything here is a pure function over annotation slices so the
//! store can apply lifecycle changes optimistically and the tests can
//! exercise them without a collaborator.

use chrono::{DateTime, Utc};

use crate::model::{Annotation, ImageStatus, TaskType};

/// Derive an image's status for one task from its annotations.
///
/// An image with no annotations for the task is untouched even if a
/// collaborator-side confirmed flag says otherwise; status is always
/// annotation-driven.
pub fn image_status(annotations: &[Annotation], task: TaskType) -> ImageStatus {
    let mut total = 0usize;
    let mut confirmed = 0usize;
    for annotation in annotations {
        if annotation.task() == Some(task) {
            total += 1;
            if annotation.is_confirmed() {
                confirmed += 1;
            }
        }
    }

    if total == 0 {
        ImageStatus::NotStarted
    } else if confirmed == total {
        ImageStatus::Completed
    } else {
        ImageStatus::InProgress
    }
}

/// Counts of images per status, for the project progress readout.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusSummary {
    pub not_started: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl StatusSummary {
    pub fn total(&self) -> usize {
        self.not_started + self.in_progress + self.completed
    }
}

/// Tally statuses into a summary.
pub fn summarize(statuses: impl IntoIterator<Item = ImageStatus>) -> StatusSummary {
    let mut summary = StatusSummary::default();
    for status in statuses {
        match status {
            ImageStatus::NotStarted => summary.not_started += 1,
            ImageStatus::InProgress => summary.in_progress += 1,
            ImageStatus::Completed => summary.completed += 1,
        }
    }
    summary
}

/// Mark every draft annotation of `task` confirmed, returning how many
/// changed. Already-confirmed annotations keep their original stamp.
pub fn confirm_task(
    annotations: &mut [Annotation],
    task: TaskType,
    user: &str,
    at: DateTime<Utc>,
) -> usize {
    let mut touched = 0;
    for annotation in annotations.iter_mut() {
        if annotation.task() == Some(task) && !annotation.is_confirmed() {
            annotation.confirm(user, at);
            touched += 1;
        }
    }
    touched
}

/// Revert every confirmed annotation of `task` to draft, returning how
/// many changed.
pub fn unconfirm_task(annotations: &mut [Annotation], task: TaskType) -> usize {
    let mut touched = 0;
    for annotation in annotations.iter_mut() {
        if annotation.task() == Some(task) && annotation.is_confirmed() {
            annotation.unconfirm();
            touched += 1;
        }
    }
    touched
}

/// Next image index, wrapping.
pub fn next_index(len: usize, current: usize) -> usize {
    if len == 0 { 0 } else { (current + 1) % len }
}

/// Previous image index, wrapping.
pub fn prev_index(len: usize, current: usize) -> usize {
    if len == 0 {
        0
    } else if current == 0 {
        len - 1
    } else {
        current - 1
    }
}

/// Where to land after confirming the image at `current`: the first
/// not-yet-completed image after it, otherwise the next index clamped
/// to the end (confirm never wraps).
pub fn advance_after_confirm(statuses: &[ImageStatus], current: usize) -> usize {
    if statuses.is_empty() {
        return 0;
    }
    for (index, status) in statuses.iter().enumerate().skip(current + 1) {
        if *status != ImageStatus::Completed {
            return index;
        }
    }
    (current + 1).min(statuses.len() - 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AnnotationKind, BBox};

    fn bbox(confirmed: bool) -> Annotation {
        let mut annotation = Annotation::draft(
            "i1",
            AnnotationKind::Bbox,
            Some(BBox::new(0.0, 0.0, 20.0, 20.0)),
            Some(0),
            "alice",
        );
        if confirmed {
            annotation.confirm("alice", Utc::now());
        }
        annotation
    }

    fn classification() -> Annotation {
        Annotation::draft("i1", AnnotationKind::Classification, None, Some(1), "alice")
    }

    #[test]
    fn test_status_is_task_scoped() {
        let annotations = vec![bbox(true), classification()];

        assert_eq!(
            image_status(&annotations, TaskType::Detection),
            ImageStatus::Completed
        );
        assert_eq!(
            image_status(&annotations, TaskType::Classification),
            ImageStatus::InProgress
        );
        assert_eq!(
            image_status(&annotations, TaskType::Segmentation),
            ImageStatus::NotStarted
        );
    }

    #[test]
    fn test_status_mixed_is_in_progress() {
        let annotations = vec![bbox(true), bbox(false)];
        assert_eq!(
            image_status(&annotations, TaskType::Detection),
            ImageStatus::InProgress
        );
    }

    #[test]
    fn test_confirm_and_unconfirm_round_trip() {
        let mut annotations = vec![bbox(false), bbox(true), classification()];

        let confirmed = confirm_task(&mut annotations, TaskType::Detection, "bob", Utc::now());
        assert_eq!(confirmed, 1);
        assert!(annotations[0].is_confirmed());
        // The earlier confirmation keeps its original reviewer.
        assert_eq!(annotations[1].confirmed_by.as_deref(), Some("alice"));
        assert!(!annotations[2].is_confirmed());

        let reverted = unconfirm_task(&mut annotations, TaskType::Detection);
        assert_eq!(reverted, 2);
        assert!(!annotations[0].is_confirmed());
        assert!(annotations[0].confirmed_by.is_none());
    }

    #[test]
    fn test_navigation_wraps() {
        assert_eq!(next_index(3, 2), 0);
        assert_eq!(next_index(3, 0), 1);
        assert_eq!(prev_index(3, 0), 2);
        assert_eq!(prev_index(3, 2), 1);
        assert_eq!(next_index(0, 0), 0);
        assert_eq!(prev_index(0, 0), 0);
    }

    #[test]
    fn test_advance_skips_completed() {
        use ImageStatus::{Completed, InProgress, NotStarted};

        let statuses = [Completed, Completed, Completed, NotStarted, InProgress];
        assert_eq!(advance_after_confirm(&statuses, 1), 3);

        // Everything ahead done: step forward without wrapping.
        let done = [NotStarted, Completed, Completed];
        assert_eq!(advance_after_confirm(&done, 1), 2);
        assert_eq!(advance_after_confirm(&done, 2), 2);

        assert_eq!(advance_after_confirm(&[], 0), 0);
    }

    #[test]
    fn test_summarize_counts() {
        use ImageStatus::{Completed, InProgress, NotStarted};

        let summary = summarize([NotStarted, Completed, Completed, InProgress]);
        assert_eq!(summary.not_started, 1);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.completed, 2);
        assert_eq!(summary.total(), 4);
    }
}
