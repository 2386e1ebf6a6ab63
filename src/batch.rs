//! Batched operations across a multi-image selection.
//!
//! A batch applies one action to every selected image in project order,
//! one collaborator call per image. The first failure aborts the rest;
//! the [`BatchReport`] keeps the run's outcome image by image so partial
//! progress is never collapsed into all-or-nothing.

use crate::model::{ClassId, ImageId};

/// Action applied to every image in a batch selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchAction {
    /// Confirm each image's annotation set for the active task
    Confirm,
    /// Mark each image as containing nothing for the active task
    MarkNoObject,
    /// Delete every annotation of the active task
    DeleteAll,
    /// Re-class every annotation of the active task
    AssignClass(ClassId),
}

impl BatchAction {
    /// Short label for status lines.
    pub fn label(&self) -> &'static str {
        match self {
            BatchAction::Confirm => "Confirm",
            BatchAction::MarkNoObject => "No object",
            BatchAction::DeleteAll => "Delete all",
            BatchAction::AssignClass(_) => "Assign class",
        }
    }
}

/// A batch ready to run: the action plus its resolved target images.
///
/// Hosts show [`BatchPlan::describe`] to the operator and only call run
/// once they confirm; execution accepts nothing but a plan, so no batch
/// can skip that gate.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchPlan {
    pub action: BatchAction,
    /// Target image ids in project order
    pub targets: Vec<ImageId>,
}

impl BatchPlan {
    pub fn new(action: BatchAction, targets: Vec<ImageId>) -> Self {
        Self { action, targets }
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }

    /// Scope and destructive effect, for the host's confirmation prompt.
    pub fn describe(&self) -> String {
        let images = if self.targets.len() == 1 {
            "1 image".to_string()
        } else {
            format!("{} images", self.targets.len())
        };
        match self.action {
            BatchAction::Confirm => format!("Confirm all annotations on {images}"),
            BatchAction::MarkNoObject => format!(
                "Mark {images} as containing no objects, deleting their existing annotations"
            ),
            BatchAction::DeleteAll => format!("Delete every annotation on {images}"),
            BatchAction::AssignClass(class_id) => {
                format!("Re-class every annotation on {images} to class {class_id}")
            }
        }
    }
}

/// The image a batch run stopped at, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchFailure {
    pub image_id: ImageId,
    pub message: String,
}

/// Image-by-image outcome of a batch run.
#[derive(Debug, Clone, PartialEq)]
pub struct BatchReport {
    pub action: BatchAction,
    /// Images the action was applied to, in attempt order
    pub completed: Vec<ImageId>,
    /// The failure that aborted the run, when one did
    pub failed: Option<BatchFailure>,
    /// Images never attempted because of the abort
    pub skipped: Vec<ImageId>,
}

impl BatchReport {
    pub fn new(action: BatchAction) -> Self {
        Self {
            action,
            completed: Vec::new(),
            failed: None,
            skipped: Vec::new(),
        }
    }

    pub fn record_success(&mut self, image_id: impl Into<ImageId>) {
        self.completed.push(image_id.into());
    }

    /// Record the aborting failure along with the targets left behind.
    pub fn record_failure(
        &mut self,
        image_id: impl Into<ImageId>,
        message: impl Into<String>,
        remaining: &[ImageId],
    ) {
        self.failed = Some(BatchFailure {
            image_id: image_id.into(),
            message: message.into(),
        });
        self.skipped = remaining.to_vec();
    }

    /// Number of images the run covered, attempted or not.
    pub fn total(&self) -> usize {
        self.completed.len() + usize::from(self.failed.is_some()) + self.skipped.len()
    }

    pub fn is_complete(&self) -> bool {
        self.failed.is_none()
    }

    /// One-line outcome for the status bar.
    pub fn summary(&self) -> String {
        match &self.failed {
            None => format!("{}: {} images", self.action.label(), self.completed.len()),
            Some(failure) => format!(
                "{} stopped at {}: {} of {} done ({})",
                self.action.label(),
                failure.image_id,
                self.completed.len(),
                self.total(),
                failure.message
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_report_counts_all_outcomes() {
        let mut report = BatchReport::new(BatchAction::Confirm);
        report.record_success("i1");
        report.record_failure("i2", "connection reset", &["i3".to_string()]);

        assert_eq!(report.completed, vec!["i1"]);
        assert_eq!(report.skipped, vec!["i3"]);
        assert_eq!(report.total(), 3);
        assert!(!report.is_complete());
    }

    #[test]
    fn test_summary_for_clean_run() {
        let mut report = BatchReport::new(BatchAction::DeleteAll);
        report.record_success("i1");
        report.record_success("i2");

        assert_eq!(report.summary(), "Delete all: 2 images");
        assert!(report.is_complete());
    }

    #[test]
    fn test_summary_names_the_aborting_image() {
        let mut report = BatchReport::new(BatchAction::Confirm);
        report.record_success("i1");
        report.record_failure("i2", "connection reset", &["i3".to_string()]);

        let summary = report.summary();
        assert!(summary.contains("stopped at i2"));
        assert!(summary.contains("1 of 3"));
    }

    #[test]
    fn test_plan_describes_scope_and_effect() {
        let targets = vec!["i1".to_string(), "i2".to_string(), "i3".to_string()];
        let plan = BatchPlan::new(BatchAction::MarkNoObject, targets);

        let text = plan.describe();
        assert!(text.contains("3 images"));
        assert!(text.contains("deleting"));

        let single = BatchPlan::new(BatchAction::DeleteAll, vec!["i1".to_string()]);
        assert_eq!(single.describe(), "Delete every annotation on 1 image");
    }
}
