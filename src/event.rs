//! Events the engine queues for the host between frames.
//!
//! Operations report hard failures through their `Result`; anything the
//! host should surface without interrupting the operator (clips,
//! conflicts, batch progress) is queued here and drained once per frame.

use crate::batch::BatchReport;
use crate::model::{AnnotationId, ImageId};

/// A notable occurrence the host may want to surface.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// A box was pulled back inside the image bounds after an edit
    GeometryClipped { annotation_id: AnnotationId },

    /// A collaborator call failed; the optimistic local change is kept
    RemoteFailure { operation: String, message: String },

    /// The image's edit lock is held by another user
    LockConflict { image_id: ImageId, holder: String },

    /// Progress tick after each attempted image in a batch run
    BatchProgress { current: usize, total: usize },

    /// A batch run ended, cleanly or aborted
    BatchFinished(BatchReport),
}
