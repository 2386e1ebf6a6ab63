//! Error types for engine operations and the remote collaborator boundary.

use thiserror::Error;

/// Errors reported by the remote collaborator (annotation store, lock service).
#[derive(Error, Debug)]
pub enum RemoteError {
    /// Transport-level failure (connection refused, timeout, dropped stream)
    #[error("Network error: {0}")]
    Network(String),

    /// The collaborator answered with a failure status
    #[error("Server error ({status}): {message}")]
    Server {
        /// Status code returned by the collaborator
        status: u16,
        /// Body or reason attached to the failure
        message: String,
    },

    /// Payload could not be decoded into the canonical representation
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Referenced entity does not exist on the collaborator
    #[error("Not found: {entity} '{id}'")]
    NotFound {
        /// Entity kind (annotation, image, lock)
        entity: String,
        /// Identifier that failed to resolve
        id: String,
    },
}

impl RemoteError {
    /// Create a network error with a message.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    /// Create a server error with a status code and message.
    pub fn server(status: u16, message: impl Into<String>) -> Self {
        Self::Server {
            status,
            message: message.into(),
        }
    }

    /// Create a not-found error for an entity kind and id.
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }
}

/// Errors that can occur during engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Remote collaborator call failed; local optimistic state is retained
    #[error("Remote error: {0}")]
    Remote(#[from] RemoteError),

    /// Geometry below the minimum drawable size
    #[error("Degenerate geometry: {width:.1}x{height:.1} is below the minimum size")]
    DegenerateGeometry {
        /// Width of the rejected geometry
        width: f32,
        /// Height of the rejected geometry
        height: f32,
    },

    /// Operation requires an open image but none is active
    #[error("No active image")]
    NoActiveImage,

    /// Annotation ID referenced but not present locally
    #[error("Unknown annotation: {id}")]
    UnknownAnnotation {
        /// The missing annotation ID
        id: String,
    },

    /// Class ID not defined in the active task's class table
    #[error("Unknown class: {id}")]
    UnknownClass {
        /// The missing class ID
        id: u32,
    },

    /// Class reorder payload does not match the known class set
    #[error("Class reorder mismatch: expected {expected} classes, got {got}")]
    ClassReorderMismatch {
        /// Number of classes in the active table
        expected: usize,
        /// Number of classes in the reorder request
        got: usize,
    },

    /// Batch run stopped early; already-applied items are kept
    #[error("Batch aborted at image '{image_id}' ({completed}/{total} applied): {source}")]
    BatchAborted {
        /// Image the failing item targeted
        image_id: String,
        /// Items applied before the failure
        completed: usize,
        /// Total items in the batch
        total: usize,
        /// The failure that stopped the run
        #[source]
        source: RemoteError,
    },
}

impl EngineError {
    /// Create a degenerate geometry error from the rejected dimensions.
    pub fn degenerate(width: f32, height: f32) -> Self {
        Self::DegenerateGeometry { width, height }
    }

    /// Create an unknown annotation error.
    pub fn unknown_annotation(id: impl Into<String>) -> Self {
        Self::UnknownAnnotation { id: id.into() }
    }
}
