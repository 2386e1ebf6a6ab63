//! Engine constants for canvas interaction, geometry validation and locking.
//!
//! This module centralizes all hardcoded values for zoom limits, size
//! thresholds, lock timing, and overlay styling.

/// Zoom constants.
pub mod zoom {
    /// Zoom step applied per wheel notch or zoom command
    pub const STEP: f32 = 0.1;
    /// Maximum zoom level
    pub const MAX: f32 = 5.0;
    /// Minimum zoom level
    pub const MIN: f32 = 0.2;
    /// Zoom floor used when dividing by the current zoom
    pub const DIVISOR_FLOOR: f32 = 0.1;
}

/// Geometry validation thresholds (image pixels unless noted).
pub mod geometry {
    /// Minimum width/height for a freshly drawn box; smaller drafts are discarded
    pub const MIN_DRAW_SIZE: f32 = 5.0;
    /// Minimum width/height enforced while resizing an existing box
    pub const MIN_RESIZE_SIZE: f32 = 10.0;
    /// Handle hit radius in canvas pixels, divided by zoom before hit testing
    pub const HANDLE_HIT_RADIUS: f32 = 8.0;
    /// Minimum pointer travel before a handle press becomes a drag
    pub const MIN_DRAG_DISTANCE: f32 = 3.0;
}

/// Lock timing constants.
pub mod lock {
    /// Seconds between heartbeat refreshes for a held lock
    pub const HEARTBEAT_INTERVAL_SECS: u64 = 30;
    /// Seconds without a heartbeat after which a lock is considered stale
    pub const STALE_AFTER_SECS: i64 = 90;
}

/// Class color generation constants.
pub mod color {
    /// Golden angle for class color generation (degrees)
    pub const GOLDEN_ANGLE: f32 = 137.5;
    /// Saturation for generated class colors
    pub const SATURATION: f32 = 0.8;
    /// Value for generated class colors
    pub const VALUE: f32 = 0.9;
}

/// Overlay styling constants.
pub mod overlay {
    /// Stroke width for confirmed/draft box outlines (canvas pixels)
    pub const STROKE_WIDTH: f32 = 2.0;
    /// Stroke width for the selected box outline
    pub const SELECTED_STROKE_WIDTH: f32 = 3.0;
    /// Side length of a resize handle square (canvas pixels)
    pub const HANDLE_SIZE: f32 = 8.0;
    /// Alpha for in-progress draw previews
    pub const PREVIEW_ALPHA: f32 = 0.5;
    /// Alpha for annotations in their normal state
    pub const DEFAULT_ALPHA: f32 = 0.9;

    /// Outline color for selected annotations
    pub const SELECTED_COLOR: [f32; 4] = [1.0, 0.85, 0.2, 1.0];
    /// Fill color for resize handles
    pub const HANDLE_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 1.0];
    /// Badge color for no-object markers
    pub const NO_OBJECT_COLOR: [f32; 4] = [0.7, 0.7, 0.7, 1.0];
}
