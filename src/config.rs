//! Engine configuration support.
//!
//! This module provides serialization and deserialization of engine tunables,
//! allowing hosts to export and import their configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants;

/// Log level setting for the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Show only errors
    Error,
    /// Show errors and warnings
    Warn,
    /// Show errors, warnings, and info messages
    #[default]
    Info,
    /// Show debug-level logging
    Debug,
    /// Show all log messages including trace
    Trace,
}

impl LogLevel {
    /// Get the display name for this log level.
    pub fn name(&self) -> &'static str {
        match self {
            LogLevel::Error => "Error",
            LogLevel::Warn => "Warn",
            LogLevel::Info => "Info",
            LogLevel::Debug => "Debug",
            LogLevel::Trace => "Trace",
        }
    }

    /// Convert to log crate's LevelFilter.
    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

/// Current configuration format version.
/// Increment this when making breaking changes to the config format.
pub const CONFIG_VERSION: u32 = 1;

/// Engine configuration that can be exported and imported by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Version of the configuration format
    pub version: u32,

    /// Zoom limits and step size
    #[serde(default)]
    pub zoom: ZoomConfig,

    /// Geometry validation thresholds
    #[serde(default)]
    pub geometry: GeometryConfig,

    /// Lock heartbeat timing
    #[serde(default)]
    pub lock: LockConfig,

    /// Jump to the next unfinished image after a single-image confirm
    #[serde(default = "default_advance_on_confirm")]
    pub advance_on_confirm: bool,

    /// Log verbosity level
    #[serde(default)]
    pub log_level: LogLevel,
}

fn default_advance_on_confirm() -> bool {
    true
}

/// Zoom section of the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ZoomConfig {
    /// Minimum zoom level
    #[serde(default = "default_zoom_min")]
    pub min: f32,

    /// Maximum zoom level
    #[serde(default = "default_zoom_max")]
    pub max: f32,

    /// Zoom delta applied per zoom command
    #[serde(default = "default_zoom_step")]
    pub step: f32,
}

fn default_zoom_min() -> f32 {
    constants::zoom::MIN
}

fn default_zoom_max() -> f32 {
    constants::zoom::MAX
}

fn default_zoom_step() -> f32 {
    constants::zoom::STEP
}

impl Default for ZoomConfig {
    fn default() -> Self {
        Self {
            min: default_zoom_min(),
            max: default_zoom_max(),
            step: default_zoom_step(),
        }
    }
}

/// Geometry threshold section of the config (image pixels unless noted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Minimum width/height for a freshly drawn box
    #[serde(default = "default_min_draw_size")]
    pub min_draw_size: f32,

    /// Minimum width/height enforced while resizing
    #[serde(default = "default_min_resize_size")]
    pub min_resize_size: f32,

    /// Handle hit radius in canvas pixels
    #[serde(default = "default_handle_hit_radius")]
    pub handle_hit_radius: f32,

    /// Pointer travel before a handle press becomes a drag
    #[serde(default = "default_min_drag_distance")]
    pub min_drag_distance: f32,
}

fn default_min_draw_size() -> f32 {
    constants::geometry::MIN_DRAW_SIZE
}

fn default_min_resize_size() -> f32 {
    constants::geometry::MIN_RESIZE_SIZE
}

fn default_handle_hit_radius() -> f32 {
    constants::geometry::HANDLE_HIT_RADIUS
}

fn default_min_drag_distance() -> f32 {
    constants::geometry::MIN_DRAG_DISTANCE
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            min_draw_size: default_min_draw_size(),
            min_resize_size: default_min_resize_size(),
            handle_hit_radius: default_handle_hit_radius(),
            min_drag_distance: default_min_drag_distance(),
        }
    }
}

/// Lock timing section of the config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockConfig {
    /// Seconds between heartbeat refreshes for a held lock
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_secs: u64,

    /// Seconds without a heartbeat after which a lock is considered stale
    #[serde(default = "default_stale_after")]
    pub stale_after_secs: i64,
}

fn default_heartbeat_interval() -> u64 {
    constants::lock::HEARTBEAT_INTERVAL_SECS
}

fn default_stale_after() -> i64 {
    constants::lock::STALE_AFTER_SECS
}

impl LockConfig {
    /// Heartbeat interval as a [`Duration`] for the refresh task.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_secs)
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval(),
            stale_after_secs: default_stale_after(),
        }
    }
}

impl EngineConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self {
            version: CONFIG_VERSION,
            zoom: ZoomConfig::default(),
            geometry: GeometryConfig::default(),
            lock: LockConfig::default(),
            advance_on_confirm: default_advance_on_confirm(),
            log_level: LogLevel::default(),
        }
    }

    /// Serialize the configuration to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Deserialize configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;

        // Validate version compatibility
        if config.version > CONFIG_VERSION {
            return Err(ConfigError::VersionTooNew {
                file_version: config.version,
                supported_version: CONFIG_VERSION,
            });
        }

        Ok(config)
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// JSON parsing error
    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),

    /// Configuration version is newer than supported
    #[error(
        "Configuration file version {file_version} is newer than supported version {supported_version}"
    )]
    VersionTooNew {
        /// Version found in the file
        file_version: u32,
        /// Newest version this build understands
        supported_version: u32,
    },
}
