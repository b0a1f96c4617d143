//! TOML-based configuration for the device.
//!
//! Reads and writes `AppConfig` from the platform-appropriate config file:
//! - Windows:  `%APPDATA%\TortoiseShare\config.toml`
//! - Linux:    `~/.config/tortoiseshare/config.toml` (or `$XDG_CONFIG_HOME`)
//! - macOS:    `~/Library/Application Support/TortoiseShare/config.toml`
//!
//! Every field has a serde default, so an empty file, a missing file, or a
//! file from an older version without newer fields all load cleanly:
//!
//! ```toml
//! [capture]
//! max_width = 600
//! jpeg_quality = 80
//! buffer_slots = 2
//! sink_capacity = 4
//!
//! [gestures]
//! tap_duration_ms = 50
//! swipe_duration_ms = 300
//!
//! [logging]
//! level = "info"
//! ```
//!
//! Values are checked by [`AppConfig::validate`] after loading; serde only
//! checks types.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tortoise_core::domain::gesture::{SWIPE_DURATION_MS, TAP_DURATION_MS};
use tortoise_core::domain::resolution::DEFAULT_MAX_WIDTH;

use crate::application::capture_session::CaptureSettings;
use crate::application::inject_gestures::GestureTimings;
use crate::infrastructure::encoder::DEFAULT_JPEG_QUALITY;
use crate::infrastructure::frame_source::synthetic::DEFAULT_BUFFER_SLOTS;

/// Error type for configuration file operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The platform config directory could not be determined.
    #[error("could not determine platform config directory")]
    NoPlatformConfigDir,

    #[error("I/O error accessing config at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// A value parsed but is outside its allowed range.
    #[error("invalid config value: {0}")]
    Invalid(String),
}

// ── Config schema types ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub capture: CaptureConfig,
    #[serde(default)]
    pub gestures: GestureConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Width budget for the virtual display, in pixels.
    #[serde(default = "default_max_width")]
    pub max_width: u32,
    /// JPEG quality, 1..=100.
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    /// Buffers in the frame source's pool.
    #[serde(default = "default_buffer_slots")]
    pub buffer_slots: usize,
    /// Images buffered per viewer before a slow viewer starts lagging.
    #[serde(default = "default_sink_capacity")]
    pub sink_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GestureConfig {
    #[serde(default = "default_tap_duration_ms")]
    pub tap_duration_ms: u64,
    #[serde(default = "default_swipe_duration_ms")]
    pub swipe_duration_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info"` or `"tortoise_device=debug"`.
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ── Default helpers ───────────────────────────────────────────────────────────

fn default_max_width() -> u32 {
    DEFAULT_MAX_WIDTH
}
fn default_jpeg_quality() -> u8 {
    DEFAULT_JPEG_QUALITY
}
fn default_buffer_slots() -> usize {
    DEFAULT_BUFFER_SLOTS
}
fn default_sink_capacity() -> usize {
    4
}
fn default_tap_duration_ms() -> u64 {
    TAP_DURATION_MS
}
fn default_swipe_duration_ms() -> u64 {
    SWIPE_DURATION_MS
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            max_width: default_max_width(),
            jpeg_quality: default_jpeg_quality(),
            buffer_slots: default_buffer_slots(),
            sink_capacity: default_sink_capacity(),
        }
    }
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            tap_duration_ms: default_tap_duration_ms(),
            swipe_duration_ms: default_swipe_duration_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: default_log_level() }
    }
}

impl AppConfig {
    /// Checks value ranges that the type system cannot express.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let c = &self.capture;
        if c.max_width == 0 {
            return Err(ConfigError::Invalid("capture.max_width must be positive".into()));
        }
        if !(1..=100).contains(&c.jpeg_quality) {
            return Err(ConfigError::Invalid(format!(
                "capture.jpeg_quality must be within 1..=100, got {}",
                c.jpeg_quality
            )));
        }
        if c.buffer_slots == 0 {
            return Err(ConfigError::Invalid("capture.buffer_slots must be positive".into()));
        }
        if c.sink_capacity == 0 {
            return Err(ConfigError::Invalid("capture.sink_capacity must be positive".into()));
        }
        if self.gestures.tap_duration_ms == 0 || self.gestures.swipe_duration_ms == 0 {
            return Err(ConfigError::Invalid("gesture durations must be positive".into()));
        }
        Ok(())
    }

    pub fn capture_settings(&self) -> CaptureSettings {
        CaptureSettings {
            default_max_width: self.capture.max_width,
            sink_capacity: self.capture.sink_capacity,
        }
    }

    pub fn gesture_timings(&self) -> GestureTimings {
        GestureTimings {
            tap: Duration::from_millis(self.gestures.tap_duration_ms),
            swipe: Duration::from_millis(self.gestures.swipe_duration_ms),
        }
    }
}

// ── Config repository ─────────────────────────────────────────────────────────

/// Resolves the full path to the platform config file.
///
/// # Errors
///
/// Returns [`ConfigError::NoPlatformConfigDir`] if the base directory cannot be
/// determined.
pub fn config_file_path() -> Result<PathBuf, ConfigError> {
    platform_config_dir()
        .map(|dir| dir.join("config.toml"))
        .ok_or(ConfigError::NoPlatformConfigDir)
}

/// Loads `AppConfig` from the platform config file.
///
/// # Errors
///
/// See [`load_config_from`].
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from(&config_file_path()?)
}

/// Loads and validates `AppConfig` from `path`, returning the defaults if the
/// file does not exist.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system errors other than "not found",
/// [`ConfigError::Parse`] if the TOML is malformed, and
/// [`ConfigError::Invalid`] if a value is out of range.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    let cfg = match std::fs::read_to_string(path) {
        Ok(content) => toml::from_str::<AppConfig>(&content)?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(source) => {
            return Err(ConfigError::Io { path: path.to_path_buf(), source });
        }
    };
    cfg.validate()?;
    Ok(cfg)
}

/// Persists `config` to `path`, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] for file-system failures or
/// [`ConfigError::Serialize`] if serialization fails.
pub fn save_config_to(config: &AppConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir).map_err(|source| ConfigError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
    }

    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn platform_config_dir() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        std::env::var_os("APPDATA").map(|p| PathBuf::from(p).join("TortoiseShare"))
    }

    #[cfg(target_os = "linux")]
    {
        let base = std::env::var_os("XDG_CONFIG_HOME")
            .map(PathBuf::from)
            .or_else(|| std::env::var_os("HOME").map(|h| PathBuf::from(h).join(".config")))?;
        Some(base.join("tortoiseshare"))
    }

    #[cfg(target_os = "macos")]
    {
        std::env::var_os("HOME").map(|h| {
            PathBuf::from(h)
                .join("Library")
                .join("Application Support")
                .join("TortoiseShare")
        })
    }

    #[cfg(not(any(target_os = "windows", target_os = "linux", target_os = "macos")))]
    {
        None
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
