//! Display metrics providers.
//!
//! On a device the metrics come from the window manager.  Here they are fixed
//! at construction time, either from a preset or from a `WxH@DPI` string given
//! on the command line.
//!
//! # Usage example
//!
//! ```ignore
//! let probe = FixedDisplayProbe::phone_1080x2400();
//! let metrics = probe.display_metrics()?;
//! assert_eq!(metrics.density_dpi, 420);
//! ```

use tortoise_core::DisplayMetrics;

use crate::application::capture_session::{CaptureError, DisplayProbe};

/// A display probe returning the metrics it was built with.
///
/// `metrics: None` models a device with no default display, which makes
/// every session start fail with [`CaptureError::Display`].
#[derive(Debug, Clone)]
pub struct FixedDisplayProbe {
    pub metrics: Option<DisplayMetrics>,
}

impl FixedDisplayProbe {
    pub fn new(metrics: DisplayMetrics) -> Self {
        Self { metrics: Some(metrics) }
    }

    /// A common 20:9 phone panel at xxhdpi.
    pub fn phone_1080x2400() -> Self {
        Self::new(DisplayMetrics { width: 1080, height: 2400, density_dpi: 420 })
    }

    pub fn disconnected() -> Self {
        Self { metrics: None }
    }
}

impl DisplayProbe for FixedDisplayProbe {
    fn display_metrics(&self) -> Result<DisplayMetrics, CaptureError> {
        self.metrics
            .ok_or_else(|| CaptureError::Display("no default display".into()))
    }
}

/// Parses `WIDTHxHEIGHT@DPI`, e.g. `1080x2400@420`.
///
/// # Errors
///
/// Returns a message naming the malformed part.
pub fn parse_display_metrics(s: &str) -> Result<DisplayMetrics, String> {
    let (size, dpi) = s
        .split_once('@')
        .ok_or_else(|| format!("expected WIDTHxHEIGHT@DPI, got '{s}'"))?;
    let (width, height) = size
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT before '@', got '{size}'"))?;

    let parse = |field: &str, name: &str| -> Result<u32, String> {
        match field.trim().parse::<u32>() {
            Ok(0) => Err(format!("{name} must be positive")),
            Ok(v) => Ok(v),
            Err(e) => Err(format!("invalid {name} '{field}': {e}")),
        }
    };

    Ok(DisplayMetrics {
        width: parse(width, "width")?,
        height: parse(height, "height")?,
        density_dpi: parse(dpi, "density")?,
    })
}

// ── Tests ─────────────────────────────────────────────────────────────────────
