//! Capture resolution negotiation.
//!
//! Encode cost and transport size grow with pixel count, so the capture
//! surface is capped to a maximum width.  Height and density follow the same
//! ratio so the aspect ratio and physical scale are preserved.

use serde::{Deserialize, Serialize};

/// Default maximum capture width in pixels.
pub const DEFAULT_MAX_WIDTH: u32 = 600;

/// Physical characteristics of the device display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayMetrics {
    pub width: u32,
    pub height: u32,
    /// Dots per inch as reported by the platform (e.g. 420 for xxhdpi).
    pub density_dpi: u32,
}

/// Resolution the virtual display is created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputResolution {
    pub width: u32,
    pub height: u32,
    pub density_dpi: u32,
}

impl From<DisplayMetrics> for OutputResolution {
    fn from(m: DisplayMetrics) -> Self {
        Self {
            width: m.width,
            height: m.height,
            density_dpi: m.density_dpi,
        }
    }
}

/// Scales `metrics` down so the width does not exceed `max_width`.
///
/// Displays already narrower than the budget are returned unchanged.
/// Scaled values are truncated, never rounded.
///
/// ```rust
/// use tortoise_core::{negotiate_resolution, DisplayMetrics};
///
/// let phone = DisplayMetrics { width: 1080, height: 2400, density_dpi: 420 };
/// let out = negotiate_resolution(phone, 600);
/// assert_eq!((out.width, out.height, out.density_dpi), (600, 1333, 233));
/// ```
pub fn negotiate_resolution(metrics: DisplayMetrics, max_width: u32) -> OutputResolution {
    if metrics.width <= max_width {
        return metrics.into();
    }

    // u64 intermediates: 4K heights times large budgets overflow u32.
    let scale = |value: u32| -> u32 {
        (u64::from(value) * u64::from(max_width) / u64::from(metrics.width)) as u32
    };

    OutputResolution {
        width: max_width,
        height: scale(metrics.height),
        density_dpi: scale(metrics.density_dpi),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wide_display_is_scaled_to_budget_with_truncation() {
        // Arrange
        let metrics = DisplayMetrics { width: 1080, height: 2400, density_dpi: 420 };

        // Act
        let out = negotiate_resolution(metrics, 600);

        // Assert: 600×2400/1080 = 1333.3, 420×600/1080 = 233.3
        assert_eq!(out, OutputResolution { width: 600, height: 1333, density_dpi: 233 });
    }

    #[test]
    fn test_narrow_display_is_unchanged() {
        let metrics = DisplayMetrics { width: 400, height: 800, density_dpi: 160 };
        let out = negotiate_resolution(metrics, 600);
        assert_eq!(out, OutputResolution { width: 400, height: 800, density_dpi: 160 });
    }

    #[test]
    fn test_display_exactly_at_budget_is_unchanged() {
        let metrics = DisplayMetrics { width: 600, height: 1000, density_dpi: 240 };
        let out = negotiate_resolution(metrics, DEFAULT_MAX_WIDTH);
        assert_eq!(out.width, 600);
        assert_eq!(out.height, 1000);
    }

    #[test]
    fn test_large_values_do_not_overflow() {
        let metrics = DisplayMetrics { width: 7680, height: 4_320_000, density_dpi: 640 };
        let out = negotiate_resolution(metrics, 3840);
        assert_eq!(out.height, 2_160_000);
        assert_eq!(out.density_dpi, 320);
    }
}
