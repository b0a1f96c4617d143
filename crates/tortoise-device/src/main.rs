//! TortoiseShare device demo: entry point.
//!
//! Runs the capture relay against a synthetic screen and a logging gesture
//! dispatcher, driven by JSON control commands on stdin.  One JSON result is
//! written to stdout per command line.
//!
//! # Usage
//!
//! ```text
//! tortoise-share [OPTIONS]
//!
//! Options:
//!   --config <PATH>        Config file [default: platform config dir]
//!   --max-width <PX>       Width budget, overrides capture.max_width
//!   --quality <1-100>      JPEG quality, overrides capture.jpeg_quality
//!   --fps <N>              Synthetic frame rate [default: 30]
//!   --display <WxH@DPI>    Simulated panel [default: 1080x2400@420]
//!   --format <FORMAT>      Synthetic pixel layout: rgba, rgbx, bgra [default: rgba]
//! ```
//!
//! ```text
//! $ echo '{"method":"startScreenShare"}' | tortoise-share
//! {"success":true,"data":{"width":600,"height":1333,"density_dpi":233},"error":null}
//! ```
//!
//! # Environment variable overrides
//!
//! | Variable              | Flag           |
//! |-----------------------|----------------|
//! | `TORTOISE_CONFIG`     | `--config`     |
//! | `TORTOISE_MAX_WIDTH`  | `--max-width`  |
//! | `TORTOISE_QUALITY`    | `--quality`    |
//! | `TORTOISE_FPS`        | `--fps`        |
//! | `TORTOISE_DISPLAY`    | `--display`    |
//! | `TORTOISE_FORMAT`     | `--format`     |
//!
//! `RUST_LOG` takes precedence over `logging.level` from the config file.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tortoise_core::{DisplayMetrics, PixelFormat};
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use tortoise_device::application::capture_session::CaptureService;
use tortoise_device::infrastructure::display_info::{parse_display_metrics, FixedDisplayProbe};
use tortoise_device::infrastructure::encoder::JpegFrameEncoder;
use tortoise_device::infrastructure::frame_source::SyntheticProjector;
use tortoise_device::infrastructure::gesture_dispatch::{AccessibilityBinding, TracingDispatcher};
use tortoise_device::infrastructure::storage::config::{load_config, load_config_from, AppConfig, ConfigError};
use tortoise_device::infrastructure::ui_bridge::{handle_json, DeviceAppState};

// ── CLI argument definitions ──────────────────────────────────────────────────

#[derive(Debug, Parser)]
#[command(
    name = "tortoise-share",
    about = "TortoiseShare device: screen capture relay and gesture injection",
    version
)]
struct Cli {
    /// Path to the TOML config file.  Missing files fall back to defaults.
    #[arg(long, env = "TORTOISE_CONFIG")]
    config: Option<PathBuf>,

    /// Maximum capture width in pixels.
    #[arg(long, env = "TORTOISE_MAX_WIDTH")]
    max_width: Option<u32>,

    /// JPEG quality (1-100).
    #[arg(long, env = "TORTOISE_QUALITY", value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: Option<u8>,

    /// Frames per second produced by the synthetic screen.
    #[arg(long, default_value_t = 30, env = "TORTOISE_FPS", value_parser = clap::value_parser!(u32).range(1..=240))]
    fps: u32,

    /// Simulated physical display as WIDTHxHEIGHT@DPI.
    #[arg(long, default_value = "1080x2400@420", env = "TORTOISE_DISPLAY", value_parser = parse_display_metrics)]
    display: DisplayMetrics,

    /// Pixel layout of the synthetic frames.
    #[arg(long, value_enum, default_value_t = FormatArg::Rgba, env = "TORTOISE_FORMAT")]
    format: FormatArg,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    Rgba,
    Rgbx,
    Bgra,
}

impl From<FormatArg> for PixelFormat {
    fn from(arg: FormatArg) -> Self {
        match arg {
            FormatArg::Rgba => PixelFormat::Rgba8888,
            FormatArg::Rgbx => PixelFormat::Rgbx8888,
            FormatArg::Bgra => PixelFormat::Bgra8888,
        }
    }
}

impl Cli {
    /// Loads the config file and applies the CLI overrides on top.
    fn resolve_config(&self) -> anyhow::Result<AppConfig> {
        let mut cfg = match &self.config {
            Some(path) => load_config_from(path)
                .with_context(|| format!("failed to load config from {}", path.display()))?,
            None => match load_config() {
                Err(ConfigError::NoPlatformConfigDir) => AppConfig::default(),
                other => other.context("failed to load config")?,
            },
        };
        if let Some(max_width) = self.max_width {
            cfg.capture.max_width = max_width;
        }
        if let Some(quality) = self.quality {
            cfg.capture.jpeg_quality = quality;
        }
        cfg.validate()?;
        Ok(cfg)
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let cfg = cli.resolve_config()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&cfg.logging.level)),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(
        display = ?cli.display,
        max_width = cfg.capture.max_width,
        quality = cfg.capture.jpeg_quality,
        fps = cli.fps,
        format = ?cli.format,
        "TortoiseShare device starting"
    );

    let projector = SyntheticProjector::new(cfg.capture.buffer_slots)
        .with_fps(cli.fps)
        .with_format(cli.format.into());
    let capture = CaptureService::new(
        Arc::new(FixedDisplayProbe::new(cli.display)),
        Arc::new(projector),
        Arc::new(JpegFrameEncoder::new(cfg.capture.jpeg_quality)),
        cfg.capture_settings(),
    );
    let accessibility = AccessibilityBinding::new(Arc::new(TracingDispatcher), cfg.gesture_timings());
    let state = DeviceAppState::new(capture, accessibility);
    state.accessibility.on_service_connected();

    let viewer = tokio::spawn(log_viewer(Arc::clone(&state)));

    // ── Command loop ──────────────────────────────────────────────────────────
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    info!("stdin closed");
                    break;
                };
                if line.trim().is_empty() {
                    continue;
                }
                let result = handle_json(Arc::clone(&state), &line).await;
                let mut out = serde_json::to_vec(&result)?;
                out.push(b'\n');
                stdout.write_all(&out).await?;
                stdout.flush().await?;
            }
            signal = tokio::signal::ctrl_c() => {
                match signal {
                    Ok(()) => info!("received Ctrl+C, shutting down"),
                    Err(e) => warn!("failed to listen for Ctrl+C: {e}"),
                }
                break;
            }
        }
    }

    state.capture.stop().await?;
    state.accessibility.on_destroy();
    viewer.abort();
    info!("TortoiseShare device stopped");
    Ok(())
}

/// Stands in for a remote viewer: logs every image at `debug` and a one-line
/// summary each second at `info`.
async fn log_viewer(state: Arc<DeviceAppState>) {
    let mut images = state.capture.subscribe();
    let mut tick = tokio::time::interval(Duration::from_secs(1));
    let (mut count, mut bytes) = (0u64, 0usize);

    loop {
        tokio::select! {
            received = images.recv() => match received {
                Ok(image) => {
                    debug!(sequence = image.sequence, bytes = image.len(), "image received");
                    count += 1;
                    bytes += image.len();
                }
                Err(RecvError::Lagged(skipped)) => debug!(skipped, "viewer lagged"),
                Err(RecvError::Closed) => break,
            },
            _ = tick.tick() => {
                if count > 0 {
                    let frames = state.capture.status().frames;
                    info!(
                        images = count,
                        kib = bytes / 1024,
                        dropped = frames.dropped,
                        failed = frames.failed,
                        "last second"
                    );
                }
                count = 0;
                bytes = 0;
            }
        }
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_defaults() {
        // Arrange / Act
        let cli = Cli::parse_from(["tortoise-share"]);

        // Assert
        assert_eq!(cli.fps, 30);
        assert_eq!(cli.display, DisplayMetrics { width: 1080, height: 2400, density_dpi: 420 });
        assert!(cli.max_width.is_none());
        assert_eq!(PixelFormat::from(cli.format), PixelFormat::Rgba8888);
    }

    #[test]
    fn test_cli_selects_bgra_format() {
        let cli = Cli::parse_from(["tortoise-share", "--format", "bgra"]);
        assert_eq!(PixelFormat::from(cli.format), PixelFormat::Bgra8888);
    }

    #[test]
    fn test_cli_overrides_apply_on_top_of_config() {
        let dir = std::env::temp_dir().join(format!("tortoise_cli_{}", uuid::Uuid::new_v4()));
        let path = dir.join("config.toml");
        let cli = Cli::parse_from([
            "tortoise-share",
            "--config",
            path.to_str().unwrap(),
            "--max-width",
            "720",
            "--quality",
            "55",
        ]);

        let cfg = cli.resolve_config().unwrap();

        assert_eq!(cfg.capture.max_width, 720);
        assert_eq!(cfg.capture.jpeg_quality, 55);
    }

    #[test]
    fn test_cli_rejects_out_of_range_quality() {
        assert!(Cli::try_parse_from(["tortoise-share", "--quality", "0"]).is_err());
    }

    #[test]
    fn test_cli_rejects_malformed_display() {
        assert!(Cli::try_parse_from(["tortoise-share", "--display", "1080x2400"]).is_err());
    }
}
