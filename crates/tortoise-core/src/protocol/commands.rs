//! JSON control commands accepted from the host bridge.
//!
//! # JSON discriminant
//!
//! Every command is a JSON object with a `"method"` field naming the call,
//! the same method names the host app uses on its platform channel.  Argument
//! fields sit next to it in camelCase:
//!
//! ```json
//! {"method":"startScreenShare","maxWidth":720}
//! {"method":"stopScreenShare"}
//! {"method":"performClick","x":100.5,"y":200.5}
//! {"method":"performSwipe","x1":500,"y1":1500,"x2":500,"y2":400}
//! {"method":"getCaptureStatus"}
//! ```
//!
//! Every reply is a [`CommandResult`] envelope so the caller has one error
//! path for all methods:
//!
//! ```json
//! { "success": true,  "data": {...}, "error": null }
//! { "success": false, "data": null,  "error": "capture session already active" }
//! ```

use serde::{Deserialize, Serialize};

use crate::domain::resolution::OutputResolution;
use crate::domain::session::{CaptureState, FrameCounters};

/// Every command the control surface understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ControlCommand {
    /// Begin mirroring.  `max_width` overrides the configured width budget.
    StartScreenShare {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_width: Option<u32>,
    },
    /// End mirroring.  A no-op when nothing is being captured.
    StopScreenShare,
    /// One tap at screen coordinates.
    PerformClick { x: f32, y: f32 },
    /// One straight swipe.  `duration_ms` overrides the configured duration.
    PerformSwipe {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        duration_ms: Option<u32>,
    },
    /// Snapshot of the capture session.
    GetCaptureStatus,
}

impl ControlCommand {
    /// The method name as it appears on the wire.
    pub fn method(&self) -> &'static str {
        match self {
            Self::StartScreenShare { .. } => "startScreenShare",
            Self::StopScreenShare => "stopScreenShare",
            Self::PerformClick { .. } => "performClick",
            Self::PerformSwipe { .. } => "performSwipe",
            Self::GetCaptureStatus => "getCaptureStatus",
        }
    }
}

/// Unified reply envelope for control commands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandResult<T> {
    /// `true` if the command completed successfully.
    pub success: bool,
    /// The command's return value, present only on success.
    pub data: Option<T>,
    /// Human-readable error, present only on failure.
    pub error: Option<String>,
}

impl<T> CommandResult<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

/// Snapshot returned by `getCaptureStatus`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureStatusDto {
    pub state: CaptureState,
    /// Identifier of the current session, if one is active.
    pub session_id: Option<String>,
    /// Negotiated capture resolution of the current session.
    pub resolution: Option<OutputResolution>,
    /// Counters of the current session (all zero when idle).
    pub frames: FrameCounters,
    /// Number of viewers currently subscribed to the image stream.
    pub viewers: usize,
}
