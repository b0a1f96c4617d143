//! Command bridge between the host app and the device services.
//!
//! The host app calls into the device with the method names of its platform
//! channel (`startScreenShare`, `performClick`, ...).  Each call maps to one
//! async function here, and every function returns a [`CommandResult`]
//! envelope so the caller has a single error path:
//!
//! ```text
//! host app                         bridge                      services
//! ─────────────────────────────────────────────────────────────────────────
//! {"method":"startScreenShare"} ─► start_screen_share() ─► CaptureService
//! {"method":"performClick",..}  ─► perform_click()      ─► InputInjector
//!                               ◄─ { "success": true, "data": ..., "error": null }
//! ```
//!
//! [`handle_command`] does the dispatch for a parsed [`ControlCommand`] and
//! erases the payload type to JSON, which is what line-oriented transports
//! (the demo binary's stdin loop) need.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tortoise_core::{CaptureStatusDto, CommandResult, ControlCommand, GestureCommand, OutputResolution};
use tracing::debug;

use crate::application::capture_session::CaptureService;
use crate::application::inject_gestures::{InjectionError, InputInjector};
use crate::infrastructure::gesture_dispatch::AccessibilityBinding;

// ── Shared state ──────────────────────────────────────────────────────────────

/// Services reachable from the bridge.
pub struct DeviceAppState {
    pub capture: CaptureService,
    pub accessibility: AccessibilityBinding,
}

impl DeviceAppState {
    pub fn new(capture: CaptureService, accessibility: AccessibilityBinding) -> Arc<Self> {
        Arc::new(Self { capture, accessibility })
    }

    fn injector(&self) -> Result<InputInjector, InjectionError> {
        self.accessibility
            .injector()
            .ok_or(InjectionError::ServiceUnavailable)
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

/// Starts mirroring and returns the negotiated resolution.
pub async fn start_screen_share(
    state: Arc<DeviceAppState>,
    max_width: Option<u32>,
) -> CommandResult<OutputResolution> {
    match state.capture.start(max_width).await {
        Ok(resolution) => CommandResult::ok(resolution),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// Stops mirroring.  `data` is `false` when nothing was running.
pub async fn stop_screen_share(state: Arc<DeviceAppState>) -> CommandResult<bool> {
    match state.capture.stop().await {
        Ok(stopped) => CommandResult::ok(stopped),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

pub async fn perform_click(state: Arc<DeviceAppState>, x: f32, y: f32) -> CommandResult<()> {
    match state.injector().and_then(|i| i.tap(x, y)) {
        Ok(()) => CommandResult::ok(()),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

/// One swipe.  Without `duration_ms` the configured swipe duration applies.
pub async fn perform_swipe(
    state: Arc<DeviceAppState>,
    (x1, y1): (f32, f32),
    (x2, y2): (f32, f32),
    duration_ms: Option<u32>,
) -> CommandResult<()> {
    let result = state.injector().and_then(|injector| match duration_ms {
        Some(duration_ms) => {
            injector.execute(GestureCommand::Swipe { x1, y1, x2, y2, duration_ms })
        }
        None => injector.swipe(x1, y1, x2, y2),
    });
    match result {
        Ok(()) => CommandResult::ok(()),
        Err(e) => CommandResult::err(e.to_string()),
    }
}

pub async fn get_capture_status(state: Arc<DeviceAppState>) -> CommandResult<CaptureStatusDto> {
    CommandResult::ok(state.capture.status())
}

/// Runs one parsed command and returns its result with a JSON payload.
pub async fn handle_command(state: Arc<DeviceAppState>, command: ControlCommand) -> CommandResult<Value> {
    debug!(method = command.method(), "control command");
    match command {
        ControlCommand::StartScreenShare { max_width } => {
            into_json(start_screen_share(state, max_width).await)
        }
        ControlCommand::StopScreenShare => into_json(stop_screen_share(state).await),
        ControlCommand::PerformClick { x, y } => into_json(perform_click(state, x, y).await),
        ControlCommand::PerformSwipe { x1, y1, x2, y2, duration_ms } => {
            into_json(perform_swipe(state, (x1, y1), (x2, y2), duration_ms).await)
        }
        ControlCommand::GetCaptureStatus => into_json(get_capture_status(state).await),
    }
}

/// Parses one JSON command line and runs it.  Malformed input yields an error
/// envelope instead of an `Err`.
pub async fn handle_json(state: Arc<DeviceAppState>, line: &str) -> CommandResult<Value> {
    match serde_json::from_str::<ControlCommand>(line) {
        Ok(command) => handle_command(state, command).await,
        Err(e) => CommandResult::err(format!("invalid command: {e}")),
    }
}

fn into_json<T: Serialize>(result: CommandResult<T>) -> CommandResult<Value> {
    match result.data {
        Some(data) if result.success => match serde_json::to_value(data) {
            Ok(value) => CommandResult::ok(value),
            Err(e) => CommandResult::err(format!("failed to serialize result: {e}")),
        },
        _ => CommandResult {
            success: result.success,
            data: None,
            error: result.error,
        },
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
