//! InputInjector: turns remote tap and swipe commands into OS gestures.
//!
//! The injector has no queue and no busy gate.  Each call builds one
//! [`Gesture`] and hands it to the [`GestureDispatcher`], which returns as soon
//! as the OS has accepted it.  Nothing waits for the gesture to play out.
//!
//! Handles are issued by [`AccessibilityBinding`] when the accessibility
//! service connects.  When the service goes away every handle issued for it
//! is invalidated and further calls fail with
//! [`InjectionError::ServiceUnavailable`].
//!
//! [`AccessibilityBinding`]: crate::infrastructure::gesture_dispatch::AccessibilityBinding

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tortoise_core::domain::gesture::{SWIPE_DURATION_MS, TAP_DURATION_MS};
use tortoise_core::{Gesture, GestureCommand, Point};
use tracing::{trace, warn};

/// Error type for gesture injection.
#[derive(Debug, Error)]
pub enum InjectionError {
    #[error("accessibility service is not connected")]
    ServiceUnavailable,
    #[error("invalid coordinate ({x}, {y})")]
    InvalidCoordinate { x: f32, y: f32 },
    #[error("platform error: {0}")]
    Platform(String),
}

/// The OS gesture-dispatch primitive.
pub trait GestureDispatcher: Send + Sync {
    /// Submits `gesture` for playback.  Returns once the OS accepted it.
    fn dispatch(&self, gesture: Gesture) -> Result<(), InjectionError>;
}

/// Stroke durations used for commands that do not carry their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureTimings {
    pub tap: Duration,
    pub swipe: Duration,
}

impl Default for GestureTimings {
    fn default() -> Self {
        Self {
            tap: Duration::from_millis(TAP_DURATION_MS),
            swipe: Duration::from_millis(SWIPE_DURATION_MS),
        }
    }
}

/// Builds the dispatchable gesture for `command`.
///
/// A swipe with `duration_ms == 0` falls back to `timings.swipe`.
///
/// # Errors
///
/// [`InjectionError::InvalidCoordinate`] for NaN or infinite coordinates.
pub fn build_gesture(command: &GestureCommand, timings: GestureTimings) -> Result<Gesture, InjectionError> {
    match *command {
        GestureCommand::Tap { x, y } => Ok(Gesture::tap(checked(x, y)?, timings.tap)),
        GestureCommand::Swipe { x1, y1, x2, y2, duration_ms } => {
            let duration = match duration_ms {
                0 => timings.swipe,
                ms => Duration::from_millis(u64::from(ms)),
            };
            Ok(Gesture::line(checked(x1, y1)?, checked(x2, y2)?, duration))
        }
    }
}

fn checked(x: f32, y: f32) -> Result<Point, InjectionError> {
    let point = Point::new(x, y);
    if point.is_finite() {
        Ok(point)
    } else {
        Err(InjectionError::InvalidCoordinate { x, y })
    }
}

/// Handle for issuing synthetic touches while the service is connected.
#[derive(Clone)]
pub struct InputInjector {
    dispatcher: Arc<dyn GestureDispatcher>,
    live: Arc<AtomicBool>,
    timings: GestureTimings,
}

impl InputInjector {
    /// Creates a live handle.  Usually called through the accessibility
    /// binding rather than directly.
    pub fn new(dispatcher: Arc<dyn GestureDispatcher>, timings: GestureTimings) -> Self {
        Self {
            dispatcher,
            live: Arc::new(AtomicBool::new(true)),
            timings,
        }
    }

    /// One tap at `(x, y)`, held for the configured tap duration.
    pub fn tap(&self, x: f32, y: f32) -> Result<(), InjectionError> {
        self.execute(GestureCommand::Tap { x, y })
    }

    /// One straight swipe over the configured swipe duration.
    pub fn swipe(&self, x1: f32, y1: f32, x2: f32, y2: f32) -> Result<(), InjectionError> {
        let duration_ms = u32::try_from(self.timings.swipe.as_millis()).unwrap_or(u32::MAX);
        self.execute(GestureCommand::Swipe { x1, y1, x2, y2, duration_ms })
    }

    pub fn execute(&self, command: GestureCommand) -> Result<(), InjectionError> {
        if !self.is_valid() {
            return Err(InjectionError::ServiceUnavailable);
        }
        let gesture = build_gesture(&command, self.timings)?;
        trace!(?command, "dispatching gesture");
        self.dispatcher.dispatch(gesture).map_err(|e| {
            warn!("gesture dispatch failed: {e}");
            e
        })
    }

    /// Marks this handle and all its clones as dead.
    pub fn invalidate(&self) {
        self.live.store(false, Ordering::Release);
    }

    pub fn is_valid(&self) -> bool {
        self.live.load(Ordering::Acquire)
    }
}
