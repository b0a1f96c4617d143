//! Recording gesture dispatcher for tests.
//!
//! Every dispatched gesture is pushed into a `Mutex<Vec<Gesture>>` so test
//! assertions can inspect exactly what was sent and in what order.
//!
//! # `should_fail` flag
//!
//! Set `should_fail = true` to make every dispatch return
//! `InjectionError::Platform`, as the OS does when it rejects a gesture.

use std::sync::{Mutex, PoisonError};

use tortoise_core::Gesture;

use crate::application::inject_gestures::{GestureDispatcher, InjectionError};

#[derive(Default)]
pub struct RecordingDispatcher {
    pub gestures: Mutex<Vec<Gesture>>,
    pub should_fail: bool,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self { should_fail: true, ..Self::default() }
    }

    /// Snapshot of the gestures dispatched so far.
    pub fn recorded(&self) -> Vec<Gesture> {
        self.gestures.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl GestureDispatcher for RecordingDispatcher {
    fn dispatch(&self, gesture: Gesture) -> Result<(), InjectionError> {
        if self.should_fail {
            return Err(InjectionError::Platform("gesture rejected".into()));
        }
        self.gestures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(gesture);
        Ok(())
    }
}
