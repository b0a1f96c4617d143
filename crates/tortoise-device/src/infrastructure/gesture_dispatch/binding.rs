//! AccessibilityBinding: owns the lifecycle of the input injector handle.
//!
//! The OS creates and destroys the accessibility service whenever the user
//! toggles it in settings.  The binding mirrors that lifecycle:
//!
//! ```text
//! on_service_connected ──► new live InputInjector (previous one invalidated)
//! on_interrupt         ──► current handle invalidated
//! on_destroy           ──► current handle invalidated
//! ```
//!
//! Callers that kept a clone of an old handle get
//! `InjectionError::ServiceUnavailable` instead of gestures silently going
//! nowhere.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::info;

use crate::application::inject_gestures::{GestureDispatcher, GestureTimings, InputInjector};

pub struct AccessibilityBinding {
    dispatcher: Arc<dyn GestureDispatcher>,
    timings: GestureTimings,
    current: Mutex<Option<InputInjector>>,
}

impl AccessibilityBinding {
    pub fn new(dispatcher: Arc<dyn GestureDispatcher>, timings: GestureTimings) -> Self {
        Self { dispatcher, timings, current: Mutex::new(None) }
    }

    /// The service connected.  Returns the new live handle.
    pub fn on_service_connected(&self) -> InputInjector {
        let injector = InputInjector::new(Arc::clone(&self.dispatcher), self.timings);
        if let Some(old) = self.current().replace(injector.clone()) {
            old.invalidate();
        }
        info!("accessibility service connected");
        injector
    }

    /// The OS interrupted the service's feedback.
    pub fn on_interrupt(&self) {
        self.disconnect("interrupted");
    }

    pub fn on_destroy(&self) {
        self.disconnect("destroyed");
    }

    /// The live handle, if the service is connected.
    pub fn injector(&self) -> Option<InputInjector> {
        self.current().clone()
    }

    pub fn is_connected(&self) -> bool {
        self.current().is_some()
    }

    fn disconnect(&self, reason: &str) {
        if let Some(old) = self.current().take() {
            old.invalidate();
            info!(reason, "accessibility service disconnected");
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<InputInjector>> {
        self.current.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
