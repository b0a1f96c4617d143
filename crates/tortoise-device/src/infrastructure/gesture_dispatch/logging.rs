//! Dispatcher that logs gestures instead of performing them.

use tortoise_core::Gesture;
use tracing::info;

use crate::application::inject_gestures::{GestureDispatcher, InjectionError};

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingDispatcher;

impl GestureDispatcher for TracingDispatcher {
    fn dispatch(&self, gesture: Gesture) -> Result<(), InjectionError> {
        for stroke in &gesture.strokes {
            let path: Vec<(f32, f32)> = stroke.path.iter().map(|p| (p.x, p.y)).collect();
            info!(
                ?path,
                delay_ms = stroke.start_delay.as_millis() as u64,
                duration_ms = stroke.duration.as_millis() as u64,
                "gesture"
            );
        }
        Ok(())
    }
}
