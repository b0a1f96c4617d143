//! Capture session lifecycle state and relay counters.

use serde::{Deserialize, Serialize};

/// Lifecycle of the single capture session.
///
/// ```text
/// Idle ──start──► Starting ──display ready──► Active ──stop──► Idle
///                    │
///                    └── permission denied / display failure ──► Idle
/// ```
///
/// There is no `Active → Active` transition: a start request while a session
/// is `Starting` or `Active` is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CaptureState {
    #[default]
    Idle,
    /// Projection permission and virtual display creation are pending.
    Starting,
    /// Virtual display exists and the relay listener is attached.
    Active,
}

/// Running totals kept by the frame relay for one session.
///
/// `events = empty + dropped + admitted`, where every admitted frame ends up
/// in exactly one of `encoded` or `failed` once its worker completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FrameCounters {
    /// Frame-ready notifications received.
    pub events: u64,
    /// Notifications for which the source had no frame to hand out.
    pub empty: u64,
    /// Frames discarded because an encode was already in flight or the
    /// session was closing.
    pub dropped: u64,
    /// Frames encoded and emitted to the sink.
    pub encoded: u64,
    /// Frames admitted but lost to an encode failure.
    pub failed: u64,
}

impl FrameCounters {
    /// Frames that passed the gate.
    pub fn admitted(&self) -> u64 {
        self.events.saturating_sub(self.empty + self.dropped)
    }
}
