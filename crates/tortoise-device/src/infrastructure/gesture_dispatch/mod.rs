//! Gesture dispatch implementations and the accessibility binding.
//!
//! The OS gesture primitive is an external collaborator.  Two dispatchers are
//! provided:
//!
//! | Type                  | Use                                           |
//! |-----------------------|-----------------------------------------------|
//! | `RecordingDispatcher` | Tests: records every gesture in memory        |
//! | `TracingDispatcher`   | Demo binary: logs every gesture via `tracing` |

pub mod binding;
pub mod logging;
pub mod mock;

pub use binding::AccessibilityBinding;
pub use logging::TracingDispatcher;
pub use mock::RecordingDispatcher;
