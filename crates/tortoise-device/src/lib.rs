//! tortoise-device library entry point.
//!
//! Re-exports all public modules so that integration tests in `tests/`
//! and the binary entry point in `main.rs` share the same module tree.
//!
//! # What does the device side do?
//!
//! The device is the phone being mirrored.  It:
//!
//! 1. Negotiates a capture resolution from the display metrics and a width
//!    budget, then opens a virtual display backed by a small buffer pool.
//! 2. Relays frames: each frame-ready notification pulls the newest frame,
//!    and if no encode is in flight, re-encodes it to JPEG and broadcasts the
//!    bytes to every viewer.  Frames arriving while an encode runs are
//!    released immediately and dropped.
//! 3. Replays viewer taps and swipes as synthetic gestures through the
//!    accessibility service.
//!
//! The OS capabilities (projection, display metrics, gesture dispatch) sit
//! behind traits in the application layer; the infrastructure layer provides
//! the synthetic and recording implementations used by tests and the demo
//! binary.

/// Application layer: capture session, frame relay, gesture injection.
pub mod application;

/// Infrastructure layer: frame sources, JPEG encoder, gesture dispatchers,
/// config storage, and the command bridge.
pub mod infrastructure;
