//! Application layer use cases for the device.
//!
//! - **`relay_frames`** – The admission gate and the relay that moves one
//!   frame at a time from the [`FrameSource`](relay_frames::FrameSource)
//!   through the [`FrameEncoder`](relay_frames::FrameEncoder) to the viewers.
//!
//! - **`capture_session`** – The `Idle → Starting → Active → Idle` state
//!   machine.  Owns the viewer broadcast channel across sessions and joins the
//!   in-flight encode before tearing a session down.
//!
//! - **`inject_gestures`** – Turns tap and swipe commands into gestures and
//!   hands them to a [`GestureDispatcher`](inject_gestures::GestureDispatcher).

pub mod capture_session;
pub mod inject_gestures;
pub mod relay_frames;
