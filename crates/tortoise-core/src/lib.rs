//! # tortoise-core
//!
//! Shared library for TortoiseShare containing the frame and image types that
//! flow through the capture relay, the resolution negotiation rule, the
//! gesture model, and the control commands accepted from the host bridge.
//!
//! This crate is used by the device crate and by any bridge that talks to it.
//! It has zero dependencies on OS APIs, async runtimes, or image codecs.
//!
//! # Architecture overview
//!
//! TortoiseShare mirrors a phone screen to a remote viewer and lets the viewer
//! tap and swipe on the phone.  Two independent paths exist:
//!
//! ```text
//! capture:  display ─► Frame ─► relay gate ─► JPEG ─► EncodedImage ─► viewers
//! control:  viewer  ─► ControlCommand ─► GestureCommand ─► Gesture ─► OS
//! ```
//!
//! - **`domain`** – Pure value types: [`Frame`], [`EncodedImage`], display
//!   metrics with [`negotiate_resolution`], and the gesture model.
//!
//! - **`protocol`** – The JSON control surface ([`ControlCommand`],
//!   [`CommandResult`]) and the per-session [`SequenceCounter`].

pub mod domain;
pub mod protocol;

pub use domain::frame::{EncodedImage, Frame, FrameLayoutError, PixelFormat};
pub use domain::gesture::{Gesture, GestureCommand, Point, Stroke};
pub use domain::resolution::{negotiate_resolution, DisplayMetrics, OutputResolution};
pub use domain::session::{CaptureState, FrameCounters};
pub use protocol::commands::{CaptureStatusDto, CommandResult, ControlCommand};
pub use protocol::sequence::SequenceCounter;
