//! Control protocol between the host bridge and the device.
//!
//! - [`commands`] – JSON commands and the uniform result envelope.
//! - [`sequence`] – Per-session numbering of emitted images.

pub mod commands;
pub mod sequence;

pub use commands::{CaptureStatusDto, CommandResult, ControlCommand};
pub use sequence::SequenceCounter;
