//! Frame source implementations.
//!
//! The platform projection (a virtual display feeding an image reader) is an
//! external collaborator.  This module provides the synthetic implementation
//! that stands in for it.

pub mod synthetic;

pub use synthetic::{SyntheticFrameSource, SyntheticProjector};
