//! Frame encoder implementations.

pub mod jpeg;

pub use jpeg::{JpegFrameEncoder, DEFAULT_JPEG_QUALITY};
