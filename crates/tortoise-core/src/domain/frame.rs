//! Raw captured frames and their encoded form.
//!
//! # Row stride and padding
//!
//! Display drivers allocate pixel rows on alignment boundaries, so one row of
//! a buffer may be longer than `width × bytes_per_pixel`.  The extra bytes at
//! the end of each row are padding and carry no image data:
//!
//! ```text
//! |<------------- row_stride ------------->|
//! |<---- width × 4 ---->|<-- padding ----->|
//! | R G B A R G B A ... | x x x x x x x x  |   row 0
//! | R G B A R G B A ... | x x x x x x x x  |   row 1
//! ```
//!
//! Consumers must crop rows to `width × 4` bytes before treating the buffer as
//! a tightly packed image.  The last row may omit its padding entirely, which
//! is why [`Frame::required_len`] does not multiply the full stride by the
//! height.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Pixel layout of a captured buffer.  All supported formats are 4 bytes per
/// pixel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PixelFormat {
    /// Red, green, blue, alpha.  The native `ImageReader` format on Android.
    Rgba8888,
    /// Red, green, blue, unused.
    Rgbx8888,
    /// Blue, green, red, alpha.  Common on desktop compositors.
    Bgra8888,
}

impl PixelFormat {
    /// Bytes occupied by one pixel.
    pub const fn bytes_per_pixel(self) -> usize {
        4
    }

    /// Extracts the red, green and blue channels of one pixel.
    ///
    /// `pixel` must be at least [`bytes_per_pixel`](Self::bytes_per_pixel)
    /// bytes long.
    #[inline]
    pub fn rgb(self, pixel: &[u8]) -> [u8; 3] {
        match self {
            Self::Rgba8888 | Self::Rgbx8888 => [pixel[0], pixel[1], pixel[2]],
            Self::Bgra8888 => [pixel[2], pixel[1], pixel[0]],
        }
    }
}

/// Reasons a frame buffer cannot be interpreted with its declared geometry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameLayoutError {
    #[error("frame has zero width or height")]
    EmptyFrame,
    #[error("row stride {stride} is shorter than one row of pixels ({row_bytes} bytes)")]
    StrideTooSmall { stride: usize, row_bytes: usize },
    #[error("buffer holds {len} bytes but the frame geometry needs {required}")]
    BufferTooSmall { len: usize, required: usize },
}

/// One raw image pulled from the frame source.
///
/// A `Frame` occupies a slot of the source's fixed-size buffer pool until the
/// slot is handed back.  The relay is responsible for releasing the slot
/// exactly once, whatever happens to the pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Logical width in pixels.
    pub width: u32,
    /// Logical height in pixels.
    pub height: u32,
    /// Bytes between the starts of two consecutive rows.
    pub row_stride: usize,
    pub format: PixelFormat,
    /// Pixel bytes, `row_stride` bytes per row.
    pub data: Vec<u8>,
    /// Buffer-pool slot this frame occupies.  Opaque outside the source.
    pub slot: usize,
}

impl Frame {
    /// Number of meaningful bytes in one row (`width × bytes_per_pixel`).
    pub fn row_bytes(&self) -> usize {
        self.width as usize * self.format.bytes_per_pixel()
    }

    /// Padding bytes at the end of every row.  Zero for tightly packed
    /// buffers.
    pub fn row_padding(&self) -> usize {
        self.row_stride.saturating_sub(self.row_bytes())
    }

    /// Smallest buffer length that holds every visible pixel, or `None` if
    /// the geometry overflows `usize`.
    pub fn required_len(&self) -> Option<usize> {
        if self.height == 0 {
            return Some(0);
        }
        self.row_stride
            .checked_mul(self.height as usize - 1)?
            .checked_add(self.row_bytes())
    }

    /// Checks that the buffer and stride agree with the declared geometry.
    ///
    /// # Errors
    ///
    /// Returns the first [`FrameLayoutError`] found.
    pub fn check_layout(&self) -> Result<(), FrameLayoutError> {
        if self.width == 0 || self.height == 0 {
            return Err(FrameLayoutError::EmptyFrame);
        }
        let row_bytes = self.row_bytes();
        if self.row_stride < row_bytes {
            return Err(FrameLayoutError::StrideTooSmall {
                stride: self.row_stride,
                row_bytes,
            });
        }
        // An overflowing geometry cannot fit any buffer.
        let required = self.required_len().unwrap_or(usize::MAX);
        if self.data.len() < required {
            return Err(FrameLayoutError::BufferTooSmall {
                len: self.data.len(),
                required,
            });
        }
        Ok(())
    }

    /// Iterates over the visible part of each row, padding removed.
    ///
    /// Call [`check_layout`](Self::check_layout) first; rows that fall outside
    /// the buffer are skipped.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let row_bytes = self.row_bytes();
        (0..self.height as usize).filter_map(move |row| {
            let start = row.checked_mul(self.row_stride)?;
            self.data.get(start..start.checked_add(row_bytes)?)
        })
    }
}

/// A compressed image produced from one [`Frame`].
///
/// Cloning is cheap: the bytes are reference counted so every viewer shares
/// one allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// JPEG bytes.
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Compression quality the image was encoded with (1..=100).
    pub quality: u8,
    /// Position of this image within its capture session, starting at 0.
    ///
    /// Dropped frames never receive a number, so gaps do not occur; a viewer
    /// that sees a smaller number than the last one knows a new session began.
    pub sequence: u64,
}

impl EncodedImage {
    /// Size of the compressed payload in bytes.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
