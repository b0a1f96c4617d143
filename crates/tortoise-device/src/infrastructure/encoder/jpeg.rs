//! JPEG encoder backed by the `image` crate.
//!
//! Captured buffers are 4 bytes per pixel with padded rows; JPEG has no alpha
//! channel.  Each frame is first packed into a tight RGB buffer, dropping the
//! row padding and the fourth channel, then compressed at a fixed quality.

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::ExtendedColorType;
use tortoise_core::Frame;

use crate::application::relay_frames::{EncodeError, FrameEncoder};

/// Quality used when none is configured.
pub const DEFAULT_JPEG_QUALITY: u8 = 80;

#[derive(Debug, Clone, Copy)]
pub struct JpegFrameEncoder {
    quality: u8,
}

impl Default for JpegFrameEncoder {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl JpegFrameEncoder {
    /// Creates an encoder.  `quality` is clamped to 1..=100.
    pub fn new(quality: u8) -> Self {
        Self { quality: quality.clamp(1, 100) }
    }
}

/// Packs the visible pixels of `frame` into `width × height × 3` bytes.
fn pack_rgb(frame: &Frame) -> Vec<u8> {
    let bpp = frame.format.bytes_per_pixel();
    let mut rgb = Vec::with_capacity(frame.width as usize * frame.height as usize * 3);
    for row in frame.rows() {
        for px in row.chunks_exact(bpp) {
            rgb.extend_from_slice(&frame.format.rgb(px));
        }
    }
    rgb
}

impl FrameEncoder for JpegFrameEncoder {
    fn encode(&self, frame: &Frame) -> Result<Bytes, EncodeError> {
        frame.check_layout()?;
        let rgb = pack_rgb(frame);

        // Roughly 1 bit per pixel at quality 80; avoids most reallocations.
        let mut out = Vec::with_capacity(rgb.len() / 8);
        JpegEncoder::new_with_quality(&mut out, self.quality)
            .encode(&rgb, frame.width, frame.height, ExtendedColorType::Rgb8)
            .map_err(|e| EncodeError::Codec(e.to_string()))?;
        Ok(Bytes::from(out))
    }

    fn quality(&self) -> u8 {
        self.quality
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tortoise_core::{FrameLayoutError, PixelFormat};

    fn solid_frame(width: u32, height: u32, stride: usize, rgba: [u8; 4]) -> Frame {
        let mut data = vec![0u8; stride * height as usize];
        for row in data.chunks_exact_mut(stride) {
            for px in row[..width as usize * 4].chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
        Frame { width, height, row_stride: stride, format: PixelFormat::Rgba8888, data, slot: 0 }
    }

    #[test]
    fn test_output_is_a_jpeg_stream() {
        let bytes = JpegFrameEncoder::default()
            .encode(&solid_frame(8, 8, 32, [200, 10, 10, 255]))
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(&bytes[bytes.len() - 2..], &[0xFF, 0xD9]);
    }

    #[test]
    fn test_padded_rows_are_cropped_to_logical_width() {
        // Arrange: 4 px wide (16 bytes) in a 24-byte stride.
        let frame = solid_frame(4, 3, 24, [10, 200, 10, 255]);

        // Act
        let bytes = JpegFrameEncoder::new(90).encode(&frame).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();

        // Assert
        assert_eq!((decoded.width(), decoded.height()), (4, 3));
    }

    #[test]
    fn test_padding_bytes_do_not_bleed_into_image() {
        // Arrange: padding filled with white, pixels black.
        let mut frame = solid_frame(8, 8, 48, [0, 0, 0, 255]);
        for row in frame.data.chunks_exact_mut(48) {
            row[32..].fill(0xFF);
        }

        // Act
        let bytes = JpegFrameEncoder::new(95).encode(&frame).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap().to_rgb8();

        // Assert: every pixel stays near black.
        assert!(decoded.pixels().all(|p| p.0.iter().all(|&c| c < 40)));
    }

    #[test]
    fn test_short_buffer_is_rejected() {
        let mut frame = solid_frame(4, 4, 16, [0; 4]);
        frame.data.truncate(40);
        let err = JpegFrameEncoder::default().encode(&frame).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Layout(FrameLayoutError::BufferTooSmall { len: 40, required: 64 })
        ));
    }

    #[test]
    fn test_corrupt_stride_is_a_layout_error() {
        let mut frame = solid_frame(4, 4, 16, [0; 4]);
        frame.row_stride = usize::MAX / 2;
        let err = JpegFrameEncoder::default().encode(&frame).unwrap_err();
        assert!(matches!(
            err,
            EncodeError::Layout(FrameLayoutError::BufferTooSmall { len: 64, required: usize::MAX })
        ));
    }

    #[test]
    fn test_empty_frame_is_rejected() {
        let frame = Frame {
            width: 0,
            height: 0,
            row_stride: 0,
            format: PixelFormat::Rgba8888,
            data: Vec::new(),
            slot: 0,
        };
        let err = JpegFrameEncoder::default().encode(&frame).unwrap_err();
        assert!(matches!(err, EncodeError::Layout(FrameLayoutError::EmptyFrame)));
    }

    #[test]
    fn test_quality_is_clamped() {
        assert_eq!(JpegFrameEncoder::new(0).quality(), 1);
        assert_eq!(JpegFrameEncoder::new(250).quality(), 100);
    }
}
