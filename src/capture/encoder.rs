//! Frame encoder
//!
//! Draws the current source frame into a reused off-screen surface at the
//! target width and serializes it to a compressed buffer. The surface's
//! pixel grid is "encoded-frame space": every detection box the backend
//! returns is expressed in these exact dimensions.

use std::io::Cursor;

use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::webp::WebPEncoder;
use image::{ExtendedColorType, RgbImage};

use super::source::FrameSource;

/// Encoded-frame dimensions for a source at a target width
///
/// Height preserves the source's aspect ratio; this is the same math the
/// encoder uses for its surface, so detection consumers can reconstruct the
/// coordinate space the backend saw.
pub fn encoded_size(source_w: u32, source_h: u32, target_width: u32) -> (u32, u32) {
    let width = target_width.max(1);
    let height = ((width as f64 * source_h as f64 / source_w.max(1) as f64).round() as u32).max(1);
    (width, height)
}

/// Frame serialization format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeFormat {
    /// Baseline JPEG, universally supported
    Jpeg,
    /// Lossless WebP, smaller for synthetic content; falls back to JPEG
    /// when encoding fails
    WebP,
}

/// Captures frames from a source into a compressed byte buffer
///
/// Stateless across calls except for the reused surface; rate limiting is
/// the caller's responsibility.
pub struct FrameEncoder {
    format: EncodeFormat,
    quality: f32,
    surface: Option<RgbImage>,
}

impl FrameEncoder {
    /// Create an encoder; quality is clamped to [0.1, 1.0]
    pub fn new(format: EncodeFormat, quality: f32) -> Self {
        Self {
            format,
            quality: quality.clamp(0.1, 1.0),
            surface: None,
        }
    }

    /// Capture and encode the source's current frame at `target_width`
    ///
    /// Target height preserves the source's aspect ratio. Returns `None`
    /// (never an error) when the source has no usable dimensions yet or
    /// encoding fails; the caller skips that tick.
    pub fn capture(&mut self, source: &dyn FrameSource, target_width: u32) -> Option<Bytes> {
        let (src_w, src_h) = source.dimensions()?;
        if src_w == 0 || src_h == 0 {
            return None;
        }

        let (target_width, target_height) = encoded_size(src_w, src_h, target_width);

        // Reallocate only when the target size actually changed
        if self.surface.as_ref().map(RgbImage::dimensions) != Some((target_width, target_height)) {
            self.surface = Some(RgbImage::new(target_width, target_height));
        }
        let surface = self.surface.as_mut()?;

        if !source.draw_into(surface) {
            return None;
        }

        self.encode().map(Bytes::from)
    }

    /// Dimensions of the reused surface, once allocated
    pub fn surface_dimensions(&self) -> Option<(u32, u32)> {
        self.surface.as_ref().map(RgbImage::dimensions)
    }

    fn encode(&self) -> Option<Vec<u8>> {
        let surface = self.surface.as_ref()?;
        let (width, height) = surface.dimensions();
        let mut buf = Vec::new();

        if self.format == EncodeFormat::WebP {
            let encoder = WebPEncoder::new_lossless(Cursor::new(&mut buf));
            match encoder.encode(surface.as_raw(), width, height, ExtendedColorType::Rgb8) {
                Ok(()) => return Some(buf),
                Err(e) => {
                    tracing::debug!(error = %e, "WebP encode failed, falling back to JPEG");
                    buf.clear();
                }
            }
        }

        let jpeg_quality = (self.quality * 100.0).round() as u8;
        let mut encoder = JpegEncoder::new_with_quality(Cursor::new(&mut buf), jpeg_quality);
        match encoder.encode_image(surface) {
            Ok(()) => Some(buf),
            Err(e) => {
                tracing::debug!(error = %e, "JPEG encode failed");
                None
            }
        }
    }
}
