//! Capture sources
//!
//! A capture source is anything that knows its current pixel dimensions and
//! can draw its current frame into a raster surface: a live camera feed, a
//! paused video, a static image. How the source itself is acquired (device
//! selection, permissions) is the embedding application's concern.

use std::sync::atomic::{AtomicU32, Ordering};

use image::{imageops, Rgb, RgbImage};

/// Something a frame can be captured from
pub trait FrameSource: Send + Sync {
    /// Native dimensions of the current frame, `None` while the source has
    /// nothing usable yet (e.g. camera still starting up)
    fn dimensions(&self) -> Option<(u32, u32)>;

    /// Draw the current frame into a pre-sized surface
    ///
    /// The surface defines the target resolution; the source samples itself
    /// at that size. Returns `false` when no frame could be drawn.
    fn draw_into(&self, surface: &mut RgbImage) -> bool;
}

/// A static image acting as a capture source
pub struct StillImage {
    image: RgbImage,
}

impl StillImage {
    /// Wrap an image
    pub fn new(image: RgbImage) -> Self {
        Self { image }
    }
}

impl FrameSource for StillImage {
    fn dimensions(&self) -> Option<(u32, u32)> {
        let (w, h) = self.image.dimensions();
        if w == 0 || h == 0 {
            None
        } else {
            Some((w, h))
        }
    }

    fn draw_into(&self, surface: &mut RgbImage) -> bool {
        let (tw, th) = surface.dimensions();
        if tw == 0 || th == 0 {
            return false;
        }

        let scaled = imageops::resize(&self.image, tw, th, imageops::FilterType::Triangle);
        surface.copy_from_slice(&scaled);
        true
    }
}

/// Synthetic moving-gradient source for tests and demos
///
/// Deterministic: the pattern is a function of the tick counter, advanced
/// explicitly with [`advance`](TestPattern::advance).
pub struct TestPattern {
    width: u32,
    height: u32,
    tick: AtomicU32,
}

impl TestPattern {
    /// Create a pattern source with the given native dimensions
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            tick: AtomicU32::new(0),
        }
    }

    /// Advance the pattern by one frame
    pub fn advance(&self) {
        self.tick.fetch_add(1, Ordering::Relaxed);
    }
}

impl FrameSource for TestPattern {
    fn dimensions(&self) -> Option<(u32, u32)> {
        if self.width == 0 || self.height == 0 {
            None
        } else {
            Some((self.width, self.height))
        }
    }

    fn draw_into(&self, surface: &mut RgbImage) -> bool {
        let (tw, th) = surface.dimensions();
        if tw == 0 || th == 0 {
            return false;
        }

        let tick = self.tick.load(Ordering::Relaxed);
        for (x, y, pixel) in surface.enumerate_pixels_mut() {
            let r = ((x * 255 / tw) + tick * 7) % 256;
            let g = (y * 255 / th) % 256;
            let b = (tick * 13) % 256;
            *pixel = Rgb([r as u8, g as u8, b as u8]);
        }
        true
    }
}
