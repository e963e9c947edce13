//! DPI-aware overlay canvas
//!
//! The canvas separates its CSS size (the coordinate space plans are
//! computed in) from its backing buffer (CSS size times device pixel
//! ratio). The DPR scale is applied once, globally, when a plan is
//! rasterized; no individual box ever multiplies by it.

use std::sync::atomic::{AtomicU64, Ordering};

use image::RgbaImage;

use crate::geometry::Size;

static NEXT_CANVAS_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a canvas, used as the overlay cache key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CanvasId(u64);

impl CanvasId {
    /// Numeric value, for logging
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// A 2D raster surface with pixel-ratio-aware sizing
pub struct OverlayCanvas {
    id: CanvasId,
    dpr: f32,
    css_size: Size,
    buffer: RgbaImage,
}

impl OverlayCanvas {
    /// Create an empty canvas with the given device pixel ratio
    pub fn new(device_pixel_ratio: f32) -> Self {
        Self {
            id: CanvasId(NEXT_CANVAS_ID.fetch_add(1, Ordering::Relaxed)),
            dpr: device_pixel_ratio.max(0.1),
            css_size: Size::default(),
            buffer: RgbaImage::new(0, 0),
        }
    }

    /// Stable identity of this canvas
    pub fn id(&self) -> CanvasId {
        self.id
    }

    /// Device pixel ratio applied at rasterization
    pub fn device_pixel_ratio(&self) -> f32 {
        self.dpr
    }

    /// CSS size of the last resize
    pub fn css_size(&self) -> Size {
        self.css_size
    }

    /// Backing buffer dimensions in device pixels
    pub fn buffer_size(&self) -> (u32, u32) {
        self.buffer.dimensions()
    }

    /// Pixel access for inspection
    pub fn buffer(&self) -> &RgbaImage {
        &self.buffer
    }

    pub(crate) fn buffer_mut(&mut self) -> &mut RgbaImage {
        &mut self.buffer
    }

    /// Resize the backing buffer to a CSS size scaled by the DPR
    ///
    /// Reuses the existing allocation when the size is unchanged.
    pub fn resize_backing(&mut self, css: Size) {
        self.css_size = css;
        let width = (css.width.max(0.0) * self.dpr).round() as u32;
        let height = (css.height.max(0.0) * self.dpr).round() as u32;

        if self.buffer.dimensions() != (width, height) {
            self.buffer = RgbaImage::new(width, height);
        }
    }

    /// Wipe all pixel content to transparent
    pub fn clear(&mut self) {
        for pixel in self.buffer.pixels_mut() {
            *pixel = image::Rgba([0, 0, 0, 0]);
        }
    }

    /// Whether every pixel is fully transparent
    pub fn is_blank(&self) -> bool {
        self.buffer.pixels().all(|p| p.0[3] == 0)
    }
}
