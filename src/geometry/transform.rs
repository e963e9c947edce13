//! Encoded-frame to display-space mapping
//!
//! Detection boxes are expressed in the pixel grid of the downscaled frame
//! that was sent to the backend. The video element shows that frame scaled
//! into its own display rectangle with one of three fit modes, so mapping a
//! box onto the overlay means reproducing the same scale and letterbox
//! offsets. All math here is in CSS pixels; the canvas applies the device
//! pixel ratio once, globally, when a plan is committed.

use super::rect::Rect;

/// How the source content is fitted into the display rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FitMode {
    /// Stretch each axis independently to fill the display rectangle
    Fill,
    /// Uniform scale, content covers the display rectangle (may crop)
    Cover,
    /// Uniform scale, content contained in the display rectangle (may letterbox)
    Contain,
}

/// Display rectangle dimensions in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Size {
    /// Width
    pub width: f32,
    /// Height
    pub height: f32,
}

impl Size {
    /// Create a new size
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }
}

/// Scale and offset mapping encoded-frame coordinates to display coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Horizontal scale
    pub scale_x: f32,
    /// Vertical scale
    pub scale_y: f32,
    /// Horizontal letterbox offset
    pub offset_x: f32,
    /// Vertical letterbox offset
    pub offset_y: f32,
}

impl Transform {
    /// The do-nothing transform
    pub fn identity() -> Self {
        Self {
            scale_x: 1.0,
            scale_y: 1.0,
            offset_x: 0.0,
            offset_y: 0.0,
        }
    }
}

/// Compute the transform from encoded-frame space into a display rectangle
///
/// A zero-sized source yields the identity transform; element geometry can
/// legitimately be observed before the first frame has dimensions and the
/// caller must not get NaN back.
pub fn compute_transform(source_w: f32, source_h: f32, display: Size, fit: FitMode) -> Transform {
    if source_w <= 0.0 || source_h <= 0.0 {
        return Transform::identity();
    }

    match fit {
        FitMode::Fill => Transform {
            scale_x: display.width / source_w,
            scale_y: display.height / source_h,
            offset_x: 0.0,
            offset_y: 0.0,
        },
        FitMode::Cover | FitMode::Contain => {
            let sx = display.width / source_w;
            let sy = display.height / source_h;
            let scale = if fit == FitMode::Cover {
                sx.max(sy)
            } else {
                sx.min(sy)
            };

            Transform {
                scale_x: scale,
                scale_y: scale,
                offset_x: (display.width - source_w * scale) / 2.0,
                offset_y: (display.height - source_h * scale) / 2.0,
            }
        }
    }
}

/// Map a box from encoded-frame space into display space
pub fn map_box(b: Rect, t: &Transform) -> Rect {
    Rect {
        x: t.offset_x + b.x * t.scale_x,
        y: t.offset_y + b.y * t.scale_y,
        w: b.w * t.scale_x,
        h: b.h * t.scale_y,
    }
}
