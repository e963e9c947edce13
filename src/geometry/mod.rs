//! Geometry primitives and coordinate transforms
//!
//! Detections arrive in encoded-frame space (the pixel grid of the
//! downscaled image that was actually transmitted) and have to be mapped
//! into the display rectangle of whatever element the video is shown in.
//! Everything here is pure and safe to call once per animation frame.

pub mod rect;
pub mod transform;

pub use rect::Rect;
pub use transform::{compute_transform, map_box, FitMode, Size, Transform};
