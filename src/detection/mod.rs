//! Detection types, payload normalization and stream fusion
//!
//! Two detection streams describe the same physical scene: an identity
//! stream (who is this face) and an attribute stream (what expression does
//! it have), produced by different backend passes at different rates. This
//! module normalizes their shape-shifting payloads into one canonical
//! [`Detection`] at the channel boundary and reconciles the two streams via
//! IoU matching inside a staleness window.

pub mod adapter;
pub mod fusion;
pub mod types;

pub use adapter::parse_detections;
pub use fusion::FusionEngine;
pub use types::{Detection, DetectionStream};
