//! Frame capture and encoding
//!
//! This side of the pipeline turns whatever the camera is showing into a
//! small compressed frame on a timer:
//!
//! ```text
//! FrameSource ──draw──► FrameEncoder ──bytes──► FrameSink (shared channel)
//!      ▲                     │
//!      │                reused surface, the single point of truth
//!   camera /             for "encoded-frame space"
//!   test pattern
//! ```
//!
//! The encoder's off-screen surface defines the coordinate system every
//! detection box comes back in; the overlay side maps out of it again.

pub mod encoder;
pub mod pipeline;
pub mod source;

pub use encoder::{encoded_size, EncodeFormat, FrameEncoder};
pub use pipeline::{CapturePipeline, FrameSink};
pub use source::{FrameSource, StillImage, TestPattern};
