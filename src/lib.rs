//! # facecast-rs
//!
//! Client library for streaming live camera frames to a remote inference
//! backend over a persistent duplex channel and rendering the returned
//! detections back onto the video in real time.
//!
//! Two detection streams describe the same scene — an identity stream (who
//! is this face) and an attribute stream (what expression does it have) —
//! produced by different backend passes at different rates. The library
//! reconciles them into one coherent overlay: boxes are matched across
//! streams by IoU inside a staleness window, detection coordinates are
//! mapped from encoded-frame space into the letterboxed, DPI-scaled
//! display surface, and the whole thing redraws on viewport changes
//! without leaking sockets, timers or listeners.
//!
//! # Pipeline
//!
//! ```text
//! capture timer ─► FrameEncoder ─► ChannelPool ═══ WebSocket ═══► backend
//!                                       │
//!                     identity events   │   attribute events
//!                                       ▼
//!                                 adapter (normalize)
//!                                       │
//!                                 FusionEngine (IoU + window)
//!                                       │
//!                                 OverlayRenderer ─► canvas over video
//!                                       ▲
//!                                 ResizeCoordinator (debounced replay)
//! ```
//!
//! [`client::OverlaySession`] wires the pieces together; every part can
//! also be used on its own.
//!
//! # Example
//! ```no_run
//! use std::sync::{Arc, Mutex};
//! use facecast_rs::capture::TestPattern;
//! use facecast_rs::channel::ChannelPool;
//! use facecast_rs::client::OverlaySession;
//! use facecast_rs::config::StreamSettings;
//! use facecast_rs::geometry::Rect;
//! use facecast_rs::overlay::{FixedView, OverlayCanvas, OverlayRenderer};
//!
//! # fn main() -> facecast_rs::error::Result<()> {
//! let pool = ChannelPool::default();
//! let renderer = Arc::new(OverlayRenderer::default());
//! let (mut session, _events) = OverlaySession::new(StreamSettings::default(), renderer);
//!
//! session.start(
//!     &pool,
//!     "wss://api.example.com/detect",
//!     Arc::new(TestPattern::new(640, 480)),
//!     Arc::new(FixedView::new(Rect::new(0.0, 0.0, 640.0, 480.0))),
//!     Arc::new(Mutex::new(OverlayCanvas::new(2.0))),
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod capture;
pub mod channel;
pub mod client;
pub mod config;
pub mod detection;
pub mod error;
pub mod geometry;
pub mod overlay;
pub mod stats;

pub use config::StreamSettings;
pub use error::{Error, Result};
