//! Detection overlay rendering
//!
//! Draws detection lists on a raster canvas positioned over the video view
//! and replays the last draw per canvas when the viewport changes.
//!
//! # Architecture
//!
//! ```text
//!  detections ──► OverlayRenderer::draw ──► compute_plan (pure, CSS px)
//!                        │                        │
//!                        │                        ▼
//!                        │                  commit (DPR scale, raster)
//!                        │                        │
//!                        ▼                        ▼
//!                  overlay cache            OverlayCanvas buffer
//!                        ▲
//!                        │ replay_all (commit only, no cache write)
//!                 ResizeCoordinator ◄── debounced ViewportSignals
//! ```
//!
//! The plan/commit split is what keeps resize replays from re-entering the
//! cache: a replay recomputes geometry and repaints, but only an original
//! `draw` call stores a cache entry.

pub mod canvas;
pub mod renderer;
pub mod resize;
pub mod style;
pub mod view;

pub use canvas::{CanvasId, OverlayCanvas};
pub use renderer::{DrawOptions, DrawOutcome, DrawPlan, OverlayRenderer, PlanItem};
pub use resize::{ResizeCoordinator, ViewportSignal, ViewportSignals};
pub use style::OverlayStyle;
pub use view::{FixedView, VideoView};
