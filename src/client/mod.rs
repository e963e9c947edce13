//! High-level overlay session
//!
//! Wires the whole pipeline together: shared channel, capture timer,
//! payload normalization, stream fusion and overlay rendering.

pub mod session;

pub use session::{OverlaySession, SessionEvent};
