//! Target view abstraction
//!
//! The overlay canvas sits on top of some element showing the video. All
//! the renderer needs from it is its live display rectangle in CSS pixels,
//! re-read on every draw because layout can change between frames.

use std::sync::{Mutex, RwLock};

use crate::geometry::Rect;

/// An element the overlay is drawn over
pub trait VideoView: Send + Sync {
    /// Current display rectangle in CSS pixels
    ///
    /// A zero-sized rectangle means the element has not been laid out yet.
    fn display_rect(&self) -> Rect;
}

/// A view with an externally updated display rectangle
///
/// Useful for embedders that track their own layout, and for tests.
pub struct FixedView {
    rect: RwLock<Rect>,
}

impl FixedView {
    /// Create a view with the given display rectangle
    pub fn new(rect: Rect) -> Self {
        Self {
            rect: RwLock::new(rect),
        }
    }

    /// Replace the display rectangle
    pub fn set_rect(&self, rect: Rect) {
        *self.rect.write().unwrap_or_else(|e| e.into_inner()) = rect;
    }
}

impl VideoView for FixedView {
    fn display_rect(&self) -> Rect {
        *self.rect.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Test helper that counts how often its rectangle is observed
pub struct CountingView {
    rect: Mutex<Rect>,
    reads: std::sync::atomic::AtomicUsize,
}

impl CountingView {
    /// Create a counting view
    pub fn new(rect: Rect) -> Self {
        Self {
            rect: Mutex::new(rect),
            reads: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Replace the display rectangle
    pub fn set_rect(&self, rect: Rect) {
        *self.rect.lock().unwrap_or_else(|e| e.into_inner()) = rect;
    }

    /// How many times `display_rect` was called
    pub fn reads(&self) -> usize {
        self.reads.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl VideoView for CountingView {
    fn display_rect(&self) -> Rect {
        self.reads
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        *self.rect.lock().unwrap_or_else(|e| e.into_inner())
    }
}
