//! Stream settings
//!
//! Tunable parameters consumed by the capture pipeline, fusion engine and
//! renderer. The library treats these as read-only inputs; where they come
//! from (settings UI, persisted profile) is the embedding application's
//! concern.

use std::time::Duration;

use crate::capture::EncodeFormat;
use crate::geometry::FitMode;

/// Tunable parameters for a live overlay stream
#[derive(Debug, Clone)]
pub struct StreamSettings {
    /// Width of the encoded frame sent to the backend, in pixels
    pub encode_width: u32,

    /// Encode quality in [0.1, 1.0] (lossy formats only)
    pub encode_quality: f32,

    /// Preferred frame encoding
    pub encode_format: EncodeFormat,

    /// Interval between frame captures
    pub capture_interval: Duration,

    /// How the video content is fitted into its element
    pub fit_mode: FitMode,

    /// Maximum age of a cached detection list before it is too stale to
    /// enrich the other stream
    pub fusion_window: Duration,

    /// Minimum IoU for two boxes to be considered the same face
    pub iou_threshold: f32,

    /// How long an acknowledged emit waits before giving up
    pub ack_timeout: Duration,

    /// Debounce window for viewport resize signals
    pub resize_debounce: Duration,

    /// Event name for outbound encoded frames
    pub frame_event: String,

    /// Event name for inbound identity detections
    pub identity_event: String,

    /// Event name for inbound attribute detections
    pub attribute_event: String,
}

impl Default for StreamSettings {
    fn default() -> Self {
        Self {
            encode_width: 320,
            encode_quality: 0.6,
            encode_format: EncodeFormat::Jpeg,
            capture_interval: Duration::from_millis(500),
            fit_mode: FitMode::Contain,
            fusion_window: Duration::from_millis(300),
            iou_threshold: 0.25,
            ack_timeout: Duration::from_secs(5),
            resize_debounce: Duration::from_millis(100),
            frame_event: "frame".to_string(),
            identity_event: "identity_result".to_string(),
            attribute_event: "attribute_result".to_string(),
        }
    }
}

impl StreamSettings {
    /// Create settings with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the encoded frame width
    pub fn encode_width(mut self, width: u32) -> Self {
        self.encode_width = width.max(1);
        self
    }

    /// Set the encode quality, clamped to [0.1, 1.0]
    pub fn encode_quality(mut self, quality: f32) -> Self {
        self.encode_quality = quality.clamp(0.1, 1.0);
        self
    }

    /// Set the preferred frame encoding
    pub fn encode_format(mut self, format: EncodeFormat) -> Self {
        self.encode_format = format;
        self
    }

    /// Set the capture interval
    ///
    /// Clamped to [100ms, 2s]; outside that range the stream is either
    /// flooding the backend or too choppy to be useful.
    pub fn capture_interval(mut self, interval: Duration) -> Self {
        self.capture_interval = interval.clamp(Duration::from_millis(100), Duration::from_secs(2));
        self
    }

    /// Set the display fit mode
    pub fn fit_mode(mut self, fit: FitMode) -> Self {
        self.fit_mode = fit;
        self
    }

    /// Set the fusion window
    pub fn fusion_window(mut self, window: Duration) -> Self {
        self.fusion_window = window;
        self
    }

    /// Set the IoU match threshold, clamped to [0.0, 1.0]
    pub fn iou_threshold(mut self, threshold: f32) -> Self {
        self.iou_threshold = threshold.clamp(0.0, 1.0);
        self
    }

    /// Set the ack timeout
    pub fn ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }

    /// Set the resize debounce window
    pub fn resize_debounce(mut self, debounce: Duration) -> Self {
        self.resize_debounce = debounce;
        self
    }

    /// Set the outbound frame event name
    pub fn frame_event(mut self, event: impl Into<String>) -> Self {
        self.frame_event = event.into();
        self
    }

    /// Set the inbound identity event name
    pub fn identity_event(mut self, event: impl Into<String>) -> Self {
        self.identity_event = event.into();
        self
    }

    /// Set the inbound attribute event name
    pub fn attribute_event(mut self, event: impl Into<String>) -> Self {
        self.attribute_event = event.into();
        self
    }
}
