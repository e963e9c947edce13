//! Statistics counters
//!
//! Counters are updated from the connection actor and the capture task, so
//! they are atomics; `snapshot()` turns them into plain values for display.

use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters for one pooled connection
#[derive(Debug, Default)]
pub struct ChannelStats {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    events_out: AtomicU64,
    frames_out: AtomicU64,
    bytes_out: AtomicU64,
    events_in: AtomicU64,
    acks_timed_out: AtomicU64,
    dropped: AtomicU64,
}

impl ChannelStats {
    /// Create a zeroed counter set
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_event_out(&self) {
        self.events_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame_out(&self, bytes: usize) {
        self.frames_out.fetch_add(1, Ordering::Relaxed);
        self.bytes_out.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_event_in(&self) {
        self.events_in.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_ack_timeout(&self) {
        self.acks_timed_out.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> ChannelStatsSnapshot {
        ChannelStatsSnapshot {
            connects: self.connects.load(Ordering::Relaxed),
            connect_failures: self.connect_failures.load(Ordering::Relaxed),
            events_out: self.events_out.load(Ordering::Relaxed),
            frames_out: self.frames_out.load(Ordering::Relaxed),
            bytes_out: self.bytes_out.load(Ordering::Relaxed),
            events_in: self.events_in.load(Ordering::Relaxed),
            acks_timed_out: self.acks_timed_out.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`ChannelStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChannelStatsSnapshot {
    /// Successful connection attempts (including reconnects)
    pub connects: u64,
    /// Failed connection attempts
    pub connect_failures: u64,
    /// Structured events sent
    pub events_out: u64,
    /// Binary frames sent
    pub frames_out: u64,
    /// Binary payload bytes sent
    pub bytes_out: u64,
    /// Structured events received
    pub events_in: u64,
    /// Acknowledged emits that timed out
    pub acks_timed_out: u64,
    /// Messages dropped (malformed inbound, sends while disconnected)
    pub dropped: u64,
}

/// Live counters for one capture pipeline
#[derive(Debug, Default)]
pub struct PipelineStats {
    ticks: AtomicU64,
    frames_captured: AtomicU64,
    frames_skipped: AtomicU64,
    bytes_encoded: AtomicU64,
}

impl PipelineStats {
    /// Create a zeroed counter set
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_frame(&self, bytes: usize) {
        self.frames_captured.fetch_add(1, Ordering::Relaxed);
        self.bytes_encoded.fetch_add(bytes as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_skip(&self) {
        self.frames_skipped.fetch_add(1, Ordering::Relaxed);
    }

    /// Copy the current counter values
    pub fn snapshot(&self) -> PipelineStatsSnapshot {
        PipelineStatsSnapshot {
            ticks: self.ticks.load(Ordering::Relaxed),
            frames_captured: self.frames_captured.load(Ordering::Relaxed),
            frames_skipped: self.frames_skipped.load(Ordering::Relaxed),
            bytes_encoded: self.bytes_encoded.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of [`PipelineStats`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStatsSnapshot {
    /// Capture timer ticks
    pub ticks: u64,
    /// Frames captured and sent
    pub frames_captured: u64,
    /// Ticks skipped because the source was not ready or encoding failed
    pub frames_skipped: u64,
    /// Total encoded payload bytes
    pub bytes_encoded: u64,
}

impl PipelineStatsSnapshot {
    /// Fraction of ticks that produced a frame
    pub fn capture_ratio(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.frames_captured as f64 / self.ticks as f64
        }
    }

    /// Average encoded frame size in bytes
    pub fn average_frame_size(&self) -> u64 {
        if self.frames_captured == 0 {
            0
        } else {
            self.bytes_encoded / self.frames_captured
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_stats_snapshot() {
        let stats = ChannelStats::new();

        stats.record_connect();
        stats.record_event_out();
        stats.record_event_out();
        stats.record_frame_out(1024);
        stats.record_event_in();
        stats.record_ack_timeout();
        stats.record_dropped();

        let snap = stats.snapshot();
        assert_eq!(snap.connects, 1);
        assert_eq!(snap.events_out, 2);
        assert_eq!(snap.frames_out, 1);
        assert_eq!(snap.bytes_out, 1024);
        assert_eq!(snap.events_in, 1);
        assert_eq!(snap.acks_timed_out, 1);
        assert_eq!(snap.dropped, 1);
    }

    #[test]
    fn test_pipeline_capture_ratio() {
        let stats = PipelineStats::new();

        for _ in 0..4 {
            stats.record_tick();
        }
        stats.record_frame(2000);
        stats.record_frame(4000);
        stats.record_skip();
        stats.record_skip();

        let snap = stats.snapshot();
        assert_eq!(snap.ticks, 4);
        assert_eq!(snap.frames_captured, 2);
        assert_eq!(snap.frames_skipped, 2);
        assert!((snap.capture_ratio() - 0.5).abs() < 1e-9);
        assert_eq!(snap.average_frame_size(), 3000);
    }

    #[test]
    fn test_empty_pipeline_ratios() {
        let snap = PipelineStats::new().snapshot();
        assert_eq!(snap.capture_ratio(), 0.0);
        assert_eq!(snap.average_frame_size(), 0);
    }
}
