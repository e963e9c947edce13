//! Capture pipeline
//!
//! Owns the capture timer: every tick, encode the source's current frame
//! and hand it to the sink as a binary frame event. A tick where the source
//! is not ready is skipped silently; a sink failure stops the pipeline,
//! since the channel it fed is gone.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::channel::ChannelHandle;
use crate::config::StreamSettings;
use crate::error::Result;
use crate::stats::{PipelineStats, PipelineStatsSnapshot};

use super::encoder::FrameEncoder;
use super::source::FrameSource;

/// Where encoded frames go
pub trait FrameSink: Send + Sync {
    /// Deliver one encoded frame
    fn send_frame(&self, event: &str, payload: Bytes) -> Result<()>;
}

impl FrameSink for ChannelHandle {
    fn send_frame(&self, event: &str, payload: Bytes) -> Result<()> {
        self.emit_binary(event, payload)
    }
}

/// Periodic capture/encode/send loop
///
/// The timer is cleared exactly once: `stop()` is idempotent and dropping
/// the pipeline stops it too.
pub struct CapturePipeline {
    task: Mutex<Option<JoinHandle<()>>>,
    stats: Arc<PipelineStats>,
}

impl CapturePipeline {
    /// Spawn the capture loop with the given source and sink
    pub fn spawn(
        source: Arc<dyn FrameSource>,
        sink: Arc<dyn FrameSink>,
        settings: &StreamSettings,
    ) -> Self {
        let stats = Arc::new(PipelineStats::new());

        let mut encoder = FrameEncoder::new(settings.encode_format, settings.encode_quality);
        let interval = settings.capture_interval;
        let width = settings.encode_width;
        let event = settings.frame_event.clone();
        let task_stats = Arc::clone(&stats);

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // A stalled encode should not be followed by a burst of
            // catch-up frames
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                task_stats.record_tick();

                match encoder.capture(source.as_ref(), width) {
                    Some(payload) => {
                        task_stats.record_frame(payload.len());
                        if let Err(e) = sink.send_frame(&event, payload) {
                            tracing::debug!(error = %e, "Frame sink gone, stopping capture");
                            return;
                        }
                    }
                    None => task_stats.record_skip(),
                }
            }
        });

        tracing::debug!(
            interval_ms = interval.as_millis() as u64,
            width = width,
            "Capture pipeline started"
        );

        Self {
            task: Mutex::new(Some(task)),
            stats,
        }
    }

    /// Stop the capture timer
    ///
    /// Idempotent; later calls are no-ops.
    pub fn stop(&self) {
        let task = {
            let mut guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(task) = task {
            task.abort();
            tracing::debug!("Capture pipeline stopped");
        }
    }

    /// Whether the capture loop is still running
    pub fn is_running(&self) -> bool {
        let guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Current pipeline statistics
    pub fn stats(&self) -> PipelineStatsSnapshot {
        self.stats.snapshot()
    }
}

impl Drop for CapturePipeline {
    fn drop(&mut self) {
        self.stop();
    }
}
