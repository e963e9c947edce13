//! Overlay session
//!
//! High-level API tying the pipeline together: acquire a shared channel,
//! stream encoded frames to the backend on a timer, and draw each inbound
//! detection message — enriched from the other stream's cache — over the
//! video view.
//!
//! The session never renders user-facing text itself; connection lifecycle
//! is exposed as [`SessionEvent`]s for an external notification layer.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::capture::{encoded_size, CapturePipeline, FrameSink, FrameSource};
use crate::channel::{
    ChannelHandle, ChannelPool, Subscription, EVENT_CONNECT, EVENT_CONNECT_ERROR, EVENT_DISCONNECT,
};
use crate::config::StreamSettings;
use crate::detection::{parse_detections, DetectionStream, FusionEngine};
use crate::error::Result;
use crate::geometry::FitMode;
use crate::overlay::{
    DrawOptions, OverlayCanvas, OverlayRenderer, ResizeCoordinator, VideoView, ViewportSignals,
};
use crate::stats::{ChannelStatsSnapshot, PipelineStatsSnapshot};

/// Event announcing this client's stream parameters after each connect
const CONFIGURE_EVENT: &str = "configure";

/// Events from an overlay session
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Channel connected (also after a reconnect)
    Connected,

    /// Channel disconnected
    Disconnected,

    /// A connection attempt failed
    ConnectError(String),

    /// A detection stream message was processed and drawn
    StreamUpdated {
        /// Which stream produced the message
        stream: DetectionStream,
        /// Detections in the drawn (fused) list
        detections: usize,
    },
}

/// Live overlay streaming session
///
/// # Example
/// ```no_run
/// use std::sync::{Arc, Mutex};
/// use facecast_rs::capture::TestPattern;
/// use facecast_rs::channel::ChannelPool;
/// use facecast_rs::client::OverlaySession;
/// use facecast_rs::config::StreamSettings;
/// use facecast_rs::geometry::Rect;
/// use facecast_rs::overlay::{FixedView, OverlayCanvas, OverlayRenderer};
///
/// # fn example() -> facecast_rs::error::Result<()> {
/// let pool = ChannelPool::default();
/// let renderer = Arc::new(OverlayRenderer::default());
/// let (mut session, mut events) = OverlaySession::new(StreamSettings::default(), renderer);
///
/// tokio::spawn(async move {
///     while let Some(event) = events.recv().await {
///         println!("Event: {:?}", event);
///     }
/// });
///
/// session.start(
///     &pool,
///     "wss://api.example.com/detect",
///     Arc::new(TestPattern::new(640, 480)),
///     Arc::new(FixedView::new(Rect::new(0.0, 0.0, 640.0, 480.0))),
///     Arc::new(Mutex::new(OverlayCanvas::new(1.0))),
/// )?;
/// # Ok(())
/// # }
/// ```
pub struct OverlaySession {
    settings: StreamSettings,
    renderer: Arc<OverlayRenderer>,
    fusion: Arc<Mutex<FusionEngine>>,
    event_tx: mpsc::UnboundedSender<SessionEvent>,
    handle: Option<Arc<ChannelHandle>>,
    pipeline: Option<CapturePipeline>,
    subscriptions: Vec<Subscription>,
    coordinator: Option<ResizeCoordinator>,
}

impl OverlaySession {
    /// Create a session.
    ///
    /// Returns the session and a receiver for its events.
    pub fn new(
        settings: StreamSettings,
        renderer: Arc<OverlayRenderer>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let fusion = Arc::new(Mutex::new(FusionEngine::new(
            settings.fusion_window,
            settings.iou_threshold,
        )));

        let session = Self {
            settings,
            renderer,
            fusion,
            event_tx,
            handle: None,
            pipeline: None,
            subscriptions: Vec::new(),
            coordinator: None,
        };

        (session, event_rx)
    }

    /// Start streaming frames and drawing detections
    ///
    /// Acquires a shared channel from the pool, subscribes to both
    /// detection streams and spawns the capture timer. A running session is
    /// stopped first, so `start` doubles as restart.
    pub fn start(
        &mut self,
        pool: &ChannelPool,
        endpoint: &str,
        source: Arc<dyn FrameSource>,
        view: Arc<dyn VideoView>,
        canvas: Arc<Mutex<OverlayCanvas>>,
    ) -> Result<()> {
        self.stop();

        let handle = Arc::new(pool.acquire(endpoint)?);

        self.subscriptions.push(self.forward_lifecycle(
            &handle,
            EVENT_CONNECT,
            |_| SessionEvent::Connected,
        )?);
        self.subscriptions.push(self.announce_on_connect(&handle)?);
        self.subscriptions.push(self.forward_lifecycle(
            &handle,
            EVENT_DISCONNECT,
            |_| SessionEvent::Disconnected,
        )?);
        self.subscriptions.push(self.forward_lifecycle(
            &handle,
            EVENT_CONNECT_ERROR,
            |data| SessionEvent::ConnectError(data.as_str().unwrap_or("unknown").to_string()),
        )?);

        for (event, stream) in [
            (self.settings.identity_event.clone(), DetectionStream::Identity),
            (self.settings.attribute_event.clone(), DetectionStream::Attribute),
        ] {
            let fusion = Arc::clone(&self.fusion);
            let renderer = Arc::clone(&self.renderer);
            let source = Arc::clone(&source);
            let view = Arc::clone(&view);
            let canvas = Arc::clone(&canvas);
            let event_tx = self.event_tx.clone();
            let encode_width = self.settings.encode_width;
            let fit = self.settings.fit_mode;

            self.subscriptions.push(handle.on(&event, move |data| {
                process_detection_message(
                    stream,
                    data,
                    &fusion,
                    &renderer,
                    &source,
                    &view,
                    &canvas,
                    encode_width,
                    fit,
                    &event_tx,
                );
            })?);
        }

        let pipeline = CapturePipeline::spawn(
            source,
            Arc::clone(&handle) as Arc<dyn FrameSink>,
            &self.settings,
        );

        tracing::info!(endpoint = %handle.endpoint(), "Overlay session started");

        self.handle = Some(handle);
        self.pipeline = Some(pipeline);
        Ok(())
    }

    /// React to viewport changes by replaying the overlay
    ///
    /// Installs a resize coordinator on this session's renderer. Call after
    /// `start`: `stop` (and therefore a restart) uninstalls it.
    pub fn attach_resize(&mut self, signals: &ViewportSignals) {
        let coordinator = ResizeCoordinator::new(
            Arc::clone(&self.renderer),
            signals.clone(),
            self.settings.resize_debounce,
        );
        coordinator.install();
        self.coordinator = Some(coordinator);
    }

    /// Stop the session
    ///
    /// Clears the capture timer, drops the stream subscriptions and
    /// releases the channel reference. Idempotent; also runs on drop, so
    /// teardown happens even when the caller errors out.
    pub fn stop(&mut self) {
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
        self.subscriptions.clear();
        if let Some(coordinator) = self.coordinator.take() {
            coordinator.uninstall();
        }
        if let Some(handle) = self.handle.take() {
            handle.release();
            tracing::info!(endpoint = %handle.endpoint(), "Overlay session stopped");
        }
    }

    /// Whether the session is currently streaming
    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Capture pipeline statistics, when running
    pub fn pipeline_stats(&self) -> Option<PipelineStatsSnapshot> {
        self.pipeline.as_ref().map(CapturePipeline::stats)
    }

    /// Channel statistics, when running
    pub fn channel_stats(&self) -> Option<ChannelStatsSnapshot> {
        self.handle.as_ref().map(|h| h.stats())
    }

    fn forward_lifecycle(
        &self,
        handle: &ChannelHandle,
        event: &str,
        map: impl Fn(&Value) -> SessionEvent + Send + Sync + 'static,
    ) -> Result<Subscription> {
        let event_tx = self.event_tx.clone();
        handle.on(event, move |data| {
            let _ = event_tx.send(map(data));
        })
    }

    /// Tell the backend our stream parameters after every (re)connect
    ///
    /// The announce is acknowledged so a silently-deaf backend shows up in
    /// the logs instead of as an empty overlay.
    fn announce_on_connect(&self, handle: &Arc<ChannelHandle>) -> Result<Subscription> {
        let announce_handle = Arc::clone(handle);
        let ack_timeout = self.settings.ack_timeout;
        let params = serde_json::json!({
            "width": self.settings.encode_width,
            "interval_ms": self.settings.capture_interval.as_millis() as u64,
            "frame_event": self.settings.frame_event,
        });

        handle.on(EVENT_CONNECT, move |_| {
            let handle = Arc::clone(&announce_handle);
            let params = params.clone();
            tokio::spawn(async move {
                match handle.emit_with_ack(CONFIGURE_EVENT, params, ack_timeout).await {
                    Ok(_) => tracing::debug!("Backend acknowledged stream configuration"),
                    Err(e) => tracing::warn!(error = %e, "Stream configuration not acknowledged"),
                }
            });
        })
    }
}

impl Drop for OverlaySession {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Handle one inbound detection-stream message
///
/// Normalizes the payload, refreshes this stream's fusion cache, enriches
/// the list from the other stream's cache and draws the result. Geometry
/// that is not ready yet (source without dimensions) skips the draw but
/// still updates the cache, so the next message from either stream can use
/// it.
#[allow(clippy::too_many_arguments)]
pub(crate) fn process_detection_message(
    stream: DetectionStream,
    payload: &Value,
    fusion: &Arc<Mutex<FusionEngine>>,
    renderer: &Arc<OverlayRenderer>,
    source: &Arc<dyn FrameSource>,
    view: &Arc<dyn VideoView>,
    canvas: &Arc<Mutex<OverlayCanvas>>,
    encode_width: u32,
    fit: FitMode,
    event_tx: &mpsc::UnboundedSender<SessionEvent>,
) {
    let detections = parse_detections(payload);
    let now = Instant::now();

    let fused = {
        let mut fusion = fusion.lock().unwrap_or_else(|e| e.into_inner());
        fusion.update_cache(stream, detections.clone(), now);
        fusion.fuse(stream, detections, now)
    };

    let count = fused.len();
    tracing::debug!(stream = %stream, detections = count, "Detection message");

    if let Some((src_w, src_h)) = source.dimensions() {
        let (encoded_w, encoded_h) = encoded_size(src_w, src_h, encode_width);
        // Earlier deferred draws get their retry on this "frame"
        renderer.flush_deferred();
        renderer.draw(
            Arc::clone(view),
            Arc::clone(canvas),
            fused,
            DrawOptions::new(encoded_w, encoded_h, fit),
        );
    }

    let _ = event_tx.send(SessionEvent::StreamUpdated {
        stream,
        detections: count,
    });
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use crate::capture::TestPattern;
    use crate::channel::{ChannelOptions, ChannelPool};
    use crate::geometry::Rect;
    use crate::overlay::FixedView;

    use super::*;

    fn harness() -> (
        Arc<Mutex<FusionEngine>>,
        Arc<OverlayRenderer>,
        Arc<dyn FrameSource>,
        Arc<dyn VideoView>,
        Arc<Mutex<OverlayCanvas>>,
        mpsc::UnboundedSender<SessionEvent>,
        mpsc::UnboundedReceiver<SessionEvent>,
    ) {
        let fusion = Arc::new(Mutex::new(FusionEngine::new(
            std::time::Duration::from_millis(300),
            0.25,
        )));
        let renderer = Arc::new(OverlayRenderer::default());
        let source: Arc<dyn FrameSource> = Arc::new(TestPattern::new(640, 480));
        let view: Arc<dyn VideoView> = Arc::new(FixedView::new(Rect::new(0.0, 0.0, 320.0, 240.0)));
        let canvas = Arc::new(Mutex::new(OverlayCanvas::new(1.0)));
        let (tx, rx) = mpsc::unbounded_channel();
        (fusion, renderer, source, view, canvas, tx, rx)
    }

    #[test]
    fn test_message_draws_and_reports() {
        let (fusion, renderer, source, view, canvas, tx, mut rx) = harness();

        process_detection_message(
            DetectionStream::Identity,
            &json!([{ "bbox": [10, 10, 50, 50], "name": "Alice" }]),
            &fusion,
            &renderer,
            &source,
            &view,
            &canvas,
            320,
            FitMode::Contain,
            &tx,
        );

        assert!(!canvas.lock().unwrap().is_blank());
        assert_eq!(renderer.cached_count(), 1);
        assert_eq!(
            rx.try_recv().unwrap(),
            SessionEvent::StreamUpdated {
                stream: DetectionStream::Identity,
                detections: 1
            }
        );
    }

    #[test]
    fn test_second_stream_enriched_from_first() {
        let (fusion, renderer, source, view, canvas, tx, _rx) = harness();

        process_detection_message(
            DetectionStream::Identity,
            &json!([{ "bbox": [10, 10, 50, 50], "name": "Alice" }]),
            &fusion,
            &renderer,
            &source,
            &view,
            &canvas,
            320,
            FitMode::Contain,
            &tx,
        );
        process_detection_message(
            DetectionStream::Attribute,
            &json!([{ "box": {"x": 12, "y": 11, "w": 48, "h": 49}, "emotion": "happy" }]),
            &fusion,
            &renderer,
            &source,
            &view,
            &canvas,
            320,
            FitMode::Contain,
            &tx,
        );

        // The attribute list was matched against the identity cache
        let fused = {
            let fusion = fusion.lock().unwrap();
            fusion.fuse(
                DetectionStream::Attribute,
                vec![crate::detection::Detection::with_bbox(Rect::new(
                    12.0, 11.0, 48.0, 49.0,
                ))],
                Instant::now(),
            )
        };
        assert_eq!(fused[0].identity.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_empty_message_clears_overlay() {
        let (fusion, renderer, source, view, canvas, tx, _rx) = harness();

        process_detection_message(
            DetectionStream::Identity,
            &json!([{ "bbox": [10, 10, 50, 50], "name": "Alice" }]),
            &fusion,
            &renderer,
            &source,
            &view,
            &canvas,
            320,
            FitMode::Contain,
            &tx,
        );
        assert!(!canvas.lock().unwrap().is_blank());

        process_detection_message(
            DetectionStream::Identity,
            &json!([]),
            &fusion,
            &renderer,
            &source,
            &view,
            &canvas,
            320,
            FitMode::Contain,
            &tx,
        );
        assert!(canvas.lock().unwrap().is_blank());
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let pool = ChannelPool::new(ChannelOptions::default().reconnect(false));
        let renderer = Arc::new(OverlayRenderer::default());
        let (mut session, _events) = OverlaySession::new(StreamSettings::default(), renderer);

        let source = Arc::new(TestPattern::new(640, 480));
        let view = Arc::new(FixedView::new(Rect::new(0.0, 0.0, 320.0, 240.0)));
        let canvas = Arc::new(Mutex::new(OverlayCanvas::new(1.0)));

        session
            .start(&pool, "ws://example.com/detect", source, view, canvas)
            .unwrap();
        assert!(session.is_running());
        assert_eq!(pool.connection_count(), 1);
        assert!(session.pipeline_stats().is_some());

        session.stop();
        session.stop();
        assert!(!session.is_running());
        assert_eq!(pool.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_start_twice_restarts() {
        let pool = ChannelPool::new(ChannelOptions::default().reconnect(false));
        let renderer = Arc::new(OverlayRenderer::default());
        let (mut session, _events) = OverlaySession::new(StreamSettings::default(), renderer);

        let source = Arc::new(TestPattern::new(640, 480));
        let view = Arc::new(FixedView::new(Rect::new(0.0, 0.0, 320.0, 240.0)));
        let canvas = Arc::new(Mutex::new(OverlayCanvas::new(1.0)));

        session
            .start(
                &pool,
                "ws://example.com/detect",
                Arc::clone(&source) as _,
                Arc::clone(&view) as _,
                Arc::clone(&canvas),
            )
            .unwrap();
        session
            .start(&pool, "ws://example.com/other", source, view, canvas)
            .unwrap();

        // The first endpoint's reference was released by the restart
        assert_eq!(pool.connection_count(), 1);
        assert_eq!(
            session.handle.as_ref().unwrap().endpoint().as_str(),
            "ws://example.com/other"
        );
    }
}
