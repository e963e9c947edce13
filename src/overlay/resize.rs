//! Resize coordination
//!
//! Viewport geometry changes (window resize, orientation change, visual
//! viewport updates) arrive as signals from the embedding layer. The
//! coordinator debounces a burst into one replay of every cached overlay,
//! so geometry catches up without re-fetching detections.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::renderer::OverlayRenderer;

/// A viewport geometry change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewportSignal {
    /// Window resized
    Resized,
    /// Device orientation changed
    OrientationChanged,
    /// Visual viewport changed (pinch zoom, keyboard)
    ViewportChanged,
}

/// Source of viewport signals
///
/// The embedding layer owns one of these and publishes into it from its
/// platform event hooks.
#[derive(Clone)]
pub struct ViewportSignals {
    tx: broadcast::Sender<ViewportSignal>,
}

impl ViewportSignals {
    /// Create a signal source
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Publish a signal; a no-op when nothing is installed
    pub fn notify(&self, signal: ViewportSignal) {
        let _ = self.tx.send(signal);
    }

    fn subscribe(&self) -> broadcast::Receiver<ViewportSignal> {
        self.tx.subscribe()
    }
}

impl Default for ViewportSignals {
    fn default() -> Self {
        Self::new()
    }
}

/// Debounced replay of cached overlays on viewport changes
///
/// One coordinator per renderer; `install()` and `uninstall()` are
/// idempotent, so repeated calls from multiple consumers never stack
/// duplicate listeners.
pub struct ResizeCoordinator {
    renderer: Arc<OverlayRenderer>,
    signals: ViewportSignals,
    debounce: Duration,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ResizeCoordinator {
    /// Create a coordinator for a renderer
    pub fn new(renderer: Arc<OverlayRenderer>, signals: ViewportSignals, debounce: Duration) -> Self {
        Self {
            renderer,
            signals,
            debounce,
            task: Mutex::new(None),
        }
    }

    /// Start listening for viewport signals
    ///
    /// No-op when already installed.
    pub fn install(&self) {
        let mut task = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if task.as_ref().map(|t| !t.is_finished()).unwrap_or(false) {
            return;
        }

        let renderer = Arc::clone(&self.renderer);
        let mut rx = self.signals.subscribe();
        let debounce = self.debounce;

        *task = Some(tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => return,
                }

                // Coalesce the burst: every further signal restarts the timer
                loop {
                    match tokio::time::timeout(debounce, rx.recv()).await {
                        Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
                        Ok(Err(broadcast::error::RecvError::Closed)) => return,
                        Err(_) => break,
                    }
                }

                tracing::debug!("Viewport settled, replaying cached overlays");
                renderer.flush_deferred();
                renderer.replay_all();
            }
        }));

        tracing::debug!("Resize coordinator installed");
    }

    /// Stop listening for viewport signals
    ///
    /// No-op when not installed.
    pub fn uninstall(&self) {
        let task = {
            let mut guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
            guard.take()
        };
        if let Some(task) = task {
            task.abort();
            tracing::debug!("Resize coordinator uninstalled");
        }
    }

    /// Whether the coordinator is currently listening
    pub fn is_installed(&self) -> bool {
        let guard = self.task.lock().unwrap_or_else(|e| e.into_inner());
        guard.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }
}

impl Drop for ResizeCoordinator {
    fn drop(&mut self) {
        self.uninstall();
    }
}

#[cfg(test)]
mod tests {
    use crate::detection::Detection;
    use crate::geometry::{FitMode, Rect};
    use crate::overlay::canvas::OverlayCanvas;
    use crate::overlay::renderer::DrawOptions;
    use crate::overlay::view::CountingView;

    use super::*;

    fn setup() -> (
        Arc<OverlayRenderer>,
        Arc<CountingView>,
        Arc<Mutex<OverlayCanvas>>,
    ) {
        let renderer = Arc::new(OverlayRenderer::default());
        let view = Arc::new(CountingView::new(Rect::new(0.0, 0.0, 320.0, 240.0)));
        let canvas = Arc::new(Mutex::new(OverlayCanvas::new(1.0)));

        renderer.draw(
            Arc::clone(&view) as _,
            Arc::clone(&canvas),
            vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))],
            DrawOptions::new(320, 240, FitMode::Contain),
        );

        (renderer, view, canvas)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_coalesces_into_one_replay() {
        let (renderer, view, _canvas) = setup();
        let signals = ViewportSignals::new();
        let coordinator = ResizeCoordinator::new(
            Arc::clone(&renderer),
            signals.clone(),
            Duration::from_millis(100),
        );
        coordinator.install();
        tokio::task::yield_now().await;

        let before = view.reads();

        // Five signals inside one debounce window
        for _ in 0..5 {
            signals.notify(ViewportSignal::Resized);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Exactly one replay: one extra geometry read
        assert_eq!(view.reads(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_replay_applies_new_geometry() {
        let (renderer, view, canvas) = setup();
        let signals = ViewportSignals::new();
        let coordinator = ResizeCoordinator::new(
            Arc::clone(&renderer),
            signals.clone(),
            Duration::from_millis(100),
        );
        coordinator.install();
        tokio::task::yield_now().await;

        view.set_rect(Rect::new(0.0, 0.0, 640.0, 480.0));
        signals.notify(ViewportSignal::OrientationChanged);
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(canvas.lock().unwrap().buffer_size(), (640, 480));
    }

    #[tokio::test(start_paused = true)]
    async fn test_install_is_idempotent() {
        let (renderer, view, _canvas) = setup();
        let signals = ViewportSignals::new();
        let coordinator = ResizeCoordinator::new(
            Arc::clone(&renderer),
            signals.clone(),
            Duration::from_millis(100),
        );

        coordinator.install();
        coordinator.install();
        coordinator.install();
        tokio::task::yield_now().await;
        assert!(coordinator.is_installed());

        let before = view.reads();
        signals.notify(ViewportSignal::Resized);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // One listener, one replay
        assert_eq!(view.reads(), before + 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_uninstall_stops_replays() {
        let (renderer, view, _canvas) = setup();
        let signals = ViewportSignals::new();
        let coordinator = ResizeCoordinator::new(
            Arc::clone(&renderer),
            signals.clone(),
            Duration::from_millis(100),
        );
        coordinator.install();
        tokio::task::yield_now().await;

        coordinator.uninstall();
        coordinator.uninstall();
        assert!(!coordinator.is_installed());

        let before = view.reads();
        signals.notify(ViewportSignal::Resized);
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(view.reads(), before);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cleared_canvas_not_replayed() {
        let (renderer, view, canvas) = setup();
        let signals = ViewportSignals::new();
        let coordinator = ResizeCoordinator::new(
            Arc::clone(&renderer),
            signals.clone(),
            Duration::from_millis(100),
        );
        coordinator.install();
        tokio::task::yield_now().await;

        renderer.clear(&canvas);
        let before = view.reads();

        signals.notify(ViewportSignal::Resized);
        tokio::time::sleep(Duration::from_millis(200)).await;

        // Nothing cached, so the view's geometry is never re-read
        assert_eq!(view.reads(), before);
        assert!(canvas.lock().unwrap().is_blank());
    }
}
