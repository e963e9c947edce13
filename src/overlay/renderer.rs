//! Overlay renderer
//!
//! Drawing is split into two phases: `compute_plan` is pure and works
//! entirely in CSS pixels, `commit` rasterizes a plan onto a canvas at the
//! canvas's device pixel ratio. `draw` runs both and caches the request so
//! a later viewport change can replay it; the replay path commits without
//! touching the cache, which is what breaks the draw → cache → resize →
//! draw feedback loop.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use image::Rgba;
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_text_mut};

use crate::detection::Detection;
use crate::geometry::{compute_transform, map_box, FitMode, Rect, Size};

use super::canvas::{CanvasId, OverlayCanvas};
use super::style::OverlayStyle;
use super::view::VideoView;

/// Per-draw options
#[derive(Debug, Clone, PartialEq)]
pub struct DrawOptions {
    /// Encoded-frame width the detections are expressed in
    pub source_width: u32,
    /// Encoded-frame height the detections are expressed in
    pub source_height: u32,
    /// How the video content is fitted into its element
    pub fit: FitMode,
}

impl DrawOptions {
    /// Create options for the given encoded-frame dimensions and fit mode
    pub fn new(source_width: u32, source_height: u32, fit: FitMode) -> Self {
        Self {
            source_width,
            source_height,
            fit,
        }
    }
}

/// One rasterization primitive, in CSS pixels
#[derive(Debug, Clone, PartialEq)]
pub enum PlanItem {
    /// Box outline
    Outline { rect: Rect, color: Rgba<u8> },
    /// Label chip (background always, text when a font is loaded)
    Chip { rect: Rect, text: String },
    /// Unfilled score bar track
    ScoreTrack { rect: Rect },
    /// Filled part of a score bar
    ScoreFill { rect: Rect, color: Rgba<u8> },
}

/// A computed draw, ready to commit
#[derive(Debug, Clone, PartialEq)]
pub struct DrawPlan {
    /// CSS size the plan was computed for
    pub css_size: Size,
    /// Primitives in paint order
    pub items: Vec<PlanItem>,
}

/// What `draw` did with the request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawOutcome {
    /// Plan committed and cached
    Committed,
    /// View not laid out yet; queued for one retry
    Deferred,
}

struct CacheEntry {
    view: Arc<dyn VideoView>,
    canvas: Arc<Mutex<OverlayCanvas>>,
    detections: Vec<Detection>,
    options: DrawOptions,
}

/// Draws detection lists over video views and replays them on demand
///
/// Owns the overlay cache. An explicit object rather than a global so tests
/// and multi-window embedders can run isolated instances.
pub struct OverlayRenderer {
    style: OverlayStyle,
    cache: Mutex<HashMap<CanvasId, CacheEntry>>,
    deferred: Mutex<HashMap<CanvasId, CacheEntry>>,
}

impl OverlayRenderer {
    /// Create a renderer with the given style
    pub fn new(style: OverlayStyle) -> Self {
        Self {
            style,
            cache: Mutex::new(HashMap::new()),
            deferred: Mutex::new(HashMap::new()),
        }
    }

    /// Draw a detection list over a view and remember the request
    ///
    /// The canvas buffer is resized and cleared even for an empty list, so
    /// stale boxes never outlive the message that superseded them. A view
    /// that reports a zero-sized rectangle defers the draw until the next
    /// [`flush_deferred`](Self::flush_deferred); if it is still zero-sized
    /// then, the request is dropped silently.
    pub fn draw(
        &self,
        view: Arc<dyn VideoView>,
        canvas: Arc<Mutex<OverlayCanvas>>,
        detections: Vec<Detection>,
        options: DrawOptions,
    ) -> DrawOutcome {
        let rect = view.display_rect();
        let id = lock(&canvas).id();

        let entry = CacheEntry {
            view,
            canvas,
            detections,
            options,
        };

        if rect.is_empty() {
            tracing::debug!(canvas = id.value(), "View not laid out, deferring draw");
            self.lock_deferred().insert(id, entry);
            return DrawOutcome::Deferred;
        }

        let plan = self.compute_plan(
            Size::new(rect.w, rect.h),
            &entry.detections,
            &entry.options,
        );
        self.commit(&mut lock(&entry.canvas), &plan);
        self.lock_cache().insert(id, entry);
        DrawOutcome::Committed
    }

    /// Retry every deferred draw once
    ///
    /// Requests whose view is still zero-sized are dropped without error.
    pub fn flush_deferred(&self) {
        let entries: Vec<(CanvasId, CacheEntry)> = self.lock_deferred().drain().collect();

        for (id, entry) in entries {
            let rect = entry.view.display_rect();
            if rect.is_empty() {
                tracing::debug!(canvas = id.value(), "View still zero-sized, dropping draw");
                continue;
            }

            let plan = self.compute_plan(
                Size::new(rect.w, rect.h),
                &entry.detections,
                &entry.options,
            );
            self.commit(&mut lock(&entry.canvas), &plan);
            self.lock_cache().insert(id, entry);
        }
    }

    /// Replay every cached draw against current view geometry
    ///
    /// This is the no-resave path: plans are recomputed and committed but
    /// the cache is not written, so a replay can never schedule itself.
    pub fn replay_all(&self) {
        let entries: Vec<(Arc<dyn VideoView>, Arc<Mutex<OverlayCanvas>>, Vec<Detection>, DrawOptions)> = {
            let cache = self.lock_cache();
            cache
                .values()
                .map(|e| {
                    (
                        Arc::clone(&e.view),
                        Arc::clone(&e.canvas),
                        e.detections.clone(),
                        e.options.clone(),
                    )
                })
                .collect()
        };

        for (view, canvas, detections, options) in entries {
            let rect = view.display_rect();
            if rect.is_empty() {
                continue;
            }

            let plan = self.compute_plan(Size::new(rect.w, rect.h), &detections, &options);
            self.commit(&mut lock(&canvas), &plan);
        }
    }

    /// Wipe a canvas and forget its cached draw
    ///
    /// A later resize produces no draw for this canvas.
    pub fn clear(&self, canvas: &Arc<Mutex<OverlayCanvas>>) {
        let id = {
            let mut canvas = lock(canvas);
            canvas.clear();
            canvas.id()
        };

        self.lock_cache().remove(&id);
        self.lock_deferred().remove(&id);
        tracing::debug!(canvas = id.value(), "Overlay cleared");
    }

    /// Number of canvases with a cached draw
    pub fn cached_count(&self) -> usize {
        self.lock_cache().len()
    }

    /// Number of draws waiting for their one retry
    pub fn deferred_count(&self) -> usize {
        self.lock_deferred().len()
    }

    /// Compute a draw plan in CSS pixels (pure, cache-free)
    pub fn compute_plan(
        &self,
        display: Size,
        detections: &[Detection],
        options: &DrawOptions,
    ) -> DrawPlan {
        let transform = compute_transform(
            options.source_width as f32,
            options.source_height as f32,
            display,
            options.fit,
        );

        let mut items = Vec::new();
        for det in detections {
            let Some(bbox) = det.bbox else {
                // Nothing spatial to draw for a box-less detection
                continue;
            };

            let mapped = map_box(bbox, &transform);
            if mapped.is_empty() {
                continue;
            }

            let color = self.style.color_for(det.attribute.as_deref());
            items.push(PlanItem::Outline {
                rect: mapped,
                color,
            });

            let mut below = mapped.bottom() + self.style.chip_gap;

            if let Some(score) = det.score {
                let track = Rect::new(mapped.x, below, mapped.w, self.style.score_bar_height);
                items.push(PlanItem::ScoreTrack { rect: track });
                items.push(PlanItem::ScoreFill {
                    rect: Rect::new(
                        mapped.x,
                        below,
                        mapped.w * score.clamp(0.0, 1.0),
                        self.style.score_bar_height,
                    ),
                    color,
                });
                below += self.style.score_bar_height + self.style.chip_gap;
            }

            if let Some(identity) = &det.identity {
                items.push(self.chip_above(identity, mapped, display));
            }
            if let Some(attribute) = &det.attribute {
                items.push(self.chip_below(attribute, mapped, below, display));
            }
        }

        DrawPlan {
            css_size: display,
            items,
        }
    }

    /// Rasterize a plan onto a canvas (side-effecting, cache-free)
    ///
    /// Resizes the backing buffer to the plan's CSS size at the canvas's
    /// DPR, clears prior content, then paints. Runs for empty plans too —
    /// that is how stale boxes get erased.
    pub fn commit(&self, canvas: &mut OverlayCanvas, plan: &DrawPlan) {
        canvas.resize_backing(plan.css_size);
        canvas.clear();

        let dpr = canvas.device_pixel_ratio();
        let thickness = (self.style.box_thickness * dpr).round().max(1.0) as u32;
        let font = self.style.font.clone();
        let font_scale = ab_glyph::PxScale::from(self.style.font_size * dpr);
        let chip_text = self.style.chip_text;
        let chip_fill = self.style.chip_fill;
        let score_track = self.style.score_track;
        let buffer = canvas.buffer_mut();

        for item in &plan.items {
            match item {
                PlanItem::Outline { rect, color } => {
                    for inset in 0..thickness {
                        if let Some(r) = device_rect(rect, dpr, inset as i32) {
                            draw_hollow_rect_mut(buffer, r, *color);
                        }
                    }
                }
                PlanItem::Chip { rect, text } => {
                    if let Some(r) = device_rect(rect, dpr, 0) {
                        draw_filled_rect_mut(buffer, r, chip_fill);
                        if let Some(font) = &font {
                            let x = ((rect.x + self.style.chip_padding) * dpr).round() as i32;
                            let y = ((rect.y + 2.0) * dpr).round() as i32;
                            draw_text_mut(buffer, chip_text, x, y, font_scale, font, text);
                        }
                    }
                }
                PlanItem::ScoreTrack { rect } => {
                    if let Some(r) = device_rect(rect, dpr, 0) {
                        draw_filled_rect_mut(buffer, r, score_track);
                    }
                }
                PlanItem::ScoreFill { rect, color } => {
                    if let Some(r) = device_rect(rect, dpr, 0) {
                        draw_filled_rect_mut(buffer, r, *color);
                    }
                }
            }
        }
    }

    fn chip_above(&self, text: &str, mapped: Rect, display: Size) -> PlanItem {
        let rect = self.chip_rect(text, mapped.x, mapped.y - self.style.chip_height - self.style.chip_gap, display);
        let rect = if rect.y < 0.0 {
            // No room above the box: flip to just inside its top edge
            Rect::new(rect.x, mapped.y + self.style.chip_gap, rect.w, rect.h)
        } else {
            rect
        };

        PlanItem::Chip {
            rect,
            text: text.to_string(),
        }
    }

    fn chip_below(&self, text: &str, mapped: Rect, y: f32, display: Size) -> PlanItem {
        let rect = self.chip_rect(text, mapped.x, y, display);
        let rect = if rect.bottom() > display.height {
            // No room below the box: flip to just inside its bottom edge
            Rect::new(
                rect.x,
                mapped.bottom() - self.style.chip_height - self.style.chip_gap,
                rect.w,
                rect.h,
            )
        } else {
            rect
        };

        PlanItem::Chip {
            rect,
            text: text.to_string(),
        }
    }

    /// Chip rectangle with the x position clamped to the canvas
    fn chip_rect(&self, text: &str, x: f32, y: f32, display: Size) -> Rect {
        let width = self.style.text_width(text) + 2.0 * self.style.chip_padding;
        let max_x = (display.width - width).max(0.0);

        Rect::new(x.clamp(0.0, max_x), y, width, self.style.chip_height)
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<CanvasId, CacheEntry>> {
        self.cache.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn lock_deferred(&self) -> std::sync::MutexGuard<'_, HashMap<CanvasId, CacheEntry>> {
        self.deferred.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for OverlayRenderer {
    fn default() -> Self {
        Self::new(OverlayStyle::default())
    }
}

/// Map a CSS rect into a device-pixel imageproc rect, inset for outline
/// passes; degenerate rects yield `None`
fn device_rect(rect: &Rect, dpr: f32, inset: i32) -> Option<imageproc::rect::Rect> {
    let x = (rect.x * dpr).round() as i32 + inset;
    let y = (rect.y * dpr).round() as i32 + inset;
    let w = (rect.w * dpr).round() as i32 - 2 * inset;
    let h = (rect.h * dpr).round() as i32 - 2 * inset;

    if w <= 0 || h <= 0 {
        return None;
    }
    Some(imageproc::rect::Rect::at(x, y).of_size(w as u32, h as u32))
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

#[cfg(test)]
mod tests {
    use crate::geometry::FitMode;
    use crate::overlay::view::FixedView;

    use super::*;

    fn view(rect: Rect) -> Arc<FixedView> {
        Arc::new(FixedView::new(rect))
    }

    fn canvas() -> Arc<Mutex<OverlayCanvas>> {
        Arc::new(Mutex::new(OverlayCanvas::new(1.0)))
    }

    fn face(x: f32, y: f32, w: f32, h: f32) -> Detection {
        let mut d = Detection::with_bbox(Rect::new(x, y, w, h));
        d.identity = Some("Alice".to_string());
        d.attribute = Some("happy".to_string());
        d.score = Some(0.8);
        d
    }

    fn options() -> DrawOptions {
        DrawOptions::new(320, 240, FitMode::Contain)
    }

    #[test]
    fn test_draw_commits_and_caches() {
        let renderer = OverlayRenderer::default();
        let view = view(Rect::new(0.0, 0.0, 320.0, 240.0));
        let canvas = canvas();

        let outcome = renderer.draw(
            view,
            Arc::clone(&canvas),
            vec![face(50.0, 50.0, 80.0, 80.0)],
            options(),
        );

        assert_eq!(outcome, DrawOutcome::Committed);
        assert_eq!(renderer.cached_count(), 1);

        let canvas = canvas.lock().unwrap();
        assert_eq!(canvas.buffer_size(), (320, 240));
        assert!(!canvas.is_blank());
    }

    #[test]
    fn test_empty_detections_erase_stale_boxes() {
        let renderer = OverlayRenderer::default();
        let view = view(Rect::new(0.0, 0.0, 320.0, 240.0));
        let canvas = canvas();

        renderer.draw(
            Arc::clone(&view) as _,
            Arc::clone(&canvas),
            vec![face(50.0, 50.0, 80.0, 80.0)],
            options(),
        );
        assert!(!canvas.lock().unwrap().is_blank());

        renderer.draw(view, Arc::clone(&canvas), vec![], options());
        assert!(canvas.lock().unwrap().is_blank());
    }

    #[test]
    fn test_dpr_scales_backing_buffer() {
        let renderer = OverlayRenderer::default();
        let view = view(Rect::new(0.0, 0.0, 100.0, 50.0));
        let canvas = Arc::new(Mutex::new(OverlayCanvas::new(2.0)));

        renderer.draw(view, Arc::clone(&canvas), vec![], options());
        assert_eq!(canvas.lock().unwrap().buffer_size(), (200, 100));
    }

    #[test]
    fn test_clear_removes_from_replay_set() {
        let renderer = OverlayRenderer::default();
        let view = view(Rect::new(0.0, 0.0, 320.0, 240.0));
        let canvas = canvas();

        renderer.draw(
            view,
            Arc::clone(&canvas),
            vec![face(50.0, 50.0, 80.0, 80.0)],
            options(),
        );
        renderer.clear(&canvas);

        assert!(canvas.lock().unwrap().is_blank());
        assert_eq!(renderer.cached_count(), 0);

        // A replay after clear draws nothing
        renderer.replay_all();
        assert!(canvas.lock().unwrap().is_blank());
    }

    #[test]
    fn test_replay_tracks_view_geometry() {
        let renderer = OverlayRenderer::default();
        let view = view(Rect::new(0.0, 0.0, 320.0, 240.0));
        let canvas = canvas();

        renderer.draw(
            Arc::clone(&view) as _,
            Arc::clone(&canvas),
            vec![face(50.0, 50.0, 80.0, 80.0)],
            options(),
        );

        view.set_rect(Rect::new(0.0, 0.0, 640.0, 480.0));
        renderer.replay_all();

        let canvas = canvas.lock().unwrap();
        assert_eq!(canvas.buffer_size(), (640, 480));
        assert!(!canvas.is_blank());

        // Replay does not grow the cache
        assert_eq!(renderer.cached_count(), 1);
    }

    #[test]
    fn test_zero_sized_view_defers_once() {
        let renderer = OverlayRenderer::default();
        let view = view(Rect::default());
        let canvas = canvas();

        let outcome = renderer.draw(
            Arc::clone(&view) as _,
            Arc::clone(&canvas),
            vec![face(50.0, 50.0, 80.0, 80.0)],
            options(),
        );

        assert_eq!(outcome, DrawOutcome::Deferred);
        assert_eq!(renderer.deferred_count(), 1);
        assert_eq!(renderer.cached_count(), 0);

        // Layout arrives before the retry
        view.set_rect(Rect::new(0.0, 0.0, 320.0, 240.0));
        renderer.flush_deferred();

        assert_eq!(renderer.deferred_count(), 0);
        assert_eq!(renderer.cached_count(), 1);
        assert!(!canvas.lock().unwrap().is_blank());
    }

    #[test]
    fn test_still_zero_sized_gives_up_silently() {
        let renderer = OverlayRenderer::default();
        let view = view(Rect::default());
        let canvas = canvas();

        renderer.draw(
            view,
            Arc::clone(&canvas),
            vec![face(50.0, 50.0, 80.0, 80.0)],
            options(),
        );
        renderer.flush_deferred();

        assert_eq!(renderer.deferred_count(), 0);
        assert_eq!(renderer.cached_count(), 0);
    }

    #[test]
    fn test_plan_skips_boxless_detections() {
        let renderer = OverlayRenderer::default();
        let mut boxless = Detection::default();
        boxless.identity = Some("Ghost".to_string());

        let plan = renderer.compute_plan(Size::new(320.0, 240.0), &[boxless], &options());
        assert!(plan.items.is_empty());
    }

    #[test]
    fn test_plan_chip_flips_when_no_room_above() {
        let renderer = OverlayRenderer::default();
        // Box flush against the top edge
        let det = face(10.0, 0.0, 60.0, 60.0);

        let plan = renderer.compute_plan(
            Size::new(320.0, 240.0),
            std::slice::from_ref(&det),
            &DrawOptions::new(320, 240, FitMode::Fill),
        );

        let chips: Vec<&Rect> = plan
            .items
            .iter()
            .filter_map(|i| match i {
                PlanItem::Chip { rect, .. } => Some(rect),
                _ => None,
            })
            .collect();

        assert_eq!(chips.len(), 2);
        for chip in chips {
            assert!(chip.y >= 0.0, "chip above canvas: {:?}", chip);
        }
    }

    #[test]
    fn test_plan_chip_clamped_to_right_edge() {
        let renderer = OverlayRenderer::default();
        // Box hanging off the right edge
        let det = face(300.0, 100.0, 60.0, 60.0);

        let plan = renderer.compute_plan(
            Size::new(320.0, 240.0),
            std::slice::from_ref(&det),
            &DrawOptions::new(320, 240, FitMode::Fill),
        );

        for item in &plan.items {
            if let PlanItem::Chip { rect, .. } = item {
                assert!(rect.x >= 0.0);
                assert!(rect.right() <= 320.0 + 1e-3, "chip off canvas: {:?}", rect);
            }
        }
    }

    #[test]
    fn test_plan_score_bar_width_tracks_score() {
        let renderer = OverlayRenderer::default();
        let mut det = Detection::with_bbox(Rect::new(0.0, 0.0, 100.0, 100.0));
        det.score = Some(0.5);

        let plan = renderer.compute_plan(
            Size::new(320.0, 240.0),
            std::slice::from_ref(&det),
            &DrawOptions::new(320, 240, FitMode::Fill),
        );

        let track = plan.items.iter().find_map(|i| match i {
            PlanItem::ScoreTrack { rect } => Some(*rect),
            _ => None,
        });
        let fill = plan.items.iter().find_map(|i| match i {
            PlanItem::ScoreFill { rect, .. } => Some(*rect),
            _ => None,
        });

        let track = track.unwrap();
        let fill = fill.unwrap();
        assert!((fill.w - track.w * 0.5).abs() < 1e-3);
    }

    #[test]
    fn test_plan_maps_through_letterbox() {
        let renderer = OverlayRenderer::default();
        // 320x240 source in a 320x320 display, contain: offset_y = 40
        let det = Detection::with_bbox(Rect::new(0.0, 0.0, 320.0, 240.0));

        let plan = renderer.compute_plan(
            Size::new(320.0, 320.0),
            std::slice::from_ref(&det),
            &DrawOptions::new(320, 240, FitMode::Contain),
        );

        let outline = plan.items.iter().find_map(|i| match i {
            PlanItem::Outline { rect, .. } => Some(*rect),
            _ => None,
        });

        let rect = outline.unwrap();
        assert!((rect.y - 40.0).abs() < 1e-3);
        assert!((rect.h - 240.0).abs() < 1e-3);
    }
}
