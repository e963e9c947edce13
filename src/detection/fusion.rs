//! Spatial-temporal fusion of the two detection streams
//!
//! The identity and attribute passes are not synchronized; their results
//! arrive independently and at different rates. Each stream keeps a
//! last-seen cache that a fresh message from the other stream is matched
//! against by IoU, but only while the cache is younger than the fusion
//! window. Without the window a face that moved or left would still get the
//! stale stream's name glued onto it.

use std::time::Instant;

use super::types::{Detection, DetectionStream};

/// Last-seen detection list for one stream
#[derive(Debug, Clone)]
struct StreamCache {
    detections: Vec<Detection>,
    at: Instant,
}

/// Reconciles the identity and attribute detection streams
///
/// Fusion is directional and symmetric in mechanism: either stream can act
/// as the primary and be enriched from the other's cache. The engine is a
/// pure lookup; deciding which stream's arrival triggers a redraw is the
/// caller's business.
#[derive(Debug)]
pub struct FusionEngine {
    window: std::time::Duration,
    iou_threshold: f32,
    identity: Option<StreamCache>,
    attribute: Option<StreamCache>,
}

impl FusionEngine {
    /// Create an engine with the given staleness window and IoU threshold
    pub fn new(window: std::time::Duration, iou_threshold: f32) -> Self {
        Self {
            window,
            iou_threshold,
            identity: None,
            attribute: None,
        }
    }

    /// Replace a stream's cached detection list wholesale
    ///
    /// There is no merging of old and new boxes within one stream; every
    /// message is a complete snapshot.
    pub fn update_cache(&mut self, stream: DetectionStream, detections: Vec<Detection>, at: Instant) {
        let cache = Some(StreamCache { detections, at });
        match stream {
            DetectionStream::Identity => self.identity = cache,
            DetectionStream::Attribute => self.attribute = cache,
        }
    }

    /// Enrich a fresh detection list with labels from the other stream
    ///
    /// For each primary box the secondary box with the strictly greatest IoU
    /// is selected (first-encountered wins ties, so output is deterministic
    /// for a fixed input ordering); at or above the match threshold its
    /// labels are merged onto the primary box. A stale or empty secondary
    /// cache enriches nothing — that is steady state, not an error.
    pub fn fuse(
        &self,
        primary: DetectionStream,
        mut detections: Vec<Detection>,
        now: Instant,
    ) -> Vec<Detection> {
        let secondary = match self.cache_for(primary.other()) {
            Some(cache) if now.saturating_duration_since(cache.at) <= self.window => cache,
            _ => return detections,
        };

        for det in &mut detections {
            let own = det.match_box();
            let mut best: Option<&Detection> = None;
            let mut best_iou = -1.0f32;

            for candidate in &secondary.detections {
                let iou = own.iou(&candidate.match_box());
                if iou > best_iou {
                    best_iou = iou;
                    best = Some(candidate);
                }
            }

            if let Some(candidate) = best {
                if best_iou >= self.iou_threshold {
                    det.merge_labels_from(candidate);
                }
            }
        }

        detections
    }

    fn cache_for(&self, stream: DetectionStream) -> Option<&StreamCache> {
        match stream {
            DetectionStream::Identity => self.identity.as_ref(),
            DetectionStream::Attribute => self.attribute.as_ref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use crate::geometry::Rect;

    use super::*;

    fn engine() -> FusionEngine {
        FusionEngine::new(Duration::from_millis(300), 0.25)
    }

    fn named(bbox: Rect, name: &str) -> Detection {
        let mut d = Detection::with_bbox(bbox);
        d.identity = Some(name.to_string());
        d
    }

    #[test]
    fn test_enrichment_within_window() {
        // Spec scenario: secondary cached at t=0, fused at t=100ms
        let t0 = Instant::now();
        let mut engine = engine();

        engine.update_cache(
            DetectionStream::Identity,
            vec![named(Rect::new(12.0, 11.0, 48.0, 49.0), "Alice")],
            t0,
        );

        let primary = vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let fused = engine.fuse(
            DetectionStream::Attribute,
            primary,
            t0 + Duration::from_millis(100),
        );

        assert_eq!(fused[0].identity.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_no_enrichment_after_window() {
        // Spec scenario: window expired at t=500ms
        let t0 = Instant::now();
        let mut engine = engine();

        engine.update_cache(
            DetectionStream::Identity,
            vec![named(Rect::new(12.0, 11.0, 48.0, 49.0), "Alice")],
            t0,
        );

        let primary = vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let fused = engine.fuse(
            DetectionStream::Attribute,
            primary.clone(),
            t0 + Duration::from_millis(500),
        );

        assert_eq!(fused, primary);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let t0 = Instant::now();
        let mut engine = engine();

        engine.update_cache(
            DetectionStream::Identity,
            vec![named(Rect::new(10.0, 10.0, 50.0, 50.0), "Alice")],
            t0,
        );

        let primary = vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let fused = engine.fuse(
            DetectionStream::Attribute,
            primary,
            t0 + Duration::from_millis(300),
        );

        assert_eq!(fused[0].identity.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_empty_cache_no_enrichment() {
        let engine = engine();
        let primary = vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))];

        let fused = engine.fuse(DetectionStream::Attribute, primary.clone(), Instant::now());
        assert_eq!(fused, primary);
    }

    #[test]
    fn test_below_threshold_no_enrichment() {
        let t0 = Instant::now();
        let mut engine = engine();

        // Far-away box: IoU is 0
        engine.update_cache(
            DetectionStream::Identity,
            vec![named(Rect::new(500.0, 500.0, 50.0, 50.0), "Alice")],
            t0,
        );

        let primary = vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let fused = engine.fuse(DetectionStream::Attribute, primary.clone(), t0);

        assert_eq!(fused, primary);
    }

    #[test]
    fn test_best_match_wins() {
        let t0 = Instant::now();
        let mut engine = engine();

        engine.update_cache(
            DetectionStream::Identity,
            vec![
                named(Rect::new(100.0, 100.0, 50.0, 50.0), "Bob"),
                named(Rect::new(11.0, 11.0, 50.0, 50.0), "Alice"),
            ],
            t0,
        );

        let primary = vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let fused = engine.fuse(DetectionStream::Attribute, primary, t0);

        assert_eq!(fused[0].identity.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_tie_first_encountered_wins() {
        let t0 = Instant::now();
        let mut engine = engine();

        // Two identical secondary boxes: the first in list order must win
        let shared = Rect::new(10.0, 10.0, 50.0, 50.0);
        engine.update_cache(
            DetectionStream::Identity,
            vec![named(shared, "First"), named(shared, "Second")],
            t0,
        );

        let primary = vec![Detection::with_bbox(shared)];
        let fused = engine.fuse(DetectionStream::Attribute, primary, t0);

        assert_eq!(fused[0].identity.as_deref(), Some("First"));
    }

    #[test]
    fn test_missing_bbox_never_matches() {
        let t0 = Instant::now();
        let mut engine = engine();

        engine.update_cache(
            DetectionStream::Identity,
            vec![named(Rect::new(0.0, 0.0, 50.0, 50.0), "Alice")],
            t0,
        );

        // Primary detection with no box at all
        let primary = vec![Detection::default()];
        let fused = engine.fuse(DetectionStream::Attribute, primary, t0);

        assert!(fused[0].identity.is_none());
    }

    #[test]
    fn test_cache_replaced_wholesale() {
        let t0 = Instant::now();
        let mut engine = engine();

        engine.update_cache(
            DetectionStream::Identity,
            vec![named(Rect::new(10.0, 10.0, 50.0, 50.0), "Old")],
            t0,
        );
        engine.update_cache(
            DetectionStream::Identity,
            vec![named(Rect::new(10.0, 10.0, 50.0, 50.0), "New")],
            t0 + Duration::from_millis(50),
        );

        let primary = vec![Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0))];
        let fused = engine.fuse(
            DetectionStream::Attribute,
            primary,
            t0 + Duration::from_millis(60),
        );

        assert_eq!(fused[0].identity.as_deref(), Some("New"));
    }

    #[test]
    fn test_fusion_is_directional() {
        let t0 = Instant::now();
        let mut engine = engine();

        let mut attr = Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0));
        attr.attribute = Some("happy".to_string());
        engine.update_cache(DetectionStream::Attribute, vec![attr], t0);

        // Identity stream as primary picks up the attribute
        let primary = vec![named(Rect::new(11.0, 10.0, 50.0, 50.0), "Alice")];
        let fused = engine.fuse(DetectionStream::Identity, primary, t0);

        assert_eq!(fused[0].identity.as_deref(), Some("Alice"));
        assert_eq!(fused[0].attribute.as_deref(), Some("happy"));
    }
}
