//! Canonical detection types

use std::collections::HashMap;

use crate::geometry::Rect;

/// Which backend pass produced a detection list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectionStream {
    /// Face identity pass (who is this face)
    Identity,
    /// Face attribute pass (expression / score)
    Attribute,
}

impl DetectionStream {
    /// The other stream of the pair
    pub fn other(&self) -> DetectionStream {
        match self {
            DetectionStream::Identity => DetectionStream::Attribute,
            DetectionStream::Attribute => DetectionStream::Identity,
        }
    }
}

impl std::fmt::Display for DetectionStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DetectionStream::Identity => write!(f, "identity"),
            DetectionStream::Attribute => write!(f, "attribute"),
        }
    }
}

/// One detected face, normalized from whatever shape the backend sent
///
/// Immutable once received; a new message fully replaces the previous list
/// for its stream.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Detection {
    /// Bounding box in encoded-frame pixels (None when the backend omitted it)
    pub bbox: Option<Rect>,
    /// Identity label (e.g. a person's name)
    pub identity: Option<String>,
    /// Attribute label (e.g. an expression category)
    pub attribute: Option<String>,
    /// Per-class probability mapping
    pub class_scores: Option<HashMap<String, f32>>,
    /// Scalar score in [0, 1]
    pub score: Option<f32>,
}

impl Detection {
    /// Create a detection with just a bounding box
    pub fn with_bbox(bbox: Rect) -> Self {
        Self {
            bbox: Some(bbox),
            ..Default::default()
        }
    }

    /// Bounding box for spatial matching
    ///
    /// A missing box degrades to a zero-area box at the origin, which makes
    /// every IoU against it 0 and disables matching without special-casing.
    pub fn match_box(&self) -> Rect {
        self.bbox.unwrap_or_default()
    }

    /// Copy labels this detection is missing from another detection
    ///
    /// Fields the receiver already carries are left untouched; enrichment
    /// never overwrites what a stream said about its own boxes.
    pub fn merge_labels_from(&mut self, other: &Detection) {
        if self.identity.is_none() {
            self.identity = other.identity.clone();
        }
        if self.attribute.is_none() {
            self.attribute = other.attribute.clone();
        }
        if self.class_scores.is_none() {
            self.class_scores = other.class_scores.clone();
        }
        if self.score.is_none() {
            self.score = other.score;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_box_missing_bbox() {
        let d = Detection::default();
        let b = d.match_box();

        assert_eq!(b, Rect::default());
        assert_eq!(b.iou(&Rect::new(0.0, 0.0, 100.0, 100.0)), 0.0);
    }

    #[test]
    fn test_merge_fills_missing_fields_only() {
        let mut primary = Detection::with_bbox(Rect::new(10.0, 10.0, 50.0, 50.0));
        primary.attribute = Some("neutral".to_string());

        let mut secondary = Detection::with_bbox(Rect::new(12.0, 11.0, 48.0, 49.0));
        secondary.identity = Some("Alice".to_string());
        secondary.attribute = Some("happy".to_string());
        secondary.score = Some(0.9);

        primary.merge_labels_from(&secondary);

        assert_eq!(primary.identity.as_deref(), Some("Alice"));
        // Own attribute wins over the secondary's
        assert_eq!(primary.attribute.as_deref(), Some("neutral"));
        assert_eq!(primary.score, Some(0.9));
        // The receiver's own box is never replaced
        assert_eq!(primary.bbox, Some(Rect::new(10.0, 10.0, 50.0, 50.0)));
    }

    #[test]
    fn test_stream_other() {
        assert_eq!(DetectionStream::Identity.other(), DetectionStream::Attribute);
        assert_eq!(DetectionStream::Attribute.other(), DetectionStream::Identity);
    }
}
