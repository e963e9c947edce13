//! Payload normalization at the channel boundary
//!
//! The two backend passes name the same things differently: `bbox` vs `box`,
//! `label` vs `name`, `expression` vs `emotion`, and boxes arrive either as
//! `[x, y, w, h]` arrays or `{x, y, w, h}` objects. Everything downstream of
//! this adapter only ever sees the canonical [`Detection`] shape.

use serde_json::Value;

use crate::geometry::Rect;

use super::types::Detection;

/// Parse an inbound detection-list payload into canonical detections
///
/// Accepts a bare array, or an object wrapping the array under a
/// conventional key. Entries that are not objects are dropped; a malformed
/// field inside an entry degrades to `None` for that field rather than
/// discarding the whole detection.
pub fn parse_detections(payload: &Value) -> Vec<Detection> {
    let list = match payload {
        Value::Array(items) => items.as_slice(),
        Value::Object(map) => match ["detections", "faces", "results"]
            .iter()
            .find_map(|k| map.get(*k).and_then(Value::as_array))
        {
            Some(items) => items.as_slice(),
            None => return Vec::new(),
        },
        _ => return Vec::new(),
    };

    list.iter()
        .filter_map(|entry| entry.as_object().map(|_| parse_one(entry)))
        .collect()
}

fn parse_one(entry: &Value) -> Detection {
    Detection {
        bbox: ["bbox", "box", "rect"]
            .iter()
            .find_map(|k| entry.get(*k))
            .and_then(parse_rect),
        identity: first_string(entry, &["label", "name", "identity"]),
        attribute: first_string(entry, &["expression", "emotion", "attribute"]),
        class_scores: ["scores", "probabilities", "expressions"]
            .iter()
            .find_map(|k| entry.get(*k))
            .and_then(parse_score_map),
        score: ["score", "confidence", "probability"]
            .iter()
            .find_map(|k| entry.get(*k))
            .and_then(Value::as_f64)
            .map(|s| s as f32),
    }
}

fn first_string(entry: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| entry.get(*k))
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn parse_rect(value: &Value) -> Option<Rect> {
    match value {
        Value::Array(parts) if parts.len() >= 4 => {
            let mut nums = parts.iter().filter_map(Value::as_f64);
            Some(Rect::new(
                nums.next()? as f32,
                nums.next()? as f32,
                nums.next()? as f32,
                nums.next()? as f32,
            ))
        }
        Value::Object(map) => {
            let get = |keys: [&str; 2]| {
                keys.iter()
                    .find_map(|k| map.get(*k))
                    .and_then(Value::as_f64)
                    .map(|v| v as f32)
            };
            Some(Rect::new(
                get(["x", "left"])?,
                get(["y", "top"])?,
                get(["w", "width"])?,
                get(["h", "height"])?,
            ))
        }
        _ => None,
    }
}

fn parse_score_map(value: &Value) -> Option<std::collections::HashMap<String, f32>> {
    let map = value.as_object()?;
    let scores: std::collections::HashMap<String, f32> = map
        .iter()
        .filter_map(|(k, v)| v.as_f64().map(|s| (k.clone(), s as f32)))
        .collect();

    if scores.is_empty() {
        None
    } else {
        Some(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_identity_shape() {
        // The identity pass sends bbox arrays and `name`
        let payload = json!({
            "faces": [
                { "bbox": [10, 20, 50, 60], "name": "Alice", "confidence": 0.93 }
            ]
        });

        let detections = parse_detections(&payload);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, Some(Rect::new(10.0, 20.0, 50.0, 60.0)));
        assert_eq!(detections[0].identity.as_deref(), Some("Alice"));
        assert!((detections[0].score.unwrap() - 0.93).abs() < 1e-6);
        assert!(detections[0].attribute.is_none());
    }

    #[test]
    fn test_parse_attribute_shape() {
        // The attribute pass sends box objects, `emotion` and a probability map
        let payload = json!([
            {
                "box": { "x": 5, "y": 6, "width": 40, "height": 42 },
                "emotion": "happy",
                "expressions": { "happy": 0.8, "neutral": 0.15 }
            }
        ]);

        let detections = parse_detections(&payload);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox, Some(Rect::new(5.0, 6.0, 40.0, 42.0)));
        assert_eq!(detections[0].attribute.as_deref(), Some("happy"));

        let scores = detections[0].class_scores.as_ref().unwrap();
        assert!((scores["happy"] - 0.8).abs() < 1e-6);
    }

    #[test]
    fn test_missing_bbox_survives() {
        let payload = json!([{ "label": "Bob" }]);

        let detections = parse_detections(&payload);
        assert_eq!(detections.len(), 1);
        assert!(detections[0].bbox.is_none());
        assert_eq!(detections[0].identity.as_deref(), Some("Bob"));
    }

    #[test]
    fn test_malformed_bbox_degrades_to_none() {
        let payload = json!([{ "bbox": [1, 2], "name": "Carol" }]);

        let detections = parse_detections(&payload);
        assert_eq!(detections.len(), 1);
        assert!(detections[0].bbox.is_none());
        assert_eq!(detections[0].identity.as_deref(), Some("Carol"));
    }

    #[test]
    fn test_non_object_entries_dropped() {
        let payload = json!([42, "noise", { "name": "Dave" }]);

        let detections = parse_detections(&payload);
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].identity.as_deref(), Some("Dave"));
    }

    #[test]
    fn test_unrecognized_payload_is_empty() {
        assert!(parse_detections(&json!("nope")).is_empty());
        assert!(parse_detections(&json!({ "status": "ok" })).is_empty());
        assert!(parse_detections(&Value::Null).is_empty());
    }
}
