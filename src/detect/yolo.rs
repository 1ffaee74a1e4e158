//! YOLOv8 detection-head decoding.
//!
//! The head emits `[1, 4 + classes, candidates]` (or its transpose `[1, candidates,
//! 4 + classes]`): center x, center y, width, height in model input pixels, followed
//! by one score per class.

use anyhow::{anyhow, Result};

use crate::detect::result::{BoundingBox, Detection};

/// Scale from model input coordinates back to frame coordinates.
#[derive(Clone, Copy, Debug)]
pub struct InputScale {
    pub x: f32,
    pub y: f32,
}

impl InputScale {
    pub fn new(frame_w: u32, frame_h: u32, input_w: u32, input_h: u32) -> Self {
        Self {
            x: frame_w as f32 / input_w.max(1) as f32,
            y: frame_h as f32 / input_h.max(1) as f32,
        }
    }
}

/// Decode raw head output into detections above `confidence_threshold`.
///
/// When `labels` is empty, classes are named by index.
pub fn decode_yolov8(
    data: &[f32],
    shape: &[usize],
    labels: &[String],
    confidence_threshold: f32,
    scale: InputScale,
) -> Result<Vec<Detection>> {
    let (rows, cols) = match shape {
        [1, a, b] => (*a, *b),
        [a, b] => (*a, *b),
        other => return Err(anyhow!("unexpected detection head shape {:?}", other)),
    };
    if data.len() != rows * cols {
        return Err(anyhow!(
            "detection head holds {} values, shape {:?} needs {}",
            data.len(),
            shape,
            rows * cols
        ));
    }

    // Attributes run along the shorter axis unless the label count says otherwise.
    let transposed = if !labels.is_empty() {
        if rows == labels.len() + 4 {
            false
        } else if cols == labels.len() + 4 {
            true
        } else {
            return Err(anyhow!(
                "detection head shape {:?} does not match {} labels",
                shape,
                labels.len()
            ));
        }
    } else {
        rows > cols
    };
    let (attributes, candidates) = if transposed { (cols, rows) } else { (rows, cols) };
    if attributes <= 4 {
        return Err(anyhow!("detection head has no class scores"));
    }

    let at = |attribute: usize, candidate: usize| -> f32 {
        if transposed {
            data[candidate * attributes + attribute]
        } else {
            data[attribute * candidates + candidate]
        }
    };

    let mut detections = Vec::new();
    for candidate in 0..candidates {
        let mut class_id = 0usize;
        let mut score = f32::NEG_INFINITY;
        for class in 0..attributes - 4 {
            let value = at(4 + class, candidate);
            if value > score {
                score = value;
                class_id = class;
            }
        }
        if score.is_nan() || score < confidence_threshold {
            continue;
        }
        let label = labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| class_id.to_string());
        let bbox = BoundingBox::from_center(
            at(0, candidate) * scale.x,
            at(1, candidate) * scale.y,
            at(2, candidate) * scale.x,
            at(3, candidate) * scale.y,
        );
        detections.push(Detection::new(label, score.min(1.0), bbox));
    }
    Ok(detections)
}

/// Class-aware non-maximum suppression.
///
/// Output is sorted by descending confidence; the sort is stable, so equal scores keep
/// their candidate order.
pub fn non_max_suppression(mut detections: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
    for detection in detections {
        let suppressed = kept.iter().any(|k| {
            k.label == detection.label && k.bbox.iou(&detection.bbox) > iou_threshold
        });
        if !suppressed {
            kept.push(detection);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels() -> Vec<String> {
        vec!["apple".to_string(), "banana".to_string()]
    }

    // Two candidates, attribute-major: cx, cy, w, h, apple, banana.
    fn head() -> Vec<f32> {
        vec![
            100.0, 300.0, // cx
            100.0, 300.0, // cy
            50.0, 40.0, // w
            50.0, 40.0, // h
            0.9, 0.1, // apple
            0.05, 0.3, // banana
        ]
    }

    #[test]
    fn decodes_attribute_major_head() -> Result<()> {
        let scale = InputScale::new(640, 640, 640, 640);
        let detections = decode_yolov8(&head(), &[1, 6, 2], &labels(), 0.25, scale)?;
        assert_eq!(detections.len(), 2);
        assert_eq!(detections[0].label, "apple");
        assert!((detections[0].confidence - 0.9).abs() < 1e-6);
        assert_eq!(detections[0].bbox.x, 75.0);
        assert_eq!(detections[1].label, "banana");
        Ok(())
    }

    #[test]
    fn decodes_transposed_head_and_rescales() -> Result<()> {
        let data = head();
        let mut transposed = vec![0.0; data.len()];
        for attribute in 0..6 {
            for candidate in 0..2 {
                transposed[candidate * 6 + attribute] = data[attribute * 2 + candidate];
            }
        }
        let scale = InputScale::new(1280, 320, 640, 640);
        let detections = decode_yolov8(&transposed, &[1, 2, 6], &labels(), 0.5, scale)?;
        assert_eq!(detections.len(), 1);
        assert_eq!(detections[0].bbox.w, 100.0);
        assert_eq!(detections[0].bbox.h, 25.0);
        Ok(())
    }

    #[test]
    fn rejects_label_mismatch() {
        let scale = InputScale::new(640, 640, 640, 640);
        let three = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        assert!(decode_yolov8(&head(), &[1, 6, 2], &three, 0.25, scale).is_err());
    }

    #[test]
    fn nms_drops_overlapping_same_class() {
        let a = Detection::new("apple", 0.9, BoundingBox { x: 0.0, y: 0.0, w: 10.0, h: 10.0 });
        let b = Detection::new("apple", 0.8, BoundingBox { x: 1.0, y: 1.0, w: 10.0, h: 10.0 });
        let c = Detection::new("banana", 0.7, BoundingBox { x: 1.0, y: 1.0, w: 10.0, h: 10.0 });
        let kept = non_max_suppression(vec![b, c, a], 0.45);
        let labels: Vec<_> = kept.iter().map(|d| (d.label.as_str(), d.confidence)).collect();
        assert_eq!(labels, vec![("apple", 0.9), ("banana", 0.7)]);
    }
}
