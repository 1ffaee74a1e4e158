use crate::detect::result::{Detection, Observation};

/// Select the highest-confidence detection of a frame.
///
/// Equal confidences resolve to the earliest detection in the detector's output
/// order. NaN confidences never win. An empty slice yields the no-item sentinel.
pub fn top_detection(detections: &[Detection]) -> Observation {
    let mut best: Option<&Detection> = None;
    for detection in detections {
        if detection.confidence.is_nan() {
            continue;
        }
        match best {
            Some(current) if detection.confidence <= current.confidence => {}
            _ => best = Some(detection),
        }
    }
    best.map(|d| Observation::new(d.label.clone(), d.confidence))
        .unwrap_or_else(Observation::nothing)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::result::{BoundingBox, NO_ITEM_LABEL};

    fn det(label: &str, confidence: f32) -> Detection {
        Detection::new(label, confidence, BoundingBox::default())
    }

    #[test]
    fn empty_frame_is_no_item() {
        let top = top_detection(&[]);
        assert_eq!(top.label, NO_ITEM_LABEL);
        assert_eq!(top.confidence, 0.0);
    }

    #[test]
    fn picks_maximum_confidence() {
        let top = top_detection(&[det("banana", 0.61), det("apple", 0.93), det("orange", 0.7)]);
        assert_eq!(top, Observation::new("apple", 0.93));
    }

    #[test]
    fn ties_resolve_to_first_in_output_order() {
        let top = top_detection(&[det("orange", 0.8), det("apple", 0.8)]);
        assert_eq!(top.label, "orange");
    }

    #[test]
    fn nan_confidence_is_ignored() {
        let top = top_detection(&[det("ghost", f32::NAN), det("apple", 0.2)]);
        assert_eq!(top.label, "apple");
        assert!(top_detection(&[det("ghost", f32::NAN)]).is_nothing());
    }
}
