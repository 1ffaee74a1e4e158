use anyhow::{anyhow, Result};
use std::collections::{HashSet, VecDeque};

use crate::detect::backend::DetectorBackend;
use crate::detect::result::{BoundingBox, Detection, NO_ITEM_LABEL};
use crate::frame::Frame;

const DEFAULT_STUB_CONFIDENCE: f32 = 0.9;

/// Stub backend for demos and tests. Ignores pixel content.
///
/// Either reports one fixed label every frame, or replays a script of per-frame
/// detections and reports nothing once the script runs out.
pub struct StubBackend {
    fixed: Option<Detection>,
    script: VecDeque<Vec<Detection>>,
    fail_on: HashSet<u64>,
    calls: u64,
}

impl StubBackend {
    /// Report `label` at `confidence` on every frame, boxed around the frame center.
    pub fn fixed(label: &str, confidence: f32) -> Self {
        Self {
            fixed: Some(Detection::new(label, confidence, BoundingBox::default())),
            script: VecDeque::new(),
            fail_on: HashSet::new(),
            calls: 0,
        }
    }

    /// Report nothing, ever.
    pub fn empty() -> Self {
        Self::scripted(Vec::new())
    }

    /// Replay `frames` in order, one entry per `detect` call.
    pub fn scripted(frames: Vec<Vec<Detection>>) -> Self {
        Self {
            fixed: None,
            script: frames.into(),
            fail_on: HashSet::new(),
            calls: 0,
        }
    }

    /// Replay a label sequence; `none` entries produce empty frames.
    pub fn from_labels(labels: &[&str], confidence: f32) -> Self {
        let frames = labels
            .iter()
            .map(|label| {
                if *label == NO_ITEM_LABEL {
                    Vec::new()
                } else {
                    vec![Detection::new(*label, confidence, BoundingBox::default())]
                }
            })
            .collect();
        Self::scripted(frames)
    }

    /// Make the `call_index`-th call (0-based) return an inference error.
    pub fn with_failure_at(mut self, call_index: u64) -> Self {
        self.fail_on.insert(call_index);
        self
    }

    /// Parse a `stub://` spec: `<label>` or `<label>:<confidence>`; `none` reports nothing.
    pub fn from_spec(spec: &str) -> Result<Self> {
        let spec = spec.trim();
        if spec.is_empty() || spec == NO_ITEM_LABEL {
            return Ok(Self::empty());
        }
        match spec.split_once(':') {
            Some((label, confidence)) => {
                let confidence: f32 = confidence
                    .parse()
                    .map_err(|_| anyhow!("invalid stub confidence '{}'", confidence))?;
                if !(0.0..=1.0).contains(&confidence) {
                    return Err(anyhow!("stub confidence must be within [0, 1]"));
                }
                Ok(Self::fixed(label, confidence))
            }
            None => Ok(Self::fixed(spec, DEFAULT_STUB_CONFIDENCE)),
        }
    }
}

impl DetectorBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>> {
        let call = self.calls;
        self.calls += 1;

        if self.fail_on.contains(&call) {
            return Err(anyhow!("stub inference failure on call {}", call));
        }

        let detections = match &self.fixed {
            Some(template) => {
                let (w, h) = (frame.width as f32, frame.height as f32);
                let mut detection = template.clone();
                detection.bbox = BoundingBox::from_center(w / 2.0, h / 2.0, w / 2.0, h / 2.0);
                vec![detection]
            }
            None => self.script.pop_front().unwrap_or_default(),
        };

        Ok(detections
            .into_iter()
            .filter(|d| d.confidence >= confidence_threshold)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_rgb(vec![0u8; 4 * 4 * 3], 4, 4).unwrap()
    }

    #[test]
    fn fixed_spec_reports_every_frame() -> Result<()> {
        let mut backend = StubBackend::from_spec("apple:0.75")?;
        for _ in 0..3 {
            let detections = backend.detect(&frame(), 0.5)?;
            assert_eq!(detections.len(), 1);
            assert_eq!(detections[0].label, "apple");
            assert_eq!(detections[0].confidence, 0.75);
        }
        Ok(())
    }

    #[test]
    fn threshold_filters_low_confidence() -> Result<()> {
        let mut backend = StubBackend::from_spec("apple:0.4")?;
        assert!(backend.detect(&frame(), 0.6)?.is_empty());
        Ok(())
    }

    #[test]
    fn script_runs_out_to_empty() -> Result<()> {
        let mut backend = StubBackend::from_labels(&["apple", "none"], 0.9);
        assert_eq!(backend.detect(&frame(), 0.0)?.len(), 1);
        assert!(backend.detect(&frame(), 0.0)?.is_empty());
        assert!(backend.detect(&frame(), 0.0)?.is_empty());
        Ok(())
    }

    #[test]
    fn injected_failure_only_hits_one_call() -> Result<()> {
        let mut backend = StubBackend::fixed("apple", 0.9).with_failure_at(1);
        assert!(backend.detect(&frame(), 0.0).is_ok());
        assert!(backend.detect(&frame(), 0.0).is_err());
        assert!(backend.detect(&frame(), 0.0).is_ok());
        Ok(())
    }

    #[test]
    fn rejects_bad_specs() {
        assert!(StubBackend::from_spec("apple:high").is_err());
        assert!(StubBackend::from_spec("apple:1.5").is_err());
    }
}
