use anyhow::{Context, Result};
use std::path::Path;

use super::dataset::Sample;
use super::table::{ResultRow, ResultWriter};
use crate::detect::{top_detection, DetectorBackend, Observation};
use crate::frame::Frame;

/// Default detector confidence floor for offline runs (the detector's own default).
pub const DEFAULT_BATCH_CONFIDENCE: f32 = 0.25;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub evaluated: u64,
    pub skipped: u64,
}

/// Classify one image file: its top detection, or the no-item sentinel.
pub fn classify_image(
    detector: &mut dyn DetectorBackend,
    path: &Path,
    confidence_threshold: f32,
) -> Result<Observation> {
    let image = image::open(path)
        .with_context(|| format!("failed to read image {}", path.display()))?
        .into_rgb8();
    let frame = Frame::from_image(image);
    let detections = detector
        .detect(&frame, confidence_threshold)
        .with_context(|| format!("{} inference on {}", detector.name(), path.display()))?;
    Ok(top_detection(&detections))
}

/// Classify every sample and append one row per success.
///
/// A sample that cannot be decoded or whose inference fails is logged and skipped.
/// Only table write errors abort the run.
pub fn run_batch(
    detector: &mut dyn DetectorBackend,
    samples: &[Sample],
    confidence_threshold: f32,
    table: &mut ResultWriter,
    mut on_sample: impl FnMut(&Sample),
) -> Result<BatchSummary> {
    let mut summary = BatchSummary::default();
    for sample in samples {
        match classify_image(detector, &sample.path, confidence_threshold) {
            Ok(observation) => {
                table.append(&ResultRow::new(
                    sample.file_name.clone(),
                    sample.ground_truth.clone(),
                    observation.label,
                    observation.confidence,
                ))?;
                summary.evaluated += 1;
            }
            Err(err) => {
                log::warn!("skipping {}: {:#}", sample.path.display(), err);
                summary.skipped += 1;
            }
        }
        on_sample(sample);
    }
    Ok(summary)
}
