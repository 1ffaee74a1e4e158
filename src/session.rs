//! The live weigh-and-identify loop.
//!
//! One `LiveSession` owns every resource of a run: camera, detector, scale link,
//! stability filter, price table, overlay renderer and display sink. Each iteration
//! polls the scale, captures a frame, detects, feeds the top detection to the stability
//! filter and shows the annotated frame. Capture and inference errors end the run.

use anyhow::{Context, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use crate::config::ScaleConfig;
use crate::detect::{top_detection, DetectorBackend, Observation};
use crate::display::FrameSink;
use crate::frame::FrameSource;
use crate::overlay::{OverlayRenderer, OverlayText};
use crate::pricing::PriceTable;
use crate::scale::Scale;
use crate::stability::{CommitEvent, CommittedItem, StabilityFilter};

/// Result of one iteration.
#[derive(Clone, Debug)]
pub struct StepReport {
    pub observation: Observation,
    pub commit: Option<CommitEvent>,
    pub weight_kg: f64,
    pub overlay: OverlayText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    QuitKey,
    Interrupted,
    FrameLimit,
}

#[derive(Clone, Debug)]
pub struct SessionSummary {
    pub frames: u64,
    pub commits: u64,
    pub stop_reason: StopReason,
    pub last_committed: CommittedItem,
}

pub struct LiveSession {
    camera: Box<dyn FrameSource>,
    detector: Box<dyn DetectorBackend>,
    scale: Scale,
    filter: StabilityFilter,
    prices: PriceTable,
    overlay: OverlayRenderer,
    sink: Box<dyn FrameSink>,
    confidence_threshold: f32,
    currency: String,
    max_frames: Option<u64>,
    frames: u64,
    commits: u64,
}

impl LiveSession {
    pub fn new(
        config: &ScaleConfig,
        camera: Box<dyn FrameSource>,
        detector: Box<dyn DetectorBackend>,
        scale: Scale,
        sink: Box<dyn FrameSink>,
    ) -> Self {
        Self {
            camera,
            detector,
            scale,
            filter: StabilityFilter::new(config.stability_duration),
            prices: config.prices.clone(),
            overlay: OverlayRenderer::new(config.display.font_path.as_deref()),
            sink,
            confidence_threshold: config.detector.confidence_threshold,
            currency: config.display.currency.clone(),
            max_frames: None,
            frames: 0,
            commits: 0,
        }
    }

    /// Stop after `limit` frames.
    pub fn with_max_frames(mut self, limit: Option<u64>) -> Self {
        self.max_frames = limit;
        self
    }

    pub fn with_overlay(mut self, overlay: OverlayRenderer) -> Self {
        self.overlay = overlay;
        self
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    pub fn commits(&self) -> u64 {
        self.commits
    }

    pub fn committed(&self) -> &CommittedItem {
        self.filter.committed()
    }

    pub fn weight_kg(&self) -> f64 {
        self.scale.weight_kg()
    }

    /// Run one iteration, timestamping the stability decision with the wall clock
    /// right after inference.
    pub fn step(&mut self) -> Result<StepReport> {
        self.iterate(None)
    }

    /// Run one iteration with an explicit stability timestamp.
    pub fn step_at(&mut self, now: Instant) -> Result<StepReport> {
        self.iterate(Some(now))
    }

    fn iterate(&mut self, now: Option<Instant>) -> Result<StepReport> {
        self.scale.poll();

        let frame = self
            .camera
            .next_frame()
            .with_context(|| format!("capture from {}", self.camera.describe()))?;
        let detections = self
            .detector
            .detect(&frame, self.confidence_threshold)
            .with_context(|| format!("{} inference", self.detector.name()))?;
        let observation = top_detection(&detections);

        let now = now.unwrap_or_else(Instant::now);
        let weight_kg = self.scale.weight_kg();
        let commit = self
            .filter
            .observe(&observation, now, weight_kg, &self.prices);
        if commit.is_some() {
            self.commits += 1;
        }

        let overlay = OverlayText::compose(self.filter.committed(), weight_kg, &self.currency);
        let mut canvas = frame.to_image();
        self.overlay.render(&mut canvas, &overlay, &detections);
        let status = overlay.status_line();
        self.sink.show(&canvas, &status)?;
        self.frames += 1;

        Ok(StepReport {
            observation,
            commit,
            weight_kg,
            overlay,
        })
    }

    /// Loop until the quit key, `stop`, the frame limit, or an error.
    ///
    /// Resources are released on every exit path, including errors.
    pub fn run(mut self, stop: &AtomicBool) -> Result<SessionSummary> {
        let outcome = self.run_loop(stop);
        self.shutdown();
        let stop_reason = outcome?;
        let summary = SessionSummary {
            frames: self.frames,
            commits: self.commits,
            stop_reason,
            last_committed: self.filter.committed().clone(),
        };
        log::info!(
            "session: stopped ({:?}) after {} frames, {} commits",
            summary.stop_reason,
            summary.frames,
            summary.commits
        );
        Ok(summary)
    }

    fn run_loop(&mut self, stop: &AtomicBool) -> Result<StopReason> {
        loop {
            if stop.load(Ordering::SeqCst) {
                return Ok(StopReason::Interrupted);
            }
            if self.max_frames.is_some_and(|limit| self.frames >= limit) {
                return Ok(StopReason::FrameLimit);
            }
            self.step()?;
            if self.sink.quit_requested() {
                return Ok(StopReason::QuitKey);
            }
        }
    }

    fn shutdown(&mut self) {
        self.sink.close();
        self.scale.close();
        self.camera.close();
        log::info!(
            "session: scale lines accepted={} dropped={}",
            self.scale.lines_accepted(),
            self.scale.lines_dropped()
        );
    }
}
