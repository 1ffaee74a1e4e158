//! Detection stability filter.
//!
//! Per-frame detections flicker. A label is only shown and priced once it has been the
//! top detection on consecutive frames for at least the configured duration. The
//! filter is evaluated exactly once per frame:
//!
//! - label differs from the previous frame: forget the timer; if nothing is in view,
//!   drop back to the no-item baseline.
//! - same label as the previous frame, no timer yet: start timing (item labels only).
//! - same label, timer running, not yet committed to it: commit once
//!   `now - pending_since >= duration`, pricing with the weight read at that instant.
//!
//! A single dropout frame restarts the timer from scratch.

use std::time::{Duration, Instant};

use crate::detect::{Observation, NO_ITEM_LABEL};
use crate::pricing::PriceTable;

/// What the overlay shows and what gets charged.
#[derive(Clone, Debug, PartialEq)]
pub struct CommittedItem {
    /// `None` at the no-item baseline.
    pub label: Option<String>,
    pub confidence: f32,
    pub price: f64,
}

impl CommittedItem {
    pub fn baseline() -> Self {
        Self {
            label: None,
            confidence: 0.0,
            price: 0.0,
        }
    }

    pub fn is_baseline(&self) -> bool {
        self.label.is_none()
    }
}

impl Default for CommittedItem {
    fn default() -> Self {
        Self::baseline()
    }
}

/// Emitted on the frame a candidate label is committed.
#[derive(Clone, Debug, PartialEq)]
pub struct CommitEvent {
    pub label: String,
    pub confidence: f32,
    pub weight_kg: f64,
    pub price: f64,
    /// Time the candidate spent in `Timing` before committing.
    pub elapsed: Duration,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StabilityPhase {
    /// No candidate is being timed and nothing is committed.
    Idle,
    /// A candidate is accumulating time and is not yet the committed item.
    Timing,
    /// The timed candidate is the committed item, or a committed item is held while
    /// no candidate is timed.
    Committed,
}

#[derive(Clone, Debug)]
pub struct StabilityFilter {
    duration: Duration,
    previous_label: String,
    pending_since: Option<Instant>,
    committed: CommittedItem,
}

impl StabilityFilter {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            previous_label: NO_ITEM_LABEL.to_string(),
            pending_since: None,
            committed: CommittedItem::baseline(),
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }

    pub fn committed(&self) -> &CommittedItem {
        &self.committed
    }

    pub fn pending_since(&self) -> Option<Instant> {
        self.pending_since
    }

    pub fn phase(&self) -> StabilityPhase {
        match self.pending_since {
            None if self.committed.is_baseline() => StabilityPhase::Idle,
            None => StabilityPhase::Committed,
            Some(_) if self.committed.label.as_deref() == Some(self.previous_label.as_str()) => {
                StabilityPhase::Committed
            }
            Some(_) => StabilityPhase::Timing,
        }
    }

    /// Feed one frame's top observation.
    ///
    /// `weight_kg` is the scale reading at `now`; it is only used if this frame commits.
    pub fn observe(
        &mut self,
        observation: &Observation,
        now: Instant,
        weight_kg: f64,
        prices: &PriceTable,
    ) -> Option<CommitEvent> {
        if observation.label != self.previous_label {
            self.previous_label = observation.label.clone();
            self.pending_since = None;
            if observation.is_nothing() {
                self.committed = CommittedItem::baseline();
            }
            return None;
        }

        let Some(started) = self.pending_since else {
            if !observation.is_nothing() {
                self.pending_since = Some(now);
            }
            return None;
        };

        if self.committed.label.as_deref() == Some(observation.label.as_str()) {
            return None;
        }

        let elapsed = now.saturating_duration_since(started);
        if elapsed < self.duration {
            return None;
        }

        let price = prices.price(&observation.label, weight_kg);
        self.committed = CommittedItem {
            label: Some(observation.label.clone()),
            confidence: observation.confidence,
            price,
        };
        log::info!(
            "item '{}' stabilized in {:.2}s (conf={:.2}, weight={:.3} kg, price={:.2})",
            observation.label,
            elapsed.as_secs_f64(),
            observation.confidence,
            weight_kg,
            price
        );
        Some(CommitEvent {
            label: observation.label.clone(),
            confidence: observation.confidence,
            weight_kg,
            price,
            elapsed,
        })
    }
}
