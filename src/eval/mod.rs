//! Offline evaluation.
//!
//! `runner` classifies a labeled image directory into a CSV result table; `sweep`
//! turns that table into coverage and macro-F1 per confidence threshold; `chart`
//! plots the sweep.

pub mod chart;
mod dataset;
mod runner;
pub mod sweep;
mod table;

pub use dataset::{collect_samples, Sample};
pub use runner::{classify_image, run_batch, BatchSummary, DEFAULT_BATCH_CONFIDENCE};
pub use sweep::{linspace, macro_f1, sweep, sweep_with, SweepPoint};
pub use table::{read_results, ResultRow, ResultWriter};
