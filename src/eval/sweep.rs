//! Confidence threshold sweep over a result table.
//!
//! For each threshold the rows whose top confidence reaches it are "accepted". Coverage
//! is the accepted fraction; F1 is the macro-averaged F1 of the accepted predictions
//! against their ground truth, or NaN when nothing was accepted.

use anyhow::{anyhow, Result};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::table::ResultRow;

pub const DEFAULT_SWEEP_START: f64 = 0.40;
pub const DEFAULT_SWEEP_END: f64 = 0.95;
pub const DEFAULT_SWEEP_STEPS: usize = 12;

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SweepPoint {
    pub threshold: f64,
    pub accepted: usize,
    pub coverage: f64,
    /// NaN when no row was accepted; serialized as `null`.
    pub f1: f64,
}

impl SweepPoint {
    /// `Threshold 0.40 -> F1 = 0.912 | coverage = 0.981`
    pub fn report_line(&self) -> String {
        let f1 = if self.f1.is_nan() {
            "nan".to_string()
        } else {
            format!("{:.3}", self.f1)
        };
        format!(
            "Threshold {:.2} -> F1 = {} | coverage = {:.3}",
            self.threshold, f1, self.coverage
        )
    }
}

/// `steps` evenly spaced values from `start` to `end`, both included.
pub fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (steps - 1) as f64;
            (0..steps)
                .map(|i| {
                    if i == steps - 1 {
                        end
                    } else {
                        start + step * i as f64
                    }
                })
                .collect()
        }
    }
}

#[derive(Default)]
struct ClassCounts {
    true_pos: usize,
    false_pos: usize,
    false_neg: usize,
}

/// Macro-averaged F1 over `(ground_truth, predicted)` pairs.
///
/// Classes are every label seen in either column. Undefined precision, recall or F1
/// count as 0. Returns NaN for an empty input.
pub fn macro_f1<'a>(pairs: impl IntoIterator<Item = (&'a str, &'a str)>) -> f64 {
    let mut counts: BTreeMap<&str, ClassCounts> = BTreeMap::new();
    for (truth, predicted) in pairs {
        if truth == predicted {
            counts.entry(truth).or_default().true_pos += 1;
        } else {
            counts.entry(truth).or_default().false_neg += 1;
            counts.entry(predicted).or_default().false_pos += 1;
        }
    }
    if counts.is_empty() {
        return f64::NAN;
    }
    let total: f64 = counts.values().map(class_f1).sum();
    total / counts.len() as f64
}

fn class_f1(counts: &ClassCounts) -> f64 {
    let tp = counts.true_pos as f64;
    let precision = ratio(tp, tp + counts.false_pos as f64);
    let recall = ratio(tp, tp + counts.false_neg as f64);
    ratio(2.0 * precision * recall, precision + recall)
}

fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Evaluate every threshold against `rows`. An empty table is an error.
pub fn sweep(rows: &[ResultRow], thresholds: &[f64]) -> Result<Vec<SweepPoint>> {
    sweep_with(rows, thresholds, |_| {})
}

/// [`sweep`], calling `on_point` as each threshold is evaluated.
pub fn sweep_with(
    rows: &[ResultRow],
    thresholds: &[f64],
    mut on_point: impl FnMut(&SweepPoint),
) -> Result<Vec<SweepPoint>> {
    if rows.is_empty() {
        return Err(anyhow!("result table is empty; coverage is undefined"));
    }
    let total = rows.len() as f64;
    let mut points = Vec::with_capacity(thresholds.len());
    for &threshold in thresholds {
        // Compare at the table's precision so a row at exactly the threshold is kept.
        let floor = threshold as f32;
        let accepted: Vec<&ResultRow> =
            rows.iter().filter(|row| row.confidence >= floor).collect();
        let f1 = macro_f1(
            accepted
                .iter()
                .map(|row| (row.ground_truth_label.as_str(), row.predicted_label.as_str())),
        );
        let point = SweepPoint {
            threshold,
            accepted: accepted.len(),
            coverage: accepted.len() as f64 / total,
            f1,
        };
        on_point(&point);
        points.push(point);
    }
    Ok(points)
}

/// Distinct ground-truth labels, for the report header.
pub fn class_labels(rows: &[ResultRow]) -> BTreeSet<&str> {
    rows.iter()
        .map(|row| row.ground_truth_label.as_str())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(truth: &str, predicted: &str, confidence: f32) -> ResultRow {
        ResultRow::new("x.jpg", truth, predicted, confidence)
    }

    fn table() -> Vec<ResultRow> {
        vec![
            row("apple", "apple", 0.95),
            row("apple", "banana", 0.55),
            row("banana", "banana", 0.80),
            row("banana", "none", 0.0),
            row("orange", "orange", 0.45),
        ]
    }

    #[test]
    fn default_grid_matches_twelve_points() {
        let grid = linspace(DEFAULT_SWEEP_START, DEFAULT_SWEEP_END, DEFAULT_SWEEP_STEPS);
        assert_eq!(grid.len(), 12);
        assert_eq!(grid[0], 0.40);
        assert_eq!(grid[11], 0.95);
        assert!((grid[1] - 0.45).abs() < 1e-12);
        assert_eq!(linspace(0.5, 0.9, 1), vec![0.5]);
        assert!(linspace(0.5, 0.9, 0).is_empty());
    }

    #[test]
    fn perfect_predictions_score_one() {
        let pairs = [("apple", "apple"), ("banana", "banana")];
        assert_eq!(macro_f1(pairs), 1.0);
    }

    #[test]
    fn macro_f1_matches_hand_computation() {
        // apple: P=1, R=0.5 -> 2/3; banana: P=0.5, R=1 -> 2/3; mean 2/3.
        let pairs = [("apple", "apple"), ("apple", "banana"), ("banana", "banana")];
        assert!((macro_f1(pairs) - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn predicted_only_class_counts_as_zero() {
        // "none" is never ground truth: its F1 is 0 and drags the mean down.
        let pairs = [("apple", "apple"), ("apple", "none")];
        // apple: P=1, R=0.5 -> 2/3; none: 0.
        assert!((macro_f1(pairs) - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn empty_accepted_set_is_nan() {
        assert!(macro_f1(std::iter::empty()).is_nan());
        let points = sweep(&table(), &[0.99]).unwrap();
        assert_eq!(points[0].accepted, 0);
        assert_eq!(points[0].coverage, 0.0);
        assert!(points[0].f1.is_nan());
        assert_eq!(
            points[0].report_line(),
            "Threshold 0.99 -> F1 = nan | coverage = 0.000"
        );
    }

    #[test]
    fn zero_threshold_accepts_everything() {
        let points = sweep(&table(), &[0.0]).unwrap();
        assert_eq!(points[0].coverage, 1.0);
        assert_eq!(points[0].accepted, 5);
    }

    #[test]
    fn coverage_never_increases_with_threshold() {
        let grid = linspace(0.0, 1.0, 21);
        let points = sweep(&table(), &grid).unwrap();
        for pair in points.windows(2) {
            assert!(pair[1].coverage <= pair[0].coverage);
        }
    }

    #[test]
    fn rows_at_exact_threshold_are_accepted() {
        let points = sweep(&table(), &[0.95]).unwrap();
        assert_eq!(points[0].accepted, 1);
        assert_eq!(points[0].f1, 1.0);
    }

    #[test]
    fn empty_table_is_an_error() {
        assert!(sweep(&[], &[0.5]).is_err());
    }

    #[test]
    fn sweep_with_reports_each_threshold_in_order() -> Result<()> {
        let grid = linspace(0.0, 0.9, 4);
        let mut seen = Vec::new();
        let points = sweep_with(&table(), &grid, |point| seen.push(point.threshold))?;
        assert_eq!(seen, grid);
        assert_eq!(points.len(), 4);

        let mut calls = 0;
        assert!(sweep_with(&[], &grid, |_| calls += 1).is_err());
        assert_eq!(calls, 0);
        Ok(())
    }

    #[test]
    fn report_line_format() {
        let point = SweepPoint {
            threshold: 0.4,
            accepted: 53,
            coverage: 0.981,
            f1: 0.9123,
        };
        assert_eq!(
            point.report_line(),
            "Threshold 0.40 -> F1 = 0.912 | coverage = 0.981"
        );
    }

    #[test]
    fn nan_f1_serializes_as_null() -> Result<()> {
        let point = SweepPoint {
            threshold: 0.9,
            accepted: 0,
            coverage: 0.0,
            f1: f64::NAN,
        };
        let json = serde_json::to_value(point)?;
        assert!(json["f1"].is_null());
        Ok(())
    }

    #[test]
    fn class_labels_come_from_ground_truth() {
        let rows = table();
        let labels: Vec<&str> = class_labels(&rows).into_iter().collect();
        assert_eq!(labels, vec!["apple", "banana", "orange"]);
    }
}
