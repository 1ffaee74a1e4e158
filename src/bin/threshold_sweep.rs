//! threshold_sweep - macro-F1 and coverage per confidence threshold.
//!
//! Reads the table written by `batch_classify`. A row is accepted at a threshold when
//! its top confidence reaches it; F1 is computed over accepted rows only and is `nan`
//! when nothing is accepted.

use anyhow::{anyhow, Result};
use clap::Parser;
use serde::Serialize;
use std::io::IsTerminal;
use std::path::PathBuf;

use smart_scale::eval::chart::save_chart;
use smart_scale::eval::sweep::{
    class_labels, DEFAULT_SWEEP_END, DEFAULT_SWEEP_START, DEFAULT_SWEEP_STEPS,
};
use smart_scale::eval::{linspace, read_results, sweep_with, SweepPoint};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "threshold_sweep",
    about = "Compute macro-F1 and coverage across confidence thresholds"
)]
struct Args {
    /// Result table from batch_classify
    #[arg(long, default_value = "results.csv", value_name = "PATH")]
    input: PathBuf,

    /// First threshold
    #[arg(long, default_value_t = DEFAULT_SWEEP_START)]
    start: f64,

    /// Last threshold (inclusive)
    #[arg(long, default_value_t = DEFAULT_SWEEP_END)]
    end: f64,

    /// Number of thresholds
    #[arg(long, default_value_t = DEFAULT_SWEEP_STEPS)]
    steps: usize,

    /// Write the F1/coverage curve as a PNG
    #[arg(long, value_name = "PATH")]
    chart: Option<PathBuf>,

    /// TTF/OTF font for the chart's title, axis labels and legend text
    #[arg(long, value_name = "PATH")]
    font: Option<PathBuf>,

    /// Write the sweep as JSON
    #[arg(long, value_name = "PATH")]
    json: Option<PathBuf>,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

#[derive(Serialize)]
struct SweepReport<'a> {
    rows: usize,
    classes: Vec<&'a str>,
    points: &'a [SweepPoint],
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    if args.steps == 0 {
        return Err(anyhow!("--steps must be at least 1"));
    }
    if !(args.start.is_finite() && args.end.is_finite()) || args.start > args.end {
        return Err(anyhow!("threshold range must satisfy start <= end"));
    }

    let rows = {
        let _stage = ui.stage("Read result table");
        read_results(&args.input)?
    };
    let points = {
        let _stage = ui.stage("Sweep thresholds");
        let progress = ui.progress(args.steps as u64);
        let points = sweep_with(&rows, &linspace(args.start, args.end, args.steps), |point| {
            progress.set_message(format!("threshold {:.2}", point.threshold));
            progress.inc(1);
        })?;
        progress.finish_and_clear();
        points
    };

    let classes: Vec<&str> = class_labels(&rows).into_iter().collect();
    println!(
        "threshold_sweep: {} rows, {} classes ({})",
        rows.len(),
        classes.len(),
        classes.join(", ")
    );
    for point in &points {
        println!("{}", point.report_line());
    }

    if let Some(path) = &args.chart {
        let _stage = ui.stage("Render chart");
        save_chart(&points, path, args.font.as_deref())?;
        log::info!("chart written to {}", path.display());
    }
    if let Some(path) = &args.json {
        let _stage = ui.stage("Write JSON report");
        let report = SweepReport {
            rows: rows.len(),
            classes,
            points: &points,
        };
        let json = serde_json::to_string_pretty(&report)?;
        std::fs::write(path, json)
            .map_err(|e| anyhow!("failed to write report {}: {}", path.display(), e))?;
        log::info!("report written to {}", path.display());
    }
    Ok(())
}
