//! batch_classify - run the detector over a labeled image directory.
//!
//! Every immediate subdirectory of `--dataset` is a ground-truth label; every
//! .jpg/.jpeg/.png directly inside it is classified. One CSV row per image:
//! `filename,ground_truth_label,predicted_label,confidence`. Unreadable images are
//! skipped with a warning.

use anyhow::{anyhow, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use smart_scale::eval::{collect_samples, run_batch, ResultWriter, DEFAULT_BATCH_CONFIDENCE};
use smart_scale::{load_backend, ScaleConfig};

#[path = "../ui.rs"]
mod ui;

#[derive(Parser, Debug)]
#[command(
    name = "batch_classify",
    about = "Classify a labeled image directory into a CSV result table"
)]
struct Args {
    /// Dataset root: one subdirectory per ground-truth label
    #[arg(long, value_name = "DIR")]
    dataset: PathBuf,

    /// Output CSV (overwritten)
    #[arg(long, default_value = "results.csv", value_name = "PATH")]
    output: PathBuf,

    /// TOML configuration file (detector section)
    #[arg(long, env = "SMART_SCALE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// ONNX model path, or stub://<label>[:<confidence>] (overrides config)
    #[arg(long, value_name = "PATH")]
    model: Option<String>,

    /// Class names file, one per line (overrides config)
    #[arg(long, value_name = "PATH")]
    labels: Option<PathBuf>,

    /// Detector confidence floor
    #[arg(long, default_value_t = DEFAULT_BATCH_CONFIDENCE)]
    confidence: f32,

    /// UI mode for stderr progress (auto|plain|pretty)
    #[arg(long, default_value = "auto", value_name = "MODE")]
    ui: String,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();
    let is_tty = std::io::stderr().is_terminal();
    let stdout_is_tty = std::io::stdout().is_terminal();
    let ui = ui::Ui::from_args(Some(&args.ui), is_tty, !stdout_is_tty);

    if !(0.0..=1.0).contains(&args.confidence) {
        return Err(anyhow!("--confidence must be within [0, 1]"));
    }

    let mut cfg = ScaleConfig::load(args.config.as_deref())?;
    if let Some(model) = args.model {
        cfg.detector.model_path = model;
    }
    if let Some(labels) = args.labels {
        cfg.detector.labels_path = Some(labels);
        cfg.detector.labels.clear();
    }

    let mut detector = {
        let _stage = ui.stage("Load detector");
        load_backend(&cfg.detector)?
    };
    let samples = {
        let _stage = ui.stage("Scan dataset");
        collect_samples(&args.dataset)?
    };
    log::info!(
        "classifying {} images from {} at confidence >= {:.2}",
        samples.len(),
        args.dataset.display(),
        args.confidence
    );

    let mut table = ResultWriter::create(&args.output)?;
    let summary = {
        let _stage = ui.stage("Classify images");
        let bar = ui.progress(samples.len() as u64);
        let summary = run_batch(
            detector.as_mut(),
            &samples,
            args.confidence,
            &mut table,
            |sample| {
                bar.set_message(sample.file_name.clone());
                bar.inc(1);
            },
        )?;
        bar.finish_and_clear();
        summary
    };
    table.finish()?;

    println!(
        "batch_classify: {} evaluated, {} skipped -> {}",
        summary.evaluated,
        summary.skipped,
        args.output.display()
    );
    Ok(())
}
