//! scale_live - live weigh-and-identify loop
//!
//! Each iteration:
//! 1. Polls the scale for the latest weight (degraded to 0.0 kg if the port is missing)
//! 2. Captures a camera frame and runs the detector on it
//! 3. Commits the top label once it has been stable for the configured window
//! 4. Prices the committed item from the weight at commit time and shows the overlay
//!
//! Stops on `q` in the window, Ctrl-C, `--max-frames`, or a capture/inference error.
//!
//! A default build only has the `stub://` camera and detector and runs headless. Real
//! hardware needs all three optional features:
//!
//! ```text
//! cargo build --release --features "camera-v4l2 backend-tract display-window"
//! ```

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use smart_scale::{
    config::CameraSettings, display::FrameSink, load_backend, CameraSource, LiveSession, Scale,
    ScaleConfig,
};

const FEATURES_HELP: &str = "\
Default builds only support stub:// cameras and detectors and run headless.
For a V4L2 camera, an ONNX model and a window, build with:
  cargo build --release --features \"camera-v4l2 backend-tract display-window\"";

#[derive(Parser, Debug)]
#[command(
    name = "scale_live",
    about = "Identify, weigh and price items placed on the scale",
    after_help = FEATURES_HELP
)]
struct Args {
    /// TOML configuration file
    #[arg(long, env = "SMART_SCALE_CONFIG", value_name = "PATH")]
    config: Option<PathBuf>,

    /// Serial port of the scale (overrides config)
    #[arg(long, value_name = "PORT")]
    port: Option<String>,

    /// Camera device, or stub://<name> for synthetic frames (overrides config)
    #[arg(long, value_name = "DEVICE")]
    camera: Option<String>,

    /// ONNX model path, or stub://<label>[:<confidence>] (overrides config)
    #[arg(long, value_name = "PATH")]
    model: Option<String>,

    /// Class names file, one per line (overrides config)
    #[arg(long, value_name = "PATH")]
    labels: Option<PathBuf>,

    /// Stop after this many frames
    #[arg(long, value_name = "N")]
    max_frames: Option<u64>,

    /// Run without a window (Ctrl-C to stop)
    #[arg(long)]
    headless: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = ScaleConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        cfg.serial.port = port;
    }
    if let Some(camera) = args.camera {
        cfg.camera.device = camera;
    }
    if let Some(model) = args.model {
        cfg.detector.model_path = model;
    }
    if let Some(labels) = args.labels {
        cfg.detector.labels_path = Some(labels);
        cfg.detector.labels.clear();
    }
    cfg.validate()?;

    log::info!(
        "scale_live starting: stability window {:.2}s, confidence >= {:.2}, {} priced items",
        cfg.stability_duration.as_secs_f64(),
        cfg.detector.confidence_threshold,
        cfg.prices.len()
    );

    let detector = load_backend(&cfg.detector)?;
    let mut camera = CameraSource::new(cfg.camera.clone())?;
    camera.connect()?;
    let scale = Scale::connect(&cfg.serial);
    let sink = open_sink(&cfg, &cfg.camera, args.headless)?;

    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = Arc::clone(&stop);
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::SeqCst);
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!("press 'q' in the window or Ctrl-C to quit");
    let summary = LiveSession::new(&cfg, Box::new(camera), detector, scale, sink)
        .with_max_frames(args.max_frames)
        .run(&stop)?;

    match &summary.last_committed.label {
        Some(label) => log::info!(
            "last committed item: {} ({})",
            label,
            smart_scale::pricing::format_price(&cfg.display.currency, summary.last_committed.price)
        ),
        None => log::info!("no item committed at exit"),
    }
    Ok(())
}

#[cfg(feature = "display-window")]
fn open_sink(
    cfg: &ScaleConfig,
    camera: &CameraSettings,
    headless: bool,
) -> Result<Box<dyn FrameSink>> {
    if headless {
        return Ok(Box::new(smart_scale::display::HeadlessSink::new()));
    }
    let window = smart_scale::display::WindowSink::open(
        &cfg.display.window_title,
        camera.width,
        camera.height,
    )?;
    Ok(Box::new(window))
}

#[cfg(not(feature = "display-window"))]
fn open_sink(
    _cfg: &ScaleConfig,
    _camera: &CameraSettings,
    headless: bool,
) -> Result<Box<dyn FrameSink>> {
    if !headless {
        log::warn!("built without the display-window feature; running headless");
    }
    Ok(Box::new(smart_scale::display::HeadlessSink::new()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn help_names_hardware_features() {
        let help = Args::command().render_help().to_string();
        for feature in ["camera-v4l2", "backend-tract", "display-window"] {
            assert!(help.contains(feature), "help is missing {}", feature);
        }
    }
}
