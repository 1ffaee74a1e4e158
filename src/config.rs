use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::pricing::PriceTable;

pub const CONFIG_ENV: &str = "SMART_SCALE_CONFIG";

const DEFAULT_SERIAL_PORT: &str = "/dev/ttyUSB0";
const DEFAULT_BAUD_RATE: u32 = 9600;
const DEFAULT_SERIAL_TIMEOUT_MS: u64 = 100;
const DEFAULT_SERIAL_SETTLE_MS: u64 = 2000;
const DEFAULT_CAMERA_DEVICE: &str = "/dev/video0";
const DEFAULT_CAMERA_FPS: u32 = 10;
const DEFAULT_CAMERA_WIDTH: u32 = 640;
const DEFAULT_CAMERA_HEIGHT: u32 = 480;
const DEFAULT_MODEL_PATH: &str = "best.onnx";
const DEFAULT_MODEL_INPUT: u32 = 640;
const DEFAULT_CONFIDENCE: f32 = 0.6;
const DEFAULT_IOU: f32 = 0.45;
const DEFAULT_STABILITY_SECS: f64 = 0.8;
const DEFAULT_CURRENCY: &str = "R$";
const DEFAULT_WINDOW_TITLE: &str = "Smart Scale (press 'q' to quit)";

#[derive(Debug, Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct ScaleConfigFile {
    serial: Option<SerialConfigFile>,
    camera: Option<CameraConfigFile>,
    detector: Option<DetectorConfigFile>,
    stability: Option<StabilityConfigFile>,
    display: Option<DisplayConfigFile>,
    prices: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Deserialize, Default)]
struct SerialConfigFile {
    port: Option<String>,
    baud_rate: Option<u32>,
    timeout_ms: Option<u64>,
    settle_ms: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct CameraConfigFile {
    device: Option<String>,
    target_fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    model_path: Option<String>,
    labels_path: Option<PathBuf>,
    labels: Option<Vec<String>>,
    input_width: Option<u32>,
    input_height: Option<u32>,
    confidence_threshold: Option<f32>,
    iou_threshold: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct StabilityConfigFile {
    duration_secs: Option<f64>,
}

#[derive(Debug, Deserialize, Default)]
struct DisplayConfigFile {
    font_path: Option<PathBuf>,
    currency: Option<String>,
    window_title: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ScaleConfig {
    pub serial: SerialSettings,
    pub camera: CameraSettings,
    pub detector: DetectorSettings,
    pub stability_duration: Duration,
    pub display: DisplaySettings,
    pub prices: PriceTable,
}

#[derive(Debug, Clone)]
pub struct SerialSettings {
    pub port: String,
    pub baud_rate: u32,
    pub timeout: Duration,
    pub settle: Duration,
}

#[derive(Debug, Clone)]
pub struct CameraSettings {
    pub device: String,
    pub target_fps: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone)]
pub struct DetectorSettings {
    pub model_path: String,
    pub labels_path: Option<PathBuf>,
    pub labels: Vec<String>,
    pub input_width: u32,
    pub input_height: u32,
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

#[derive(Debug, Clone)]
pub struct DisplaySettings {
    pub font_path: Option<PathBuf>,
    pub currency: String,
    pub window_title: String,
}

impl Default for SerialSettings {
    fn default() -> Self {
        Self {
            port: DEFAULT_SERIAL_PORT.to_string(),
            baud_rate: DEFAULT_BAUD_RATE,
            timeout: Duration::from_millis(DEFAULT_SERIAL_TIMEOUT_MS),
            settle: Duration::from_millis(DEFAULT_SERIAL_SETTLE_MS),
        }
    }
}

impl Default for CameraSettings {
    fn default() -> Self {
        Self {
            device: DEFAULT_CAMERA_DEVICE.to_string(),
            target_fps: DEFAULT_CAMERA_FPS,
            width: DEFAULT_CAMERA_WIDTH,
            height: DEFAULT_CAMERA_HEIGHT,
        }
    }
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            model_path: DEFAULT_MODEL_PATH.to_string(),
            labels_path: None,
            labels: Vec::new(),
            input_width: DEFAULT_MODEL_INPUT,
            input_height: DEFAULT_MODEL_INPUT,
            confidence_threshold: DEFAULT_CONFIDENCE,
            iou_threshold: DEFAULT_IOU,
        }
    }
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            font_path: None,
            currency: DEFAULT_CURRENCY.to_string(),
            window_title: DEFAULT_WINDOW_TITLE.to_string(),
        }
    }
}

impl DetectorSettings {
    /// Class names for the model: the inline list wins over the labels file.
    pub fn resolve_labels(&self) -> Result<Vec<String>> {
        if !self.labels.is_empty() {
            return Ok(self.labels.clone());
        }
        match &self.labels_path {
            Some(path) => read_labels_file(path),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for ScaleConfig {
    fn default() -> Self {
        Self {
            serial: SerialSettings::default(),
            camera: CameraSettings::default(),
            detector: DetectorSettings::default(),
            stability_duration: Duration::from_secs_f64(DEFAULT_STABILITY_SECS),
            display: DisplaySettings::default(),
            prices: PriceTable::default(),
        }
    }
}

impl ScaleConfig {
    /// Load configuration: optional TOML file, then environment overrides, then validation.
    ///
    /// When `path` is `None` the `SMART_SCALE_CONFIG` variable is consulted.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var(CONFIG_ENV)
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let file_cfg = match path.map(Path::to_path_buf).or(env_path) {
            Some(path) => read_config_file(&path)?,
            None => ScaleConfigFile::default(),
        };
        let mut cfg = Self::from_file(file_cfg)?;
        cfg.apply_env()?;
        cfg.validate()?;
        Ok(cfg)
    }

    fn from_file(file: ScaleConfigFile) -> Result<Self> {
        let defaults = Self::default();

        let serial = match file.serial {
            Some(serial) => SerialSettings {
                port: serial.port.unwrap_or(defaults.serial.port),
                baud_rate: serial.baud_rate.unwrap_or(defaults.serial.baud_rate),
                timeout: serial
                    .timeout_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.serial.timeout),
                settle: serial
                    .settle_ms
                    .map(Duration::from_millis)
                    .unwrap_or(defaults.serial.settle),
            },
            None => defaults.serial,
        };
        let camera = match file.camera {
            Some(camera) => CameraSettings {
                device: camera.device.unwrap_or(defaults.camera.device),
                target_fps: camera.target_fps.unwrap_or(defaults.camera.target_fps),
                width: camera.width.unwrap_or(defaults.camera.width),
                height: camera.height.unwrap_or(defaults.camera.height),
            },
            None => defaults.camera,
        };
        let detector = match file.detector {
            Some(detector) => DetectorSettings {
                model_path: detector.model_path.unwrap_or(defaults.detector.model_path),
                labels_path: detector.labels_path,
                labels: detector.labels.unwrap_or_default(),
                input_width: detector
                    .input_width
                    .unwrap_or(defaults.detector.input_width),
                input_height: detector
                    .input_height
                    .unwrap_or(defaults.detector.input_height),
                confidence_threshold: detector
                    .confidence_threshold
                    .unwrap_or(defaults.detector.confidence_threshold),
                iou_threshold: detector
                    .iou_threshold
                    .unwrap_or(defaults.detector.iou_threshold),
            },
            None => defaults.detector,
        };
        let stability_secs = file
            .stability
            .and_then(|stability| stability.duration_secs)
            .unwrap_or(DEFAULT_STABILITY_SECS);
        let display = match file.display {
            Some(display) => DisplaySettings {
                font_path: display.font_path,
                currency: display.currency.unwrap_or(defaults.display.currency),
                window_title: display
                    .window_title
                    .unwrap_or(defaults.display.window_title),
            },
            None => defaults.display,
        };
        let prices = match file.prices {
            Some(prices) => PriceTable::new(prices),
            None => defaults.prices,
        };

        Ok(Self {
            serial,
            camera,
            detector,
            stability_duration: secs_to_duration(stability_secs, "stability.duration_secs")?,
            display,
            prices,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(port) = std::env::var("SMART_SCALE_SERIAL_PORT") {
            if !port.trim().is_empty() {
                self.serial.port = port;
            }
        }
        if let Ok(device) = std::env::var("SMART_SCALE_CAMERA") {
            if !device.trim().is_empty() {
                self.camera.device = device;
            }
        }
        if let Ok(model) = std::env::var("SMART_SCALE_MODEL") {
            if !model.trim().is_empty() {
                self.detector.model_path = model;
            }
        }
        if let Ok(secs) = std::env::var("SMART_SCALE_STABILITY_SECS") {
            let secs: f64 = secs.trim().parse().map_err(|_| {
                anyhow!("SMART_SCALE_STABILITY_SECS must be a number of seconds")
            })?;
            self.stability_duration = secs_to_duration(secs, "SMART_SCALE_STABILITY_SECS")?;
        }
        if let Ok(confidence) = std::env::var("SMART_SCALE_CONFIDENCE") {
            self.detector.confidence_threshold = confidence
                .trim()
                .parse()
                .map_err(|_| anyhow!("SMART_SCALE_CONFIDENCE must be a number"))?;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        let confidence = self.detector.confidence_threshold;
        if !(0.0..=1.0).contains(&confidence) {
            return Err(anyhow!(
                "detector confidence threshold must be within [0, 1], got {}",
                confidence
            ));
        }
        if !(0.0..=1.0).contains(&self.detector.iou_threshold) {
            return Err(anyhow!("detector IoU threshold must be within [0, 1]"));
        }
        if self.detector.input_width == 0 || self.detector.input_height == 0 {
            return Err(anyhow!("detector input size must be non-zero"));
        }
        if self.serial.baud_rate == 0 {
            return Err(anyhow!("serial baud rate must be greater than zero"));
        }
        if self.camera.width == 0 || self.camera.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }
        self.prices.validate()?;
        Ok(())
    }
}

fn secs_to_duration(secs: f64, field: &str) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{} must be a finite, non-negative number of seconds", field))
}

fn read_config_file(path: &Path) -> Result<ScaleConfigFile> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| anyhow!("failed to read config file {}: {}", path.display(), e))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?;
    Ok(cfg)
}

/// Read class names, one per line; blank lines are skipped.
pub fn read_labels_file(path: &Path) -> Result<Vec<String>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read labels file {}", path.display()))?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_yields_defaults() -> Result<()> {
        let cfg = ScaleConfig::from_file(toml::from_str("")?)?;
        assert_eq!(cfg.serial.baud_rate, 9600);
        assert_eq!(cfg.serial.timeout, Duration::from_millis(100));
        assert_eq!(cfg.stability_duration, Duration::from_millis(800));
        assert_eq!(cfg.detector.confidence_threshold, 0.6);
        assert_eq!(cfg.prices.price_per_kg("apple"), 8.99);
        Ok(())
    }

    #[test]
    fn prices_section_replaces_default_table() -> Result<()> {
        let file: ScaleConfigFile = toml::from_str(
            r#"
            [prices]
            pear = 7.5
            "#,
        )?;
        let cfg = ScaleConfig::from_file(file)?;
        assert_eq!(cfg.prices.price_per_kg("pear"), 7.5);
        assert_eq!(cfg.prices.price_per_kg("apple"), 0.0);
        Ok(())
    }

    #[test]
    fn negative_stability_is_rejected() -> Result<()> {
        let file: ScaleConfigFile = toml::from_str("[stability]\nduration_secs = -1.0")?;
        assert!(ScaleConfig::from_file(file).is_err());
        Ok(())
    }

    #[test]
    fn unknown_section_is_rejected() {
        assert!(toml::from_str::<ScaleConfigFile>("[network]\nport = 1").is_err());
    }

    #[test]
    fn inline_labels_win_over_file() -> Result<()> {
        let settings = DetectorSettings {
            labels: vec!["apple".into()],
            labels_path: Some(PathBuf::from("/nonexistent/labels.txt")),
            ..DetectorSettings::default()
        };
        assert_eq!(settings.resolve_labels()?, vec!["apple".to_string()]);
        Ok(())
    }
}
