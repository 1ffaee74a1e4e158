use anyhow::{anyhow, Result};
use std::path::Path;

use crate::config::DetectorSettings;
use crate::detect::backends::StubBackend;
use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detector backend trait.
///
/// The pipelines only consume the label and confidence of the top detection; boxes are
/// used for drawing. Output order is the backend's native order, which decides ties.
pub trait DetectorBackend {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Run detection on a frame, keeping detections with confidence >= `confidence_threshold`.
    fn detect(&mut self, frame: &Frame, confidence_threshold: f32) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Build the backend described by the detector settings.
///
/// `stub://` model paths select the stub backend. Anything else must be an existing
/// model file; a missing model is a startup error.
pub fn load_backend(settings: &DetectorSettings) -> Result<Box<dyn DetectorBackend>> {
    if let Some(spec) = settings.model_path.strip_prefix("stub://") {
        let backend = StubBackend::from_spec(spec)?;
        log::info!("detector: stub backend ({})", spec);
        return Ok(Box::new(backend));
    }

    let model_path = Path::new(&settings.model_path);
    if !model_path.is_file() {
        return Err(anyhow!(
            "model file not found at {}",
            model_path.display()
        ));
    }

    #[cfg(feature = "backend-tract")]
    {
        let labels = settings.resolve_labels()?;
        let mut backend = crate::detect::backends::TractBackend::new(
            model_path,
            labels,
            settings.input_width,
            settings.input_height,
        )?
        .with_iou_threshold(settings.iou_threshold);
        backend.warm_up()?;
        log::info!("detector: loaded {}", model_path.display());
        Ok(Box::new(backend))
    }
    #[cfg(not(feature = "backend-tract"))]
    {
        Err(anyhow!(
            "ONNX inference for {} requires the backend-tract feature",
            model_path.display()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_model_is_fatal() {
        let settings = DetectorSettings {
            model_path: "/nonexistent/best.onnx".to_string(),
            ..DetectorSettings::default()
        };
        let err = load_backend(&settings).err().expect("missing model must fail");
        assert!(err.to_string().contains("model file not found"));
    }

    #[test]
    fn stub_path_selects_stub_backend() -> Result<()> {
        let settings = DetectorSettings {
            model_path: "stub://apple:0.8".to_string(),
            ..DetectorSettings::default()
        };
        let backend = load_backend(&settings)?;
        assert_eq!(backend.name(), "stub");
        Ok(())
    }
}
