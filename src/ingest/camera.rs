//! Camera frame source.
//!
//! `CameraSource` captures frames from a local V4L2 device (feature `camera-v4l2`) or,
//! for `stub://` devices, synthesizes frames that look like a YUYV webcam. Every frame
//! leaves this module as packed RGB24.
//!
//! Opening the camera is fatal on failure, and so is a failed capture mid-run: there
//! is no reconnect logic.

use anyhow::{anyhow, Result};
#[cfg(feature = "camera-v4l2")]
use anyhow::Context;
#[cfg(feature = "camera-v4l2")]
use ouroboros::self_referencing;

use super::normalize::{normalize_to_rgb, PixelFormat};
use crate::config::CameraSettings;
use crate::frame::{Frame, FrameSource};

/// Camera frame source.
pub struct CameraSource {
    backend: CameraBackend,
}

enum CameraBackend {
    Synthetic(SyntheticCamera),
    #[cfg(feature = "camera-v4l2")]
    Device(DeviceCamera),
}

impl CameraSource {
    pub fn new(settings: CameraSettings) -> Result<Self> {
        if settings.width == 0 || settings.height == 0 {
            return Err(anyhow!("camera frame size must be non-zero"));
        }
        if settings.device.starts_with("stub://") {
            return Ok(Self {
                backend: CameraBackend::Synthetic(SyntheticCamera::new(settings)),
            });
        }
        #[cfg(feature = "camera-v4l2")]
        {
            Ok(Self {
                backend: CameraBackend::Device(DeviceCamera::new(settings)),
            })
        }
        #[cfg(not(feature = "camera-v4l2"))]
        {
            Err(anyhow!(
                "camera device {} requires the camera-v4l2 feature",
                settings.device
            ))
        }
    }

    /// Open the camera. Failure here is a startup error.
    pub fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.connect(),
        }
    }

    /// Frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.frame_count,
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.frame_count,
        }
    }
}

impl FrameSource for CameraSource {
    fn describe(&self) -> String {
        match &self.backend {
            CameraBackend::Synthetic(source) => source.settings.device.clone(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.settings.device.clone(),
        }
    }

    fn next_frame(&mut self) -> Result<Frame> {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.next_frame(),
        }
    }

    fn close(&mut self) {
        match &mut self.backend {
            CameraBackend::Synthetic(source) => source.connected = false,
            #[cfg(feature = "camera-v4l2")]
            CameraBackend::Device(source) => source.close(),
        }
        log::info!(
            "camera: released {} after {} frames",
            self.describe(),
            self.frames_captured()
        );
    }
}

// ----------------------------------------------------------------------------
// Synthetic camera (stub://) for tests and demos
// ----------------------------------------------------------------------------

struct SyntheticCamera {
    settings: CameraSettings,
    connected: bool,
    frame_count: u64,
}

impl SyntheticCamera {
    fn new(settings: CameraSettings) -> Self {
        Self {
            settings,
            connected: false,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!(
            "camera: connected to {} (synthetic {}x{})",
            self.settings.device,
            self.settings.width,
            self.settings.height
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        if !self.connected {
            return Err(anyhow!("camera {} is not connected", self.settings.device));
        }
        self.frame_count += 1;
        let (width, height) = (self.settings.width & !1, self.settings.height);
        let yuyv = self.generate_yuyv(width, height);
        let rgb = normalize_to_rgb(&yuyv, width, height, PixelFormat::Yuyv)?;
        Frame::from_rgb(rgb, width, height)
    }

    /// Horizontal luma gradient drifting one step per frame, neutral chroma.
    fn generate_yuyv(&self, width: u32, height: u32) -> Vec<u8> {
        let mut yuyv = Vec::with_capacity((width * height * 2) as usize);
        for _ in 0..height {
            for x in (0..width).step_by(2) {
                let luma = ((x as u64 + self.frame_count) % 256) as u8;
                yuyv.extend_from_slice(&[luma, 128, luma.wrapping_add(1), 128]);
            }
        }
        yuyv
    }
}

// ----------------------------------------------------------------------------
// V4L2 device camera
// ----------------------------------------------------------------------------

#[cfg(feature = "camera-v4l2")]
struct DeviceCamera {
    settings: CameraSettings,
    state: Option<DeviceState>,
    format: PixelFormat,
    frame_count: u64,
    active_width: u32,
    active_height: u32,
}

#[cfg(feature = "camera-v4l2")]
#[self_referencing]
struct DeviceState {
    device: v4l::Device,
    #[borrows(mut device)]
    #[covariant]
    stream: v4l::prelude::MmapStream<'this, v4l::Device>,
}

#[cfg(feature = "camera-v4l2")]
impl DeviceCamera {
    fn new(settings: CameraSettings) -> Self {
        Self {
            active_width: settings.width,
            active_height: settings.height,
            settings,
            state: None,
            format: PixelFormat::Yuyv,
            frame_count: 0,
        }
    }

    fn connect(&mut self) -> Result<()> {
        use v4l::buffer::Type;
        use v4l::video::Capture;

        let mut device = v4l::Device::with_path(&self.settings.device)
            .with_context(|| format!("open camera {}", self.settings.device))?;
        let mut format = device.format().context("read camera format")?;
        format.width = self.settings.width;
        format.height = self.settings.height;
        format.fourcc = v4l::FourCC::new(b"YUYV");

        let format = match device.set_format(&format) {
            Ok(format) => format,
            Err(err) => {
                log::warn!(
                    "camera: failed to set format on {}: {}",
                    self.settings.device,
                    err
                );
                device
                    .format()
                    .context("read camera format after set failure")?
            }
        };
        self.format = PixelFormat::from_fourcc(&format.fourcc.repr).ok_or_else(|| {
            anyhow!(
                "camera {} delivers unsupported pixel format {}",
                self.settings.device,
                format.fourcc
            )
        })?;

        if self.settings.target_fps > 0 {
            let params = v4l::video::capture::Parameters::with_fps(self.settings.target_fps);
            if let Err(err) = device.set_params(&params) {
                log::warn!(
                    "camera: failed to set fps on {}: {}",
                    self.settings.device,
                    err
                );
            }
        }

        self.active_width = format.width;
        self.active_height = format.height;

        let state = DeviceStateBuilder {
            device,
            stream_builder: |device| {
                v4l::prelude::MmapStream::with_buffers(device, Type::VideoCapture, 4)
                    .map_err(|err| anyhow::Error::new(err).context("create camera buffer stream"))
            },
        }
        .try_build()?;
        self.state = Some(state);

        log::info!(
            "camera: connected to {} ({}x{}, {:?})",
            self.settings.device,
            self.active_width,
            self.active_height,
            self.format
        );
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Frame> {
        use v4l::io::traits::CaptureStream;

        let state = self.state.as_mut().context("camera not connected")?;
        let (buf, _meta) = state
            .with_mut(|fields| fields.stream.next())
            .map_err(|err| anyhow::Error::new(err).context("capture camera frame"))?;
        let rgb = normalize_to_rgb(buf, self.active_width, self.active_height, self.format)?;
        self.frame_count += 1;
        Frame::from_rgb(rgb, self.active_width, self.active_height)
    }

    fn close(&mut self) {
        self.state = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stub_settings() -> CameraSettings {
        CameraSettings {
            device: "stub://test".to_string(),
            target_fps: 10,
            width: 64,
            height: 48,
        }
    }

    #[test]
    fn stub_camera_produces_rgb_frames() -> Result<()> {
        let mut camera = CameraSource::new(stub_settings())?;
        camera.connect()?;
        let frame = camera.next_frame()?;
        assert_eq!((frame.width, frame.height), (64, 48));
        assert_eq!(frame.pixels().len(), 64 * 48 * 3);
        assert_eq!(camera.frames_captured(), 1);
        Ok(())
    }

    #[test]
    fn stub_frames_change_over_time() -> Result<()> {
        let mut camera = CameraSource::new(stub_settings())?;
        camera.connect()?;
        let first = camera.next_frame()?;
        let second = camera.next_frame()?;
        assert_ne!(first.pixels(), second.pixels());
        Ok(())
    }

    #[test]
    fn capture_before_connect_fails() -> Result<()> {
        let mut camera = CameraSource::new(stub_settings())?;
        assert!(camera.next_frame().is_err());
        Ok(())
    }

    #[test]
    fn closed_camera_stops_capturing() -> Result<()> {
        let mut camera = CameraSource::new(stub_settings())?;
        camera.connect()?;
        camera.close();
        assert!(camera.next_frame().is_err());
        Ok(())
    }

    #[cfg(not(feature = "camera-v4l2"))]
    #[test]
    fn device_path_requires_feature() {
        let settings = CameraSettings {
            device: "/dev/video0".to_string(),
            ..stub_settings()
        };
        let err = CameraSource::new(settings).err().expect("device needs feature");
        assert!(err.to_string().contains("camera-v4l2"));
    }
}
