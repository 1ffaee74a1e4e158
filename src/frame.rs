//! Captured frames.
//!
//! - `Frame`: owned RGB24 pixel buffer produced by a `FrameSource`.
//! - `FrameSource`: anything the live session can pull frames from (camera, tests).
//!
//! Frames are produced fresh every iteration and dropped once the overlay has been
//! shown; nothing here is persisted.

use anyhow::{anyhow, Result};
use image::RgbImage;
use std::time::Instant;

/// One RGB24 frame, row-major, 3 bytes per pixel.
#[derive(Clone)]
pub struct Frame {
    pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonic capture instant.
    pub captured_at: Instant,
}

impl Frame {
    /// Wrap an RGB24 buffer. Fails when the length does not match the dimensions.
    pub fn from_rgb(pixels: Vec<u8>, width: u32, height: u32) -> Result<Self> {
        let expected = rgb_len(width, height)?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "RGB frame length mismatch: expected {}, got {}",
                expected,
                pixels.len()
            ));
        }
        Ok(Self {
            pixels,
            width,
            height,
            captured_at: Instant::now(),
        })
    }

    pub fn from_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            pixels: image.into_raw(),
            width,
            height,
            captured_at: Instant::now(),
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    /// Copy of the frame as an `RgbImage`, used as the annotation canvas.
    pub fn to_image(&self) -> RgbImage {
        // Length is validated on construction.
        RgbImage::from_raw(self.width, self.height, self.pixels.clone())
            .unwrap_or_else(|| RgbImage::new(self.width, self.height))
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width)
            .field("height", &self.height)
            .field("bytes", &self.pixels.len())
            .finish()
    }
}

/// Source of frames for the live loop.
///
/// A failed capture is fatal for the live loop; implementations do not retry.
pub trait FrameSource {
    /// Human-readable source identifier (device path, stub name).
    fn describe(&self) -> String;

    /// Block until the next frame is available.
    fn next_frame(&mut self) -> Result<Frame>;

    /// Release the underlying device. Called once on the normal exit path.
    fn close(&mut self) {}
}

pub(crate) fn rgb_len(width: u32, height: u32) -> Result<usize> {
    (width as usize)
        .checked_mul(height as usize)
        .and_then(|v| v.checked_mul(3))
        .ok_or_else(|| anyhow!("frame dimensions overflow"))
}
