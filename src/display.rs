//! Where annotated frames go.
//!
//! `WindowSink` (feature `display-window`) shows frames in a desktop window and reports
//! `q`/close as a quit request. `HeadlessSink` discards frames and never asks to quit;
//! the loop then stops on Ctrl-C or a frame limit.

use anyhow::Result;
use image::RgbImage;

pub trait FrameSink {
    /// Present one annotated frame. `status` is the overlay text as a single line.
    fn show(&mut self, frame: &RgbImage, status: &str) -> Result<()>;

    /// True once the operator asked to stop.
    fn quit_requested(&self) -> bool;

    /// Release the window. Called once on the normal exit path.
    fn close(&mut self) {}
}

/// Sink for runs without a display.
#[derive(Debug, Default)]
pub struct HeadlessSink {
    last_status: Option<String>,
    frames_shown: u64,
}

impl HeadlessSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_shown(&self) -> u64 {
        self.frames_shown
    }

    pub fn last_status(&self) -> Option<&str> {
        self.last_status.as_deref()
    }
}

impl FrameSink for HeadlessSink {
    fn show(&mut self, _frame: &RgbImage, status: &str) -> Result<()> {
        self.frames_shown += 1;
        if self.last_status.as_deref() != Some(status) {
            log::debug!("overlay: {}", status);
            self.last_status = Some(status.to_string());
        }
        Ok(())
    }

    fn quit_requested(&self) -> bool {
        false
    }
}

/// Pack RGB24 pixels into minifb's `0RGB` u32 layout.
#[cfg_attr(not(feature = "display-window"), allow(dead_code))]
pub(crate) fn to_0rgb(frame: &RgbImage, buffer: &mut Vec<u32>) {
    buffer.clear();
    buffer.extend(
        frame
            .pixels()
            .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2])),
    );
}

#[cfg(feature = "display-window")]
pub use window::WindowSink;

#[cfg(feature = "display-window")]
mod window {
    use anyhow::{anyhow, Result};
    use image::RgbImage;
    use minifb::{Key, Window, WindowOptions};

    use super::{to_0rgb, FrameSink};

    /// Desktop window backed by `minifb`.
    pub struct WindowSink {
        window: Option<Window>,
        title: String,
        buffer: Vec<u32>,
        quit: bool,
        last_status: String,
    }

    impl WindowSink {
        pub fn open(title: &str, width: u32, height: u32) -> Result<Self> {
            let window = Window::new(
                title,
                width as usize,
                height as usize,
                WindowOptions::default(),
            )
            .map_err(|e| anyhow!("failed to open display window: {}", e))?;
            Ok(Self {
                window: Some(window),
                title: title.to_string(),
                buffer: Vec::new(),
                quit: false,
                last_status: String::new(),
            })
        }
    }

    impl FrameSink for WindowSink {
        fn show(&mut self, frame: &RgbImage, status: &str) -> Result<()> {
            let Some(window) = self.window.as_mut() else {
                return Ok(());
            };
            if status != self.last_status {
                window.set_title(&format!("{} - {}", self.title, status));
                self.last_status = status.to_string();
            }
            to_0rgb(frame, &mut self.buffer);
            window
                .update_with_buffer(&self.buffer, frame.width() as usize, frame.height() as usize)
                .map_err(|e| anyhow!("failed to update display window: {}", e))?;
            if !window.is_open() || window.is_key_down(Key::Q) {
                self.quit = true;
            }
            Ok(())
        }

        fn quit_requested(&self) -> bool {
            self.quit
        }

        fn close(&mut self) {
            if self.window.take().is_some() {
                log::info!("display: window closed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn headless_sink_counts_frames_and_never_quits() -> Result<()> {
        let mut sink = HeadlessSink::new();
        let frame = RgbImage::new(4, 4);
        sink.show(&frame, "Item: No item")?;
        sink.show(&frame, "Item: apple (90%)")?;
        assert_eq!(sink.frames_shown(), 2);
        assert_eq!(sink.last_status(), Some("Item: apple (90%)"));
        assert!(!sink.quit_requested());
        Ok(())
    }

    #[test]
    fn packs_pixels_as_0rgb() {
        let frame = RgbImage::from_pixel(2, 1, Rgb([0x12, 0x34, 0x56]));
        let mut buffer = Vec::new();
        to_0rgb(&frame, &mut buffer);
        assert_eq!(buffer, vec![0x0012_3456, 0x0012_3456]);
    }
}
