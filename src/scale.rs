//! Weight acquisition from a serial-connected scale.
//!
//! The scale firmware prints one reading per line, in kilograms (`0.152\r\n`). The live
//! loop polls without blocking; malformed lines are dropped and the last good weight is
//! kept. If the link cannot be opened the scale runs degraded with a fixed 0.0 weight.

use anyhow::{Context, Result};
use std::io::Read;
use std::time::Duration;

use crate::config::SerialSettings;

/// Cap on buffered bytes without a newline; older bytes are discarded past this.
const MAX_PENDING_BYTES: usize = 4096;

/// Raw line transport under the scale.
pub trait LineSource {
    /// Return the next complete line (newline stripped) if one is already available.
    /// Must not block beyond the transport's short read timeout.
    fn poll_line(&mut self) -> Result<Option<Vec<u8>>>;

    fn describe(&self) -> String;
}

/// Parse a scale line as kilograms.
///
/// Non-UTF-8, empty, unparsable and non-finite lines yield `None`.
pub fn parse_weight(line: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(line).ok()?.trim();
    if text.is_empty() {
        return None;
    }
    text.parse::<f64>().ok().filter(|w| w.is_finite())
}

/// Latest weight plus the (optional) link it comes from.
pub struct Scale {
    link: Option<Box<dyn LineSource>>,
    weight_kg: f64,
    lines_accepted: u64,
    lines_dropped: u64,
}

impl Scale {
    pub fn new(link: Box<dyn LineSource>) -> Self {
        Self {
            link: Some(link),
            weight_kg: 0.0,
            lines_accepted: 0,
            lines_dropped: 0,
        }
    }

    /// Scale with no link: weight stays at 0.0.
    pub fn degraded() -> Self {
        Self {
            link: None,
            weight_kg: 0.0,
            lines_accepted: 0,
            lines_dropped: 0,
        }
    }

    /// Open the serial port described by `settings`, falling back to degraded mode.
    pub fn connect(settings: &SerialSettings) -> Self {
        match SerialLink::open(settings) {
            Ok(link) => {
                log::info!(
                    "scale: connected to {} at {} baud",
                    settings.port,
                    settings.baud_rate
                );
                Self::new(Box::new(link))
            }
            Err(err) => {
                log::warn!(
                    "scale: {:#}; continuing without weight readings (weight fixed at 0.0 kg)",
                    err
                );
                Self::degraded()
            }
        }
    }

    pub fn is_connected(&self) -> bool {
        self.link.is_some()
    }

    /// Latest valid weight in kilograms.
    pub fn weight_kg(&self) -> f64 {
        self.weight_kg
    }

    pub fn lines_accepted(&self) -> u64 {
        self.lines_accepted
    }

    pub fn lines_dropped(&self) -> u64 {
        self.lines_dropped
    }

    /// Drain every complete line currently available.
    ///
    /// Returns the new weight if at least one valid line arrived. A link I/O error drops
    /// the link for the rest of the run; the last weight is kept.
    pub fn poll(&mut self) -> Option<f64> {
        let link = self.link.as_mut()?;
        let mut updated = None;
        loop {
            match link.poll_line() {
                Ok(Some(line)) => match parse_weight(&line) {
                    Some(weight) => {
                        self.weight_kg = weight;
                        self.lines_accepted += 1;
                        updated = Some(weight);
                    }
                    None => {
                        self.lines_dropped += 1;
                        log::debug!(
                            "scale: dropped malformed line {:?}",
                            String::from_utf8_lossy(&line)
                        );
                    }
                },
                Ok(None) => break,
                Err(err) => {
                    log::warn!(
                        "scale: link {} failed: {:#}; keeping last weight {:.3} kg",
                        link.describe(),
                        err,
                        self.weight_kg
                    );
                    self.link = None;
                    break;
                }
            }
        }
        updated
    }

    /// Drop the link. Called once on the normal exit path.
    pub fn close(&mut self) {
        if let Some(link) = self.link.take() {
            log::info!("scale: closed {}", link.describe());
        }
    }
}

/// Splits a byte stream into newline-terminated lines.
///
/// A partial line that outgrows `MAX_PENDING_BYTES` is discarded whole, along with the
/// rest of it up to the next newline, so no fragment of it is ever returned as a line.
#[derive(Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
    discarding: bool,
}

impl LineBuffer {
    pub(crate) fn extend(&mut self, mut bytes: &[u8]) {
        if self.discarding {
            let Some(end) = bytes.iter().position(|b| *b == b'\n') else {
                return;
            };
            self.discarding = false;
            bytes = &bytes[end + 1..];
        }
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_PENDING_BYTES && !self.pending.contains(&b'\n') {
            log::debug!("scale: dropped {} bytes without a line break", self.pending.len());
            self.pending.clear();
            self.discarding = true;
        }
    }

    pub(crate) fn take_line(&mut self) -> Option<Vec<u8>> {
        let end = self.pending.iter().position(|b| *b == b'\n')?;
        let mut line: Vec<u8> = self.pending.drain(..=end).collect();
        line.pop();
        Some(line)
    }
}

/// Serial port transport (`serialport` crate).
pub struct SerialLink {
    port: Box<dyn serialport::SerialPort>,
    name: String,
    buffer: LineBuffer,
}

impl SerialLink {
    pub fn open(settings: &SerialSettings) -> Result<Self> {
        let port = serialport::new(&settings.port, settings.baud_rate)
            .timeout(settings.timeout)
            .open()
            .with_context(|| format!("failed to open serial port {}", settings.port))?;
        if settings.settle > Duration::ZERO {
            // Opening the port resets most Arduino boards.
            std::thread::sleep(settings.settle);
        }
        Ok(Self {
            port,
            name: settings.port.clone(),
            buffer: LineBuffer::default(),
        })
    }
}

impl LineSource for SerialLink {
    fn poll_line(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(line) = self.buffer.take_line() {
            return Ok(Some(line));
        }
        let available = self
            .port
            .bytes_to_read()
            .context("query serial input buffer")? as usize;
        if available == 0 {
            return Ok(None);
        }
        let mut chunk = vec![0u8; available];
        match self.port.read(&mut chunk) {
            Ok(n) => self.buffer.extend(&chunk[..n]),
            Err(err) if err.kind() == std::io::ErrorKind::TimedOut => {}
            Err(err) => return Err(anyhow::Error::new(err).context("read serial port")),
        }
        Ok(self.buffer.take_line())
    }

    fn describe(&self) -> String {
        self.name.clone()
    }
}
