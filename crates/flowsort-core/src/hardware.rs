//! Boundary traits for the rig's I/O collaborators.
//!
//! The control loop only talks to the camera, the valve manifold, the alert
//! channel and the run directory through these traits. Faults from
//! [`FrameSource`] and [`ValveActuator`] are fatal; faults from [`Notifier`]
//! and [`Recorder`] are logged and dropped by the caller.

use std::time::{Duration, Instant};

use tracing::warn;

use crate::controller::summary::RunSummary;
use crate::controller::valves::ValveCommand;
use crate::error::Result;
use crate::frame::{Frame, Illumination};
use crate::record::{ImageCategory, SpecimenRecord};

/// A single capture request: which lamp to use and for how long to expose.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CaptureRequest {
    pub illumination: Illumination,
    pub exposure_ms: f64,
}

/// Camera plus illumination control.
pub trait FrameSource: Send {
    /// Capture one frame under the requested illumination. Blocks for the
    /// exposure and readout.
    fn capture(&mut self, request: &CaptureRequest) -> Result<Frame>;
}

/// Pneumatic valve manifold. Commands take effect immediately and are never
/// acknowledged.
pub trait ValveActuator: Send {
    fn execute(&mut self, commands: &[ValveCommand]) -> Result<()>;
}

/// Best-effort operator alert channel.
pub trait Notifier: Send {
    fn send(&mut self, message: &str) -> Result<()>;
}

/// Persistent record of a run: reference images, per-specimen images, the
/// record stream and the closing summary.
pub trait Recorder: Send {
    /// Called once before the first record with the classifier's metric column names.
    fn begin(&mut self, metric_fields: &[String]) -> Result<()>;
    fn save_reference(&mut self, frame: &Frame, tag: &str) -> Result<()>;
    fn save_specimen(&mut self, sequence: u64, category: ImageCategory, frame: &Frame)
        -> Result<()>;
    fn append(&mut self, record: &SpecimenRecord) -> Result<()>;
    fn write_summary(&mut self, summary: &RunSummary) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

/// Monotonic time source for every timeout and delay in the loop.
pub trait Clock: Send + Sync {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;
    fn sleep(&self, duration: Duration);
}

/// Wall-clock implementation backed by [`Instant`] and `thread::sleep`.
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Notifier that only writes the alert to the log.
#[derive(Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn send(&mut self, message: &str) -> Result<()> {
        warn!(alert = message, "Operator alert");
        Ok(())
    }
}
