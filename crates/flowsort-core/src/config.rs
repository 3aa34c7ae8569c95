use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::calibration::CalibrationConfig;
use crate::consts::{
    DEFAULT_BRIGHTFIELD_EXPOSURE_MS, DEFAULT_CLEAR_RETRY_MS, DEFAULT_CYAN_EXPOSURE_MS,
    DEFAULT_GREEN_YELLOW_EXPOSURE_MS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_PUSH_MS,
    DEFAULT_MAX_SIZE, DEFAULT_MIN_SIZE, DEFAULT_REFRESH_INTERVAL, DEFAULT_SETTLE_DELAY_MS,
    DEFAULT_SORT_SETTLE_MS, DEFAULT_STUCK_TIMEOUT_SECS,
};
use crate::controller::valves::ValveMap;
use crate::error::{Result, SortError};
use crate::frame::Illumination;
use crate::geometry::DeviceGeometry;
use crate::metrics::ClassifierConfig;
use crate::motion::MotionConfig;
use crate::segmentation::SegmentationConfig;

/// Complete, immutable configuration of a sorting run. Built before the loop
/// starts and handed to each component by reference.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(default)]
    pub geometry: DeviceGeometry,
    #[serde(default)]
    pub motion: MotionConfig,
    #[serde(default)]
    pub illumination: IlluminationConfig,
    #[serde(default)]
    pub size: SizeLimits,
    #[serde(default)]
    pub segmentation: SegmentationConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub watchdog: WatchdogConfig,
    /// Accepted specimens between periodic background refreshes (0 disables).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: usize,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub valves: ValveMap,
}

fn default_refresh_interval() -> usize {
    DEFAULT_REFRESH_INTERVAL
}

impl SortConfig {
    pub fn validate(&self) -> Result<()> {
        self.geometry.validate()?;
        self.motion.validate()?;
        self.size.validate()?;
        self.segmentation.validate()?;
        self.calibration.validate()?;
        self.classifier.validate()?;
        self.valves.validate()?;
        Ok(())
    }
}

/// Exposure per illumination channel and the lamp settle delay.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IlluminationConfig {
    #[serde(default = "default_brightfield_ms")]
    pub brightfield_exposure_ms: f64,
    #[serde(default = "default_cyan_ms")]
    pub cyan_exposure_ms: f64,
    #[serde(default = "default_green_yellow_ms")]
    pub green_yellow_exposure_ms: f64,
    /// Delay after switching channel before a capture is valid.
    #[serde(default = "default_settle_ms")]
    pub settle_delay_ms: u64,
}

fn default_brightfield_ms() -> f64 {
    DEFAULT_BRIGHTFIELD_EXPOSURE_MS
}
fn default_cyan_ms() -> f64 {
    DEFAULT_CYAN_EXPOSURE_MS
}
fn default_green_yellow_ms() -> f64 {
    DEFAULT_GREEN_YELLOW_EXPOSURE_MS
}
fn default_settle_ms() -> u64 {
    DEFAULT_SETTLE_DELAY_MS
}

impl Default for IlluminationConfig {
    fn default() -> Self {
        Self {
            brightfield_exposure_ms: DEFAULT_BRIGHTFIELD_EXPOSURE_MS,
            cyan_exposure_ms: DEFAULT_CYAN_EXPOSURE_MS,
            green_yellow_exposure_ms: DEFAULT_GREEN_YELLOW_EXPOSURE_MS,
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
        }
    }
}

impl IlluminationConfig {
    pub fn exposure_ms(&self, illumination: Illumination) -> f64 {
        match illumination {
            Illumination::Brightfield => self.brightfield_exposure_ms,
            Illumination::Cyan => self.cyan_exposure_ms,
            Illumination::GreenYellow => self.green_yellow_exposure_ms,
        }
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }
}

/// Acceptable specimen size range in mask pixels, inclusive on both ends.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SizeLimits {
    #[serde(default = "default_min_size")]
    pub min: usize,
    #[serde(default = "default_max_size")]
    pub max: usize,
    /// Segment a fresh brightfield frame after fluorescence imaging and apply
    /// the limits again before actuation.
    #[serde(default = "default_true")]
    pub recheck_after_imaging: bool,
}

fn default_min_size() -> usize {
    DEFAULT_MIN_SIZE
}
fn default_max_size() -> usize {
    DEFAULT_MAX_SIZE
}
fn default_true() -> bool {
    true
}

impl Default for SizeLimits {
    fn default() -> Self {
        Self {
            min: DEFAULT_MIN_SIZE,
            max: DEFAULT_MAX_SIZE,
            recheck_after_imaging: true,
        }
    }
}

impl SizeLimits {
    fn validate(&self) -> Result<()> {
        if self.min > self.max {
            return Err(SortError::InvalidConfig(format!(
                "size.min ({}) exceeds size.max ({})",
                self.min, self.max
            )));
        }
        Ok(())
    }
}

/// Watchdog and pacing timeouts.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WatchdogConfig {
    /// Interval between clearance retries.
    #[serde(default = "default_clear_retry_ms")]
    pub clear_retry_ms: u64,
    /// Clearance budget before the stuck alert and forced reset.
    #[serde(default = "default_stuck_timeout_secs")]
    pub stuck_timeout_secs: u64,
    /// Time without a detection before the idle alert.
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
    /// Pause after clearance before loading resumes.
    #[serde(default = "default_sort_settle_ms")]
    pub sort_settle_ms: u64,
    /// Longest queue push before the input is closed anyway.
    #[serde(default = "default_max_push_ms")]
    pub max_push_ms: u64,
}

fn default_clear_retry_ms() -> u64 {
    DEFAULT_CLEAR_RETRY_MS
}
fn default_stuck_timeout_secs() -> u64 {
    DEFAULT_STUCK_TIMEOUT_SECS
}
fn default_idle_timeout_secs() -> u64 {
    DEFAULT_IDLE_TIMEOUT_SECS
}
fn default_sort_settle_ms() -> u64 {
    DEFAULT_SORT_SETTLE_MS
}
fn default_max_push_ms() -> u64 {
    DEFAULT_MAX_PUSH_MS
}

impl Default for WatchdogConfig {
    fn default() -> Self {
        Self {
            clear_retry_ms: DEFAULT_CLEAR_RETRY_MS,
            stuck_timeout_secs: DEFAULT_STUCK_TIMEOUT_SECS,
            idle_timeout_secs: DEFAULT_IDLE_TIMEOUT_SECS,
            sort_settle_ms: DEFAULT_SORT_SETTLE_MS,
            max_push_ms: DEFAULT_MAX_PUSH_MS,
        }
    }
}

impl WatchdogConfig {
    pub fn clear_retry(&self) -> Duration {
        Duration::from_millis(self.clear_retry_ms)
    }

    pub fn stuck_timeout(&self) -> Duration {
        Duration::from_secs(self.stuck_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_secs(self.idle_timeout_secs)
    }

    pub fn sort_settle(&self) -> Duration {
        Duration::from_millis(self.sort_settle_ms)
    }

    pub fn max_push(&self) -> Duration {
        Duration::from_millis(self.max_push_ms)
    }
}
