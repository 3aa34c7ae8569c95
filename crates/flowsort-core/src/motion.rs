use serde::{Deserialize, Serialize};

use crate::background::{check_shape, roi_abs_diff_sum, BackgroundModel};
use crate::consts::{
    DEFAULT_CLEARING_MULTIPLIER, DEFAULT_DETECTION_MULTIPLIER, DEFAULT_LOST_MULTIPLIER,
    DEFAULT_MIN_NOISE_BASELINE, DEFAULT_POSITION_MULTIPLIER, DEFAULT_PUSH_MULTIPLIER,
    DEFAULT_QUEUE_MULTIPLIER,
};
use crate::error::{Result, SortError};
use crate::frame::Frame;
use crate::geometry::DeviceGeometry;

/// Multipliers applied to the noise baselines by the motion tests.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MotionConfig {
    /// K_d: detection fires when `sum - noise > K_d * noise`.
    #[serde(default = "default_detection")]
    pub detection_multiplier: f64,
    /// K_l: lost fires when `sum - noise < K_l * noise` over the position ROI.
    #[serde(default = "default_lost")]
    pub lost_multiplier: f64,
    /// K_p: positioned fires when frame-to-frame change is below `K_p * noise`.
    #[serde(default = "default_position")]
    pub position_multiplier: f64,
    /// K_c: cleared fires when the clearing ROI is within `K_c * noise` of background.
    #[serde(default = "default_clearing")]
    pub clearing_multiplier: f64,
    /// Lower bound applied to every measured baseline.
    #[serde(default = "default_min_noise")]
    pub min_noise_baseline: f64,
    /// K_q: queued fires when the queue ROI difference exceeds `K_q` times
    /// the detection baseline.
    #[serde(default = "default_queue")]
    pub queue_multiplier: f64,
    /// Detection-window rise, in baselines, that ends a queue push.
    #[serde(default = "default_push")]
    pub push_multiplier: f64,
}

fn default_detection() -> f64 {
    DEFAULT_DETECTION_MULTIPLIER
}
fn default_lost() -> f64 {
    DEFAULT_LOST_MULTIPLIER
}
fn default_position() -> f64 {
    DEFAULT_POSITION_MULTIPLIER
}
fn default_clearing() -> f64 {
    DEFAULT_CLEARING_MULTIPLIER
}
fn default_min_noise() -> f64 {
    DEFAULT_MIN_NOISE_BASELINE
}
fn default_queue() -> f64 {
    DEFAULT_QUEUE_MULTIPLIER
}
fn default_push() -> f64 {
    DEFAULT_PUSH_MULTIPLIER
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            detection_multiplier: DEFAULT_DETECTION_MULTIPLIER,
            lost_multiplier: DEFAULT_LOST_MULTIPLIER,
            position_multiplier: DEFAULT_POSITION_MULTIPLIER,
            clearing_multiplier: DEFAULT_CLEARING_MULTIPLIER,
            min_noise_baseline: DEFAULT_MIN_NOISE_BASELINE,
            queue_multiplier: DEFAULT_QUEUE_MULTIPLIER,
            push_multiplier: DEFAULT_PUSH_MULTIPLIER,
        }
    }
}

impl MotionConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        let all = [
            ("detection_multiplier", self.detection_multiplier),
            ("lost_multiplier", self.lost_multiplier),
            ("position_multiplier", self.position_multiplier),
            ("clearing_multiplier", self.clearing_multiplier),
            ("queue_multiplier", self.queue_multiplier),
            ("push_multiplier", self.push_multiplier),
        ];
        for (name, value) in all {
            if value.is_nan() || value <= 0.0 {
                return Err(SortError::InvalidConfig(format!("motion.{name} must be positive")));
            }
        }
        if self.min_noise_baseline < 0.0 {
            return Err(SortError::InvalidConfig(
                "motion.min_noise_baseline must not be negative".into(),
            ));
        }
        Ok(())
    }
}

/// Frame-difference gates for the control loop.
///
/// Every test is a pure function of two frames, the fixed geometry and the
/// background model's noise baselines.
#[derive(Clone, Debug)]
pub struct MotionDetector {
    geometry: DeviceGeometry,
    config: MotionConfig,
}

impl MotionDetector {
    pub fn new(geometry: &DeviceGeometry, config: &MotionConfig) -> Self {
        Self {
            geometry: geometry.clone(),
            config: config.clone(),
        }
    }

    /// A specimen has entered the detection window.
    pub fn detected(&self, frame: &Frame, background: &BackgroundModel) -> Result<bool> {
        let sum = background.roi_difference(frame, &self.geometry.detection)?;
        let noise = self.baseline(background.noise().detection);
        Ok(sum - noise > self.config.detection_multiplier * noise)
    }

    /// The position window is back to (near) background: the specimen drifted
    /// out or was never there.
    pub fn lost(&self, frame: &Frame, background: &BackgroundModel) -> Result<bool> {
        let sum = background.roi_difference(frame, &self.geometry.position)?;
        let noise = self.baseline(background.noise().position);
        Ok(sum - noise < self.config.lost_multiplier * noise)
    }

    /// Two successive frames are nearly identical over the position window.
    pub fn positioned(
        &self,
        frame: &Frame,
        previous: &Frame,
        background: &BackgroundModel,
    ) -> Result<bool> {
        check_shape(frame, previous)?;
        let sum = roi_abs_diff_sum(frame.data(), previous.data(), &self.geometry.position);
        let noise = self.baseline(background.noise().position);
        Ok(sum - noise < self.config.position_multiplier * noise)
    }

    /// A specimen is waiting in the upstream queue window. Always false when
    /// the geometry has no queue window.
    pub fn queued(&self, frame: &Frame, background: &BackgroundModel) -> Result<bool> {
        let Some(queue) = &self.geometry.queue else {
            return Ok(false);
        };
        let sum = background.roi_difference(frame, queue)?;
        let noise = self.baseline(background.noise().detection);
        Ok(sum > self.config.queue_multiplier * noise)
    }

    /// The pushed specimen has reached the detection window.
    pub fn pushed_forwards(&self, frame: &Frame, background: &BackgroundModel) -> Result<bool> {
        let sum = background.roi_difference(frame, &self.geometry.detection)?;
        let noise = self.baseline(background.noise().detection);
        Ok(sum - noise > self.config.push_multiplier * noise)
    }

    /// The clearing window is back to background after actuation.
    pub fn cleared(&self, frame: &Frame, background: &BackgroundModel) -> Result<bool> {
        let sum = background.roi_difference(frame, &self.geometry.clearing)?;
        let noise = self.baseline(background.noise().clearing);
        Ok(sum - noise < self.config.clearing_multiplier * noise)
    }

    fn baseline(&self, measured: f64) -> f64 {
        measured.max(self.config.min_noise_baseline)
    }
}
