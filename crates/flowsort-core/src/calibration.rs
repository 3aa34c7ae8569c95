use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::SizeLimits;
use crate::consts::{
    CALIBRATED_MAX_SIZE_FACTOR, CALIBRATED_MIN_SIZE_FACTOR, DEFAULT_CALIBRATION_SAMPLES,
    DEFAULT_LOWER_PERCENTILE, DEFAULT_MIN_CALIBRATION_SAMPLES, DEFAULT_UPPER_PERCENTILE,
};
use crate::error::{Result, SortError};
use crate::stats::{percentile, percentile_in_place};

/// Lower/upper cutoffs on the primary metric. `lower <= upper` always holds.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RoutingThresholds {
    pub lower: f64,
    pub upper: f64,
}

/// How the calibration sample set evolves once seeded.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationMode {
    /// Thresholds are fixed after the initial calibration phase.
    #[default]
    Frozen,
    /// Every sorted specimen's metric is appended and thresholds follow.
    Continuous,
    /// Operator-supplied thresholds; no calibration phase.
    Fixed { lower: f64, upper: f64 },
}

impl std::fmt::Display for CalibrationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Frozen => write!(f, "Frozen"),
            Self::Continuous => write!(f, "Continuous"),
            Self::Fixed { lower, upper } => write!(f, "Fixed ({lower}, {upper})"),
        }
    }
}

/// When thresholds are recomputed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recompute {
    /// On every append.
    #[default]
    Eager,
    /// On every read.
    Lazy,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CalibrationConfig {
    #[serde(default)]
    pub mode: CalibrationMode,
    /// Accepted specimens routed straight to seed the sample set.
    #[serde(default = "default_sample_count")]
    pub sample_count: usize,
    /// Samples required before thresholds may be read.
    #[serde(default = "default_min_samples")]
    pub min_samples: usize,
    #[serde(default = "default_lower_percentile")]
    pub lower_percentile: f64,
    #[serde(default = "default_upper_percentile")]
    pub upper_percentile: f64,
    #[serde(default)]
    pub recompute: Recompute,
    /// Replace the size limits with ones derived from the calibration sizes
    /// once the calibration phase completes.
    #[serde(default)]
    pub derive_size_limits: bool,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            mode: CalibrationMode::default(),
            sample_count: default_sample_count(),
            min_samples: default_min_samples(),
            lower_percentile: default_lower_percentile(),
            upper_percentile: default_upper_percentile(),
            recompute: Recompute::default(),
            derive_size_limits: false,
        }
    }
}

fn default_sample_count() -> usize {
    DEFAULT_CALIBRATION_SAMPLES
}
fn default_min_samples() -> usize {
    DEFAULT_MIN_CALIBRATION_SAMPLES
}
fn default_lower_percentile() -> f64 {
    DEFAULT_LOWER_PERCENTILE
}
fn default_upper_percentile() -> f64 {
    DEFAULT_UPPER_PERCENTILE
}

impl CalibrationConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        for (name, p) in [
            ("lower_percentile", self.lower_percentile),
            ("upper_percentile", self.upper_percentile),
        ] {
            if !(0.0..=100.0).contains(&p) {
                return Err(SortError::InvalidConfig(format!(
                    "calibration {name} must be within [0, 100], got {p}"
                )));
            }
        }
        if self.lower_percentile > self.upper_percentile {
            return Err(SortError::InvalidConfig(format!(
                "calibration lower_percentile ({}) exceeds upper_percentile ({})",
                self.lower_percentile, self.upper_percentile
            )));
        }
        if let CalibrationMode::Fixed { lower, upper } = self.mode {
            if lower > upper {
                return Err(SortError::InvalidConfig(format!(
                    "fixed lower threshold ({lower}) exceeds upper ({upper})"
                )));
            }
            return Ok(());
        }
        if self.sample_count == 0 {
            return Err(SortError::InvalidConfig(
                "calibration sample_count must be at least 1".into(),
            ));
        }
        if self.min_samples == 0 || self.min_samples > self.sample_count {
            return Err(SortError::InvalidConfig(format!(
                "calibration min_samples must be within [1, sample_count = {}], got {}",
                self.sample_count, self.min_samples
            )));
        }
        Ok(())
    }

    pub fn is_fixed(&self) -> bool {
        matches!(self.mode, CalibrationMode::Fixed { .. })
    }
}

/// Result of the final calibration sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CalibrationComplete {
    pub thresholds: RoutingThresholds,
    /// Present when size-limit derivation is enabled.
    pub size_limits: Option<SizeLimits>,
}

/// Accumulates metric values from accepted specimens and derives routing
/// thresholds from their percentiles.
#[derive(Clone, Debug)]
pub struct AdaptiveCalibrator {
    config: CalibrationConfig,
    samples: Vec<f64>,
    sizes: Vec<usize>,
    target: usize,
    calibrating: bool,
    cached: Option<RoutingThresholds>,
}

impl AdaptiveCalibrator {
    pub fn new(config: &CalibrationConfig) -> Self {
        Self {
            config: config.clone(),
            samples: Vec::new(),
            sizes: Vec::new(),
            target: 0,
            calibrating: false,
            cached: None,
        }
    }

    /// Start a calibration phase that collects `initial_count` accepted
    /// samples. Clears any previous samples. No-op in fixed mode.
    ///
    /// The phase never ends below `min_samples`: a smaller count is raised to
    /// it, so a completed phase always has readable thresholds.
    pub fn seed(&mut self, initial_count: usize) {
        if self.config.is_fixed() {
            return;
        }
        self.samples.clear();
        self.sizes.clear();
        self.cached = None;
        self.target = initial_count.max(self.config.min_samples);
        self.calibrating = self.target > 0;
        if self.target > initial_count {
            warn!(
                requested = initial_count,
                min_samples = self.config.min_samples,
                "Calibration count raised to the minimum"
            );
        }
        info!(samples = self.target, "Calibration phase started");
    }

    pub fn is_calibrating(&self) -> bool {
        self.calibrating
    }

    /// Samples still needed to finish the calibration phase.
    pub fn remaining(&self) -> usize {
        if self.calibrating {
            self.target.saturating_sub(self.samples.len())
        } else {
            0
        }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    /// Append a calibration-phase sample. Returns the final thresholds (and
    /// derived size limits) when this sample completes the phase.
    pub fn record_seed(&mut self, metric: f64, size: usize) -> Result<Option<CalibrationComplete>> {
        if !self.calibrating {
            return Ok(None);
        }
        self.push(metric);
        self.sizes.push(size);
        debug!(
            collected = self.samples.len(),
            target = self.target,
            metric,
            "Calibration sample"
        );
        if self.samples.len() < self.target {
            return Ok(None);
        }

        self.calibrating = false;
        let thresholds = self.thresholds()?;
        let size_limits = if self.config.derive_size_limits {
            derive_size_limits(&self.sizes)
        } else {
            None
        };
        info!(
            samples = self.samples.len(),
            lower = thresholds.lower,
            upper = thresholds.upper,
            "Calibration complete"
        );
        Ok(Some(CalibrationComplete {
            thresholds,
            size_limits,
        }))
    }

    /// Append a sorted specimen's metric. Only continuous mode outside the
    /// calibration phase grows the set; returns whether the value was kept.
    pub fn update(&mut self, metric: f64) -> bool {
        if self.calibrating || self.config.mode != CalibrationMode::Continuous {
            return false;
        }
        self.push(metric);
        true
    }

    /// Current routing thresholds.
    ///
    /// Fails with [`SortError::EmptyCalibration`] when no samples exist and
    /// [`SortError::InsufficientSamples`] below the configured minimum.
    pub fn thresholds(&self) -> Result<RoutingThresholds> {
        if let CalibrationMode::Fixed { lower, upper } = self.config.mode {
            return Ok(RoutingThresholds { lower, upper });
        }
        if self.samples.is_empty() {
            return Err(SortError::EmptyCalibration);
        }
        if self.samples.len() < self.config.min_samples {
            return Err(SortError::InsufficientSamples {
                have: self.samples.len(),
                need: self.config.min_samples,
            });
        }
        match (self.config.recompute, self.cached) {
            (Recompute::Eager, Some(cached)) => Ok(cached),
            _ => self.compute(),
        }
    }

    fn push(&mut self, metric: f64) {
        self.samples.push(metric);
        if self.config.recompute == Recompute::Eager
            && self.samples.len() >= self.config.min_samples
        {
            self.cached = self.compute().ok();
        }
    }

    fn compute(&self) -> Result<RoutingThresholds> {
        let mut scratch = self.samples.clone();
        let lower = percentile_in_place(&mut scratch, self.config.lower_percentile)
            .ok_or(SortError::EmptyCalibration)?;
        let upper = percentile_in_place(&mut scratch, self.config.upper_percentile)
            .ok_or(SortError::EmptyCalibration)?;
        Ok(RoutingThresholds {
            lower: lower.min(upper),
            upper: upper.max(lower),
        })
    }
}

/// `min = p10 · 0.5`, `max = p90 · 1.3` of the calibration-phase sizes.
pub fn derive_size_limits(sizes: &[usize]) -> Option<SizeLimits> {
    let p10 = percentile(sizes, DEFAULT_LOWER_PERCENTILE)?;
    let p90 = percentile(sizes, DEFAULT_UPPER_PERCENTILE)?;
    Some(SizeLimits {
        min: (p10 * CALIBRATED_MIN_SIZE_FACTOR).round() as usize,
        max: (p90 * CALIBRATED_MAX_SIZE_FACTOR).round() as usize,
        ..SizeLimits::default()
    })
}
