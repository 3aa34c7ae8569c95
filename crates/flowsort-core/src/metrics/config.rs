use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_AGGREGATE_HIGH_PERCENTILE, DEFAULT_AGGREGATE_LOW_PERCENTILE, DEFAULT_BENT_ASPECT_RATIO,
    DEFAULT_FLUORESCENCE_PERCENTILE, DEFAULT_TOP_MEAN_PERCENTILE,
};
use crate::error::{Result, SortError};
use crate::frame::Illumination;
use crate::segmentation::Connectivity;

use super::aggregates::AggregateClassifier;
use super::fluorescence::{
    PercentileClassifier, RedGreenClassifier, TopMeanClassifier, ViabilityCheck,
};
use super::passthrough::{AlternateClassifier, NoSortClassifier};
use super::shape::LengthClassifier;
use super::Classifier;

/// Which assay drives routing, and its parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassifierConfig {
    NoSort,
    Alternate,
    Percentile(FluorescenceConfig),
    TopMean(FluorescenceConfig),
    Length(LengthConfig),
    Aggregates(AggregateConfig),
    RedGreen(RedGreenConfig),
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::Percentile(FluorescenceConfig::default())
    }
}

impl std::fmt::Display for ClassifierConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NoSort => write!(f, "No sort"),
            Self::Alternate => write!(f, "Alternate"),
            Self::Percentile(c) => write!(f, "Percentile (p{}, {})", c.percentile, c.channel),
            Self::TopMean(c) => write!(f, "Top mean (>p{}, {})", c.percentile, c.channel),
            Self::Length(c) => write!(f, "Length (min aspect {})", c.min_aspect_ratio),
            Self::Aggregates(c) => write!(
                f,
                "Aggregates (p{}/p{}, {})",
                c.low_percentile, c.high_percentile, c.channel
            ),
            Self::RedGreen(c) => write!(
                f,
                "Red/green ({} > {}, {} > {})",
                c.green_channel, c.green_threshold, c.red_channel, c.red_threshold
            ),
        }
    }
}

/// Single-channel fluorescence classifiers (`percentile`, `top_mean`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FluorescenceConfig {
    #[serde(default = "default_channel")]
    pub channel: Illumination,
    /// For `percentile` the reported percentile, for `top_mean` the cut above
    /// which pixels are averaged.
    #[serde(default = "default_fluorescence_percentile")]
    pub percentile: f64,
    /// Metrics below this are rejected as dim. Absent disables the check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_signal: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub viability: Option<ViabilityCheck>,
}

impl Default for FluorescenceConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            percentile: default_fluorescence_percentile(),
            min_signal: None,
            viability: None,
        }
    }
}

impl FluorescenceConfig {
    /// Defaults for the top-mean classifier.
    pub fn top_mean() -> Self {
        Self {
            percentile: DEFAULT_TOP_MEAN_PERCENTILE,
            ..Self::default()
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LengthConfig {
    #[serde(default = "default_min_aspect_ratio")]
    pub min_aspect_ratio: f64,
}

impl Default for LengthConfig {
    fn default() -> Self {
        Self {
            min_aspect_ratio: default_min_aspect_ratio(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregateConfig {
    #[serde(default = "default_channel")]
    pub channel: Illumination,
    #[serde(default = "default_aggregate_low")]
    pub low_percentile: f64,
    #[serde(default = "default_aggregate_high")]
    pub high_percentile: f64,
    #[serde(default)]
    pub connectivity: Connectivity,
}

impl Default for AggregateConfig {
    fn default() -> Self {
        Self {
            channel: default_channel(),
            low_percentile: default_aggregate_low(),
            high_percentile: default_aggregate_high(),
            connectivity: Connectivity::default(),
        }
    }
}

/// Fixed-threshold two-reporter sort. Thresholds are in background-subtracted
/// counts at `percentile`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RedGreenConfig {
    #[serde(default = "default_channel")]
    pub green_channel: Illumination,
    #[serde(default = "default_red_channel")]
    pub red_channel: Illumination,
    #[serde(default = "default_fluorescence_percentile")]
    pub percentile: f64,
    pub green_threshold: f64,
    pub red_threshold: f64,
}

fn default_channel() -> Illumination {
    Illumination::Cyan
}
fn default_red_channel() -> Illumination {
    Illumination::GreenYellow
}
fn default_fluorescence_percentile() -> f64 {
    DEFAULT_FLUORESCENCE_PERCENTILE
}
fn default_min_aspect_ratio() -> f64 {
    DEFAULT_BENT_ASPECT_RATIO
}
fn default_aggregate_low() -> f64 {
    DEFAULT_AGGREGATE_LOW_PERCENTILE
}
fn default_aggregate_high() -> f64 {
    DEFAULT_AGGREGATE_HIGH_PERCENTILE
}

fn check_percentile(name: &str, value: f64) -> Result<()> {
    if !(0.0..=100.0).contains(&value) {
        return Err(SortError::InvalidConfig(format!(
            "{name} must be within [0, 100], got {value}"
        )));
    }
    Ok(())
}

fn check_fluorescence_channel(channel: Illumination) -> Result<()> {
    if channel == Illumination::Brightfield {
        return Err(SortError::InvalidConfig(
            "classifier channel must be a fluorescence channel".into(),
        ));
    }
    Ok(())
}

impl ClassifierConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        match self {
            Self::NoSort | Self::Alternate => Ok(()),
            Self::Percentile(c) | Self::TopMean(c) => {
                check_fluorescence_channel(c.channel)?;
                check_percentile("classifier percentile", c.percentile)?;
                if let Some(v) = &c.viability {
                    check_percentile("viability bright_percentile", v.bright_percentile)?;
                    if v.max_median_ratio <= 0.0 {
                        return Err(SortError::InvalidConfig(
                            "viability max_median_ratio must be positive".into(),
                        ));
                    }
                }
                Ok(())
            }
            Self::Length(c) => {
                if c.min_aspect_ratio.is_nan() || c.min_aspect_ratio < 0.0 {
                    return Err(SortError::InvalidConfig(format!(
                        "min_aspect_ratio must be non-negative, got {}",
                        c.min_aspect_ratio
                    )));
                }
                Ok(())
            }
            Self::Aggregates(c) => {
                check_fluorescence_channel(c.channel)?;
                check_percentile("aggregate low_percentile", c.low_percentile)?;
                check_percentile("aggregate high_percentile", c.high_percentile)?;
                if c.low_percentile > c.high_percentile {
                    return Err(SortError::InvalidConfig(format!(
                        "aggregate low_percentile ({}) exceeds high_percentile ({})",
                        c.low_percentile, c.high_percentile
                    )));
                }
                Ok(())
            }
            Self::RedGreen(c) => {
                check_fluorescence_channel(c.green_channel)?;
                check_fluorescence_channel(c.red_channel)?;
                check_percentile("red/green percentile", c.percentile)?;
                if c.green_channel == c.red_channel {
                    return Err(SortError::InvalidConfig(
                        "red and green channels must differ".into(),
                    ));
                }
                Ok(())
            }
        }
    }

    /// Instantiate the configured strategy.
    pub fn build(&self) -> Box<dyn Classifier> {
        match self {
            Self::NoSort => Box::new(NoSortClassifier),
            Self::Alternate => Box::new(AlternateClassifier),
            Self::Percentile(c) => Box::new(PercentileClassifier {
                channel: c.channel,
                percentile: c.percentile,
                min_signal: c.min_signal,
                viability: c.viability.clone(),
            }),
            Self::TopMean(c) => Box::new(TopMeanClassifier {
                channel: c.channel,
                percentile: c.percentile,
                min_signal: c.min_signal,
                viability: c.viability.clone(),
            }),
            Self::Length(c) => Box::new(LengthClassifier {
                min_aspect_ratio: c.min_aspect_ratio,
            }),
            Self::Aggregates(c) => Box::new(AggregateClassifier {
                channel: c.channel,
                low_percentile: c.low_percentile,
                high_percentile: c.high_percentile,
                connectivity: c.connectivity,
            }),
            Self::RedGreen(c) => Box::new(RedGreenClassifier {
                green_channel: c.green_channel,
                red_channel: c.red_channel,
                percentile: c.percentile,
                green_threshold: c.green_threshold,
                red_threshold: c.red_threshold,
            }),
        }
    }
}
