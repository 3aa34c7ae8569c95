use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_MAX_HOLE_AREA, DEFAULT_SEGMENTATION_PERCENTILE, DEFAULT_SMOOTHING_ITERATIONS,
};
use crate::error::{Result, SortError};

/// Pixel adjacency used when grouping foreground pixels into blobs.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Connectivity {
    /// Edge neighbours only.
    #[default]
    Four,
    /// Edge and corner neighbours.
    Eight,
}

impl Connectivity {
    /// Adjacency for the complement of a mask grouped with `self`.
    pub fn dual(self) -> Self {
        match self {
            Self::Four => Self::Eight,
            Self::Eight => Self::Four,
        }
    }
}

impl std::fmt::Display for Connectivity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Four => write!(f, "4-connected"),
            Self::Eight => write!(f, "8-connected"),
        }
    }
}

/// Configuration for turning a background-subtracted frame into a specimen mask.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SegmentationConfig {
    /// Pixels at or above this percentile of the subtracted frame are foreground.
    #[serde(default = "default_percentile")]
    pub percentile: f64,
    /// Adjacency for the largest-component step.
    #[serde(default)]
    pub connectivity: Connectivity,
    /// Enclosed holes smaller than this many pixels are filled.
    #[serde(default = "default_max_hole_area")]
    pub max_hole_area: usize,
    /// Erosion passes followed by as many dilation passes. 0 disables smoothing.
    #[serde(default = "default_smoothing_iterations")]
    pub smoothing_iterations: usize,
}

fn default_percentile() -> f64 {
    DEFAULT_SEGMENTATION_PERCENTILE
}
fn default_max_hole_area() -> usize {
    DEFAULT_MAX_HOLE_AREA
}
fn default_smoothing_iterations() -> usize {
    DEFAULT_SMOOTHING_ITERATIONS
}

impl Default for SegmentationConfig {
    fn default() -> Self {
        Self {
            percentile: DEFAULT_SEGMENTATION_PERCENTILE,
            connectivity: Connectivity::default(),
            max_hole_area: DEFAULT_MAX_HOLE_AREA,
            smoothing_iterations: DEFAULT_SMOOTHING_ITERATIONS,
        }
    }
}

impl SegmentationConfig {
    pub(crate) fn validate(&self) -> Result<()> {
        if !(0.0..=100.0).contains(&self.percentile) {
            return Err(SortError::InvalidConfig(format!(
                "segmentation.percentile {} outside [0, 100]",
                self.percentile
            )));
        }
        Ok(())
    }
}
