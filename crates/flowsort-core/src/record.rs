use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outlet a specimen is routed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Up,
    Straight,
    Down,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Straight => "straight",
            Self::Down => "down",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a positioned specimen was not sorted on its metric.
///
/// Variant order is the fixed check precedence: when several conditions hold
/// at once, the first one in this order is reported.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Mask larger than the upper size limit: two specimens or debris clump.
    DoubledWorm,
    /// Mask smaller than the lower size limit.
    SmallWorm,
    /// No masked pixel fell inside the fluorescence sampling window, so the
    /// classifier had nothing to measure.
    Unsampled,
    /// Fluorescence spread evenly over the whole body.
    DeadWorm,
    /// Fluorescence below the classifier's minimum signal.
    DimWorm,
    /// Aspect ratio too low for length-based sorting.
    BentWorm,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DoubledWorm => "doubled_worm",
            Self::SmallWorm => "small_worm",
            Self::Unsampled => "unsampled",
            Self::DeadWorm => "dead_worm",
            Self::DimWorm => "dim_worm",
            Self::BentWorm => "bent_worm",
        }
    }

    pub fn image_category(&self) -> ImageCategory {
        match self {
            Self::DoubledWorm => ImageCategory::Double,
            Self::SmallWorm => ImageCategory::Small,
            Self::Unsampled => ImageCategory::Unsampled,
            Self::DeadWorm => ImageCategory::Dead,
            Self::DimWorm => ImageCategory::Dim,
            Self::BentWorm => ImageCategory::Bent,
        }
    }
}

impl std::fmt::Display for RejectReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Final decision for a positioned specimen.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Disposition {
    /// Routed on its metric.
    Sorted,
    /// Routed straight while its metric seeded the calibration set.
    Calibration,
    Rejected(RejectReason),
}

impl Disposition {
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Sorted => "sorted",
            Self::Calibration => "calibration",
            Self::Rejected(r) => r.as_str(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, Self::Rejected(_))
    }
}

/// Folder/file tag for persisted specimen images.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ImageCategory {
    Accepted,
    Double,
    Small,
    Unsampled,
    Dead,
    Dim,
    Bent,
}

impl ImageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accepted => "accepted",
            Self::Double => "double",
            Self::Small => "small",
            Self::Unsampled => "unsampled",
            Self::Dead => "dead",
            Self::Dim => "dim",
            Self::Bent => "bent",
        }
    }
}

/// One line of the run's record stream. Emitted exactly once per specimen
/// that reached the positioned state.
#[derive(Clone, Debug, PartialEq)]
pub struct SpecimenRecord {
    pub sequence: u64,
    /// Mask pixel count.
    pub size: usize,
    /// Classifier metric values, in the classifier's `record_fields` order.
    /// Empty for size rejections, which happen before any metric is taken.
    pub metrics: Vec<f64>,
    /// Time since the previous specimen was detected.
    pub elapsed: Duration,
    pub direction: Direction,
    pub disposition: Disposition,
}
